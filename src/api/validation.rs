use super::ApiError;

pub fn validate_name(name: &str) -> Result<&str, ApiError> {
    if name.is_empty() {
        return Err(ApiError::validation("Name cannot be empty"));
    }

    if name.len() > 71 {
        return Err(ApiError::validation("Name must be 71 characters or less"));
    }

    Ok(name)
}

/// Shape check only: one `@` with a dotted, space-free domain. Anything
/// stricter belongs to a confirmation email, not the API.
pub fn validate_email(email: &str) -> Result<&str, ApiError> {
    let valid = email
        .split_once('@')
        .is_some_and(|(local, domain)| {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
        })
        && !email.contains(char::is_whitespace);

    if !valid {
        return Err(ApiError::validation(format!("Invalid email: {email}")));
    }

    Ok(email)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.is_empty() {
        return Err(ApiError::validation("Password cannot be empty"));
    }

    if password.len() > 32 {
        return Err(ApiError::validation(
            "Password must be 32 characters or less",
        ));
    }

    Ok(password)
}

pub fn validate_title(title: &str) -> Result<&str, ApiError> {
    if title.trim().is_empty() {
        return Err(ApiError::validation("Title cannot be empty"));
    }

    if title.len() > 500 {
        return Err(ApiError::validation("Title must be 500 characters or less"));
    }

    Ok(title)
}

pub fn validate_pagination(page: u64, limit: u64) -> Result<(u64, u64), ApiError> {
    const MAX_LIMIT: u64 = 100;

    if page == 0 {
        return Err(ApiError::validation("Page must be 1 or greater"));
    }

    if !(1..=MAX_LIMIT).contains(&limit) {
        return Err(ApiError::validation(format!(
            "Invalid limit: {limit}. Limit must be between 1 and {MAX_LIMIT}"
        )));
    }

    Ok((page, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("first.last@sub.domain.org").is_ok());

        assert!(validate_email("").is_err());
        assert!(validate_email("no-at-sign").is_err());
        assert!(validate_email("@missing-local.com").is_err());
        assert!(validate_email("user@nodot").is_err());
        assert!(validate_email("user@.leading.dot").is_err());
        assert!(validate_email("spaced user@b.co").is_err());
    }

    #[test]
    fn password_bounds() {
        assert!(validate_password("x").is_ok());
        assert!(validate_password(&"a".repeat(32)).is_ok());
        assert!(validate_password("").is_err());
        assert!(validate_password(&"a".repeat(33)).is_err());
    }

    #[test]
    fn name_bounds() {
        assert!(validate_name(&"n".repeat(71)).is_ok());
        assert!(validate_name("").is_err());
        assert!(validate_name(&"n".repeat(72)).is_err());
    }

    #[test]
    fn pagination_bounds() {
        assert!(validate_pagination(1, 10).is_ok());
        assert!(validate_pagination(0, 10).is_err());
        assert!(validate_pagination(1, 0).is_err());
        assert!(validate_pagination(1, 101).is_err());
    }
}
