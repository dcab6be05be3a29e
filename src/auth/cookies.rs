use axum::http::{HeaderMap, header};

/// Name of the cookie carrying the access token.
pub const AUTH_COOKIE: &str = "x-auth-token";

/// Build the `Set-Cookie` value for a freshly issued access token. HTTP-only,
/// Secure, SameSite=Strict, with a max-age mirroring the access lifetime.
#[must_use]
pub fn set_auth_cookie(token: &str, max_age_seconds: i64) -> String {
    format!(
        "{AUTH_COOKIE}={token}; Path=/; Max-Age={max_age_seconds}; HttpOnly; Secure; SameSite=Strict"
    )
}

/// Build the `Set-Cookie` value that removes the auth cookie.
#[must_use]
pub fn clear_auth_cookie() -> String {
    format!("{AUTH_COOKIE}=; Path=/; Max-Age=0; HttpOnly; Secure; SameSite=Strict")
}

/// Whether a `Set-Cookie` value targets the auth cookie (setting or
/// clearing it).
#[must_use]
pub fn is_auth_cookie(set_cookie: &str) -> bool {
    set_cookie
        .trim_start()
        .strip_prefix(AUTH_COOKIE)
        .is_some_and(|rest| rest.starts_with('='))
}

/// Extract the access token from the request's `Cookie` header, if present.
#[must_use]
pub fn auth_cookie_value(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            let (name, token) = pair.trim().split_once('=')?;
            (name == AUTH_COOKIE && !token.is_empty()).then(|| token.to_string())
        })
}
