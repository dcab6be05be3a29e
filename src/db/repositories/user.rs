use anyhow::{Context, Result};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, SqlErr,
    sea_query::Expr,
};
use serde::Serialize;
use tokio::task;
use uuid::Uuid;

use crate::entities::users::{self, Role};

/// User projection safe for client responses: no password hash, no refresh
/// token.
#[derive(Debug, Clone, Serialize)]
pub struct PublicUser {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}

impl From<users::Model> for PublicUser {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            email: model.email,
            role: model.role,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CreateUserError {
    #[error("email already registered")]
    EmailTaken,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Look up a non-deleted user by email. Soft-deleted accounts are treated
    /// as if they do not exist for authentication purposes.
    pub async fn find_active_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        let user = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .filter(users::Column::DeletedAt.is_null())
            .one(&self.conn)
            .await
            .context("Failed to query user by email")?;

        Ok(user)
    }

    /// Look up a non-deleted user by id.
    pub async fn find_active_by_id(&self, id: Uuid) -> Result<Option<users::Model>> {
        let user = users::Entity::find_by_id(id)
            .filter(users::Column::DeletedAt.is_null())
            .one(&self.conn)
            .await
            .context("Failed to query user by id")?;

        Ok(user)
    }

    /// Whether any row (soft-deleted included) already claims this email.
    /// Registration must not resurrect deactivated accounts.
    pub async fn email_exists(&self, email: &str) -> Result<bool> {
        let existing = users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to probe email uniqueness")?;

        Ok(existing.is_some())
    }

    /// Insert a new user with a freshly hashed password and the default role.
    /// A unique-constraint violation on the email column maps to
    /// `EmailTaken`: two concurrent registrations can both pass the
    /// uniqueness probe, and the loser of the insert race is still a
    /// duplicate, not a server fault.
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<users::Model, CreateUserError> {
        let password = password.to_string();
        let password_hash = task::spawn_blocking(move || hash_password(&password))
            .await
            .context("Password hashing task panicked")??;

        let now = Utc::now();

        let user = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            password_hash: Set(password_hash),
            role: Set(Role::User),
            refresh_token: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };

        let user = match user.insert(&self.conn).await {
            Ok(user) => user,
            Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
                return Err(CreateUserError::EmailTaken);
            }
            Err(e) => return Err(anyhow::Error::new(e).context("Failed to insert user").into()),
        };

        Ok(user)
    }

    /// Verify a password against a stored Argon2 hash.
    /// Note: `spawn_blocking` because Argon2 is CPU-intensive and would block
    /// the async runtime if run directly.
    pub async fn verify_password(&self, password: &str, password_hash: &str) -> Result<bool> {
        let password = password.to_string();
        let password_hash = password_hash.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Replace (or clear) the stored refresh token. Writing a new value is
    /// the rotation step: the previous token stops matching and can no longer
    /// mint access tokens.
    pub async fn set_refresh_token(&self, id: Uuid, refresh_token: Option<String>) -> Result<()> {
        users::Entity::update_many()
            .col_expr(users::Column::RefreshToken, Expr::value(refresh_token))
            .col_expr(users::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(users::Column::Id.eq(id))
            .exec(&self.conn)
            .await
            .context("Failed to update refresh token")?;

        Ok(())
    }
}

/// Hash a password using Argon2id with default parameters.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
