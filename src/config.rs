use anyhow::{Context, Result};
use tracing::warn;

/// Fallback signing secret matching the development default of the reference
/// deployment. `validate()` warns loudly when it is still in use.
pub const DEFAULT_JWT_SECRET: &str = "2202";

/// Process-wide immutable configuration, loaded once at startup from the
/// environment and never re-read per request.
#[derive(Debug, Clone)]
pub struct Config {
    /// Public base URL used to build pagination and self links,
    /// e.g. `http://localhost:3000/api`.
    pub api_url: String,

    /// Base URL of the external change-feed service the shape endpoint
    /// proxies to.
    pub electric_url: String,

    /// Shared HMAC secret for access and refresh tokens.
    pub jwt_secret: String,

    /// Access-token lifetime in minutes.
    pub jwt_expiration_minutes: i64,

    /// Refresh-token lifetime in days.
    pub jwt_refresh_expiration_days: i64,

    /// sea-orm connection string (postgres in production, sqlite for
    /// development and tests).
    pub database_url: String,

    pub server: ServerConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,

    /// Allowed CORS origins. A `*` entry allows any origin but disables
    /// credentialed requests.
    pub cors_allowed_origins: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:3000/api".to_string(),
            electric_url: "http://localhost:3333".to_string(),
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            jwt_expiration_minutes: 5,
            jwt_refresh_expiration_days: 7,
            database_url: "sqlite://tasker.db".to_string(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            cors_allowed_origins: vec!["http://localhost:4321".to_string()],
        }
    }
}

impl Config {
    /// Load configuration from the environment, falling back to defaults for
    /// anything unset. A `.env` file is honored when present.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = Self::default();

        Ok(Self {
            api_url: env_or("API_URL", &defaults.api_url),
            electric_url: env_or("ELECTRIC_URL", &defaults.electric_url),
            jwt_secret: env_or("JWT_SECRET", &defaults.jwt_secret),
            jwt_expiration_minutes: env_parsed(
                "JWT_EXPIRATION_IN_MINUTES",
                defaults.jwt_expiration_minutes,
            )?,
            jwt_refresh_expiration_days: env_parsed(
                "JWT_REFRESH_EXPIRATION_IN_DAYS",
                defaults.jwt_refresh_expiration_days,
            )?,
            database_url: env_or("DATABASE_URL", &defaults.database_url),
            server: ServerConfig {
                port: env_parsed("PORT", defaults.server.port)?,
                cors_allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .map(|v| {
                        v.split(',')
                            .map(|s| s.trim().to_string())
                            .filter(|s| !s.is_empty())
                            .collect()
                    })
                    .unwrap_or(defaults.server.cors_allowed_origins),
            },
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_url.is_empty() {
            anyhow::bail!("API_URL must not be empty");
        }
        if self.electric_url.is_empty() {
            anyhow::bail!("ELECTRIC_URL must not be empty");
        }
        if self.jwt_expiration_minutes <= 0 {
            anyhow::bail!("JWT_EXPIRATION_IN_MINUTES must be positive");
        }
        if self.jwt_refresh_expiration_days <= 0 {
            anyhow::bail!("JWT_REFRESH_EXPIRATION_IN_DAYS must be positive");
        }
        if self.jwt_secret == DEFAULT_JWT_SECRET {
            warn!("JWT_SECRET is the development fallback; set a real secret in production");
        }
        Ok(())
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .with_context(|| format!("Invalid value for {key}: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.jwt_expiration_minutes, 5);
        assert_eq!(config.jwt_refresh_expiration_days, 7);
    }

    #[test]
    fn zero_lifetime_is_rejected() {
        let config = Config {
            jwt_expiration_minutes: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
