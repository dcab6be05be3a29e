use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;

/// Signed token payload: subject (user id) and absolute expiry in seconds
/// since the epoch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: i64,
}

/// Freshly issued access/refresh pair with their expiries.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: String,
    pub access_exp: i64,
    pub refresh: String,
    pub refresh_exp: i64,
}

/// Creates and verifies HMAC-signed bearer tokens. Pure over the configured
/// secret and the clock passed by callers.
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_lifetime: Duration,
    refresh_lifetime: Duration,
}

impl TokenService {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let secret = config.jwt_secret.as_bytes();

        // Expiry is deliberately checked outside of verification so callers
        // can tell an expired token apart from a forged one.
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            access_lifetime: Duration::minutes(config.jwt_expiration_minutes),
            refresh_lifetime: Duration::days(config.jwt_refresh_expiration_days),
        }
    }

    /// Issue an access/refresh token pair for a user, both signed with the
    /// shared secret and carrying `{sub, exp}`.
    pub fn issue(&self, user_id: Uuid, now: DateTime<Utc>) -> anyhow::Result<TokenPair> {
        let access_exp = (now + self.access_lifetime).timestamp();
        let refresh_exp = (now + self.refresh_lifetime).timestamp();

        let access = self.sign(&Claims {
            sub: user_id,
            exp: access_exp,
        })?;
        let refresh = self.sign(&Claims {
            sub: user_id,
            exp: refresh_exp,
        })?;

        Ok(TokenPair {
            access,
            access_exp,
            refresh,
            refresh_exp,
        })
    }

    fn sign(&self, claims: &Claims) -> anyhow::Result<String> {
        encode(&Header::default(), claims, &self.encoding_key)
            .map_err(|e| anyhow::anyhow!("Failed to sign token: {e}"))
    }

    /// Validate signature and structural shape. Does not reject on expiry;
    /// use [`has_expired`] on the returned claims for that.
    pub fn verify(&self, token: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
        decode::<Claims>(token, &self.decoding_key, &self.validation).map(|data| data.claims)
    }
}

/// Strict comparison: an expiry exactly equal to `now` is still valid.
#[must_use]
pub fn has_expired(exp: i64, now: DateTime<Utc>) -> bool {
    exp < now.timestamp()
}
