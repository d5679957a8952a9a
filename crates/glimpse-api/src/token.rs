use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;

use glimpse_types::api::Claims;
use glimpse_types::models::SessionIdentity;

pub const DEFAULT_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token: {0}")]
    Invalid(#[source] jsonwebtoken::errors::Error),

    #[error("failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

/// Signs and verifies HS256 session tokens. Built once at startup from the
/// configured secret and never mutated afterwards.
#[derive(Clone)]
pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl TokenCodec {
    pub fn new(secret: &str) -> Self {
        Self::with_ttl(secret, Duration::days(DEFAULT_TOKEN_TTL_DAYS))
    }

    pub fn with_ttl(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::default(),
            ttl,
        }
    }

    pub fn issue(&self, identity: &SessionIdentity) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = Claims {
            sub: identity.id,
            username: identity.username.clone(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp() as usize,
        };

        encode(&Header::default(), &claims, &self.encoding).map_err(TokenError::Signing)
    }

    /// Check signature and expiry, returning the identity the token carries.
    pub fn verify(&self, token: &str) -> Result<SessionIdentity, TokenError> {
        let data =
            decode::<Claims>(token, &self.decoding, &self.validation).map_err(TokenError::Invalid)?;

        Ok(SessionIdentity {
            id: data.claims.sub,
            username: data.claims.username,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn identity() -> SessionIdentity {
        SessionIdentity {
            id: Uuid::new_v4(),
            username: "ada".into(),
        }
    }

    #[test]
    fn issued_token_verifies() {
        let codec = TokenCodec::new("test-secret");
        let who = identity();

        let token = codec.issue(&who).unwrap();
        assert_eq!(codec.verify(&token).unwrap(), who);
    }

    #[test]
    fn expired_token_is_rejected() {
        let codec = TokenCodec::with_ttl("test-secret", Duration::hours(-2));
        let token = codec.issue(&identity()).unwrap();

        assert!(matches!(codec.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = TokenCodec::new("secret-a").issue(&identity()).unwrap();
        let other = TokenCodec::new("secret-b");

        assert!(matches!(other.verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn malformed_token_is_rejected() {
        let codec = TokenCodec::new("test-secret");

        assert!(codec.verify("").is_err());
        assert!(codec.verify("not.a.jwt").is_err());

        // Swap in a payload from a different token; the signature no longer matches.
        let a = codec.issue(&identity()).unwrap();
        let b = codec.issue(&identity()).unwrap();
        let a_parts: Vec<&str> = a.split('.').collect();
        let b_parts: Vec<&str> = b.split('.').collect();
        let forged = format!("{}.{}.{}", a_parts[0], b_parts[1], a_parts[2]);
        assert!(codec.verify(&forged).is_err());
    }
}
