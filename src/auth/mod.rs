pub mod cookie;
pub mod otp;

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Identity, Role};

/// Signed session claims. `type` carries the caller's role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub name: String,
    #[serde(rename = "type")]
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn for_identity(identity: &Identity, ttl: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: identity.id,
            email: identity.email.clone(),
            name: identity.name.clone(),
            role: identity.role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
        }
    }
}

/// Verified caller, extracted from a session token
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub email: String,
    pub name: String,
    #[serde(rename = "type")]
    pub role: Role,
}

impl From<Claims> for Session {
    fn from(claims: Claims) -> Self {
        Self {
            id: claims.sub,
            email: claims.email,
            name: claims.name,
            role: claims.role,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("no session token was presented")]
    Missing,

    #[error("session token is malformed")]
    Malformed,

    #[error("session token has expired")]
    Expired,

    #[error("session token signature is invalid")]
    SignatureInvalid,

    #[error("session signing is not configured")]
    ConfigError,
}

/// Signing and verification keys, built once at startup from the session secret
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl: Duration,
}

impl SessionKeys {
    pub fn new(secret: &str, ttl_days: i64) -> Result<Self, SessionError> {
        if secret.is_empty() || ttl_days <= 0 {
            return Err(SessionError::ConfigError);
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            ttl: Duration::days(ttl_days),
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mint a session token for a verified identity
    pub fn issue(&self, identity: &Identity) -> Result<String, SessionError> {
        self.sign(&Claims::for_identity(identity, self.ttl))
    }

    pub fn sign(&self, claims: &Claims) -> Result<String, SessionError> {
        encode(&Header::new(Algorithm::HS256), claims, &self.encoding).map_err(|e| {
            tracing::error!("Failed to sign session token: {}", e);
            SessionError::ConfigError
        })
    }

    /// Decode and verify a bearer string. An empty string means no session.
    pub fn verify(&self, token: &str) -> Result<Session, SessionError> {
        let token = token.trim();
        if token.is_empty() {
            return Err(SessionError::Missing);
        }

        let data = decode::<Claims>(token, &self.decoding, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => SessionError::Expired,
                ErrorKind::InvalidSignature => SessionError::SignatureInvalid,
                ErrorKind::InvalidKeyFormat | ErrorKind::InvalidRsaKey(_) | ErrorKind::InvalidEcdsaKey => {
                    SessionError::ConfigError
                }
                _ => SessionError::Malformed,
            }
        })?;

        Ok(data.claims.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Profile;

    fn keys() -> SessionKeys {
        SessionKeys::new("test-secret-test-secret-test-secret", 7).unwrap()
    }

    fn identity() -> Identity {
        Identity::new("priya@example.com", "Priya", "9876543210", Profile::User { address: None }, Utc::now())
    }

    #[test]
    fn round_trips_identity_and_role() {
        let keys = keys();
        let identity = identity();
        let token = keys.issue(&identity).unwrap();

        let session = keys.verify(&token).unwrap();
        assert_eq!(session.id, identity.id);
        assert_eq!(session.email, "priya@example.com");
        assert_eq!(session.role, Role::User);
    }

    #[test]
    fn empty_token_is_missing() {
        assert_eq!(keys().verify("").unwrap_err(), SessionError::Missing);
        assert_eq!(keys().verify("   ").unwrap_err(), SessionError::Missing);
    }

    #[test]
    fn garbage_is_malformed() {
        assert_eq!(keys().verify("not-a-jwt").unwrap_err(), SessionError::Malformed);
    }

    #[test]
    fn foreign_signature_is_rejected() {
        let other = SessionKeys::new("another-secret-another-secret-123", 7).unwrap();
        let token = other.issue(&identity()).unwrap();
        assert_eq!(keys().verify(&token).unwrap_err(), SessionError::SignatureInvalid);
    }

    #[test]
    fn expired_token_is_reported_as_expired() {
        let keys = keys();
        let mut claims = Claims::for_identity(&identity(), Duration::days(7));
        claims.iat -= 3 * 3600;
        claims.exp = Utc::now().timestamp() - 3600;
        let token = keys.sign(&claims).unwrap();
        assert_eq!(keys.verify(&token).unwrap_err(), SessionError::Expired);
    }

    #[test]
    fn empty_secret_is_a_config_error() {
        assert!(matches!(SessionKeys::new("", 7), Err(SessionError::ConfigError)));
    }

    #[test]
    fn claims_use_type_for_role() {
        let claims = Claims::for_identity(&identity(), Duration::days(7));
        let value = serde_json::to_value(&claims).unwrap();
        assert_eq!(value["type"], "user");
        assert!(value["exp"].as_i64().unwrap() > value["iat"].as_i64().unwrap());
    }
}
