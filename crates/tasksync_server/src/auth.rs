//! Bearer-token authentication.
//!
//! Signed tokens are HMAC-SHA256 protected and carry their issue time for
//! expiration checking.
//!
//! ## Token Format
//!
//! - 8 bytes: issue timestamp (Unix millis, big-endian)
//! - N bytes: subject (UTF-8, e.g. a user or device name)
//! - 32 bytes: HMAC-SHA256 signature over the preceding bytes
//!
//! The whole token is base64url-encoded without padding for transport.

use crate::error::{ServerError, ServerResult};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::time::Duration;
use tasksync_model::{now_millis, Timestamp};

type HmacSha256 = Hmac<Sha256>;

const TIMESTAMP_LEN: usize = 8;
const SIGNATURE_LEN: usize = 32;

/// Signed-token configuration.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Secret key for HMAC.
    pub secret: Vec<u8>,
    /// Token lifetime.
    pub token_expiry: Duration,
}

impl AuthConfig {
    /// Creates a configuration with a 24 hour token lifetime.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
            token_expiry: Duration::from_secs(24 * 60 * 60),
        }
    }

    /// Sets the token lifetime.
    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.token_expiry = expiry;
        self
    }
}

/// Issues and validates signed tokens.
#[derive(Debug, Clone)]
pub struct TokenValidator {
    config: AuthConfig,
}

impl TokenValidator {
    /// Creates a validator.
    pub fn new(config: AuthConfig) -> Self {
        Self { config }
    }

    /// Issues a token for `subject`, valid from now.
    pub fn create_token(&self, subject: &str) -> ServerResult<String> {
        self.create_token_at(subject, now_millis())
    }

    /// Issues a token for `subject` with an explicit issue time.
    pub fn create_token_at(&self, subject: &str, issued_at: Timestamp) -> ServerResult<String> {
        let mut data = Vec::with_capacity(TIMESTAMP_LEN + subject.len() + SIGNATURE_LEN);
        data.extend_from_slice(&issued_at.to_be_bytes());
        data.extend_from_slice(subject.as_bytes());

        let signature = self.mac(&data)?.finalize().into_bytes();
        data.extend_from_slice(&signature);
        Ok(URL_SAFE_NO_PAD.encode(data))
    }

    /// Validates a token and returns its subject.
    pub fn validate(&self, token: &str) -> ServerResult<String> {
        self.validate_at(token, now_millis())
    }

    /// Validates a token against an explicit current time.
    pub fn validate_at(&self, token: &str, now: Timestamp) -> ServerResult<String> {
        let raw = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| ServerError::NotAuthorized("malformed token".into()))?;
        if raw.len() < TIMESTAMP_LEN + SIGNATURE_LEN {
            return Err(ServerError::NotAuthorized("invalid token length".into()));
        }

        let (signed, signature) = raw.split_at(raw.len() - SIGNATURE_LEN);
        self.mac(signed)?
            .verify_slice(signature)
            .map_err(|_| ServerError::NotAuthorized("invalid signature".into()))?;

        let (timestamp, subject) = signed.split_at(TIMESTAMP_LEN);
        let mut issued = [0u8; TIMESTAMP_LEN];
        issued.copy_from_slice(timestamp);
        let issued_at = i64::from_be_bytes(issued);

        let expiry = i64::try_from(self.config.token_expiry.as_millis()).unwrap_or(i64::MAX);
        if now > issued_at.saturating_add(expiry) {
            return Err(ServerError::NotAuthorized("token expired".into()));
        }

        String::from_utf8(subject.to_vec())
            .map_err(|_| ServerError::NotAuthorized("invalid subject".into()))
    }

    fn mac(&self, data: &[u8]) -> ServerResult<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(&self.config.secret)
            .map_err(|e| ServerError::Internal(format!("hmac key: {e}")))?;
        mac.update(data);
        Ok(mac)
    }
}

/// Validator for a single shared secret used directly as the bearer token.
#[derive(Debug, Clone)]
pub struct SimpleTokenValidator {
    secret: Vec<u8>,
}

impl SimpleTokenValidator {
    /// Creates a validator for `secret`.
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Checks that the token equals the secret.
    pub fn validate(&self, token: &str) -> ServerResult<()> {
        if token.as_bytes() == self.secret.as_slice() {
            Ok(())
        } else {
            Err(ServerError::NotAuthorized("invalid token".into()))
        }
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
pub fn bearer_token(authorization: Option<&str>) -> ServerResult<&str> {
    let header = authorization
        .ok_or_else(|| ServerError::NotAuthorized("missing authorization".into()))?;
    let (scheme, token) = header
        .split_once(' ')
        .ok_or_else(|| ServerError::NotAuthorized("malformed authorization".into()))?;
    if !scheme.eq_ignore_ascii_case("bearer") || token.trim().is_empty() {
        return Err(ServerError::NotAuthorized("expected a bearer token".into()));
    }
    Ok(token.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> TokenValidator {
        TokenValidator::new(
            AuthConfig::new(b"test-secret-key-32-bytes-long!!".to_vec())
                .with_expiry(Duration::from_secs(60)),
        )
    }

    #[test]
    fn create_and_validate_token() {
        let validator = validator();
        let token = validator.create_token("laptop").unwrap();
        assert!(!token.contains('='));
        assert_eq!(validator.validate(&token).unwrap(), "laptop");
    }

    #[test]
    fn reject_expired_token() {
        let validator = validator();
        let token = validator.create_token_at("laptop", 1_000).unwrap();
        assert!(validator.validate_at(&token, 61_000).is_ok());
        assert!(matches!(
            validator.validate_at(&token, 61_001),
            Err(ServerError::NotAuthorized(msg)) if msg.contains("expired")
        ));
    }

    #[test]
    fn reject_tampered_token() {
        let validator = validator();
        let token = validator.create_token_at("laptop", 1_000).unwrap();
        let mut raw = URL_SAFE_NO_PAD.decode(&token).unwrap();
        raw[TIMESTAMP_LEN] ^= 0x01;
        let tampered = URL_SAFE_NO_PAD.encode(raw);
        assert!(validator.validate_at(&tampered, 2_000).is_err());
    }

    #[test]
    fn reject_other_secret() {
        let token = validator().create_token("laptop").unwrap();
        let other = TokenValidator::new(AuthConfig::new(b"another-secret".to_vec()));
        assert!(other.validate(&token).is_err());
    }

    #[test]
    fn reject_garbage() {
        let validator = validator();
        assert!(validator.validate("not base64 !!").is_err());
        assert!(validator.validate("c2hvcnQ").is_err());
    }

    #[test]
    fn simple_validator() {
        let validator = SimpleTokenValidator::new("simple-secret");
        assert!(validator.validate("simple-secret").is_ok());
        assert!(validator.validate("wrong-secret").is_err());
    }

    #[test]
    fn bearer_header_parsing() {
        assert_eq!(bearer_token(Some("Bearer abc")).unwrap(), "abc");
        assert_eq!(bearer_token(Some("bearer  abc ")).unwrap(), "abc");
        assert!(bearer_token(None).is_err());
        assert!(bearer_token(Some("Basic abc")).is_err());
        assert!(bearer_token(Some("Bearer")).is_err());
    }
}
