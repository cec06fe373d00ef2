//! JWT Token Handler
//! Mission: Issue and verify signed, expiring access tokens

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

/// Token verification failure.
///
/// `Malformed` and `BadSignature` cover anything structurally or
/// cryptographically wrong with the token; `Expired` is only reported for
/// tokens whose signature checked out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Malformed,
    BadSignature,
    Expired,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Malformed => write!(f, "malformed token"),
            TokenError::BadSignature => write!(f, "token signature mismatch"),
            TokenError::Expired => write!(f, "token expired"),
        }
    }
}

impl std::error::Error for TokenError {}

/// JWT handler for token operations.
///
/// Holds the process-wide signing secret, injected once at construction.
/// Verification is a pure function of (token, secret, now) with no other
/// state consulted.
pub struct JwtHandler {
    secret: String,
    expiration_hours: i64,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: String) -> Self {
        Self {
            secret,
            expiration_hours: 24, // 24-hour tokens by default
        }
    }

    pub fn with_expiration_hours(mut self, hours: i64) -> Self {
        self.expiration_hours = hours;
        self
    }

    /// Issue a signed token for a user
    pub fn issue(&self, user: &User) -> Result<(String, usize)> {
        self.issue_at(user, Utc::now())
    }

    /// Issue a signed token with an explicit issue time
    pub fn issue_at(&self, user: &User, now: DateTime<Utc>) -> Result<(String, usize)> {
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(self.expiration_hours))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let expires_in = (self.expiration_hours * 3600) as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            iat: now.timestamp() as usize,
            exp: expiration,
        };

        debug!(
            "Issuing token for user {}, expires in {}h",
            user.id, self.expiration_hours
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to sign token")?;

        Ok((token, expires_in))
    }

    /// Verify a token against the secret and the supplied clock.
    ///
    /// Expiry is checked against `now`, not the library wall clock, so the
    /// outcome is deterministic for a given (token, secret, now) triple.
    /// Decode order guarantees a garbage or tampered token reports
    /// `Malformed`/`BadSignature`, never `Expired`.
    pub fn verify(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &validation,
        )
        .map_err(|err| match err.kind() {
            ErrorKind::InvalidSignature => TokenError::BadSignature,
            _ => TokenError::Malformed,
        })?;

        if now.timestamp() >= decoded.claims.exp as i64 {
            return Err(TokenError::Expired);
        }

        Ok(decoded.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Role;
    use uuid::Uuid;

    fn create_test_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Test User".to_string(),
            email: "test@example.org".to_string(),
            password_hash: "hash".to_string(),
            role: Role::User,
            department: None,
            employee_id: None,
            phone: None,
            is_active: true,
            created_at: Utc::now().to_rfc3339(),
            last_login: None,
        }
    }

    #[test]
    fn test_issue_and_verify_roundtrip() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        let user = create_test_user();

        let (token, expires_in) = handler.issue(&user).unwrap();
        assert!(!token.is_empty());
        assert_eq!(expires_in, 24 * 3600);

        let claims = handler.verify(&token, Utc::now()).unwrap();
        assert_eq!(claims.sub, user.id.to_string());
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn test_garbage_token_is_malformed_not_expired() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());

        assert_eq!(
            handler.verify("not.a.token", Utc::now()),
            Err(TokenError::Malformed)
        );
        assert_eq!(handler.verify("", Utc::now()), Err(TokenError::Malformed));
    }

    #[test]
    fn test_wrong_secret_is_bad_signature() {
        let handler1 = JwtHandler::new("secret1".to_string());
        let handler2 = JwtHandler::new("secret2".to_string());
        let user = create_test_user();

        let (token, _) = handler1.issue(&user).unwrap();

        assert_eq!(
            handler2.verify(&token, Utc::now()),
            Err(TokenError::BadSignature)
        );
    }

    #[test]
    fn test_expired_token_with_valid_signature() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        let user = create_test_user();

        let issued = Utc::now() - chrono::Duration::hours(48);
        let (token, _) = handler.issue_at(&user, issued).unwrap();

        // Signature is fine, but 48h > 24h TTL
        assert_eq!(
            handler.verify(&token, Utc::now()),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_expiry_boundary_is_exclusive() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string()).with_expiration_hours(1);
        let user = create_test_user();

        let issued = Utc::now();
        let (token, _) = handler.issue_at(&user, issued).unwrap();
        let expiry = issued + chrono::Duration::hours(1);

        // Valid strictly before expiry, invalid at and after it
        assert!(handler
            .verify(&token, expiry - chrono::Duration::seconds(1))
            .is_ok());
        assert_eq!(handler.verify(&token, expiry), Err(TokenError::Expired));
        assert_eq!(
            handler.verify(&token, expiry + chrono::Duration::seconds(1)),
            Err(TokenError::Expired)
        );
    }

    #[test]
    fn test_verification_is_idempotent() {
        let handler = JwtHandler::new("test-secret-key-12345".to_string());
        let user = create_test_user();
        let now = Utc::now();

        let (token, _) = handler.issue_at(&user, now).unwrap();

        let first = handler.verify(&token, now).unwrap();
        let second = handler.verify(&token, now).unwrap();
        assert_eq!(first, second);
    }
}
