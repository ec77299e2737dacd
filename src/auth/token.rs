/// Session token generation and validation
///
/// Session tokens are JWTs signed with HS256 against a process-wide secret
/// that is loaded once at startup and injected (see [`crate::config`]).
/// Every token binds a user id and expires a fixed seven days after
/// issuance; multi-device sessions are supported by keeping every live token
/// on the user record, so signing here says nothing about whether a token is
/// still honored. That is the store's call.
///
/// # Example
///
/// ```
/// use taskvault::auth::token::{sign_token, verify_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let secret = "test-secret-key-at-least-32-bytes-long";
///
/// let token = sign_token(&Claims::new(user_id), secret)?;
/// let claims = verify_token(&token, secret)?;
/// assert_eq!(claims.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token issuer claim value
const ISSUER: &str = "taskvault";

/// Fixed session lifetime: seven days from issuance
pub const SESSION_TTL_DAYS: i64 = 7;

/// Error type for token operations
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Failed to sign token
    #[error("Failed to sign token: {0}")]
    SignError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token failed validation (bad signature, issuer, or format)
    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// Claims carried by a session token
///
/// Standard JWT claims only:
///
/// - `sub`: the user id the session belongs to
/// - `iss`: always "taskvault"
/// - `iat` / `nbf` / `exp`: issuance window (Unix timestamps)
/// - `jti`: random per-token id, so two logins in the same second still get
///   distinct tokens
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    pub sub: Uuid,

    /// Issuer
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,

    /// Unique token ID
    pub jti: Uuid,
}

impl Claims {
    /// Creates claims for a new session expiring [`SESSION_TTL_DAYS`] from now
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        let expiration = now + Duration::days(SESSION_TTL_DAYS);

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: expiration.timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
        }
    }

    /// Checks if the token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }

    /// Time remaining until expiration, if any
    pub fn time_until_expiration(&self) -> Option<Duration> {
        let now = Utc::now().timestamp();
        if self.exp > now {
            Some(Duration::seconds(self.exp - now))
        } else {
            None
        }
    }
}

/// Signs a session token from claims
///
/// # Errors
///
/// Returns `TokenError::SignError` if encoding fails
pub fn sign_token(claims: &Claims, secret: &str) -> Result<String, TokenError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| TokenError::SignError(format!("Token encoding failed: {}", e)))
}

/// Verifies a session token and extracts its claims
///
/// Checks the signature, expiration, not-before window, and issuer. Must be
/// called with the same secret the token was signed with.
///
/// # Errors
///
/// Returns `TokenError::Expired` for expired tokens, `TokenError::Invalid`
/// for any other failure
pub fn verify_token(token: &str, secret: &str) -> Result<Claims, TokenError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
        _ => TokenError::Invalid(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id);

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.iss, "taskvault");
        assert!(!claims.is_expired());

        // Expiry sits seven days out, give or take the test's own runtime
        let remaining = claims.time_until_expiration().unwrap();
        assert!(remaining.num_days() >= 6);
        assert!(remaining.num_days() <= 7);
    }

    #[test]
    fn test_sign_and_verify_token() {
        let user_id = Uuid::new_v4();
        let secret = "test-secret-key-at-least-32-bytes-long";

        let token = sign_token(&Claims::new(user_id), secret).expect("Should sign token");
        let verified = verify_token(&token, secret).expect("Should verify token");

        assert_eq!(verified.sub, user_id);
        assert_eq!(verified.iss, "taskvault");
    }

    #[test]
    fn test_verify_with_wrong_secret() {
        let token = sign_token(&Claims::new(Uuid::new_v4()), "secret1").expect("Should sign");

        let result = verify_token(&token, "wrong-secret");
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_expired_token() {
        let user_id = Uuid::new_v4();
        let secret = "test-secret";

        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            iss: "taskvault".to_string(),
            iat: (now - Duration::days(8)).timestamp(),
            exp: (now - Duration::days(1)).timestamp(),
            nbf: (now - Duration::days(8)).timestamp(),
            jti: Uuid::new_v4(),
        };

        assert!(claims.is_expired());
        assert!(claims.time_until_expiration().is_none());

        let token = sign_token(&claims, secret).expect("Should sign token");
        let result = verify_token(&token, secret);

        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn test_verify_garbage_token() {
        let result = verify_token("not.a.token", "secret");
        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_two_tokens_for_same_user_are_distinct() {
        let user_id = Uuid::new_v4();
        let secret = "secret";

        // Same user, same instant: jti still separates the tokens
        let token_a = sign_token(&Claims::new(user_id), secret).unwrap();
        let token_b = sign_token(&Claims::new(user_id), secret).unwrap();
        assert_ne!(token_a, token_b);
    }
}
