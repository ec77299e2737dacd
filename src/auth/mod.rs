/// Authentication primitives for TaskVault
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and verification
/// - [`token`]: signed session tokens with a fixed expiry
///
/// # Security Features
///
/// - **Password Hashing**: Argon2id with fixed cost parameters and per-hash
///   random salts
/// - **Session Tokens**: HS256 signing against a process-wide secret
/// - **Constant-time Comparison**: verification never short-circuits on
///   partial matches
///
/// # Example
///
/// ```no_run
/// use taskvault::auth::password::{hash_password, verify_password};
/// use taskvault::auth::token::{sign_token, verify_token, Claims};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("correct horse battery")?;
/// assert!(verify_password("correct horse battery", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4());
/// let token = sign_token(&claims, "secret-key-at-least-32-bytes-long!!")?;
/// # Ok(())
/// # }
/// ```

pub mod password;
pub mod token;
