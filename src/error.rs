/// Error types for the account data layer
///
/// Three caller-visible kinds, per the component contract:
///
/// - [`AccountError::Validation`]: bad input, field-specific, detailed enough
///   for the caller to correct it
/// - [`AccountError::Auth`]: credential failure; the same value and message
///   whether the account is unknown or the password is wrong, so callers
///   cannot tell the cases apart
/// - [`AccountError::Storage`]: the backing store failed or refused a
///   constraint; propagated as-is, retry policy belongs to the caller
///
/// Hashing and signing failures are internal faults and get their own
/// variants rather than being folded into the above.
///
/// # Example
///
/// ```
/// use taskvault::error::{AccountError, ValidationError};
///
/// let err = AccountError::from(ValidationError::new("email", "Email is invalid"));
/// assert_eq!(err.to_string(), "email: Email is invalid");
/// ```

use crate::auth::{password::PasswordError, token::TokenError};

/// Result type alias for account operations
pub type AccountResult<T> = Result<T, AccountError>;

/// A single violated field constraint
///
/// Validation stops at the first violation, checked in declaration order
/// (name, email, password, age), so the field named here is deterministic
/// for a given input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Field that failed validation
    pub field: &'static str,

    /// Human-readable message
    pub message: String,
}

impl ValidationError {
    /// Creates a validation error for a field
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Errors from the backing store
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Unique constraint on email violated
    #[error("Email is already registered")]
    DuplicateEmail,

    /// The referenced row no longer exists
    #[error("Record not found")]
    NotFound,

    /// Any other database failure
    #[error("Database error: {0}")]
    Database(sqlx::Error),
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StorageError::NotFound,
            sqlx::Error::Database(db_err) => {
                // Unique violation on the users.email constraint
                if let Some(constraint) = db_err.constraint() {
                    if constraint.contains("email") {
                        return StorageError::DuplicateEmail;
                    }
                }
                StorageError::Database(sqlx::Error::Database(db_err))
            }
            _ => StorageError::Database(err),
        }
    }
}

/// Unified error type for account operations
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    /// Input failed a field constraint
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Unknown account or wrong password, indistinguishable by contract
    #[error("Unable to login")]
    Auth,

    /// Backing store failure or constraint violation
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Password hashing or verification failed internally
    #[error(transparent)]
    Password(#[from] PasswordError),

    /// Token signing or verification failed internally
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl From<sqlx::Error> for AccountError {
    fn from(err: sqlx::Error) -> Self {
        AccountError::Storage(StorageError::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display() {
        let err = ValidationError::new("password", "Password must be at least 7 characters");
        assert_eq!(
            err.to_string(),
            "password: Password must be at least 7 characters"
        );
    }

    #[test]
    fn test_auth_error_is_generic() {
        // One variant, one message, regardless of cause
        assert_eq!(AccountError::Auth.to_string(), "Unable to login");
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        let err = StorageError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, StorageError::NotFound));
    }

    #[test]
    fn test_duplicate_email_display() {
        assert_eq!(
            StorageError::DuplicateEmail.to_string(),
            "Email is already registered"
        );
    }

    #[test]
    fn test_validation_error_wraps_into_account_error() {
        let err: AccountError = ValidationError::new("email", "Email is invalid").into();
        assert_eq!(err.to_string(), "email: Email is invalid");
        assert!(matches!(err, AccountError::Validation(_)));
    }
}
