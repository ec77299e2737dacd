/// User model and database operations
///
/// The user row owns the account's identity, credentials, and live session
/// tokens. Credential handling has two hard rules: the plaintext password is
/// hashed before it reaches a row, and nothing serializable ever carries the
/// hash, the token list, or the avatar; external views go through
/// [`PublicUser`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
///     name VARCHAR(255) NOT NULL,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     age INTEGER NOT NULL DEFAULT 0 CHECK (age >= 0),
///     tokens TEXT[] NOT NULL DEFAULT '{}',
///     avatar BYTEA,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```
///
/// Email is normalized (trimmed, lowercased) before insert and lookup, so
/// the UNIQUE constraint collapses any casing collisions. The token list is
/// only ever touched with single-statement `array_append` / `array_remove`
/// updates; concurrent logins both land.
///
/// # Example
///
/// ```no_run
/// use taskvault::models::user::{User, CreateUser};
/// use taskvault::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let user = User::create(&pool, CreateUser {
///     name: "Ada".to_string(),
///     email: "ada@example.com".to_string(),
///     password_hash: "$argon2id$...".to_string(),
///     age: 0,
/// }).await?;
///
/// let found = User::find_by_email(&pool, "ada@example.com").await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::fmt;
use uuid::Uuid;
use validator::Validate;

use crate::error::ValidationError;

/// Fields checked in this order; the first violation is the one reported
const FIELD_ORDER: [&str; 4] = ["name", "email", "password", "age"];

/// User model representing an account
///
/// `password_hash`, `tokens`, and `avatar` are private: they never leave the
/// crate except through deliberate accessors, cannot be serialized (only
/// [`PublicUser`] implements `Serialize`), and are redacted from `Debug`
/// output.
///
/// The password carries an explicit dirty flag: [`User::set_password`]
/// stages a validated plaintext in `pending_password`, and only a successful
/// store save hashes it, writes the hash, and clears the flag. A stored hash
/// is never re-hashed.
#[derive(Clone, sqlx::FromRow, Validate)]
pub struct User {
    /// Unique user ID, assigned by the storage layer
    pub id: Uuid,

    /// Display name, non-empty after trimming
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    /// Email address, stored lowercase, unique across all users
    #[validate(email(message = "Email is invalid"))]
    pub email: String,

    /// Argon2id password hash, never the plaintext
    password_hash: String,

    /// Plaintext staged by `set_password`, consumed by the next save
    #[sqlx(default)]
    pending_password: Option<String>,

    /// Age in years, never negative
    #[validate(range(min = 0, message = "Age must be a positive number"))]
    pub age: i32,

    /// Live session tokens, one per device
    tokens: Vec<String>,

    /// Optional raw avatar image
    avatar: Option<Vec<u8>>,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("email", &self.email)
            .field("age", &self.age)
            .field("sessions", &self.tokens.len())
            .field("created_at", &self.created_at)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// External representation of a user
///
/// The only serializable view; password hash, tokens, and avatar have no
/// fields here at all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicUser {
    /// Unique user ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Email address
    pub email: String,

    /// Age in years
    pub age: i32,

    /// When the account was created
    pub created_at: DateTime<Utc>,

    /// When the account was last updated
    pub updated_at: DateTime<Utc>,
}

/// Registration input, validated before any row exists
///
/// Age is optional and defaults to 0.
#[derive(Clone, Deserialize, Validate)]
pub struct NewUser {
    /// Display name
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    /// Email address
    #[validate(email(message = "Email is invalid"))]
    pub email: String,

    /// Raw password; hashed and discarded during creation
    #[validate(
        length(min = 7, message = "Password must be at least 7 characters"),
        custom(function = password_not_literal)
    )]
    pub password: String,

    /// Optional age in years
    #[validate(range(min = 0, message = "Age must be a positive number"))]
    pub age: Option<i32>,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("age", &self.age)
            .finish_non_exhaustive()
    }
}

impl NewUser {
    /// Trims the name and lowercases the email, returning the input in the
    /// form the store persists
    pub fn normalized(mut self) -> Self {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
        self
    }
}

/// Input for inserting a user row
///
/// Carries the already-computed hash; callers go through
/// [`crate::accounts::AccountStore::create`], which validates and hashes
/// first.
#[derive(Debug, Clone)]
pub struct CreateUser {
    /// Display name (trimmed)
    pub name: String,

    /// Email address (lowercase)
    pub email: String,

    /// Argon2id password hash (NOT the plaintext password)
    pub password_hash: String,

    /// Age in years
    pub age: i32,
}

/// Full-row update written by a save
///
/// Carries no token list: tokens are only ever changed with atomic
/// append/remove statements, never by rewriting a list a save happened to
/// have read earlier.
#[derive(Debug, Clone)]
pub struct UpdateUser {
    /// Display name (trimmed)
    pub name: String,

    /// Email address (lowercase)
    pub email: String,

    /// Age in years
    pub age: i32,

    /// Avatar image, replaced wholesale
    pub avatar: Option<Vec<u8>>,

    /// Password hash: the existing one, or a fresh hash when the password
    /// was dirty
    pub password_hash: String,
}

/// Rejects passwords containing the literal substring "password"
fn password_not_literal(password: &str) -> Result<(), validator::ValidationError> {
    if password.to_lowercase().contains("password") {
        let mut err = validator::ValidationError::new("password_literal");
        err.message = Some(r#"Password cannot contain "password""#.into());
        return Err(err);
    }
    Ok(())
}

/// Validates a raw password against the account password rules
///
/// Same rules the `NewUser` derive applies: at least 7 characters, no
/// "password" substring in any casing.
pub fn validate_raw_password(raw: &str) -> Result<(), ValidationError> {
    if raw.chars().count() < 7 {
        return Err(ValidationError::new(
            "password",
            "Password must be at least 7 characters",
        ));
    }
    if password_not_literal(raw).is_err() {
        return Err(ValidationError::new(
            "password",
            r#"Password cannot contain "password""#,
        ));
    }
    Ok(())
}

/// Reduces a validator error set to the single first violation, checked in
/// fixed field order so the reported field is deterministic
pub(crate) fn first_violation(errors: &validator::ValidationErrors) -> ValidationError {
    let map = errors.field_errors();
    for field in FIELD_ORDER {
        if let Some(list) = map.get(field) {
            if let Some(err) = list.first() {
                let message = err
                    .message
                    .as_ref()
                    .map(|m| m.to_string())
                    .unwrap_or_else(|| "Validation failed".to_string());
                return ValidationError::new(field, message);
            }
        }
    }
    ValidationError::new("input", "Validation failed")
}

impl User {
    /// Produces the external representation of this user
    ///
    /// Call this at every boundary where a user crosses into a response or a
    /// log; it is the only path to a serializable user.
    pub fn to_public(&self) -> PublicUser {
        PublicUser {
            id: self.id,
            name: self.name.clone(),
            email: self.email.clone(),
            age: self.age,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    /// The stored password hash
    pub fn password_hash(&self) -> &str {
        &self.password_hash
    }

    /// Live session tokens
    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The avatar image, if one is set
    pub fn avatar(&self) -> Option<&[u8]> {
        self.avatar.as_deref()
    }

    /// Replaces the avatar image; persisted by the next save
    pub fn set_avatar(&mut self, bytes: Vec<u8>) {
        self.avatar = Some(bytes);
    }

    /// Removes the avatar image; persisted by the next save
    pub fn clear_avatar(&mut self) {
        self.avatar = None;
    }

    /// Stages a new password for the next save
    ///
    /// Validates the raw password, then marks the password field dirty. The
    /// hash in the row is untouched until a save succeeds.
    ///
    /// # Errors
    ///
    /// Returns a `ValidationError` if the password is shorter than 7
    /// characters or contains "password"
    pub fn set_password(&mut self, raw: &str) -> Result<(), ValidationError> {
        validate_raw_password(raw)?;
        self.pending_password = Some(raw.to_string());
        Ok(())
    }

    /// Whether a new password is staged and will be hashed on the next save
    pub fn password_dirty(&self) -> bool {
        self.pending_password.is_some()
    }

    /// The staged plaintext, if any
    pub(crate) fn pending_password(&self) -> Option<&str> {
        self.pending_password.as_deref()
    }

    /// Trims the name and lowercases the email in place
    pub(crate) fn normalize(&mut self) {
        self.name = self.name.trim().to_string();
        self.email = self.email.trim().to_lowercase();
    }

    /// Folds a freshly-saved row back into this instance and clears the
    /// password dirty flag
    pub(crate) fn apply_saved(&mut self, row: User) {
        self.password_hash = row.password_hash;
        self.tokens = row.tokens;
        self.updated_at = row.updated_at;
        self.pending_password = None;
    }

    /// Replaces the local view of the token list with the stored one
    pub(crate) fn set_tokens(&mut self, tokens: Vec<String>) {
        self.tokens = tokens;
    }

    /// Inserts a new user row
    ///
    /// # Errors
    ///
    /// Returns an error if the email already exists (unique constraint
    /// violation) or the database is unavailable
    pub async fn create(pool: &PgPool, data: CreateUser) -> Result<Self, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (name, email, password_hash, age)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, password_hash, age, tokens, avatar,
                      created_at, updated_at
            "#,
        )
        .bind(data.name)
        .bind(data.email)
        .bind(data.password_hash)
        .bind(data.age)
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, age, tokens, avatar,
                   created_at, updated_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by email address
    ///
    /// Matches the stored lowercase form exactly; callers normalize first.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, age, tokens, avatar,
                   created_at, updated_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(email)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Finds a user by ID, but only if the given session token is still in
    /// their token list
    ///
    /// A signed, unexpired token that has been revoked (logout, logout-all)
    /// no longer matches here.
    pub async fn find_by_id_with_token(
        pool: &PgPool,
        id: Uuid,
        token: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT id, name, email, password_hash, age, tokens, avatar,
                   created_at, updated_at
            FROM users
            WHERE id = $1 AND $2 = ANY(tokens)
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Writes the full profile row (everything except the token list)
    ///
    /// Returns the updated row, or None if the user no longer exists.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        data: UpdateUser,
    ) -> Result<Option<Self>, sqlx::Error> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET name = $2, email = $3, age = $4, avatar = $5,
                password_hash = $6, updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, password_hash, age, tokens, avatar,
                      created_at, updated_at
            "#,
        )
        .bind(id)
        .bind(data.name)
        .bind(data.email)
        .bind(data.age)
        .bind(data.avatar)
        .bind(data.password_hash)
        .fetch_optional(pool)
        .await?;

        Ok(user)
    }

    /// Appends a session token atomically
    ///
    /// Single-statement `array_append`, so concurrent issuance from two
    /// devices preserves both tokens. Returns the updated token list, or
    /// None if the user no longer exists.
    pub async fn push_token(
        pool: &PgPool,
        id: Uuid,
        token: &str,
    ) -> Result<Option<Vec<String>>, sqlx::Error> {
        let row = sqlx::query_as::<_, (Vec<String>,)>(
            r#"
            UPDATE users
            SET tokens = array_append(tokens, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING tokens
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(tokens,)| tokens))
    }

    /// Removes one session token atomically
    ///
    /// Returns the updated token list, or None if the user no longer exists.
    pub async fn remove_token(
        pool: &PgPool,
        id: Uuid,
        token: &str,
    ) -> Result<Option<Vec<String>>, sqlx::Error> {
        let row = sqlx::query_as::<_, (Vec<String>,)>(
            r#"
            UPDATE users
            SET tokens = array_remove(tokens, $2), updated_at = NOW()
            WHERE id = $1
            RETURNING tokens
            "#,
        )
        .bind(id)
        .bind(token)
        .fetch_optional(pool)
        .await?;

        Ok(row.map(|(tokens,)| tokens))
    }

    /// Clears every session token (logout from all devices)
    ///
    /// Returns true if the user existed.
    pub async fn clear_tokens(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE users
            SET tokens = '{}', updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Deletes a user row
    ///
    /// Callers go through [`crate::accounts::AccountStore::delete`], which
    /// removes owned tasks first; the tasks.owner foreign key will refuse
    /// this delete while owned tasks remain.
    ///
    /// Returns true if a row was deleted.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user() -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password_hash: "$argon2id$v=19$m=65536,t=3,p=4$c2FsdA$aGFzaA".to_string(),
            pending_password: None,
            age: 30,
            tokens: vec!["tok-a".to_string(), "tok-b".to_string()],
            avatar: Some(vec![0xFF, 0xD8, 0xFF]),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn valid_new_user() -> NewUser {
        NewUser {
            name: "Ada".to_string(),
            email: "ada@example.com".to_string(),
            password: "correct-horse".to_string(),
            age: Some(30),
        }
    }

    #[test]
    fn test_valid_new_user_passes() {
        assert!(valid_new_user().validate().is_ok());
    }

    #[test]
    fn test_invalid_email_rejected() {
        let input = NewUser {
            email: "not-an-email".to_string(),
            ..valid_new_user()
        };

        let errors = input.validate().unwrap_err();
        let violation = first_violation(&errors);
        assert_eq!(violation.field, "email");
        assert_eq!(violation.message, "Email is invalid");
    }

    #[test]
    fn test_short_password_rejected() {
        let input = NewUser {
            password: "abc".to_string(),
            ..valid_new_user()
        };

        let errors = input.validate().unwrap_err();
        let violation = first_violation(&errors);
        assert_eq!(violation.field, "password");
        assert_eq!(violation.message, "Password must be at least 7 characters");
    }

    #[test]
    fn test_password_containing_literal_rejected() {
        // Case-insensitive: "MyPassword123" embeds "password"
        let input = NewUser {
            password: "MyPassword123".to_string(),
            ..valid_new_user()
        };

        let errors = input.validate().unwrap_err();
        let violation = first_violation(&errors);
        assert_eq!(violation.field, "password");
        assert_eq!(violation.message, r#"Password cannot contain "password""#);
    }

    #[test]
    fn test_negative_age_rejected() {
        let input = NewUser {
            age: Some(-1),
            ..valid_new_user()
        };

        let errors = input.validate().unwrap_err();
        let violation = first_violation(&errors);
        assert_eq!(violation.field, "age");
    }

    #[test]
    fn test_missing_age_is_allowed() {
        let input = NewUser {
            age: None,
            ..valid_new_user()
        };

        assert!(input.validate().is_ok());
    }

    #[test]
    fn test_empty_name_rejected() {
        let input = NewUser {
            name: "   ".to_string(),
            ..valid_new_user()
        }
        .normalized();

        let errors = input.validate().unwrap_err();
        let violation = first_violation(&errors);
        assert_eq!(violation.field, "name");
    }

    #[test]
    fn test_first_violation_reports_earliest_field() {
        // Both email and password are bad; email comes first in field order
        let input = NewUser {
            email: "nope".to_string(),
            password: "x".to_string(),
            ..valid_new_user()
        };

        let errors = input.validate().unwrap_err();
        assert_eq!(first_violation(&errors).field, "email");
    }

    #[test]
    fn test_normalized_trims_and_lowercases() {
        let input = NewUser {
            name: "  Ada Lovelace  ".to_string(),
            email: "  Ada@Example.COM ".to_string(),
            ..valid_new_user()
        }
        .normalized();

        assert_eq!(input.name, "Ada Lovelace");
        assert_eq!(input.email, "ada@example.com");
    }

    #[test]
    fn test_set_password_marks_dirty() {
        let mut user = sample_user();
        assert!(!user.password_dirty());

        user.set_password("fresh-secret").expect("Valid password");
        assert!(user.password_dirty());
        assert_eq!(user.pending_password(), Some("fresh-secret"));
    }

    #[test]
    fn test_set_password_rejects_bad_input() {
        let mut user = sample_user();

        assert!(user.set_password("abc").is_err());
        assert!(user.set_password("MyPASSWORDy").is_err());
        assert!(!user.password_dirty());
    }

    #[test]
    fn test_public_view_omits_credentials() {
        let user = sample_user();
        let value = serde_json::to_value(user.to_public()).expect("Should serialize");
        let object = value.as_object().expect("Should be an object");

        assert!(object.contains_key("id"));
        assert!(object.contains_key("name"));
        assert!(object.contains_key("email"));
        assert!(object.contains_key("age"));
        assert!(!object.contains_key("password_hash"));
        assert!(!object.contains_key("password"));
        assert!(!object.contains_key("tokens"));
        assert!(!object.contains_key("avatar"));
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let user = sample_user();
        let rendered = format!("{:?}", user);

        assert!(rendered.contains("ada@example.com"));
        assert!(!rendered.contains("argon2id"));
        assert!(!rendered.contains("tok-a"));
    }

    #[test]
    fn test_user_revalidation_on_save_rules() {
        let mut user = sample_user();
        assert!(user.validate().is_ok());

        user.email = "broken".to_string();
        assert!(user.validate().is_err());

        user.email = "ok@example.com".to_string();
        user.age = -3;
        assert!(user.validate().is_err());
    }

    #[test]
    fn test_validate_raw_password_boundary() {
        assert!(validate_raw_password("abcdef").is_err()); // 6 chars
        assert!(validate_raw_password("abcdefg").is_ok()); // 7 chars
        assert!(validate_raw_password("PaSsWoRd123").is_err());
    }
}
