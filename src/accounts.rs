/// Account store adapter
///
/// The one component that owns the account lifecycle: registration,
/// credential checks, session issuance and revocation, saves, and deletion
/// with its task cascade. Everything else in the crate is a collaborator it
/// sequences: validation rules and rows in [`crate::models`], hashing and
/// signing in [`crate::auth`].
///
/// The store is constructed from a pool and a [`JwtConfig`]; the signing
/// secret arrives here by injection and is the only copy the component holds.
///
/// # Example
///
/// ```no_run
/// use taskvault::accounts::AccountStore;
/// use taskvault::config::Config;
/// use taskvault::db::pool::create_pool;
/// use taskvault::models::user::NewUser;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.clone()).await?;
/// let store = AccountStore::new(pool, config.jwt);
///
/// let mut user = store.create(NewUser {
///     name: "Ada".to_string(),
///     email: "ada@example.com".to_string(),
///     password: "correct-horse".to_string(),
///     age: None,
/// }).await?;
///
/// let token = store.issue_token(&mut user).await?;
/// let same_user = store.authenticate_token(&token).await?;
/// assert_eq!(same_user.id, user.id);
/// # Ok(())
/// # }
/// ```

use sqlx::PgPool;
use tokio::task;
use tracing::{debug, info};
use uuid::Uuid;
use validator::Validate;

use crate::auth::password::{self, PasswordError};
use crate::auth::token::{self, Claims};
use crate::config::JwtConfig;
use crate::error::{AccountError, AccountResult, StorageError};
use crate::models::task::Task;
use crate::models::user::{first_violation, CreateUser, NewUser, UpdateUser, User};

/// The account store adapter
///
/// Cheap to clone; handlers hold one per request without ceremony.
#[derive(Debug, Clone)]
pub struct AccountStore {
    pool: PgPool,
    jwt: JwtConfig,
}

impl AccountStore {
    /// Creates a store over a connection pool with an injected signing config
    pub fn new(pool: PgPool, jwt: JwtConfig) -> Self {
        Self { pool, jwt }
    }

    /// Registers a new account
    ///
    /// Normalizes the input (trimmed name, lowercased email), validates
    /// every field constraint and fails with the first violation, hashes the
    /// password off the async path, and inserts the row. The plaintext is
    /// dropped once the hash exists.
    ///
    /// # Errors
    ///
    /// - `AccountError::Validation` for the first violated constraint
    /// - `AccountError::Storage(StorageError::DuplicateEmail)` if the email
    ///   is taken, in any casing
    pub async fn create(&self, new_user: NewUser) -> AccountResult<User> {
        let new_user = new_user.normalized();
        new_user
            .validate()
            .map_err(|e| AccountError::Validation(first_violation(&e)))?;

        let password_hash = hash_blocking(new_user.password.clone()).await?;

        let user = User::create(
            &self.pool,
            CreateUser {
                name: new_user.name,
                email: new_user.email,
                password_hash,
                age: new_user.age.unwrap_or(0),
            },
        )
        .await?;

        info!(user_id = %user.id, "Created user account");
        Ok(user)
    }

    /// Authenticates an email/password pair
    ///
    /// Unknown email and wrong password fail identically with
    /// [`AccountError::Auth`]; callers cannot probe which emails exist.
    /// Hash verification is constant-time and runs off the async path.
    pub async fn authenticate(&self, email: &str, password: &str) -> AccountResult<User> {
        let email = email.trim().to_lowercase();

        let user = User::find_by_email(&self.pool, &email)
            .await?
            .ok_or(AccountError::Auth)?;

        let matches = verify_blocking(password.to_string(), user.password_hash().to_string()).await?;
        if !matches {
            return Err(AccountError::Auth);
        }

        debug!(user_id = %user.id, "Authenticated user");
        Ok(user)
    }

    /// Resolves a session token back to its user
    ///
    /// The token must carry a valid signature, be inside its validity
    /// window, and still be present in the user's token list; a revoked
    /// token fails even though its signature checks out.
    pub async fn authenticate_token(&self, token: &str) -> AccountResult<User> {
        let claims = token::verify_token(token, &self.jwt.secret).map_err(|_| AccountError::Auth)?;

        User::find_by_id_with_token(&self.pool, claims.sub, token)
            .await?
            .ok_or(AccountError::Auth)
    }

    /// Issues a new session token for a user
    ///
    /// Signs a token bound to the user's id, expiring seven days out, and
    /// appends it to the stored token list with a single atomic statement;
    /// concurrent logins from other devices are preserved, not overwritten.
    pub async fn issue_token(&self, user: &mut User) -> AccountResult<String> {
        let claims = Claims::new(user.id);
        let signed = token::sign_token(&claims, &self.jwt.secret)?;

        let tokens = User::push_token(&self.pool, user.id, &signed)
            .await?
            .ok_or(StorageError::NotFound)?;
        user.set_tokens(tokens);

        debug!(user_id = %user.id, sessions = user.tokens().len(), "Issued session token");
        Ok(signed)
    }

    /// Revokes one session token (logout from one device)
    pub async fn revoke_token(&self, user: &mut User, token: &str) -> AccountResult<()> {
        let tokens = User::remove_token(&self.pool, user.id, token)
            .await?
            .ok_or(StorageError::NotFound)?;
        user.set_tokens(tokens);

        debug!(user_id = %user.id, sessions = user.tokens().len(), "Revoked session token");
        Ok(())
    }

    /// Revokes every session token (logout from all devices)
    pub async fn revoke_all_tokens(&self, user: &mut User) -> AccountResult<()> {
        let found = User::clear_tokens(&self.pool, user.id).await?;
        if !found {
            return Err(StorageError::NotFound.into());
        }
        user.set_tokens(Vec::new());

        info!(user_id = %user.id, "Revoked all session tokens");
        Ok(())
    }

    /// Persists profile changes on a user
    ///
    /// Every field constraint is re-checked, not just at creation. The
    /// password is re-hashed only when [`User::set_password`] staged a new
    /// one since the last load; a stored hash is never hashed again. The
    /// dirty flag clears only after the row is written. The token list is
    /// never written by a save.
    pub async fn save(&self, user: &mut User) -> AccountResult<()> {
        user.normalize();
        user.validate()
            .map_err(|e| AccountError::Validation(first_violation(&e)))?;

        let password_hash = match user.pending_password() {
            Some(raw) => hash_blocking(raw.to_string()).await?,
            None => user.password_hash().to_string(),
        };

        let saved = User::update(
            &self.pool,
            user.id,
            UpdateUser {
                name: user.name.clone(),
                email: user.email.clone(),
                age: user.age,
                avatar: user.avatar().map(|a| a.to_vec()),
                password_hash,
            },
        )
        .await?
        .ok_or(StorageError::NotFound)?;

        let rehashed = user.password_dirty();
        user.apply_saved(saved);

        debug!(user_id = %user.id, rehashed, "Saved user account");
        Ok(())
    }

    /// Deletes an account, cascading to its tasks first
    ///
    /// Owned tasks are removed before the user row. If the cascade fails the
    /// user row is left untouched (fail closed); a user row is never removed
    /// while owned tasks remain, and the tasks.owner foreign key backs that
    /// up at the schema level.
    pub async fn delete(&self, user: &User) -> AccountResult<()> {
        let removed = Task::delete_all_by_owner(&self.pool, user.id).await?;
        debug!(user_id = %user.id, tasks_removed = removed, "Cascade-deleted owned tasks");

        let deleted = User::delete(&self.pool, user.id).await?;
        if !deleted {
            return Err(StorageError::NotFound.into());
        }

        info!(user_id = %user.id, "Deleted user account");
        Ok(())
    }

    /// Finds a user by id
    pub async fn find(&self, id: Uuid) -> AccountResult<Option<User>> {
        Ok(User::find_by_id(&self.pool, id).await?)
    }

    /// Finds a user by email (any casing)
    pub async fn find_by_email(&self, email: &str) -> AccountResult<Option<User>> {
        let email = email.trim().to_lowercase();
        Ok(User::find_by_email(&self.pool, &email).await?)
    }

    /// Lists the tasks a user owns
    ///
    /// The explicit query replacing any joined-field notion of "the user's
    /// tasks".
    pub async fn list_tasks(&self, user_id: Uuid) -> AccountResult<Vec<Task>> {
        Ok(Task::list_by_owner(&self.pool, user_id).await?)
    }
}

/// Hashes a password on the blocking pool
///
/// Argon2id burns tens of milliseconds of CPU per call; it runs off the
/// request-serving executor threads.
async fn hash_blocking(raw: String) -> Result<String, AccountError> {
    let hash = task::spawn_blocking(move || password::hash_password(&raw))
        .await
        .map_err(|e| PasswordError::HashError(format!("Hashing task failed: {}", e)))??;
    Ok(hash)
}

/// Verifies a password on the blocking pool
async fn verify_blocking(raw: String, hash: String) -> Result<bool, AccountError> {
    let matches = task::spawn_blocking(move || password::verify_password(&raw, &hash))
        .await
        .map_err(|e| PasswordError::VerifyError(format!("Verification task failed: {}", e)))??;
    Ok(matches)
}
