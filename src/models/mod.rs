/// Database models for TaskVault
///
/// # Models
///
/// - `user`: accounts, credentials, session tokens
/// - `task`: to-do items owned by a user
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
/// # Ok(())
/// # }
/// ```

pub mod task;
pub mod user;
