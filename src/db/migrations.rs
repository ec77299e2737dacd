/// Database migration runner
///
/// Migrations live in the `migrations/` directory at the crate root, one
/// `.sql` file per schema change, applied in version order by sqlx's
/// embedded migrator.
///
/// # Example
///
/// ```no_run
/// use taskvault::db::pool::{create_pool, DatabaseConfig};
/// use taskvault::db::migrations::run_migrations;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// run_migrations(&pool).await?;
/// # Ok(())
/// # }
/// ```

use sqlx::postgres::PgPool;
use tracing::{info, warn};

/// Runs all pending database migrations
///
/// Migrations already recorded in `_sqlx_migrations` are skipped; a failing
/// migration is rolled back and returned as an error.
///
/// # Errors
///
/// Returns an error if a migration file is malformed, a migration fails to
/// execute, or the connection is lost mid-run.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!("Starting database migrations");

    let migrations = sqlx::migrate!("./migrations");

    match migrations.run(pool).await {
        Ok(()) => {
            info!("All database migrations completed successfully");
            Ok(())
        }
        Err(e) => {
            warn!("Migration failed: {}", e);
            Err(e)
        }
    }
}
