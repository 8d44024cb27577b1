//! Database migration management.

use crate::error::DbError;
use crate::pool::DbPool;

/// Run all pending migrations.
///
/// Migrations are embedded at compile time from `migrations/` and applied in
/// filename order.
///
/// ```rust,ignore
/// use syncline_db::{run_migrations, DbPool};
///
/// let pool = DbPool::connect("postgres://localhost/syncline").await?;
/// run_migrations(&pool).await?;
/// ```
pub async fn run_migrations(pool: &DbPool) -> Result<(), DbError> {
    tracing::info!("Running database migrations...");

    sqlx::migrate!("./migrations")
        .run(pool.inner())
        .await
        .map_err(DbError::MigrationFailed)?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}
