//! # Database Migration Support
//!
//! Schema for both domain stores, their outboxes and the PostgreSQL
//! message queue lives in `migrations/`.
//!
//! ```rust,ignore
//! #[sqlx::test(migrator = "editorial_workflow::database::migrator::MIGRATOR")]
//! async fn test_something(pool: PgPool) { /* ... */ }
//! ```

use sqlx::PgPool;
use tracing::info;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

pub type MigrationResult<T> = Result<T, sqlx::migrate::MigrateError>;

pub async fn run_migrations(pool: &PgPool) -> MigrationResult<()> {
    info!("Running editorial workflow migrations");
    MIGRATOR.run(pool).await?;
    info!("Migrations complete");
    Ok(())
}
