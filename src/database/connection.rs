use super::errors::{StoreError, StoreResult};
use super::migrator;
use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::env;
use tracing::info;

/// Pooled PostgreSQL connection shared by the stores and the queue
#[derive(Debug, Clone)]
pub struct DatabaseConnection {
    pool: PgPool,
}

impl DatabaseConnection {
    /// Connect using `database.url`, falling back to `DATABASE_URL`, and
    /// run migrations when `database.run_migrations` is set
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let database_url = config
            .url
            .clone()
            .or_else(|| env::var("DATABASE_URL").ok())
            .ok_or_else(|| {
                StoreError::Database(sqlx::Error::Configuration(
                    "database.url is not set and DATABASE_URL is missing".into(),
                ))
            })?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&database_url)
            .await?;

        info!(
            max_connections = config.max_connections,
            "Database pool initialized"
        );

        if config.run_migrations {
            migrator::run_migrations(&pool).await?;
        }

        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn health_check(&self) -> StoreResult<bool> {
        let row = sqlx::query("SELECT 1 as health")
            .fetch_one(&self.pool)
            .await?;

        let health: i32 = row.get("health");
        Ok(health == 1)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
