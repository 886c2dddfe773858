//! # convhub-database
//!
//! Durable storage of job records behind the
//! [`JobPersistence`](repositories::JobPersistence) trait, with an
//! in-memory implementation and a PostgreSQL one.

pub mod connection;
pub mod migration;
pub mod repositories;

use std::sync::Arc;

use convhub_core::config::DatabaseConfig;
use convhub_core::{AppError, AppResult};

pub use connection::DatabasePool;
pub use repositories::{JobPersistence, MemoryJobRepository, PgJobRepository};

/// Build the job store selected by configuration, running migrations for
/// PostgreSQL.
pub async fn build_persistence(config: &DatabaseConfig) -> AppResult<Arc<dyn JobPersistence>> {
    match config.provider.as_str() {
        "memory" => Ok(Arc::new(MemoryJobRepository::new())),
        "postgres" => {
            let pool = DatabasePool::connect(config).await?;
            migration::run_migrations(pool.pool()).await?;
            Ok(Arc::new(PgJobRepository::new(pool.into_pool())))
        }
        other => Err(AppError::configuration(format!(
            "Unknown database provider '{other}'"
        ))),
    }
}
