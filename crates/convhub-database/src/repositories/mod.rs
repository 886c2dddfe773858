//! Job repositories.

pub mod job;
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use convhub_core::result::AppResult;
use convhub_core::types::JobId;
use convhub_entity::Job;

pub use job::PgJobRepository;
pub use memory::MemoryJobRepository;

/// Durable storage of job records.
#[async_trait]
pub trait JobPersistence: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or fully replace a job record.
    async fn upsert(&self, job: &Job) -> AppResult<()>;

    /// Find a job by id.
    async fn find(&self, id: JobId) -> AppResult<Option<Job>>;

    /// Terminal jobs that reached their terminal state before `cutoff`.
    async fn find_expired_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Job>>;

    /// Remove a job record. Returns whether it existed.
    async fn delete(&self, id: JobId) -> AppResult<bool>;
}
