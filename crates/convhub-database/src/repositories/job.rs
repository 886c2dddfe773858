//! PostgreSQL job repository.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use convhub_core::error::{AppError, ErrorKind};
use convhub_core::result::AppResult;
use convhub_core::types::{ArtifactId, ConversionOptions, Format, JobId};
use convhub_entity::{Job, JobError};

use super::JobPersistence;

/// Row shape of the `conversion_jobs` table.
#[derive(Debug, FromRow)]
struct JobRow {
    id: Uuid,
    kind: String,
    priority: String,
    status: String,
    progress_percent: i16,
    current_stage: String,
    source_format: String,
    target_format: String,
    options: serde_json::Value,
    input_refs: Vec<Uuid>,
    output_refs: Vec<Uuid>,
    attempt_count: i32,
    last_error: Option<serde_json::Value>,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    estimated_completion: DateTime<Utc>,
    retry_at: Option<DateTime<Utc>>,
    artifacts_purged: bool,
    updated_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for Job {
    type Error = AppError;

    fn try_from(row: JobRow) -> Result<Self, Self::Error> {
        let options: ConversionOptions = serde_json::from_value(row.options)?;
        let metadata: BTreeMap<String, String> = serde_json::from_value(row.metadata)?;
        let last_error: Option<JobError> = row
            .last_error
            .map(serde_json::from_value)
            .transpose()?;
        Ok(Job {
            id: JobId::from_uuid(row.id),
            kind: row.kind.parse()?,
            priority: row.priority.parse()?,
            status: row.status.parse()?,
            progress_percent: row.progress_percent.clamp(0, 100) as u8,
            current_stage: row.current_stage,
            source_format: Format::parse(&row.source_format)?,
            target_format: Format::parse(&row.target_format)?,
            options,
            input_refs: row.input_refs.into_iter().map(ArtifactId::from_uuid).collect(),
            output_refs: row.output_refs.into_iter().map(ArtifactId::from_uuid).collect(),
            attempt_count: row.attempt_count.max(0) as u32,
            last_error,
            metadata,
            created_at: row.created_at,
            started_at: row.started_at,
            completed_at: row.completed_at,
            estimated_completion: row.estimated_completion,
            retry_at: row.retry_at,
            artifacts_purged: row.artifacts_purged,
            updated_at: row.updated_at,
        })
    }
}

/// Job records in PostgreSQL.
#[derive(Debug, Clone)]
pub struct PgJobRepository {
    pool: PgPool,
}

impl PgJobRepository {
    /// Create a new job repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn uuids(ids: &[ArtifactId]) -> Vec<Uuid> {
    ids.iter().map(|id| id.into_uuid()).collect()
}

#[async_trait]
impl JobPersistence for PgJobRepository {
    async fn upsert(&self, job: &Job) -> AppResult<()> {
        let options = serde_json::to_value(&job.options)?;
        let metadata = serde_json::to_value(&job.metadata)?;
        let last_error = job.last_error.as_ref().map(serde_json::to_value).transpose()?;

        sqlx::query(
            "INSERT INTO conversion_jobs (id, kind, priority, status, progress_percent, current_stage, \
             source_format, target_format, options, input_refs, output_refs, attempt_count, last_error, \
             metadata, created_at, started_at, completed_at, estimated_completion, retry_at, \
             artifacts_purged, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21) \
             ON CONFLICT (id) DO UPDATE SET \
             status = EXCLUDED.status, progress_percent = EXCLUDED.progress_percent, \
             current_stage = EXCLUDED.current_stage, options = EXCLUDED.options, \
             input_refs = EXCLUDED.input_refs, output_refs = EXCLUDED.output_refs, \
             attempt_count = EXCLUDED.attempt_count, last_error = EXCLUDED.last_error, \
             metadata = EXCLUDED.metadata, started_at = EXCLUDED.started_at, \
             completed_at = EXCLUDED.completed_at, retry_at = EXCLUDED.retry_at, \
             artifacts_purged = EXCLUDED.artifacts_purged, updated_at = EXCLUDED.updated_at",
        )
        .bind(job.id.into_uuid())
        .bind(job.kind.as_str())
        .bind(job.priority.as_str())
        .bind(job.status.as_str())
        .bind(i16::from(job.progress_percent))
        .bind(&job.current_stage)
        .bind(job.source_format.as_str())
        .bind(job.target_format.as_str())
        .bind(options)
        .bind(uuids(&job.input_refs))
        .bind(uuids(&job.output_refs))
        .bind(i32::try_from(job.attempt_count).unwrap_or(i32::MAX))
        .bind(last_error)
        .bind(metadata)
        .bind(job.created_at)
        .bind(job.started_at)
        .bind(job.completed_at)
        .bind(job.estimated_completion)
        .bind(job.retry_at)
        .bind(job.artifacts_purged)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to upsert job", e))?;
        Ok(())
    }

    async fn find(&self, id: JobId) -> AppResult<Option<Job>> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM conversion_jobs WHERE id = $1")
            .bind(id.into_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find job", e))?;
        row.map(Job::try_from).transpose()
    }

    async fn find_expired_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM conversion_jobs \
             WHERE status IN ('completed', 'failed', 'cancelled') AND completed_at < $1 \
             ORDER BY completed_at ASC",
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find expired jobs", e))?;
        rows.into_iter().map(Job::try_from).collect()
    }

    async fn delete(&self, id: JobId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM conversion_jobs WHERE id = $1")
            .bind(id.into_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to delete job", e))?;
        Ok(result.rows_affected() > 0)
    }
}
