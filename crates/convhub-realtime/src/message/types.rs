//! Progress event payload.

use chrono::{DateTime, Utc};
use convhub_core::types::{ArtifactId, JobId};
use convhub_entity::{Job, JobError, JobStatus};
use serde::{Deserialize, Serialize};

/// One progress notification for a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEvent {
    /// Job the event is about.
    pub job_id: JobId,
    /// Batch the job belongs to, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub batch_id: Option<String>,
    /// Job status at publication time.
    pub status: JobStatus,
    /// Progress of the current attempt.
    pub progress_percent: u8,
    /// Active stage label.
    pub current_stage: String,
    /// Whether this is the job's last event.
    pub terminal: bool,
    /// Whether the job is waiting to be retried.
    pub retrying: bool,
    /// Retries scheduled so far.
    pub attempt_count: u32,
    /// Output artifacts, set on completion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub download_refs: Vec<ArtifactId>,
    /// Error details on retry or failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    /// Publication time.
    pub timestamp: DateTime<Utc>,
}

impl ProgressEvent {
    /// Snapshot a job into an event.
    pub fn from_job(job: &Job, timestamp: DateTime<Utc>) -> Self {
        let retrying = job.status == JobStatus::Pending && job.retry_at.is_some();
        Self {
            job_id: job.id,
            batch_id: job.batch_id().map(str::to_string),
            status: job.status,
            progress_percent: job.progress_percent,
            current_stage: job.current_stage.clone(),
            terminal: job.is_terminal(),
            retrying,
            attempt_count: job.attempt_count,
            download_refs: if job.status == JobStatus::Completed {
                job.output_refs.clone()
            } else {
                Vec::new()
            },
            error: if retrying || job.status == JobStatus::Failed {
                job.last_error.clone()
            } else {
                None
            },
            timestamp,
        }
    }
}
