//! Retention sweep: removes terminal jobs past their maximum age.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

use convhub_core::config::RetentionConfig;
use convhub_core::result::AppResult;
use convhub_core::traits::{ArtifactStore, Clock};
use convhub_database::JobPersistence;

use crate::orchestrator::delete_artifacts;

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Job records deleted.
    pub jobs_removed: usize,
    /// Artifacts deleted.
    pub artifacts_removed: usize,
}

/// Deletes terminal jobs, and any artifacts they still own, once they have
/// been terminal for longer than the maximum job age.
#[derive(Debug, Clone)]
pub struct RetentionSweeper {
    jobs: Arc<dyn JobPersistence>,
    artifacts: Arc<dyn ArtifactStore>,
    clock: Arc<dyn Clock>,
    max_age: Duration,
}

impl RetentionSweeper {
    /// Create a sweeper.
    pub fn new(
        jobs: Arc<dyn JobPersistence>,
        artifacts: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        max_age: Duration,
    ) -> Self {
        Self {
            jobs,
            artifacts,
            clock,
            max_age,
        }
    }

    /// Create a sweeper using the configured maximum job age.
    pub fn from_config(
        jobs: Arc<dyn JobPersistence>,
        artifacts: Arc<dyn ArtifactStore>,
        clock: Arc<dyn Clock>,
        config: &RetentionConfig,
    ) -> Self {
        Self::new(jobs, artifacts, clock, config.job_max_age())
    }

    /// Sweep relative to the clock's current time.
    pub async fn sweep(&self) -> AppResult<SweepReport> {
        self.sweep_once(self.clock.now()).await
    }

    /// Sweep every job that became terminal before `now - max_age`.
    ///
    /// A job whose artifacts cannot be deleted is kept for the next sweep.
    pub async fn sweep_once(&self, now: DateTime<Utc>) -> AppResult<SweepReport> {
        let max_age = chrono::Duration::from_std(self.max_age)
            .map_err(|e| convhub_core::AppError::internal(format!("Invalid max job age: {e}")))?;
        let cutoff = now - max_age;
        let expired = self.jobs.find_expired_before(cutoff).await?;

        let mut report = SweepReport::default();
        for job in expired {
            if !job.artifacts_purged {
                match delete_artifacts(self.artifacts.as_ref(), &job).await {
                    Ok(n) => report.artifacts_removed += n,
                    Err(e) => {
                        tracing::warn!(job_id = %job.id, error = %e, "Failed to delete artifacts of expired job");
                        continue;
                    }
                }
            }
            if self.jobs.delete(job.id).await? {
                report.jobs_removed += 1;
            }
        }

        if report.jobs_removed > 0 {
            tracing::info!(
                jobs = report.jobs_removed,
                artifacts = report.artifacts_removed,
                "Retention sweep removed expired jobs"
            );
        } else {
            tracing::debug!("Retention sweep found nothing to remove");
        }
        Ok(report)
    }
}
