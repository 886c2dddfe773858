//! In-memory job repository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;

use convhub_core::result::AppResult;
use convhub_core::types::JobId;
use convhub_entity::Job;

use super::JobPersistence;

/// Job records kept in a concurrent map.
#[derive(Debug, Default)]
pub struct MemoryJobRepository {
    jobs: DashMap<JobId, Job>,
}

impl MemoryJobRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored jobs.
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// Whether the repository is empty.
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

#[async_trait]
impl JobPersistence for MemoryJobRepository {
    async fn upsert(&self, job: &Job) -> AppResult<()> {
        self.jobs.insert(job.id, job.clone());
        Ok(())
    }

    async fn find(&self, id: JobId) -> AppResult<Option<Job>> {
        Ok(self.jobs.get(&id).map(|entry| entry.value().clone()))
    }

    async fn find_expired_before(&self, cutoff: DateTime<Utc>) -> AppResult<Vec<Job>> {
        let mut expired: Vec<Job> = self
            .jobs
            .iter()
            .filter(|entry| {
                let job = entry.value();
                job.is_terminal() && job.completed_at.is_some_and(|at| at < cutoff)
            })
            .map(|entry| entry.value().clone())
            .collect();
        expired.sort_by_key(|job| job.completed_at);
        Ok(expired)
    }

    async fn delete(&self, id: JobId) -> AppResult<bool> {
        Ok(self.jobs.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use convhub_entity::{ConversionKind, CreateJob, JobStatus};

    fn job(now: DateTime<Utc>) -> Job {
        let request = CreateJob::new(ConversionKind::FormatTranscode, "docx", "pdf");
        Job::new(&request, now, now).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_find_delete() {
        let repo = MemoryJobRepository::new();
        let mut job = job(Utc::now());
        repo.upsert(&job).await.unwrap();
        job.progress_percent = 40;
        repo.upsert(&job).await.unwrap();

        let found = repo.find(job.id).await.unwrap().unwrap();
        assert_eq!(found.progress_percent, 40);
        assert_eq!(repo.len(), 1);
        assert!(repo.delete(job.id).await.unwrap());
        assert!(repo.find(job.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_find_expired_only_terminal() {
        let repo = MemoryJobRepository::new();
        let old = Utc::now() - chrono::Duration::days(2);

        let mut done = job(old);
        done.transition_to(JobStatus::Processing, old).unwrap();
        done.complete(Vec::new(), old).unwrap();
        repo.upsert(&done).await.unwrap();

        let mut stuck = job(old);
        stuck.transition_to(JobStatus::Processing, old).unwrap();
        repo.upsert(&stuck).await.unwrap();

        let mut recent = job(Utc::now());
        recent.cancel(Utc::now()).unwrap();
        repo.upsert(&recent).await.unwrap();

        let cutoff = Utc::now() - chrono::Duration::days(1);
        let expired = repo.find_expired_before(cutoff).await.unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, done.id);
    }
}
