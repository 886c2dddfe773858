//! Delayed task queue for retries and artifact cleanup.
//!
//! Tasks live in memory and are keyed by `(job, kind)`: scheduling a task
//! that already exists moves it to the new due time. The queue is drained
//! by the [`TaskRunner`](crate::runner::TaskRunner), or directly in tests
//! with a manual clock.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

use convhub_core::types::JobId;

/// What a scheduled task does when it comes due.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Re-run a job waiting out its backoff.
    Retry,
    /// Delete a terminal job's artifacts.
    Cleanup,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Retry => write!(f, "retry"),
            Self::Cleanup => write!(f, "cleanup"),
        }
    }
}

/// A task waiting in the queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledTask {
    /// Job the task belongs to.
    pub job_id: JobId,
    /// Task kind.
    pub kind: TaskKind,
    /// When the task becomes runnable.
    pub due_at: DateTime<Utc>,
}

type DueKey = (DateTime<Utc>, u64);

#[derive(Debug, Default)]
struct Queue {
    by_due: BTreeMap<DueKey, (JobId, TaskKind)>,
    index: HashMap<(JobId, TaskKind), DueKey>,
    next_seq: u64,
}

/// In-memory delayed task queue.
#[derive(Debug, Clone, Default)]
pub struct TaskScheduler {
    queue: Arc<Mutex<Queue>>,
}

impl TaskScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(|p| p.into_inner())
    }

    /// Schedule `kind` for `job_id` at `due_at`, replacing any existing task
    /// of the same kind for that job.
    pub fn schedule(&self, job_id: JobId, kind: TaskKind, due_at: DateTime<Utc>) {
        let mut queue = self.lock();
        if let Some(old) = queue.index.remove(&(job_id, kind)) {
            queue.by_due.remove(&old);
        }
        let key = (due_at, queue.next_seq);
        queue.next_seq += 1;
        queue.by_due.insert(key, (job_id, kind));
        queue.index.insert((job_id, kind), key);
    }

    /// Drop the task of `kind` for `job_id`. Returns whether one existed.
    pub fn cancel(&self, job_id: JobId, kind: TaskKind) -> bool {
        let mut queue = self.lock();
        match queue.index.remove(&(job_id, kind)) {
            Some(key) => {
                queue.by_due.remove(&key);
                true
            }
            None => false,
        }
    }

    /// Drop every task for `job_id`.
    pub fn cancel_job(&self, job_id: JobId) -> usize {
        [TaskKind::Retry, TaskKind::Cleanup]
            .into_iter()
            .filter(|kind| self.cancel(job_id, *kind))
            .count()
    }

    /// All waiting tasks, earliest first.
    pub fn pending(&self) -> Vec<ScheduledTask> {
        self.lock()
            .by_due
            .iter()
            .map(|((due_at, _), (job_id, kind))| ScheduledTask {
                job_id: *job_id,
                kind: *kind,
                due_at: *due_at,
            })
            .collect()
    }

    /// Remove and return every task due at or before `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<ScheduledTask> {
        let mut queue = self.lock();
        let mut due = Vec::new();
        while let Some(entry) = queue.by_due.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((due_at, _), (job_id, kind)) = entry.remove_entry();
            queue.index.remove(&(job_id, kind));
            due.push(ScheduledTask {
                job_id,
                kind,
                due_at,
            });
        }
        due
    }

    /// Number of waiting tasks.
    pub fn len(&self) -> usize {
        self.lock().by_due.len()
    }

    /// Whether no tasks are waiting.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
