//! Job orchestration for ConvHub.
//!
//! This crate provides:
//! - The [`JobOrchestrator`], owner of the job state machine
//! - Retry, retention and completion-estimate policies
//! - An inspectable delayed-task queue for retries and artifact cleanup,
//!   and the [`TaskRunner`] loop that drains it
//! - The [`RetentionSweeper`] and the cron schedule that drives it

pub mod classify;
pub mod cron;
pub mod orchestrator;
pub mod policy;
pub mod runner;
pub mod scheduler;
pub mod sweeper;

pub use cron::CronScheduler;
pub use orchestrator::{CreatedJob, DueTaskReport, JobOrchestrator, OrchestratorDeps};
pub use policy::{EtaEstimator, RetentionPolicy, RetryPolicy};
pub use runner::TaskRunner;
pub use scheduler::{ScheduledTask, TaskKind, TaskScheduler};
pub use sweeper::{RetentionSweeper, SweepReport};
