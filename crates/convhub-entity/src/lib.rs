//! # convhub-entity
//!
//! Domain entities for ConvHub. The conversion [`Job`](job::Job) and its
//! state machine live here, independent of any persistence backend.

pub mod job;

pub use job::{ConversionKind, CreateJob, Job, JobError, JobPriority, JobStatus};
