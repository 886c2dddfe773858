//! Conversion job domain entities.

pub mod error;
pub mod kind;
pub mod model;
pub mod status;

pub use error::JobError;
pub use kind::ConversionKind;
pub use model::{BATCH_ID_KEY, CreateJob, Job};
pub use status::{JobPriority, JobStatus};
