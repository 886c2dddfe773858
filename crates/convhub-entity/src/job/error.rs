//! Error recorded on a job.

use std::fmt;

use convhub_core::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

/// The last error a job encountered, as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    /// Stable error kind.
    pub kind: ErrorKind,
    /// Human-readable message.
    pub message: String,
}

impl JobError {
    /// Create a job error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl From<&AppError> for JobError {
    fn from(err: &AppError) -> Self {
        Self::new(err.kind, err.message.clone())
    }
}

impl fmt::Display for JobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}
