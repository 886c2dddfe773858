//! Topic definitions and parsing.

use std::fmt;

use convhub_core::types::JobId;
use serde::{Deserialize, Serialize};

/// What a subscription listens to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum Topic {
    /// Events of a single job.
    Job(JobId),
    /// Events of every job in a batch.
    Batch(String),
}

impl Topic {
    /// Parses a `job:<uuid>` or `batch:<id>` string.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.split_once(':') {
            Some(("job", id)) => id.parse().ok().map(Topic::Job),
            Some(("batch", id)) if !id.is_empty() => Some(Topic::Batch(id.to_string())),
            _ => None,
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Topic::Job(id) => write!(f, "job:{id}"),
            Topic::Batch(id) => write!(f, "batch:{id}"),
        }
    }
}
