//! File format names.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// A normalized file format name (lowercase extension without the dot).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Format(String);

impl Format {
    /// Maximum accepted length of a format name.
    pub const MAX_LEN: usize = 16;

    /// Parse and normalize a format name: trims whitespace, strips a
    /// leading dot and lowercases. Accepts ASCII alphanumerics only.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let name = raw.trim().trim_start_matches('.').to_ascii_lowercase();
        if name.is_empty() {
            return Err(AppError::validation("Format name is empty"));
        }
        if name.len() > Self::MAX_LEN {
            return Err(AppError::validation(format!(
                "Format name '{name}' exceeds {} characters",
                Self::MAX_LEN
            )));
        }
        if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::validation(format!(
                "Format name '{name}' contains invalid characters"
            )));
        }
        Ok(Self(name))
    }

    /// Derive a format from a file path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| Self::parse(ext).ok())
    }

    /// The normalized name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Format {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Format> for String {
    fn from(format: Format) -> String {
        format.0
    }
}

impl std::str::FromStr for Format {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
