//! Conversion option bags.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::result::AppResult;

/// Option key carrying the conversion operation name.
pub const OPERATION_KEY: &str = "operation";

/// Free-form conversion options (e.g. `quality=80`, `width=100`).
///
/// Backed by a `BTreeMap` so iteration and serialization are always in
/// key order, which makes the option set canonical for fingerprinting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversionOptions(BTreeMap<String, String>);

impl ConversionOptions {
    /// Create an empty option set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace an option.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get an option value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Get an option parsed as `u32`. A present but unparsable value is a
    /// validation error.
    pub fn get_u32(&self, key: &str) -> AppResult<Option<u32>> {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw.trim().parse::<u32>().map(Some).map_err(|_| {
                AppError::validation(format!("Option '{key}' must be a positive integer, got '{raw}'"))
            }),
        }
    }

    /// The operation name, if set.
    pub fn operation(&self) -> Option<&str> {
        self.get(OPERATION_KEY)
    }

    /// Iterate options in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of options.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no options are set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse a `key=value` pair.
    pub fn parse_pair(raw: &str) -> AppResult<(String, String)> {
        match raw.split_once('=') {
            Some((k, v)) if !k.trim().is_empty() => {
                Ok((k.trim().to_string(), v.trim().to_string()))
            }
            _ => Err(AppError::validation(format!(
                "Option '{raw}' is not of the form key=value"
            ))),
        }
    }
}

impl FromIterator<(String, String)> for ConversionOptions {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
