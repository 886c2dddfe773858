//! Request fingerprints.

use std::fmt;

use convhub_core::AppResult;
use convhub_core::types::{ConversionOptions, Format};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// SHA-256 of `data`, hex encoded.
pub fn content_hash(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Deterministic identifier of one conversion request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

/// Canonical serialization input. Field order is fixed by the struct and
/// options are already sorted by key.
#[derive(Serialize)]
struct FingerprintKey<'a> {
    source_format: &'a str,
    target_format: &'a str,
    file_hash: &'a str,
    options: Vec<(&'a str, &'a str)>,
}

impl Fingerprint {
    /// Fingerprint a request from the raw input bytes.
    pub fn compute(
        source: &Format,
        target: &Format,
        input: &[u8],
        options: &ConversionOptions,
    ) -> AppResult<Self> {
        Self::from_content_hash(source, target, &content_hash(input), options)
    }

    /// Fingerprint a request from an already computed input hash.
    pub fn from_content_hash(
        source: &Format,
        target: &Format,
        input_hash: &str,
        options: &ConversionOptions,
    ) -> AppResult<Self> {
        let key = FingerprintKey {
            source_format: source.as_str(),
            target_format: target.as_str(),
            file_hash: input_hash,
            options: options.iter().collect(),
        };
        let canonical = serde_json::to_vec(&key)?;
        Ok(Self(content_hash(&canonical)))
    }

    /// Hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
