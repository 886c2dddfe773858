//! The external conversion capability.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::types::{ConversionOptions, Format};

/// Errors raised by a converter.
///
/// Converters only describe what went wrong; deciding whether the failure
/// is worth retrying belongs to the job orchestrator.
#[derive(Debug, Error)]
pub enum ConverterError {
    /// The input could not be decoded.
    #[error("malformed input: {0}")]
    MalformedInput(String),
    /// The converter cannot handle this format pair or option set.
    #[error("unsupported conversion: {0}")]
    Unsupported(String),
    /// The conversion did not finish in time.
    #[error("conversion timed out after {0}s")]
    Timeout(u64),
    /// An external tool exited unsuccessfully.
    #[error("{tool} exited with status {status}: {stderr}")]
    ProcessFailed {
        /// Tool name.
        tool: String,
        /// Exit status (`-1` when killed by a signal).
        status: i32,
        /// Trailing stderr output.
        stderr: String,
    },
    /// A required external tool is not installed or not executable.
    #[error("tool unavailable: {0}")]
    ToolUnavailable(String),
    /// Scratch file I/O failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    /// Anything else.
    #[error("{0}")]
    Other(String),
}

/// Byte-in, byte-out conversion between two formats.
#[async_trait]
pub trait Converter: Send + Sync + std::fmt::Debug + 'static {
    /// Converter name used in logs.
    fn name(&self) -> &str;

    /// Whether this converter handles `source -> target`.
    fn supports(&self, _source: &Format, _target: &Format) -> bool {
        true
    }

    /// Convert `input` from `source` to `target`.
    async fn convert(
        &self,
        source: &Format,
        target: &Format,
        input: Bytes,
        options: &ConversionOptions,
    ) -> Result<Bytes, ConverterError>;
}
