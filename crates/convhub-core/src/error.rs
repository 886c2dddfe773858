//! Unified application error types for ConvHub.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator. Every [`ErrorKind`] belongs to one
//! [`ErrorClass`], which is what the job orchestrator uses to decide
//! between retrying and failing a job.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The requested job or artifact was not found.
    NotFound,
    /// The job is in the wrong state for the requested operation.
    InvalidState,
    /// Input validation failed (malformed request, missing input).
    Validation,
    /// The requested format pair cannot be converted.
    UnsupportedConversion,
    /// A transient failure (timeout, non-zero exit, I/O contention).
    Transient,
    /// The converter rejected the input as malformed or corrupt.
    FatalConversion,
    /// An unexpected defect.
    Internal,
    /// A storage I/O error occurred.
    Storage,
    /// A cache error occurred.
    Cache,
    /// A database error occurred.
    Database,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
}

/// Coarse error classes that drive retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Caller error; never retried.
    Validation,
    /// Retryable up to the retry policy limit.
    Transient,
    /// Input rejected by the converter; never retried.
    FatalConversion,
    /// Unexpected defect; never retried.
    Internal,
}

impl ErrorKind {
    /// Map this kind to its error class.
    pub fn error_class(&self) -> ErrorClass {
        match self {
            Self::NotFound | Self::InvalidState | Self::Validation | Self::UnsupportedConversion => {
                ErrorClass::Validation
            }
            Self::Transient | Self::Storage | Self::Cache | Self::Database => ErrorClass::Transient,
            Self::FatalConversion => ErrorClass::FatalConversion,
            Self::Internal | Self::Configuration | Self::Serialization => ErrorClass::Internal,
        }
    }

    /// Whether errors of this kind may be retried.
    pub fn is_retryable(&self) -> bool {
        self.error_class() == ErrorClass::Transient
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::InvalidState => write!(f, "INVALID_STATE"),
            Self::Validation => write!(f, "VALIDATION"),
            Self::UnsupportedConversion => write!(f, "UNSUPPORTED_CONVERSION"),
            Self::Transient => write!(f, "TRANSIENT"),
            Self::FatalConversion => write!(f, "FATAL_CONVERSION"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Storage => write!(f, "STORAGE"),
            Self::Cache => write!(f, "CACHE"),
            Self::Database => write!(f, "DATABASE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
        }
    }
}

/// The unified application error used throughout ConvHub.
///
/// All crate-specific errors are mapped into `AppError` using `From` impls
/// or explicit `.map_err()` calls. This provides a single error type for
/// the entire application boundary.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an invalid-state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidState, message)
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// Create an unsupported-conversion error.
    pub fn unsupported_conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedConversion, message)
    }

    /// Create a transient error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, message)
    }

    /// Create a fatal conversion error.
    pub fn fatal_conversion(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::FatalConversion, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a storage error.
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage, message)
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// The error class of this error's kind.
    pub fn class(&self) -> ErrorClass {
        self.kind.error_class()
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        let kind = if err.kind() == std::io::ErrorKind::NotFound {
            ErrorKind::NotFound
        } else {
            ErrorKind::Storage
        };
        Self::with_source(kind, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::with_source(
            ErrorKind::Validation,
            format!("Invalid request: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_uses_stable_codes() {
        let err = AppError::not_found("Job 42 not found");
        assert_eq!(err.to_string(), "NOT_FOUND: Job 42 not found");
        assert_eq!(
            AppError::unsupported_conversion("mp3 -> pdf").to_string(),
            "UNSUPPORTED_CONVERSION: mp3 -> pdf"
        );
    }

    #[test]
    fn test_error_classes() {
        assert_eq!(ErrorKind::NotFound.error_class(), ErrorClass::Validation);
        assert_eq!(ErrorKind::InvalidState.error_class(), ErrorClass::Validation);
        assert_eq!(ErrorKind::Transient.error_class(), ErrorClass::Transient);
        assert_eq!(ErrorKind::Storage.error_class(), ErrorClass::Transient);
        assert_eq!(
            ErrorKind::FatalConversion.error_class(),
            ErrorClass::FatalConversion
        );
        assert_eq!(ErrorKind::Internal.error_class(), ErrorClass::Internal);
        assert!(ErrorKind::Cache.is_retryable());
        assert!(!ErrorKind::UnsupportedConversion.is_retryable());
    }

    #[test]
    fn test_io_not_found_maps_to_not_found() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: AppError = io.into();
        assert_eq!(err.kind, ErrorKind::NotFound);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope");
        let err: AppError = io.into();
        assert_eq!(err.kind, ErrorKind::Storage);
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::other("disk");
        let err = AppError::with_source(ErrorKind::Storage, "write failed", io);
        let cloned = err.clone();
        assert_eq!(cloned.kind, ErrorKind::Storage);
        assert!(cloned.source.is_none());
    }
}
