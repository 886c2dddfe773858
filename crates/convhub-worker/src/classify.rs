//! Mapping converter failures onto the application error taxonomy.

use convhub_core::error::{AppError, ErrorKind};
use convhub_core::traits::ConverterError;

/// Classify a converter failure.
///
/// Malformed input is fatal, an unsupported pair is a caller error,
/// timeouts and process or I/O failures are transient, and a missing tool
/// or anything unexpected is internal.
pub fn classify(err: ConverterError) -> AppError {
    let kind = match &err {
        ConverterError::MalformedInput(_) => ErrorKind::FatalConversion,
        ConverterError::Unsupported(_) => ErrorKind::UnsupportedConversion,
        ConverterError::Timeout(_)
        | ConverterError::ProcessFailed { .. }
        | ConverterError::Io(_) => ErrorKind::Transient,
        ConverterError::ToolUnavailable(_) | ConverterError::Other(_) => ErrorKind::Internal,
    };
    let message = err.to_string();
    AppError::with_source(kind, message, err)
}
