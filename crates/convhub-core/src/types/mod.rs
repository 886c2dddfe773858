//! Core type definitions used across the ConvHub workspace.

pub mod format;
pub mod id;
pub mod options;

pub use format::Format;
pub use id::*;
pub use options::ConversionOptions;
