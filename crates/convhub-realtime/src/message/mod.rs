//! Progress message types.

pub mod types;

pub use types::ProgressEvent;
