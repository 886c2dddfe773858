//! # convhub-core
//!
//! Core crate for ConvHub. Contains the unified error system, configuration
//! schemas, typed identifiers, format and option value types, and the
//! boundary traits the orchestration core consumes (`Converter`,
//! `ArtifactStore`, `Clock`).
//!
//! This crate has **no** internal dependencies on other ConvHub crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::{AppError, ErrorClass, ErrorKind};
pub use result::AppResult;
