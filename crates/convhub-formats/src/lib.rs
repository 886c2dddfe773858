//! # convhub-formats
//!
//! The static format catalog (format → category) and the conversion
//! router that decides which format pairs can be converted.

pub mod catalog;
pub mod router;

pub use catalog::{Category, FormatCatalog};
pub use router::{ConversionRouter, Operation, Route};
