//! # convhub-cache
//!
//! Content-addressed cache of conversion results. Entries are keyed by a
//! [`Fingerprint`] of the request and expire by age and by total size.

pub mod fingerprint;
pub mod store;

pub use fingerprint::{Fingerprint, content_hash};
pub use store::{CacheStats, ConversionCache};
