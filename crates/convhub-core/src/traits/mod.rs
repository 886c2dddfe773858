//! Boundary traits defined in `convhub-core` and implemented by other crates.

pub mod clock;
pub mod converter;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use converter::{Converter, ConverterError};
pub use storage::ArtifactStore;
