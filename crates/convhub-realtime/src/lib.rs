//! # convhub-realtime
//!
//! Progress notifications for conversion jobs. A [`ProgressChannel`] is
//! created at startup, handed to the orchestrator, and torn down with
//! [`ProgressChannel::shutdown`]. Clients subscribe per job or per batch.

pub mod channel;
pub mod message;

pub use channel::{ProgressChannel, Subscription, Topic};
pub use message::ProgressEvent;
