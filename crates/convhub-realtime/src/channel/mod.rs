//! Topic-based progress channel.

pub mod registry;
pub mod service;
pub mod subscription;
pub mod types;

pub use registry::TopicRegistry;
pub use service::ProgressChannel;
pub use subscription::Subscription;
pub use types::Topic;
