//! The progress channel service.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use convhub_core::config::RealtimeConfig;
use convhub_core::types::{JobId, SubscriptionId};
use convhub_core::{AppError, AppResult};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::message::ProgressEvent;

use super::registry::TopicRegistry;
use super::subscription::Subscription;
use super::types::Topic;

/// Per-job and per-batch publish/subscribe.
///
/// Publishing never blocks: every subscriber has a bounded queue and
/// events that do not fit are dropped for that subscriber only.
#[derive(Debug, Clone)]
pub struct ProgressChannel {
    registry: Arc<TopicRegistry>,
    buffer: usize,
    closed: Arc<AtomicBool>,
}

impl ProgressChannel {
    /// Create a channel whose subscribers queue up to `buffer` events.
    pub fn new(buffer: usize) -> Self {
        Self {
            registry: Arc::new(TopicRegistry::new()),
            buffer: buffer.max(1),
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Create a channel from configuration.
    pub fn from_config(config: &RealtimeConfig) -> Self {
        Self::new(config.subscriber_buffer)
    }

    /// Subscribe to one job's events.
    pub fn subscribe(&self, job_id: JobId) -> AppResult<Subscription> {
        self.subscribe_topic(Topic::Job(job_id))
    }

    /// Subscribe to the events of every job in a batch.
    pub fn subscribe_batch(&self, batch_id: impl Into<String>) -> AppResult<Subscription> {
        self.subscribe_topic(Topic::Batch(batch_id.into()))
    }

    /// Subscribe to an arbitrary topic.
    pub fn subscribe_topic(&self, topic: Topic) -> AppResult<Subscription> {
        if self.is_closed() {
            return Err(AppError::invalid_state("Progress channel is shut down"));
        }
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = SubscriptionId::new();
        self.registry.add(topic.clone(), id, tx);
        debug!(subscription = %id, topic = %topic, "Subscribed");
        Ok(Subscription::new(id, topic, rx))
    }

    /// Remove a subscription. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.registry.remove(id)
    }

    /// Publish an event to the job's subscribers and, when the job belongs
    /// to a batch, to the batch's subscribers. Returns the delivery count.
    pub fn publish(&self, event: &ProgressEvent) -> usize {
        if self.is_closed() {
            return 0;
        }
        let mut delivered = self.registry.deliver(&Topic::Job(event.job_id), event);
        if let Some(batch_id) = &event.batch_id {
            delivered += self.registry.deliver(&Topic::Batch(batch_id.clone()), event);
        }
        delivered
    }

    /// Number of subscribers of one job.
    pub fn subscriber_count(&self, job_id: JobId) -> usize {
        self.registry.subscriber_count(&Topic::Job(job_id))
    }

    /// Close every subscription and refuse new ones.
    pub fn shutdown(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let topics = self.registry.topic_count();
            self.registry.clear();
            info!(topics, "Progress channel shut down");
        }
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}
