//! Subscriber-side handle.

use convhub_core::types::SubscriptionId;
use tokio::sync::mpsc;

use crate::message::ProgressEvent;

use super::types::Topic;

/// A live subscription. Dropping it closes the queue; the publisher then
/// forgets the subscriber on its next delivery.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    topic: Topic,
    receiver: mpsc::Receiver<ProgressEvent>,
}

impl Subscription {
    pub(crate) fn new(
        id: SubscriptionId,
        topic: Topic,
        receiver: mpsc::Receiver<ProgressEvent>,
    ) -> Self {
        Self {
            id,
            topic,
            receiver,
        }
    }

    /// Subscription identifier, used to unsubscribe.
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Topic this subscription listens to.
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// Wait for the next event. `None` once unsubscribed or shut down.
    pub async fn recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.recv().await
    }

    /// Take the next event if one is queued.
    pub fn try_recv(&mut self) -> Option<ProgressEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drain every queued event.
    pub fn drain(&mut self) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}
