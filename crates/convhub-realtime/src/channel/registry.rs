//! Topic registry: which subscribers listen to which topic.

use std::collections::HashMap;

use convhub_core::types::SubscriptionId;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::message::ProgressEvent;

use super::types::Topic;

/// Registry of all active topics and their subscriber queues.
#[derive(Debug, Default)]
pub struct TopicRegistry {
    /// Topic → subscriber queues.
    topics: DashMap<Topic, HashMap<SubscriptionId, mpsc::Sender<ProgressEvent>>>,
    /// Subscription → topic (reverse index).
    subscriptions: DashMap<SubscriptionId, Topic>,
}

impl TopicRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber queue on a topic.
    pub fn add(&self, topic: Topic, id: SubscriptionId, sender: mpsc::Sender<ProgressEvent>) {
        self.topics
            .entry(topic.clone())
            .or_default()
            .insert(id, sender);
        self.subscriptions.insert(id, topic);
    }

    /// Removes a subscriber. Returns whether it was registered.
    pub fn remove(&self, id: SubscriptionId) -> bool {
        let Some((_, topic)) = self.subscriptions.remove(&id) else {
            return false;
        };
        if let Some(mut subscribers) = self.topics.get_mut(&topic) {
            subscribers.remove(&id);
            if subscribers.is_empty() {
                drop(subscribers);
                self.topics.remove_if(&topic, |_, subs| subs.is_empty());
            }
        }
        true
    }

    /// Delivers `event` to every subscriber of `topic` without waiting.
    ///
    /// Closed subscribers are dropped from the topic. Subscribers with a
    /// full queue miss this event but stay subscribed. Returns the number of
    /// subscribers that received the event.
    pub fn deliver(&self, topic: &Topic, event: &ProgressEvent) -> usize {
        let Some(mut subscribers) = self.topics.get_mut(topic) else {
            return 0;
        };

        let mut delivered = 0;
        let mut closed = Vec::new();
        for (id, sender) in subscribers.iter() {
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(subscription = %id, topic = %topic, "Subscriber queue full, dropping event");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => closed.push(*id),
            }
        }

        for id in &closed {
            subscribers.remove(id);
            self.subscriptions.remove(id);
            debug!(subscription = %id, topic = %topic, "Removed closed subscriber");
        }
        if subscribers.is_empty() {
            drop(subscribers);
            self.topics.remove_if(topic, |_, subs| subs.is_empty());
        }
        delivered
    }

    /// Number of subscribers on a topic.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.topics.get(topic).map(|subs| subs.len()).unwrap_or(0)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.topics.len()
    }

    /// Drops every subscriber, closing their queues.
    pub fn clear(&self) {
        self.topics.clear();
        self.subscriptions.clear();
    }
}
