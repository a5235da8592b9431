//! Event Bus
//!
//! Topic-keyed publish/subscribe registry. Subscribers register a
//! bounded channel under a topic; publishing fans a value out to every
//! registered channel in registration order.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, RwLock};

/// Depth of each subscriber channel.
const DEFAULT_CHANNEL_DEPTH: usize = 10;

/// Identifies one registration so it can later be removed.
pub type SubscriberId = u64;

/// Fan-out registry generic over the published message type.
pub struct EventBus<T> {
    topics: RwLock<HashMap<String, Vec<(SubscriberId, mpsc::Sender<T>)>>>,
    next_id: AtomicU64,
    channel_depth: usize,
}

impl<T: Clone> EventBus<T> {
    pub fn new() -> Self {
        Self::with_channel_depth(DEFAULT_CHANNEL_DEPTH)
    }

    pub fn with_channel_depth(channel_depth: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            channel_depth,
        }
    }

    /// Register a new subscriber under a topic.
    ///
    /// Returns the registration id together with the receiving end of
    /// the subscriber's channel.
    pub async fn subscribe(&self, topic: &str) -> (SubscriberId, mpsc::Receiver<T>) {
        let (tx, rx) = mpsc::channel(self.channel_depth);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        let mut topics = self.topics.write().await;
        topics.entry(topic.to_string()).or_default().push((id, tx));

        (id, rx)
    }

    /// Remove a registration; the subscriber's channel closes once its
    /// last sender is dropped. Unknown ids are ignored.
    pub async fn unsubscribe(&self, topic: &str, id: SubscriberId) {
        let mut topics = self.topics.write().await;
        if let Some(subscribers) = topics.get_mut(topic) {
            subscribers.retain(|(sub_id, _)| *sub_id != id);
            if subscribers.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Send a value to every subscriber of a topic, in registration
    /// order. A full subscriber channel suspends the publisher until it
    /// drains. No-op when the topic has no subscribers.
    pub async fn publish(&self, topic: &str, value: T) {
        // Snapshot the senders so the registry lock is never held
        // across a channel send.
        let senders: Vec<mpsc::Sender<T>> = {
            let topics = self.topics.read().await;
            match topics.get(topic) {
                Some(subscribers) => subscribers.iter().map(|(_, tx)| tx.clone()).collect(),
                None => return,
            }
        };

        for tx in senders {
            // A send only fails when the receiver is gone; a subscriber
            // torn down mid-publish is skipped.
            let _ = tx.send(value.clone()).await;
        }
    }

    /// Number of subscribers currently registered under a topic.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

impl<T: Clone> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}
