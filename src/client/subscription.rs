//! Event Subscriptions
//!
//! Each subscription watches the shared event stream, keeps only the
//! envelopes that answer its own subscribe command, and hands those to
//! a user callback. The dispatch loop runs on its own task with its own
//! cancellation scope, so tearing one subscription down never disturbs
//! the connection or its siblings.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::bus::{EventBus, SubscriberId};
use super::messages::{Event, ServerMessage};

/// Callback invoked for every event delivered to a subscription.
pub type OnEvent = dyn Fn(Event) + Send + Sync;

/// A live event subscription on a connection.
pub struct EventSubscription {
    id: i64,
    topic: String,
    subscriber_id: SubscriberId,
    bus: Arc<EventBus<ServerMessage>>,
    cancel: CancellationToken,
}

impl EventSubscription {
    /// Start the dispatch loop over an already-registered bus channel.
    pub(crate) fn spawn(
        id: i64,
        topic: &str,
        subscriber_id: SubscriberId,
        mut rx: mpsc::Receiver<ServerMessage>,
        bus: Arc<EventBus<ServerMessage>>,
        callback: Arc<OnEvent>,
    ) -> Self {
        let cancel = CancellationToken::new();

        let loop_cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = loop_cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        // An answer to our subscribe command: hand the
                        // event to the callback on its own task so a
                        // slow callback never blocks dispatch. This
                        // also means callback runs may overlap and
                        // finish out of receipt order.
                        Some(ServerMessage::Event { id: msg_id, event }) if msg_id == id => {
                            let callback = Arc::clone(&callback);
                            tokio::spawn(async move { callback(event) });
                        }
                        // Traffic for other subscriptions sharing the
                        // topic.
                        Some(_) => {}
                        None => break,
                    },
                }
            }
            tracing::debug!(subscription_id = id, "Dispatch loop stopped");
        });

        Self {
            id,
            topic: topic.to_string(),
            subscriber_id,
            bus,
            cancel,
        }
    }

    /// Correlation id this subscription filters on.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Stop the dispatch loop and withdraw this subscription's channel
    /// from the event stream. Events published after this returns are
    /// no longer delivered; callback runs already in flight finish on
    /// their own.
    pub async fn unsubscribe(&self) {
        self.cancel.cancel();
        self.bus.unsubscribe(&self.topic, self.subscriber_id).await;
        tracing::debug!(subscription_id = self.id, "Unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn event_envelope(id: i64, event_type: &str) -> ServerMessage {
        ServerMessage::Event {
            id,
            event: Event {
                event_type: event_type.to_string(),
                time_fired: Utc::now(),
                data: Default::default(),
            },
        }
    }

    async fn subscription_under_test(
        id: i64,
        bus: &Arc<EventBus<ServerMessage>>,
    ) -> (EventSubscription, mpsc::UnboundedReceiver<Event>) {
        let (seen_tx, seen_rx) = mpsc::unbounded_channel();
        let (subscriber_id, rx) = bus.subscribe("events").await;
        let sub = EventSubscription::spawn(
            id,
            "events",
            subscriber_id,
            rx,
            Arc::clone(bus),
            Arc::new(move |event| {
                let _ = seen_tx.send(event);
            }),
        );
        (sub, seen_rx)
    }

    #[tokio::test]
    async fn test_dispatches_matching_id() {
        let bus = Arc::new(EventBus::new());
        let (sub, mut seen) = subscription_under_test(1, &bus).await;

        bus.publish("events", event_envelope(1, "state_changed")).await;

        let event = timeout(Duration::from_secs(1), seen.recv())
            .await
            .expect("callback should have fired")
            .unwrap();
        assert_eq!(event.event_type, "state_changed");
        assert_eq!(sub.id(), 1);
    }

    #[tokio::test]
    async fn test_discards_other_ids_and_results() {
        let bus = Arc::new(EventBus::new());
        let (_sub, mut seen) = subscription_under_test(1, &bus).await;

        bus.publish("events", event_envelope(2, "state_changed")).await;
        bus.publish(
            "events",
            ServerMessage::Result {
                id: 1,
                success: true,
                result: None,
                error: None,
            },
        )
        .await;

        assert!(timeout(Duration::from_millis(100), seen.recv())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_unsubscribe_stops_delivery_and_deregisters() {
        let bus = Arc::new(EventBus::new());
        let (sub, mut seen) = subscription_under_test(1, &bus).await;
        assert_eq!(bus.subscriber_count("events").await, 1);

        sub.unsubscribe().await;
        assert_eq!(bus.subscriber_count("events").await, 0);

        bus.publish("events", event_envelope(1, "state_changed")).await;
        assert!(timeout(Duration::from_millis(100), seen.recv())
            .await
            .is_err());
    }
}
