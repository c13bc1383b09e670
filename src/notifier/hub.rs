//! Per-batch subscription bus (spec §4.4).
//!
//! Delivery is best-effort and unordered across subscribers but ordered per
//! subscriber. `tokio::sync::broadcast`'s ring buffer gives us exactly the
//! drop-oldest-on-overflow semantics the spec calls for: a lagging receiver
//! gets `RecvError::Lagged(n)` instead of blocking the publisher, which we
//! surface to callers as a `SubscriberLagged` event.

use dashmap::DashMap;
use tokio::sync::broadcast;

use super::events::ServerEvent;

const DEFAULT_BUFFER: usize = 64;

pub struct NotifierHub {
    topics: DashMap<String, broadcast::Sender<ServerEvent>>,
    buffer_capacity: usize,
}

impl Default for NotifierHub {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

impl NotifierHub {
    pub fn new(buffer_capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            buffer_capacity,
        }
    }

    fn topic_sender(&self, batch_id: &str) -> broadcast::Sender<ServerEvent> {
        self.topics
            .entry(batch_id.to_string())
            .or_insert_with(|| broadcast::channel(self.buffer_capacity).0)
            .clone()
    }

    /// Subscribe to a batch's event topic. Creates the topic lazily so a
    /// subscriber may join before the scheduler has published anything.
    pub fn subscribe(&self, batch_id: &str) -> Subscription {
        Subscription {
            batch_id: batch_id.to_string(),
            receiver: self.topic_sender(batch_id).subscribe(),
        }
    }

    /// Publish an event to every current subscriber of `batch_id`. A publish
    /// with no subscribers is a silent no-op (spec §4.4: best-effort).
    pub fn publish(&self, batch_id: &str, event: ServerEvent) {
        let sender = self.topic_sender(batch_id);
        let _ = sender.send(event);
    }

    pub fn subscriber_count(&self, batch_id: &str) -> usize {
        self.topics
            .get(batch_id)
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }

    /// Drop a batch's topic once it is terminal and no longer needed. Any
    /// subscriber still holding a `Subscription` simply observes `Closed`.
    pub fn remove_topic(&self, batch_id: &str) {
        self.topics.remove(batch_id);
    }
}

pub struct Subscription {
    batch_id: String,
    receiver: broadcast::Receiver<ServerEvent>,
}

pub enum SubscriptionEvent {
    Event(ServerEvent),
    Closed,
}

impl Subscription {
    pub async fn recv(&mut self) -> SubscriptionEvent {
        match self.receiver.recv().await {
            Ok(event) => SubscriptionEvent::Event(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                SubscriptionEvent::Event(ServerEvent::SubscriberLagged {
                    batch_id: self.batch_id.clone(),
                    skipped,
                })
            }
            Err(broadcast::error::RecvError::Closed) => SubscriptionEvent::Closed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_with_no_subscribers_is_noop() {
        let hub = NotifierHub::default();
        hub.publish(
            "b1",
            ServerEvent::SystemStatusUpdate {
                message: "hello".into(),
                timestamp: chrono::Utc::now(),
            },
        );
        assert_eq!(hub.subscriber_count("b1"), 0);
    }

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let hub = NotifierHub::default();
        let mut sub = hub.subscribe("b1");
        hub.publish(
            "b1",
            ServerEvent::SystemStatusUpdate {
                message: "hello".into(),
                timestamp: chrono::Utc::now(),
            },
        );
        match sub.recv().await {
            SubscriptionEvent::Event(ServerEvent::SystemStatusUpdate { message, .. }) => {
                assert_eq!(message, "hello");
            }
            _ => panic!("expected SystemStatusUpdate"),
        }
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_subscriber_lagged() {
        let hub = NotifierHub::new(2);
        let mut sub = hub.subscribe("b1");
        for i in 0..5 {
            hub.publish(
                "b1",
                ServerEvent::SystemStatusUpdate {
                    message: format!("msg-{i}"),
                    timestamp: chrono::Utc::now(),
                },
            );
        }
        match sub.recv().await {
            SubscriptionEvent::Event(ServerEvent::SubscriberLagged { batch_id, .. }) => {
                assert_eq!(batch_id, "b1");
            }
            _ => panic!("expected SubscriberLagged, got a different event"),
        }
    }
}
