//! Message bus abstraction and the in-memory implementation.
//!
//! A bus is topic-addressed: `publish` sends one [`Message`] to every current
//! subscriber of a topic, `subscribe` yields a [`Subscription`] stream of the
//! messages published after it was created.
//!
//! ## Guarantees (in-memory)
//!
//! - **FIFO per topic**: a subscriber sees messages in publish order
//! - **At-most-once**: lagging subscribers drop the oldest messages
//! - **No retention**: publishing to a topic without subscribers succeeds and
//!   the message is discarded

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tracing::warn;
use uuid::Uuid;

use crate::error::BusError;

/// Metadata key carrying the correlation identifier.
pub const CORRELATION_ID_KEY: &str = "correlation_id";

/// Default per-topic buffer for the in-memory bus.
pub const DEFAULT_TOPIC_CAPACITY: usize = 1024;

// ============================================================================
// Message
// ============================================================================

/// Transport-level message: identifier, metadata and the encoded envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: Uuid,
    pub metadata: HashMap<String, String>,
    pub payload: Vec<u8>,
}

impl Message {
    pub fn new(id: Uuid, payload: Vec<u8>) -> Self {
        Self {
            id,
            metadata: HashMap::new(),
            payload,
        }
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.metadata.get(CORRELATION_ID_KEY).map(String::as_str)
    }

    pub fn set_correlation_id(&mut self, id: impl Into<String>) {
        self.metadata.insert(CORRELATION_ID_KEY.to_string(), id.into());
    }
}

// ============================================================================
// MessageBus
// ============================================================================

/// Topic-addressed publish/subscribe transport.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BusError>;

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError>;
}

/// Stream of messages delivered on one topic.
pub struct Subscription {
    topic: String,
    messages: BoxStream<'static, Message>,
}

impl Subscription {
    pub fn new(topic: impl Into<String>, messages: BoxStream<'static, Message>) -> Self {
        Self {
            topic: topic.into(),
            messages,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Next message, or `None` once the topic is closed.
    pub async fn next(&mut self) -> Option<Message> {
        self.messages.next().await
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// InMemoryBus
// ============================================================================

/// In-process bus built on one broadcast channel per topic.
///
/// Cloning yields another handle to the same topics.
#[derive(Clone)]
pub struct InMemoryBus {
    topics: Arc<DashMap<String, broadcast::Sender<Message>>>,
    capacity: usize,
}

impl InMemoryBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TOPIC_CAPACITY)
    }

    /// Bus whose topics each buffer up to `capacity` undelivered messages.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            topics: Arc::new(DashMap::new()),
            capacity: capacity.max(1),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<Message> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Number of live subscribers on a topic.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for InMemoryBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryBus")
            .field("topics", &self.topics.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[async_trait]
impl MessageBus for InMemoryBus {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BusError> {
        // A send error only means nobody is listening yet.
        let _ = self.sender(topic).send(message);
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        let rx = self.sender(topic).subscribe();
        let name = topic.to_string();

        let messages = stream::unfold((rx, name), |(mut rx, name)| async move {
            loop {
                match rx.recv().await {
                    Ok(message) => return Some((message, (rx, name))),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(topic = %name, skipped, "subscriber lagged, messages dropped");
                    }
                    Err(broadcast::error::RecvError::Closed) => return None,
                }
            }
        });

        Ok(Subscription::new(topic, messages.boxed()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_in_publish_order() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("orders").await.unwrap();

        for i in 0..3u8 {
            bus.publish("orders", Message::new(Uuid::new_v4(), vec![i]))
                .await
                .unwrap();
        }

        for i in 0..3u8 {
            assert_eq!(sub.next().await.unwrap().payload, vec![i]);
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_succeeds() {
        let bus = InMemoryBus::new();
        bus.publish("nobody", Message::new(Uuid::new_v4(), vec![]))
            .await
            .unwrap();
        assert_eq!(bus.subscriber_count("nobody"), 0);
    }

    #[tokio::test]
    async fn topics_are_isolated() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("a").await.unwrap();
        let _b = bus.subscribe("b").await.unwrap();

        bus.publish("b", Message::new(Uuid::new_v4(), b"for b".to_vec()))
            .await
            .unwrap();
        bus.publish("a", Message::new(Uuid::new_v4(), b"for a".to_vec()))
            .await
            .unwrap();

        assert_eq!(a.next().await.unwrap().payload, b"for a".to_vec());
        assert_eq!(bus.subscriber_count("b"), 1);
    }

    #[test]
    fn correlation_id_lives_in_metadata() {
        let mut message = Message::new(Uuid::new_v4(), vec![]);
        assert!(message.correlation_id().is_none());

        message.set_correlation_id("abc");
        assert_eq!(message.correlation_id(), Some("abc"));
        assert_eq!(message.metadata.get(CORRELATION_ID_KEY).unwrap(), "abc");
    }
}
