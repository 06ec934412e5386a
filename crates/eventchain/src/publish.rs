//! Publish adapter: stamps identifiers on an encoded envelope and routes it.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::bus::{Message, MessageBus};
use crate::envelope::Envelope;
use crate::error::ChainError;
use crate::event::EventType;
use crate::random::RandomSource;

/// Wraps a bus, giving every published message a fresh message id and a
/// fresh correlation id.
///
/// Correlation ids are never propagated from the causing message.
#[derive(Clone)]
pub struct Publisher {
    bus: Arc<dyn MessageBus>,
    random: Arc<dyn RandomSource>,
}

impl Publisher {
    pub fn new(bus: Arc<dyn MessageBus>, random: Arc<dyn RandomSource>) -> Self {
        Self { bus, random }
    }

    /// Wrap `payload` in an envelope tagged `event_type` and publish it.
    ///
    /// Returns the message id assigned to the published message.
    pub async fn publish<P: Serialize>(
        &self,
        topic: &str,
        event_type: EventType,
        payload: &P,
    ) -> Result<Uuid, ChainError> {
        let bytes = Envelope::new(event_type, payload)
            .and_then(|envelope| envelope.encode())
            .inspect_err(|e| {
                warn!(topic, %event_type, error = %e, "failed to encode envelope");
            })?;

        self.publish_envelope(topic, bytes).await
    }

    /// Publish already-encoded envelope bytes.
    pub async fn publish_envelope(&self, topic: &str, envelope: Vec<u8>) -> Result<Uuid, ChainError> {
        let mut message = Message::new(self.random.token(), envelope);
        message.set_correlation_id(self.random.token().to_string());

        let message_id = message.id;
        debug!(
            topic,
            message_id = %message_id,
            correlation_id = message.correlation_id().unwrap_or_default(),
            payload = %String::from_utf8_lossy(&message.payload),
            "publishing message"
        );

        self.bus.publish(topic, message).await.map_err(|e| {
            warn!(topic, message_id = %message_id, error = %e, "publish rejected");
            ChainError::Publish(e)
        })?;

        Ok(message_id)
    }
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Publisher").finish_non_exhaustive()
    }
}
