//! NATS transport.
//!
//! Topics map one-to-one onto NATS subjects. The message id and the
//! correlation id travel as NATS headers.

use async_trait::async_trait;
use futures::StreamExt;
use tracing::{debug, info};
use uuid::Uuid;

use crate::bus::{Message, MessageBus, Subscription, CORRELATION_ID_KEY};
use crate::error::BusError;

/// Header carrying [`Message::id`].
pub const MESSAGE_ID_HEADER: &str = "message_id";

/// [`MessageBus`] over a single NATS connection.
#[derive(Clone)]
pub struct NatsBus {
    client: async_nats::Client,
}

impl NatsBus {
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        info!(url, "connecting to NATS server");
        let client = async_nats::connect(url)
            .await
            .map_err(|e| BusError::Transport(format!("failed to connect to {url}: {e}")))?;
        info!("NATS connection established");
        Ok(Self { client })
    }

    pub fn from_client(client: async_nats::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl MessageBus for NatsBus {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BusError> {
        let mut headers = async_nats::HeaderMap::new();
        headers.insert(MESSAGE_ID_HEADER, message.id.to_string().as_str());
        if let Some(correlation_id) = message.correlation_id() {
            headers.insert(CORRELATION_ID_KEY, correlation_id);
        }

        self.client
            .publish_with_headers(topic.to_string(), headers, message.payload.into())
            .await
            .map_err(|e| BusError::Rejected {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        debug!(subject = topic, "subscribing");
        let subscriber = self
            .client
            .subscribe(topic.to_string())
            .await
            .map_err(|e| BusError::Transport(format!("failed to subscribe to {topic}: {e}")))?;

        let messages = subscriber.map(|msg| {
            let mut message = Message::new(Uuid::nil(), msg.payload.to_vec());
            if let Some(headers) = &msg.headers {
                if let Some(id) = headers.get(MESSAGE_ID_HEADER) {
                    message.id = id.as_str().parse().unwrap_or_else(|_| Uuid::nil());
                }
                if let Some(correlation_id) = headers.get(CORRELATION_ID_KEY) {
                    message.set_correlation_id(correlation_id.as_str());
                }
            }
            message
        });

        Ok(Subscription::new(topic, messages.boxed()))
    }
}

impl std::fmt::Debug for NatsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBus").field("connected", &true).finish()
    }
}
