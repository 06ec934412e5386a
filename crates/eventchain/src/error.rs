//! Error types.
//!
//! Three failure kinds matter to a chain step:
//!
//! - **Encoding**: a payload or envelope failed to serialize. The step is skipped.
//! - **Decoding**: received bytes failed to parse. Processing of that message
//!   aborts; redelivery is the bus's concern.
//! - **Publish**: the bus rejected the message. The caller treats it as not
//!   committed.
//!
//! None of them is fatal to the process.

/// Errors raised by a bus implementation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BusError {
    /// The bus refused the message.
    #[error("publish to {topic} rejected: {reason}")]
    Rejected { topic: String, reason: String },

    /// The underlying transport failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The bus has been shut down.
    #[error("bus closed")]
    Closed,
}

/// Errors raised while seeding, emitting or advancing a chain.
#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    #[error("encoding failed: {0}")]
    Encoding(#[source] serde_json::Error),

    #[error("decoding failed: {0}")]
    Decoding(#[source] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(#[source] BusError),

    #[error("subscribe to {topic} failed: {source}")]
    Subscribe {
        topic: String,
        #[source]
        source: BusError,
    },
}

impl ChainError {
    pub fn is_decoding(&self) -> bool {
        matches!(self, ChainError::Decoding(_))
    }
}

impl From<BusError> for ChainError {
    fn from(e: BusError) -> Self {
        ChainError::Publish(e)
    }
}
