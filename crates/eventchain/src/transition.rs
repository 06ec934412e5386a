//! Chain transition engine.
//!
//! One [`ChainHandler`] is installed per subscribed topic. For every received
//! envelope it takes exactly one causal step:
//!
//! ```text
//! decode envelope ──► lookup table ──► decode payload ──► draw next type
//!        │                 │                 │                  │
//!     Decoding          no entry          Decoding           Nothing
//!      error           (terminal)          error           (terminal)
//!                                                                │
//!                                          synthesize payload ◄──┘
//!                                                  │
//!                                          encode new envelope
//! ```
//!
//! The draw is uniform over the candidate set. Nothing here touches the
//! transport; the router publishes whatever [`ChainHandler::handle`] returns.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use smallvec::SmallVec;
use tracing::{debug, warn};

use crate::envelope::Envelope;
use crate::error::ChainError;
use crate::event::{
    EventType, ItemDeliveredPayload, ItemDroppedPayload, ItemNotDeliveredPayload,
    ItemPurchasedPayload, ItemViewedPayload, Payload,
};
use crate::random::{pick, RandomSource};

/// Quantity bounds for purchased and dropped items.
pub const QUANTITY_RANGE: (i64, i64) = (1, 5);

/// Reasons an item can fail delivery.
pub const NOT_DELIVERED_REASONS: [&str; 2] = ["fake", "not occupied by user"];

type Candidates = SmallVec<[EventType; 3]>;

// ============================================================================
// Transition Table
// ============================================================================

/// Maps an incoming event type to the candidate types that may follow it.
#[derive(Debug, Clone, Default)]
pub struct TransitionTable {
    entries: HashMap<EventType, Candidates>,
}

impl TransitionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the candidates following `from`.
    pub fn with(mut self, from: EventType, to: impl IntoIterator<Item = EventType>) -> Self {
        self.entries.insert(from, to.into_iter().collect());
        self
    }

    /// `ItemViewed → {ItemPurchased, ItemDropped, Nothing}`
    pub fn item_viewed() -> Self {
        Self::new().with(
            EventType::ItemViewed,
            [
                EventType::ItemPurchased,
                EventType::ItemDropped,
                EventType::Nothing,
            ],
        )
    }

    /// `ItemPurchased → {ItemDelivered, ItemNotDelivered}`
    pub fn item_purchased() -> Self {
        Self::new().with(
            EventType::ItemPurchased,
            [EventType::ItemDelivered, EventType::ItemNotDelivered],
        )
    }

    /// Candidates following `from`. `None` marks a terminal state.
    pub fn candidates(&self, from: EventType) -> Option<&[EventType]> {
        self.entries
            .get(&from)
            .map(|c| c.as_slice())
            .filter(|c| !c.is_empty())
    }
}

// ============================================================================
// Chain Handler
// ============================================================================

/// Single-step chain advancement for one subscription.
///
/// Holds no mutable state, so one instance serves concurrent messages.
#[derive(Clone)]
pub struct ChainHandler {
    table: TransitionTable,
    random: Arc<dyn RandomSource>,
}

impl ChainHandler {
    pub fn new(table: TransitionTable, random: Arc<dyn RandomSource>) -> Self {
        Self { table, random }
    }

    pub fn table(&self) -> &TransitionTable {
        &self.table
    }

    /// Decide the successor payload of `incoming`, if any.
    ///
    /// `Ok(None)` means the chain ends here: the incoming type is terminal,
    /// or the draw landed on [`EventType::Nothing`].
    pub fn decide(&self, incoming: &Envelope) -> Result<Option<Payload>, ChainError> {
        let Some(candidates) = self.table.candidates(incoming.event_type) else {
            debug!(event_type = %incoming.event_type, "terminal event type");
            return Ok(None);
        };

        let payload = Payload::from_envelope(incoming).inspect_err(|e| {
            warn!(event_type = %incoming.event_type, error = %e, "failed to decode event payload");
        })?;

        let Some(&next) = pick(self.random.as_ref(), candidates) else {
            return Ok(None);
        };

        if next == EventType::Nothing {
            debug!(event_type = %incoming.event_type, "drew Nothing, chain ends");
            return Ok(None);
        }

        let outgoing = self.synthesize(next, &payload);
        if outgoing.is_none() {
            warn!(
                from = %incoming.event_type,
                to = %next,
                "no synthesis rule for transition, chain ends"
            );
        }
        Ok(outgoing)
    }

    /// Take one step from encoded envelope bytes to encoded envelope bytes.
    pub fn handle(&self, incoming: &[u8]) -> Result<Option<Vec<u8>>, ChainError> {
        let envelope = Envelope::decode(incoming).inspect_err(|e| {
            warn!(
                error = %e,
                payload = %String::from_utf8_lossy(incoming),
                "failed to decode envelope"
            );
        })?;

        let Some(outgoing) = self.decide(&envelope)? else {
            return Ok(None);
        };

        let bytes = Envelope::from_payload(&outgoing)
            .and_then(|e| e.encode())
            .inspect_err(|e| warn!(error = %e, "failed to encode outgoing envelope"))?;

        Ok(Some(bytes))
    }

    /// Build the `next` payload, carrying `(ItemID, UserID)` forward from the
    /// incoming payload and generating fresh values for new fields.
    fn synthesize(&self, next: EventType, incoming: &Payload) -> Option<Payload> {
        let (item_id, user_id) = incoming.identity()?;

        let payload = match next {
            EventType::ItemViewed => Payload::ItemViewed(ItemViewedPayload { item_id, user_id }),
            EventType::ItemPurchased => Payload::ItemPurchased(ItemPurchasedPayload {
                item_id,
                user_id,
                quantity: self.quantity(),
            }),
            EventType::ItemDropped => Payload::ItemDropped(ItemDroppedPayload {
                item_id,
                user_id,
                quantity: self.quantity(),
            }),
            EventType::ItemDelivered => Payload::ItemDelivered(ItemDeliveredPayload {
                item_id,
                user_id,
                address: self.random.address(),
            }),
            EventType::ItemNotDelivered => Payload::ItemNotDelivered(ItemNotDeliveredPayload {
                item_id,
                user_id,
                address: self.random.address(),
                reason: self
                    .random
                    .pick_str(&NOT_DELIVERED_REASONS)
                    .unwrap_or(NOT_DELIVERED_REASONS[0])
                    .to_string(),
            }),
            EventType::UserRegistered
            | EventType::ItemCreated
            | EventType::UserAddressValidated
            | EventType::UserAddressValidationFailed
            | EventType::Nothing => return None,
        };
        Some(payload)
    }

    fn quantity(&self) -> u32 {
        let (min, max) = QUANTITY_RANGE;
        u32::try_from(self.random.number(min, max)).unwrap_or(1)
    }
}

impl fmt::Debug for ChainHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainHandler")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}
