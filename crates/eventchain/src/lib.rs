//! # Eventchain
//!
//! Generates causally-linked streams of domain events over a publish/subscribe
//! bus, as realistic test traffic for downstream event-graph consumers.
//!
//! ## Core Concepts
//!
//! - [`Envelope`] = a type tag, a creation time and an embedded payload
//! - [`Payload`] = the typed body of an envelope, chosen by its tag
//! - [`ChainHandler`] = one causal step: given an event, decide its successor
//!
//! The key principle: **one received event = at most one successor**. A chain
//! ends when its event type has no outgoing transition or when the draw lands
//! on [`EventType::Nothing`].
//!
//! ## Architecture
//!
//! ```text
//! Seeder ──► create_topic            (UserRegistered, ItemCreated)
//!
//! RootEmitter ──► initial_events_topic
//!                        │
//!                        ▼ ChainHandler(ItemViewed → {ItemPurchased, ItemDropped, Nothing})
//!                 checkout_topic
//!                        │
//!                        ▼ ChainHandler(ItemPurchased → {ItemDelivered, ItemNotDelivered})
//!                 delivery_topic     (terminal)
//! ```
//!
//! ## Key Invariants
//!
//! 1. **Entities are immutable** - Seeded once, shared read-only afterwards
//! 2. **Handlers are pure** - No IO, no shared mutable state; the router publishes
//! 3. **Identity flows forward** - `ItemID`/`UserID` are copied into every successor
//! 4. **Draws are uniform** - Every candidate successor is equally likely
//! 5. **Decode failures surface** - A bad message aborts its step, never coerced
//!
//! ## Guarantees
//!
//! - **Fresh ids per publish**: message and correlation ids are never reused or
//!   propagated from the causing message
//! - **No persistence**: event history lives only on the bus
//! - **Delivery semantics are the bus's**: nothing here retries
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use eventchain::{
//!     ChainHandler, FakeRandom, InMemoryBus, MessageBus, Publisher, RandomSource,
//!     RootEmitter, Router, Seeder, TransitionTable,
//! };
//!
//! let bus: Arc<dyn MessageBus> = Arc::new(InMemoryBus::new());
//! let random: Arc<dyn RandomSource> = Arc::new(FakeRandom::new());
//! let publisher = Publisher::new(bus.clone(), random.clone());
//!
//! let router = Router::builder(bus.clone(), publisher.clone())
//!     .route("viewed", "initial_events_topic", "checkout_topic",
//!            ChainHandler::new(TransitionTable::item_viewed(), random.clone()))
//!     .route("purchased", "checkout_topic", "delivery_topic",
//!            ChainHandler::new(TransitionTable::item_purchased(), random.clone()))
//!     .build()
//!     .await?;
//!
//! let population = Seeder::new(publisher.clone(), random.clone(), "create_topic")
//!     .seed(30, 20)
//!     .await;
//! let emitter = RootEmitter::new(publisher, random, population, "initial_events_topic");
//!
//! let shutdown = tokio_util::sync::CancellationToken::new();
//! tokio::spawn(router.run(shutdown.clone()));
//! emitter.run(shutdown).await;
//! ```

mod bus;
mod config;
mod emitter;
mod envelope;
mod error;
mod event;
mod publish;
mod random;
mod router;
mod seeder;
mod transition;

#[cfg(feature = "nats")]
mod nats;

// Re-export event types
pub use event::{
    EventType, Item, ItemDeliveredPayload, ItemDroppedPayload, ItemNotDeliveredPayload,
    ItemPurchasedPayload, ItemViewedPayload, Payload, UnknownEventType, User,
};

// Re-export codec
pub use envelope::{decode, encode, Envelope};

// Re-export error types
pub use error::{BusError, ChainError};

// Re-export random choice service
pub use random::{pick, FakeRandom, RandomSource, Vehicle};

// Re-export bus types
pub use bus::{InMemoryBus, Message, MessageBus, Subscription, CORRELATION_ID_KEY};

#[cfg(feature = "nats")]
pub use nats::{NatsBus, MESSAGE_ID_HEADER};

// Re-export generators
pub use emitter::{RootEmitter, Tick, DEFAULT_EMIT_INTERVAL};
pub use publish::Publisher;
pub use seeder::{Population, Seeder, USER_AGE_RANGE};
pub use transition::{ChainHandler, TransitionTable, NOT_DELIVERED_REASONS, QUANTITY_RANGE};

// Re-export wiring
pub use config::{
    ConfigError, GeneratorConfig, Topics, CHECKOUT_TOPIC, CREATE_TOPIC, DELIVERY_TOPIC,
    INITIAL_EVENTS_TOPIC,
};
pub use router::{ChainRoute, Router, RouterBuilder};

// Re-export commonly used external types
pub use async_trait::async_trait;
