//! Root event emitter.
//!
//! Every tick draws a root type uniformly from [`EventType::ROOTS`]. Only
//! `ItemViewed` has a payload rule (a random seeded item/user pair); the two
//! address-validation roots produce no-op ticks.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ChainError;
use crate::event::{EventType, ItemViewedPayload};
use crate::publish::Publisher;
use crate::random::{pick, RandomSource};
use crate::seeder::Population;

/// Reference cadence between root events.
pub const DEFAULT_EMIT_INTERVAL: Duration = Duration::from_millis(500);

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    /// A root event was published under this message id.
    Published { event_type: EventType, message_id: Uuid },
    /// The drawn root type has no payload rule.
    Skipped(EventType),
    /// The population has no user or no item to bind.
    NoEntities,
}

/// Publishes root events on a fixed interval.
pub struct RootEmitter {
    publisher: Publisher,
    random: Arc<dyn RandomSource>,
    population: Population,
    topic: String,
    interval: Duration,
}

impl RootEmitter {
    pub fn new(
        publisher: Publisher,
        random: Arc<dyn RandomSource>,
        population: Population,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            random,
            population,
            topic: topic.into(),
            interval: DEFAULT_EMIT_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Run one tick.
    pub async fn tick(&self) -> Result<Tick, ChainError> {
        let roots = &EventType::ROOTS;
        let event_type = roots[self.random.index(roots.len()).min(roots.len() - 1)];

        match event_type {
            EventType::ItemViewed => {
                let (Some(item), Some(user)) = (
                    pick(self.random.as_ref(), &self.population.items[..]),
                    pick(self.random.as_ref(), &self.population.users[..]),
                ) else {
                    return Ok(Tick::NoEntities);
                };

                let payload = ItemViewedPayload {
                    item_id: item.id,
                    user_id: user.id,
                };
                let message_id = self
                    .publisher
                    .publish(&self.topic, event_type, &payload)
                    .await?;

                Ok(Tick::Published {
                    event_type,
                    message_id,
                })
            }
            // TODO: give the address-validation roots a payload rule once one is defined.
            other => Ok(Tick::Skipped(other)),
        }
    }

    /// Tick every interval until `shutdown` is cancelled.
    ///
    /// A failed tick is logged and the loop carries on.
    pub async fn run(&self, shutdown: CancellationToken) {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(topic = %self.topic, interval_ms = u64::try_from(self.interval.as_millis()).unwrap_or(u64::MAX), "root emitter started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("root emitter stopping");
                    break;
                }
                _ = ticker.tick() => {
                    match self.tick().await {
                        Ok(Tick::Published { event_type, message_id }) => {
                            debug!(%event_type, %message_id, "root event published");
                        }
                        Ok(Tick::Skipped(event_type)) => {
                            debug!(%event_type, "no payload rule, tick skipped");
                        }
                        Ok(Tick::NoEntities) => {
                            warn!("no seeded users or items, tick skipped");
                        }
                        Err(e) => {
                            warn!(error = %e, "root tick failed");
                        }
                    }
                }
            }
        }
    }
}

impl std::fmt::Debug for RootEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootEmitter")
            .field("topic", &self.topic)
            .field("interval", &self.interval)
            .field("users", &self.population.users.len())
            .field("items", &self.population.items.len())
            .finish()
    }
}
