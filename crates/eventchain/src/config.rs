//! Generator configuration.
//!
//! Defaults reproduce the reference setup: 30 users, 20 items, one root event
//! every 500 ms, four fixed topics. Each field can be overridden from the
//! environment:
//!
//! - `EVENTCHAIN_USERS`, `EVENTCHAIN_ITEMS` -- population sizes
//! - `EVENTCHAIN_INTERVAL_MS` -- root emitter cadence
//! - `EVENTCHAIN_SEED` -- fixes the random source for reproducible runs
//! - `EVENTCHAIN_CREATE_TOPIC`, `EVENTCHAIN_INITIAL_TOPIC`,
//!   `EVENTCHAIN_CHECKOUT_TOPIC`, `EVENTCHAIN_DELIVERY_TOPIC` -- topic names
//! - `NATS_URL` -- publish over NATS instead of the in-memory bus

use std::str::FromStr;
use std::time::Duration;

use crate::emitter::DEFAULT_EMIT_INTERVAL;

pub const CREATE_TOPIC: &str = "create_topic";
pub const INITIAL_EVENTS_TOPIC: &str = "initial_events_topic";
pub const CHECKOUT_TOPIC: &str = "checkout_topic";
pub const DELIVERY_TOPIC: &str = "delivery_topic";

/// A malformed environment override.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid value for {var}: {value:?}")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
}

/// The four channels events travel on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    /// `UserRegistered` and `ItemCreated`.
    pub create: String,
    /// Root events.
    pub initial_events: String,
    /// Successors of `ItemViewed`.
    pub checkout: String,
    /// Successors of `ItemPurchased`.
    pub delivery: String,
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            create: CREATE_TOPIC.to_string(),
            initial_events: INITIAL_EVENTS_TOPIC.to_string(),
            checkout: CHECKOUT_TOPIC.to_string(),
            delivery: DELIVERY_TOPIC.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorConfig {
    pub users: usize,
    pub items: usize,
    pub emit_interval: Duration,
    pub topics: Topics,
    pub seed: Option<u64>,
    pub nats_url: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            users: 30,
            items: 20,
            emit_interval: DEFAULT_EMIT_INTERVAL,
            topics: Topics::default(),
            seed: None,
            nats_url: None,
        }
    }
}

impl GeneratorConfig {
    /// Defaults overridden by the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(users) = parsed(&lookup, "EVENTCHAIN_USERS")? {
            config.users = users;
        }
        if let Some(items) = parsed(&lookup, "EVENTCHAIN_ITEMS")? {
            config.items = items;
        }
        if let Some(ms) = parsed::<u64>(&lookup, "EVENTCHAIN_INTERVAL_MS")? {
            if ms == 0 {
                return Err(ConfigError {
                    var: "EVENTCHAIN_INTERVAL_MS",
                    value: ms.to_string(),
                });
            }
            config.emit_interval = Duration::from_millis(ms);
        }
        config.seed = parsed(&lookup, "EVENTCHAIN_SEED")?;

        let topics = &mut config.topics;
        for (var, slot) in [
            ("EVENTCHAIN_CREATE_TOPIC", &mut topics.create),
            ("EVENTCHAIN_INITIAL_TOPIC", &mut topics.initial_events),
            ("EVENTCHAIN_CHECKOUT_TOPIC", &mut topics.checkout),
            ("EVENTCHAIN_DELIVERY_TOPIC", &mut topics.delivery),
        ] {
            if let Some(name) = lookup(var).filter(|v| !v.trim().is_empty()) {
                *slot = name;
            }
        }

        config.nats_url = lookup("NATS_URL").filter(|v| !v.trim().is_empty());

        Ok(config)
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<T>, ConfigError> {
    let Some(value) = lookup(var) else {
        return Ok(None);
    };
    value
        .trim()
        .parse()
        .map(Some)
        .map_err(|_| ConfigError { var, value })
}
