//! Test doubles for eventchain collaborators.
//!
//! - [`RecordingBus`] keeps every accepted publish and can be told to reject
//!   specific ones, for exercising publish-failure paths.
//! - [`ScriptedRandom`] answers choices from queues the test fills, falling back
//!   to a seeded RNG once a queue runs dry.
//!
//! ```rust,ignore
//! let bus = RecordingBus::new().reject_nth(2);
//! let random = ScriptedRandom::with_seed(1).then_index(0).then_number(4);
//! ```

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;
use eventchain::{
    BusError, Envelope, InMemoryBus, Message, MessageBus, RandomSource, Subscription, Vehicle,
};

// ============================================================================
// RecordingBus
// ============================================================================

/// A publish the bus accepted.
#[derive(Debug, Clone)]
pub struct Published {
    pub topic: String,
    pub message: Message,
}

impl Published {
    /// Decode the recorded payload as an envelope.
    pub fn envelope(&self) -> Envelope {
        Envelope::decode(&self.message.payload).expect("recorded payload is not an envelope")
    }
}

/// Bus that records accepted publishes and forwards them to an in-memory bus
/// so subscriptions still work.
#[derive(Clone, Default)]
pub struct RecordingBus {
    inner: InMemoryBus,
    published: Arc<Mutex<Vec<Published>>>,
    attempts: Arc<AtomicUsize>,
    reject_attempts: Arc<Mutex<HashSet<usize>>>,
    reject_topics: Arc<DashMap<String, ()>>,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject the `n`th publish attempt (1-based, counted across topics).
    pub fn reject_nth(self, n: usize) -> Self {
        self.reject_attempts.lock().unwrap().insert(n);
        self
    }

    /// Reject every publish to `topic`.
    pub fn reject_topic(self, topic: &str) -> Self {
        self.reject_topics.insert(topic.to_string(), ());
        self
    }

    /// Every accepted publish, in order.
    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap().clone()
    }

    /// Accepted publishes on one topic, in order.
    pub fn published_to(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|p| p.topic == topic)
            .collect()
    }

    /// Total publish attempts, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn publish(&self, topic: &str, message: Message) -> Result<(), BusError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        let rejected = self.reject_topics.contains_key(topic)
            || self.reject_attempts.lock().unwrap().contains(&attempt);
        if rejected {
            return Err(BusError::Rejected {
                topic: topic.to_string(),
                reason: format!("scripted rejection of attempt {attempt}"),
            });
        }

        self.published.lock().unwrap().push(Published {
            topic: topic.to_string(),
            message: message.clone(),
        });
        self.inner.publish(topic, message).await
    }

    async fn subscribe(&self, topic: &str) -> Result<Subscription, BusError> {
        self.inner.subscribe(topic).await
    }
}

// ============================================================================
// ScriptedRandom
// ============================================================================

#[derive(Default)]
struct Script {
    indexes: VecDeque<usize>,
    numbers: VecDeque<i64>,
}

/// [`RandomSource`] whose choices are queued by the test.
///
/// `index` and `number` pop from their queues first; an empty queue falls back
/// to the seeded RNG. Fake values are fixed strings so assertions stay simple.
pub struct ScriptedRandom {
    script: Mutex<Script>,
    rng: Mutex<fastrand::Rng>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            script: Mutex::new(Script::default()),
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Queue the next index choice.
    pub fn then_index(self, index: usize) -> Self {
        self.script.lock().unwrap().indexes.push_back(index);
        self
    }

    /// Queue the next number draw.
    pub fn then_number(self, n: i64) -> Self {
        self.script.lock().unwrap().numbers.push_back(n);
        self
    }

    /// Queue an index choice from a shared reference.
    pub fn push_index(&self, index: usize) {
        self.script.lock().unwrap().indexes.push_back(index);
    }
}

impl Default for ScriptedRandom {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomSource for ScriptedRandom {
    fn index(&self, len: usize) -> usize {
        let scripted = self.script.lock().unwrap().indexes.pop_front();
        match scripted {
            Some(i) => i.min(len.saturating_sub(1)),
            None => self.rng.lock().unwrap().usize(..len.max(1)),
        }
    }

    fn number(&self, min: i64, max: i64) -> i64 {
        let scripted = self.script.lock().unwrap().numbers.pop_front();
        match scripted {
            Some(n) => n.clamp(min, max),
            None => self.rng.lock().unwrap().i64(min..=max),
        }
    }

    fn name(&self) -> String {
        "Test User".to_string()
    }

    fn vehicle(&self) -> Vehicle {
        Vehicle {
            brand: "Volvo".to_string(),
            model: "XC60".to_string(),
            year: 2020,
        }
    }

    fn street(&self) -> String {
        "1 Test Street".to_string()
    }

    fn city(&self) -> String {
        "Testville".to_string()
    }

    fn country(&self) -> String {
        "Testland".to_string()
    }

    fn token(&self) -> uuid::Uuid {
        uuid::Uuid::new_v4()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_indexes_come_first() {
        let random = ScriptedRandom::new().then_index(2).then_index(0);
        assert_eq!(random.index(3), 2);
        assert_eq!(random.index(3), 0);
        assert!(random.index(3) < 3);
    }

    #[test]
    fn scripted_numbers_are_clamped() {
        let random = ScriptedRandom::new().then_number(9);
        assert_eq!(random.number(1, 5), 5);
    }

    #[tokio::test]
    async fn rejects_scripted_attempt_only() {
        let bus = RecordingBus::new().reject_nth(2);
        for _ in 0..3 {
            let _ = bus
                .publish("t", Message::new(ScriptedRandom::new().token(), vec![]))
                .await;
        }
        assert_eq!(bus.attempts(), 3);
        assert_eq!(bus.published().len(), 2);
    }
}
