//! Entity seeding.
//!
//! Users and items get sequential ids starting at 1. Each one is published on
//! the creation topic; only entities the bus accepted are returned, since later
//! events may only reference entities downstream consumers have seen.

use std::sync::Arc;

use tracing::{info, warn};

use crate::event::{EventType, Item, User};
use crate::publish::Publisher;
use crate::random::RandomSource;

/// Youngest and oldest seeded user.
pub const USER_AGE_RANGE: (i64, i64) = (20, 50);

/// Read-only populations shared by the emitter and every handler.
#[derive(Debug, Clone)]
pub struct Population {
    pub users: Arc<[User]>,
    pub items: Arc<[Item]>,
}

impl Population {
    pub fn new(users: Vec<User>, items: Vec<Item>) -> Self {
        Self {
            users: users.into(),
            items: items.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty() || self.items.is_empty()
    }
}

impl Default for Population {
    fn default() -> Self {
        Self::new(Vec::new(), Vec::new())
    }
}

/// Creates and publishes the user and item populations.
#[derive(Clone)]
pub struct Seeder {
    publisher: Publisher,
    random: Arc<dyn RandomSource>,
    topic: String,
}

impl Seeder {
    pub fn new(publisher: Publisher, random: Arc<dyn RandomSource>, topic: impl Into<String>) -> Self {
        Self {
            publisher,
            random,
            topic: topic.into(),
        }
    }

    /// Seed both populations, users first.
    pub async fn seed(&self, users: usize, items: usize) -> Population {
        let users = self.seed_users(users).await;
        let items = self.seed_items(items).await;
        Population::new(users, items)
    }

    pub async fn seed_users(&self, count: usize) -> Vec<User> {
        let mut users = Vec::with_capacity(count);

        for id in 1..=count as u64 {
            let (min_age, max_age) = USER_AGE_RANGE;
            let user = User {
                id,
                name: self.random.name(),
                age: u32::try_from(self.random.number(min_age, max_age)).unwrap_or(20),
            };

            match self
                .publisher
                .publish(&self.topic, EventType::UserRegistered, &user)
                .await
            {
                Ok(_) => users.push(user),
                Err(e) => warn!(user_id = id, error = %e, "skipping user, publish failed"),
            }
        }

        info!(requested = count, seeded = users.len(), "users seeded");
        users
    }

    pub async fn seed_items(&self, count: usize) -> Vec<Item> {
        let mut items = Vec::with_capacity(count);

        for id in 1..=count as u64 {
            let vehicle = self.random.vehicle();
            let item = Item {
                id,
                title: format!("{} {} {}", vehicle.brand, vehicle.model, vehicle.year),
                manufacturer: vehicle.brand,
                origin: self.random.country(),
            };

            match self
                .publisher
                .publish(&self.topic, EventType::ItemCreated, &item)
                .await
            {
                Ok(_) => items.push(item),
                Err(e) => warn!(item_id = id, error = %e, "skipping item, publish failed"),
            }
        }

        info!(requested = count, seeded = items.len(), "items seeded");
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{InMemoryBus, MessageBus};
    use crate::envelope::Envelope;
    use crate::random::FakeRandom;

    fn seeder(bus: &InMemoryBus) -> Seeder {
        let random: Arc<dyn RandomSource> = Arc::new(FakeRandom::with_seed(9));
        Seeder::new(
            Publisher::new(Arc::new(bus.clone()), random.clone()),
            random,
            "create_topic",
        )
    }

    #[tokio::test]
    async fn users_get_sequential_ids_from_one() {
        let bus = InMemoryBus::new();
        let users = seeder(&bus).seed_users(5).await;

        let ids: Vec<u64> = users.iter().map(|u| u.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5]);
        assert!(users.iter().all(|u| (20..=50).contains(&u.age)));
    }

    #[tokio::test]
    async fn item_title_is_built_from_vehicle() {
        let bus = InMemoryBus::new();
        let items = seeder(&bus).seed_items(3).await;

        assert_eq!(items.len(), 3);
        for item in &items {
            assert!(item.title.starts_with(&item.manufacturer));
            assert_eq!(item.title.split(' ').count(), 3);
            assert!(!item.origin.is_empty());
        }
    }

    #[tokio::test]
    async fn creation_events_are_published() {
        let bus = InMemoryBus::new();
        let mut sub = bus.subscribe("create_topic").await.unwrap();

        let population = seeder(&bus).seed(1, 1).await;
        assert!(!population.is_empty());

        let first = Envelope::decode(&sub.next().await.unwrap().payload).unwrap();
        let second = Envelope::decode(&sub.next().await.unwrap().payload).unwrap();
        assert_eq!(first.event_type, EventType::UserRegistered);
        assert_eq!(second.event_type, EventType::ItemCreated);
        assert_eq!(first.payload::<User>().unwrap(), population.users[0]);
    }

    #[tokio::test]
    async fn zero_count_seeds_nothing() {
        let bus = InMemoryBus::new();
        let population = seeder(&bus).seed(0, 0).await;
        assert!(population.is_empty());
    }
}
