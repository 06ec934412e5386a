//! Router: installs chain handlers on topics and publishes what they return.
//!
//! ```text
//! subscribe(from) ──► spawn per message ──► ChainHandler::handle()
//!                                                 │
//!                          Ok(Some(bytes)) ───────┼──► Publisher ──► publish(to)
//!                          Ok(None)        ───────┤    (fresh message id
//!                          Err(e)          ───────┘     + correlation id)
//!                            logged, message dropped
//! ```
//!
//! Each message is handled in its own task, so slow or failing messages never
//! hold up the rest of the subscription.

use std::fmt;
use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::bus::{Message, MessageBus, Subscription};
use crate::error::ChainError;
use crate::publish::Publisher;
use crate::transition::ChainHandler;

/// One installed handler: consume `from`, publish successors to `to`.
#[derive(Debug, Clone)]
pub struct ChainRoute {
    pub name: String,
    pub from: String,
    pub to: String,
    pub handler: Arc<ChainHandler>,
}

/// Collects routes, then subscribes them all in [`RouterBuilder::build`].
pub struct RouterBuilder {
    bus: Arc<dyn MessageBus>,
    publisher: Publisher,
    routes: Vec<ChainRoute>,
}

impl RouterBuilder {
    pub fn new(bus: Arc<dyn MessageBus>, publisher: Publisher) -> Self {
        Self {
            bus,
            publisher,
            routes: Vec::new(),
        }
    }

    /// Install `handler` on `from`, publishing its output to `to`.
    pub fn route(
        mut self,
        name: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
        handler: ChainHandler,
    ) -> Self {
        self.routes.push(ChainRoute {
            name: name.into(),
            from: from.into(),
            to: to.into(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Subscribe every route.
    ///
    /// Messages published after this returns are delivered to the router.
    pub async fn build(self) -> Result<Router, ChainError> {
        let mut installed = Vec::with_capacity(self.routes.len());

        for route in self.routes {
            let subscription =
                self.bus
                    .subscribe(&route.from)
                    .await
                    .map_err(|source| ChainError::Subscribe {
                        topic: route.from.clone(),
                        source,
                    })?;
            info!(route = %route.name, from = %route.from, to = %route.to, "route installed");
            installed.push((route, subscription));
        }

        Ok(Router {
            publisher: self.publisher,
            routes: installed,
        })
    }
}

/// Subscribed routes, ready to run.
pub struct Router {
    publisher: Publisher,
    routes: Vec<(ChainRoute, Subscription)>,
}

impl Router {
    pub fn builder(bus: Arc<dyn MessageBus>, publisher: Publisher) -> RouterBuilder {
        RouterBuilder::new(bus, publisher)
    }

    pub fn routes(&self) -> impl Iterator<Item = &ChainRoute> {
        self.routes.iter().map(|(route, _)| route)
    }

    /// Drive every route until `shutdown` is cancelled or all topics close.
    ///
    /// A token cancelled before the first poll stops every route immediately.
    pub async fn run(self, shutdown: CancellationToken) {
        let loops = self.routes.into_iter().map(|(route, subscription)| {
            run_route(
                route,
                subscription,
                self.publisher.clone(),
                shutdown.clone(),
            )
        });

        join_all(loops).await;
        info!("router stopped");
    }
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("routes", &self.routes().map(|r| &r.name).collect::<Vec<_>>())
            .finish()
    }
}

async fn run_route(
    route: ChainRoute,
    mut subscription: Subscription,
    publisher: Publisher,
    shutdown: CancellationToken,
) {
    let route = Arc::new(route);

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                debug!(route = %route.name, "route stopping");
                break;
            }
            message = subscription.next() => {
                let Some(message) = message else {
                    info!(route = %route.name, "subscription closed");
                    break;
                };
                tokio::spawn(dispatch(route.clone(), publisher.clone(), message));
            }
        }
    }
}

/// Handle one message and publish its successor, if any.
async fn dispatch(route: Arc<ChainRoute>, publisher: Publisher, message: Message) {
    debug!(
        route = %route.name,
        message_id = %message.id,
        correlation_id = message.correlation_id().unwrap_or_default(),
        "handling message"
    );

    let outgoing = match route.handler.handle(&message.payload) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return,
        Err(e) => {
            error!(route = %route.name, message_id = %message.id, error = %e, "chain step failed");
            return;
        }
    };

    if let Err(e) = publisher.publish_envelope(&route.to, outgoing).await {
        warn!(route = %route.name, to = %route.to, error = %e, "successor not published");
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::bus::InMemoryBus;
    use crate::envelope::Envelope;
    use crate::event::{EventType, ItemPurchasedPayload};
    use crate::random::{FakeRandom, RandomSource};
    use crate::transition::TransitionTable;

    #[tokio::test]
    async fn purchased_events_flow_to_delivery_topic() {
        let bus = InMemoryBus::new();
        let random: Arc<dyn RandomSource> = Arc::new(FakeRandom::with_seed(31));
        let publisher = Publisher::new(Arc::new(bus.clone()), random.clone());

        let router = Router::builder(Arc::new(bus.clone()), publisher.clone())
            .route(
                "purchased",
                "checkout_topic",
                "delivery_topic",
                ChainHandler::new(TransitionTable::item_purchased(), random),
            )
            .build()
            .await
            .unwrap();
        assert_eq!(bus.subscriber_count("checkout_topic"), 1);

        let mut delivery = bus.subscribe("delivery_topic").await.unwrap();
        let shutdown = CancellationToken::new();
        let running = tokio::spawn(router.run(shutdown.clone()));

        let source_id = publisher
            .publish(
                "checkout_topic",
                EventType::ItemPurchased,
                &ItemPurchasedPayload {
                    item_id: 2,
                    user_id: 3,
                    quantity: 4,
                },
            )
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), delivery.next())
            .await
            .unwrap()
            .unwrap();
        assert_ne!(message.id, source_id);
        assert!(message.correlation_id().is_some());

        let envelope = Envelope::decode(&message.payload).unwrap();
        assert!(matches!(
            envelope.event_type,
            EventType::ItemDelivered | EventType::ItemNotDelivered
        ));

        shutdown.cancel();
        running.await.unwrap();
    }

    #[tokio::test]
    async fn malformed_message_does_not_stop_route() {
        let bus = InMemoryBus::new();
        let random: Arc<dyn RandomSource> = Arc::new(FakeRandom::with_seed(37));
        let publisher = Publisher::new(Arc::new(bus.clone()), random.clone());

        let router = Router::builder(Arc::new(bus.clone()), publisher.clone())
            .route(
                "purchased",
                "checkout_topic",
                "delivery_topic",
                ChainHandler::new(TransitionTable::item_purchased(), random),
            )
            .build()
            .await
            .unwrap();

        let mut delivery = bus.subscribe("delivery_topic").await.unwrap();
        let shutdown = CancellationToken::new();
        let running = tokio::spawn(router.run(shutdown.clone()));

        publisher
            .publish_envelope("checkout_topic", b"not an envelope".to_vec())
            .await
            .unwrap();
        publisher
            .publish(
                "checkout_topic",
                EventType::ItemPurchased,
                &ItemPurchasedPayload {
                    item_id: 1,
                    user_id: 1,
                    quantity: 1,
                },
            )
            .await
            .unwrap();

        let message = tokio::time::timeout(Duration::from_secs(5), delivery.next())
            .await
            .unwrap()
            .unwrap();
        assert!(Envelope::decode(&message.payload).is_ok());

        shutdown.cancel();
        running.await.unwrap();
    }

    #[tokio::test]
    async fn shutdown_before_first_poll_stops_router() {
        let bus = InMemoryBus::new();
        let random: Arc<dyn RandomSource> = Arc::new(FakeRandom::with_seed(41));
        let publisher = Publisher::new(Arc::new(bus.clone()), random.clone());

        let router = Router::builder(Arc::new(bus.clone()), publisher)
            .route(
                "viewed",
                "initial_events_topic",
                "checkout_topic",
                ChainHandler::new(TransitionTable::item_viewed(), random.clone()),
            )
            .route(
                "purchased",
                "checkout_topic",
                "delivery_topic",
                ChainHandler::new(TransitionTable::item_purchased(), random),
            )
            .build()
            .await
            .unwrap();

        let shutdown = CancellationToken::new();
        let running = tokio::spawn(router.run(shutdown.clone()));
        shutdown.cancel();

        tokio::time::timeout(Duration::from_secs(2), running)
            .await
            .expect("router kept running after shutdown")
            .unwrap();
    }
}
