//! # Chain Generator
//!
//! Seeds users and items, then publishes root events every interval and lets
//! the two chain handlers extend them until Ctrl-C.
//!
//! Runs over the in-memory bus by default. Build with `--features nats` and set
//! `NATS_URL` to publish to a NATS server instead.

use std::sync::Arc;

use anyhow::Result;
use eventchain::{
    ChainHandler, FakeRandom, GeneratorConfig, InMemoryBus, MessageBus, Publisher, RandomSource,
    RootEmitter, Router, Seeder, TransitionTable,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

// ============================================================================
// Wiring
// ============================================================================

async fn connect(config: &GeneratorConfig) -> Result<Arc<dyn MessageBus>> {
    #[cfg(feature = "nats")]
    if let Some(url) = &config.nats_url {
        return Ok(Arc::new(eventchain::NatsBus::connect(url).await?));
    }

    #[cfg(not(feature = "nats"))]
    if config.nats_url.is_some() {
        warn!("NATS_URL set but built without the nats feature, using in-memory bus");
    }
    Ok(Arc::new(InMemoryBus::new()))
}

fn random(config: &GeneratorConfig) -> Arc<dyn RandomSource> {
    match config.seed {
        Some(seed) => Arc::new(FakeRandom::with_seed(seed)),
        None => Arc::new(FakeRandom::new()),
    }
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let config = GeneratorConfig::from_env()?;
    info!(
        users = config.users,
        items = config.items,
        interval_ms = u64::try_from(config.emit_interval.as_millis()).unwrap_or(u64::MAX),
        seed = ?config.seed,
        "configuration loaded"
    );

    let bus = connect(&config).await?;
    let random = random(&config);
    let publisher = Publisher::new(bus.clone(), random.clone());
    let topics = &config.topics;

    let router = Router::builder(bus.clone(), publisher.clone())
        .route(
            "item_viewed",
            &topics.initial_events,
            &topics.checkout,
            ChainHandler::new(TransitionTable::item_viewed(), random.clone()),
        )
        .route(
            "item_purchased",
            &topics.checkout,
            &topics.delivery,
            ChainHandler::new(TransitionTable::item_purchased(), random.clone()),
        )
        .build()
        .await?;

    let population = Seeder::new(publisher.clone(), random.clone(), &topics.create)
        .seed(config.users, config.items)
        .await;

    let emitter = RootEmitter::new(publisher, random, population, &topics.initial_events)
        .with_interval(config.emit_interval);

    let shutdown = CancellationToken::new();
    let router_task = tokio::spawn(router.run(shutdown.clone()));
    let emitter_task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { emitter.run(shutdown).await }
    });

    tokio::signal::ctrl_c().await?;
    info!("received shutdown signal");
    shutdown.cancel();

    router_task.await?;
    emitter_task.await?;

    info!("generator stopped");
    Ok(())
}
