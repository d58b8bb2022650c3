//! Order stats service binary
//!
//! Runs the full pipeline in one process: the event source publishing to an
//! in-memory broker topic, the ingestion loop applying events to the
//! aggregate, and the HTTP query facade. In a deployment with an external
//! partitioned log broker, the producer and the consumer bind to it instead
//! of the in-process topic; everything else is unchanged.

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use order_stats::config::ServiceConfig;
use order_stats::hub::SubscriptionHub;
use order_stats::ingestion::IngestionLoop;
use order_stats::router::create_router;
use order_stats::state::AppState;
use order_stats::store::AggregateStore;
use transport::{DeadLetterSink, EventTransport, InMemoryBroker, InMemoryDeadLetters};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = ServiceConfig::from_env();
    info!(version = order_stats::SERVICE_VERSION, "Starting order stats service");

    let broker: Arc<InMemoryBroker> = Arc::new(InMemoryBroker::with_defaults());
    let store = Arc::new(AggregateStore::new(config.store.clone()));
    let hub = Arc::new(SubscriptionHub::new(config.hub.clone()));
    let dead_letters = Arc::new(InMemoryDeadLetters::new());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let producer = tokio::spawn(order_producer::run(
        Arc::clone(&broker) as Arc<dyn EventTransport>,
        config.producer.clone(),
        shutdown_rx.clone(),
    ));

    let ingestion = IngestionLoop::new(
        Arc::clone(&broker) as Arc<dyn EventTransport>,
        Arc::clone(&store),
        Arc::clone(&hub),
        dead_letters as Arc<dyn DeadLetterSink>,
        config.ingestion.clone(),
    );
    let ingestion = tokio::spawn(ingestion.run(shutdown_rx));

    let state = AppState::new(store, hub, config.stream_min_interval);
    let app = create_router(state);

    let listener = TcpListener::bind(config.http_addr).await?;
    info!(addr = %config.http_addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
        })
        .await?;

    // Stop the workers cooperatively: the ingestion loop finishes its
    // in-flight apply before it exits.
    let _ = shutdown_tx.send(true);
    let producer_stats = producer.await?;
    let counters = ingestion.await?;
    info!(
        published = producer_stats.events_published,
        applied = counters.events_applied,
        "Pipeline stopped"
    );

    Ok(())
}
