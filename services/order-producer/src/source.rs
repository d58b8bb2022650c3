//! The producing loop: emit, publish, retry

use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use transport::EventTransport;

use crate::generator::OrderGenerator;

/// Configuration for the event source.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Delay between generation attempts.
    pub emit_interval: Duration,
    /// Delay before retrying a failed publish of the same event.
    pub retry_backoff: Duration,
    /// Lower bound of the random amount range.
    pub amount_min: f64,
    /// Upper bound of the random amount range.
    pub amount_max: f64,
}

impl Default for ProducerConfig {
    fn default() -> Self {
        Self {
            emit_interval: Duration::from_secs(1),
            retry_backoff: Duration::from_secs(1),
            amount_min: 10.0,
            amount_max: 100.0,
        }
    }
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProducerStats {
    /// Events successfully published.
    pub events_published: u64,
    /// Publish attempts that failed and were retried.
    pub publish_retries: u64,
}

/// Run the event source until `shutdown` fires.
///
/// Publish failures are logged and retried after `retry_backoff` with the
/// same event: an outage delays the stream but never drops an event and
/// never duplicates a generation attempt. Only shutdown stops the loop.
pub async fn run(
    transport: Arc<dyn EventTransport>,
    config: ProducerConfig,
    mut shutdown: watch::Receiver<bool>,
) -> ProducerStats {
    let generator = OrderGenerator::new(config.amount_min, config.amount_max);
    let mut rng = StdRng::from_entropy();
    let mut ticker = tokio::time::interval(config.emit_interval);
    let mut stats = ProducerStats::default();

    info!(
        emit_interval_ms = config.emit_interval.as_millis() as u64,
        retry_backoff_ms = config.retry_backoff.as_millis() as u64,
        "Event source started"
    );

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }

        let event = generator.next_event(&mut rng);
        let payload = event.to_payload();

        // Retry the same event until it lands or we are told to stop.
        loop {
            match transport.publish(&payload).await {
                Ok(()) => {
                    stats.events_published += 1;
                    debug!(event_id = %event.id, amount = %event.amount, "Event published");
                    break;
                }
                Err(err) if err.is_retryable() => {
                    stats.publish_retries += 1;
                    warn!(event_id = %event.id, error = %err, "Publish failed, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(config.retry_backoff) => {}
                        _ = shutdown.changed() => {
                            info!(
                                published = stats.events_published,
                                "Event source stopped mid-retry"
                            );
                            return stats;
                        }
                    }
                }
                Err(err) => {
                    info!(error = %err, "Transport closed, event source stopping");
                    return stats;
                }
            }
        }
    }

    info!(
        published = stats.events_published,
        retries = stats.publish_retries,
        "Event source stopped"
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use transport::InMemoryBroker;
    use types::event::OrderEvent;

    fn test_config() -> ProducerConfig {
        ProducerConfig {
            emit_interval: Duration::from_millis(10),
            retry_backoff: Duration::from_millis(10),
            ..ProducerConfig::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_publishes_on_interval() {
        let broker = Arc::new(InMemoryBroker::with_defaults());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(
            Arc::clone(&broker) as Arc<dyn EventTransport>,
            test_config(),
            shutdown_rx,
        ));

        tokio::time::sleep(Duration::from_millis(55)).await;
        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert!(stats.events_published >= 5);
        assert_eq!(broker.published(), stats.events_published);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_same_event_through_outage() {
        let broker = Arc::new(InMemoryBroker::with_defaults());
        broker.set_available(false);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let handle = tokio::spawn(run(
            Arc::clone(&broker) as Arc<dyn EventTransport>,
            test_config(),
            shutdown_rx,
        ));

        // Let several retry cycles fail, then recover.
        tokio::time::sleep(Duration::from_millis(45)).await;
        broker.set_available(true);
        tokio::time::sleep(Duration::from_millis(15)).await;

        shutdown_tx.send(true).unwrap();
        let stats = handle.await.unwrap();

        assert!(stats.publish_retries >= 3, "outage should force retries");
        assert!(stats.events_published >= 1);

        // The retried event landed exactly once.
        let delivery = broker.receive().await.unwrap();
        let event = OrderEvent::from_payload(&delivery.payload).unwrap();
        assert!(!event.amount.is_sign_negative());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stops_on_closed_transport() {
        let broker = Arc::new(InMemoryBroker::with_defaults());
        broker.close();
        let (_shutdown_tx, shutdown_rx) = watch::channel(false);

        let stats = run(
            Arc::clone(&broker) as Arc<dyn EventTransport>,
            test_config(),
            shutdown_rx,
        )
        .await;

        assert_eq!(stats.events_published, 0);
    }
}
