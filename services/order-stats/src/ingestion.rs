//! Ingestion loop: transport → store → hub
//!
//! Drives the consume state machine: CONNECTING → CONSUMING, with BACKOFF
//! on transport failure and STOPPED only on explicit shutdown. Every
//! delivery is acknowledged only after the store has applied it, so a crash
//! between receive and apply redelivers the event instead of losing it; the
//! dedup window absorbs the other half of that bargain (redelivery of
//! already-applied events). A payload that can never be applied is
//! dead-lettered and acked, and the loop keeps consuming.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use transport::{DeadLetterSink, Delivery, EventTransport};
use types::errors::TransportError;
use types::event::OrderEvent;

use crate::hub::SubscriptionHub;
use crate::store::AggregateStore;

/// Configuration for the ingestion loop.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// First backoff delay after a transport failure.
    pub backoff_base: Duration,
    /// Backoff ceiling; delays double up to this cap.
    pub backoff_cap: Duration,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

/// Consume state machine states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestState {
    Connecting,
    Consuming,
    Backoff,
    Stopped,
}

/// Capped exponential backoff for transport reconnects.
#[derive(Debug, Clone)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
    attempt: u32,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration) -> Self {
        Self {
            base,
            cap,
            attempt: 0,
        }
    }

    /// Delay for the next retry: base * 2^attempt, capped.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self
            .base
            .saturating_mul(1u32 << self.attempt.min(16))
            .min(self.cap);
        self.attempt = self.attempt.saturating_add(1);
        delay
    }

    /// Reset after a successful receive.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }
}

/// Counters reported when the loop stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestionCounters {
    pub events_applied: u64,
    pub duplicates_ignored: u64,
    pub events_dead_lettered: u64,
    pub reconnects: u64,
}

/// The consuming side of the pipeline.
pub struct IngestionLoop {
    transport: Arc<dyn EventTransport>,
    store: Arc<AggregateStore>,
    hub: Arc<SubscriptionHub>,
    dead_letters: Arc<dyn DeadLetterSink>,
    config: IngestionConfig,
    state: IngestState,
    counters: IngestionCounters,
}

impl IngestionLoop {
    pub fn new(
        transport: Arc<dyn EventTransport>,
        store: Arc<AggregateStore>,
        hub: Arc<SubscriptionHub>,
        dead_letters: Arc<dyn DeadLetterSink>,
        config: IngestionConfig,
    ) -> Self {
        Self {
            transport,
            store,
            hub,
            dead_letters,
            config,
            state: IngestState::Connecting,
            counters: IngestionCounters::default(),
        }
    }

    pub fn state(&self) -> IngestState {
        self.state
    }

    /// Run until shutdown or until the transport closes.
    ///
    /// Shutdown is cooperative: it is only observed between deliveries, so
    /// an in-flight apply always finishes and gets acked before the loop
    /// stops. Nothing is ever dropped silently.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> IngestionCounters {
        let mut backoff = BackoffPolicy::new(self.config.backoff_base, self.config.backoff_cap);
        let mut recovering = false;
        info!("Ingestion loop starting");

        loop {
            let received = tokio::select! {
                received = self.transport.receive() => received,
                _ = shutdown.changed() => {
                    info!("Ingestion loop shutting down");
                    self.state = IngestState::Stopped;
                    break;
                }
            };

            match received {
                Ok(delivery) => {
                    if self.state != IngestState::Consuming {
                        if recovering {
                            recovering = false;
                            self.counters.reconnects += 1;
                            info!(
                                reconnects = self.counters.reconnects,
                                "Transport recovered, consuming resumed"
                            );
                        } else {
                            info!("Ingestion loop consuming");
                        }
                        self.state = IngestState::Consuming;
                        backoff.reset();
                    }
                    self.process(delivery).await;
                }
                Err(err) if err.is_retryable() => {
                    let delay = backoff.next_delay();
                    self.state = IngestState::Backoff;
                    recovering = true;
                    warn!(
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        attempt = backoff.attempt(),
                        "Transport unavailable, backing off"
                    );
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {
                            self.state = IngestState::Connecting;
                        }
                        _ = shutdown.changed() => {
                            info!("Ingestion loop shutting down during backoff");
                            self.state = IngestState::Stopped;
                            break;
                        }
                    }
                }
                Err(err) => {
                    info!(error = %err, "Transport closed, ingestion loop stopping");
                    self.state = IngestState::Stopped;
                    break;
                }
            }
        }

        info!(
            applied = self.counters.events_applied,
            duplicates = self.counters.duplicates_ignored,
            dead_lettered = self.counters.events_dead_lettered,
            "Ingestion loop stopped"
        );
        self.counters
    }

    /// Decode, apply, ack, notify — in that order.
    async fn process(&mut self, delivery: Delivery) {
        let event = match OrderEvent::from_payload(&delivery.payload) {
            Ok(event) => event,
            Err(err) => {
                // Permanent for this event: dead-letter and ack so the
                // broker stops redelivering it.
                self.dead_letters.push(&delivery.payload, &err.to_string());
                self.counters.events_dead_lettered += 1;
                self.ack(delivery.tag).await;
                return;
            }
        };

        let outcome = self.store.apply(&event);
        self.ack(delivery.tag).await;

        if outcome.is_applied() {
            self.counters.events_applied += 1;
            // Push-on-change. This loop is the only applier, so notify
            // order equals mutation order and subscribers never observe a
            // count regression.
            self.hub.notify(outcome.snapshot());
        } else {
            self.counters.duplicates_ignored += 1;
        }
    }

    /// Ack is best-effort: if it fails, the broker redelivers and the
    /// dedup window absorbs the duplicate.
    async fn ack(&self, tag: transport::DeliveryTag) {
        match self.transport.ack(tag).await {
            Ok(()) => debug!(tag, "Delivery acked"),
            Err(TransportError::Closed) => {}
            Err(err) => warn!(tag, error = %err, "Ack failed, expecting redelivery"),
        }
    }
}
