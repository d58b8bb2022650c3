//! In-process broker with at-least-once semantics and fault injection
//!
//! Backs the demo wiring and the test suite. Messages move from a bounded
//! pending queue into an in-flight map on receive; `ack` drops them,
//! `redeliver_unacked` requeues them (what a real broker does after a
//! consumer crash or a visibility timeout). `set_available(false)` makes
//! both ends fail with `Unavailable`, which is how tests exercise the
//! producer retry loop and the consumer backoff path.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::Notify;
use tracing::debug;

use types::errors::TransportError;

use crate::broker::{Delivery, DeliveryTag, EventTransport};

/// Configuration for the in-memory broker.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    /// Maximum number of pending (undelivered) messages.
    pub pending_capacity: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            pending_capacity: 10_000,
        }
    }
}

#[derive(Default)]
struct BrokerInner {
    pending: VecDeque<Vec<u8>>,
    in_flight: HashMap<DeliveryTag, Vec<u8>>,
    next_tag: DeliveryTag,
    closed: bool,
    published: u64,
    delivered: u64,
    acked: u64,
    redelivered: u64,
}

/// In-memory topic with ack-based redelivery.
pub struct InMemoryBroker {
    inner: Mutex<BrokerInner>,
    available: AtomicBool,
    notify: Notify,
    config: BrokerConfig,
}

impl InMemoryBroker {
    pub fn new(config: BrokerConfig) -> Self {
        Self {
            inner: Mutex::new(BrokerInner::default()),
            available: AtomicBool::new(true),
            notify: Notify::new(),
            config,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(BrokerConfig::default())
    }

    /// Fault injection: make the broker unreachable (or reachable again).
    ///
    /// While unavailable, both `publish` and `receive` fail with
    /// `Unavailable`. Pending and in-flight messages are retained, so
    /// nothing published before an outage is lost.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
        // Wake on both transitions: a receiver parked on an empty topic
        // must observe the outage to enter its backoff path.
        self.notify.notify_one();
    }

    /// Requeue every unacked delivery at the front of the topic.
    ///
    /// Simulates broker redelivery after a consumer crash; the consumer
    /// will see these payloads a second time with fresh tags.
    pub fn redeliver_unacked(&self) {
        let mut inner = self.inner.lock().expect("broker mutex poisoned");
        let mut tags: Vec<DeliveryTag> = inner.in_flight.keys().copied().collect();
        tags.sort_unstable();
        for tag in tags.into_iter().rev() {
            if let Some(payload) = inner.in_flight.remove(&tag) {
                inner.pending.push_front(payload);
                inner.redelivered += 1;
            }
        }
        drop(inner);
        self.notify.notify_one();
    }

    /// Close the topic: receivers drain what is pending, then get `Closed`.
    pub fn close(&self) {
        self.inner.lock().expect("broker mutex poisoned").closed = true;
        self.notify.notify_one();
    }

    /// Number of undelivered messages.
    pub fn pending_len(&self) -> usize {
        self.inner.lock().expect("broker mutex poisoned").pending.len()
    }

    /// Number of delivered-but-unacked messages.
    pub fn in_flight_len(&self) -> usize {
        self.inner.lock().expect("broker mutex poisoned").in_flight.len()
    }

    /// Total messages published since creation.
    pub fn published(&self) -> u64 {
        self.inner.lock().expect("broker mutex poisoned").published
    }

    /// Total messages acked since creation.
    pub fn acked(&self) -> u64 {
        self.inner.lock().expect("broker mutex poisoned").acked
    }

    /// Total redeliveries since creation.
    pub fn redelivered(&self) -> u64 {
        self.inner.lock().expect("broker mutex poisoned").redelivered
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventTransport for InMemoryBroker {
    async fn publish(&self, payload: &[u8]) -> Result<(), TransportError> {
        if !self.is_available() {
            return Err(TransportError::Unavailable("broker offline".to_string()));
        }

        let mut inner = self.inner.lock().expect("broker mutex poisoned");
        if inner.closed {
            return Err(TransportError::Closed);
        }
        if inner.pending.len() >= self.config.pending_capacity {
            return Err(TransportError::Unavailable("topic backlog full".to_string()));
        }

        inner.pending.push_back(payload.to_vec());
        inner.published += 1;
        drop(inner);

        self.notify.notify_one();
        Ok(())
    }

    async fn receive(&self) -> Result<Delivery, TransportError> {
        loop {
            // notify_one stores a permit when no receiver is waiting, so a
            // publish racing with the empty-queue check below is not lost:
            // the await at the bottom completes immediately.
            let notified = self.notify.notified();

            if !self.is_available() {
                return Err(TransportError::Unavailable("broker offline".to_string()));
            }

            {
                let mut inner = self.inner.lock().expect("broker mutex poisoned");
                if let Some(payload) = inner.pending.pop_front() {
                    let tag = inner.next_tag;
                    inner.next_tag += 1;
                    inner.in_flight.insert(tag, payload.clone());
                    inner.delivered += 1;
                    debug!(tag, pending = inner.pending.len(), "Delivered message");
                    return Ok(Delivery { payload, tag });
                }
                if inner.closed {
                    return Err(TransportError::Closed);
                }
            }

            notified.await;
        }
    }

    async fn ack(&self, tag: DeliveryTag) -> Result<(), TransportError> {
        let mut inner = self.inner.lock().expect("broker mutex poisoned");
        if inner.in_flight.remove(&tag).is_some() {
            inner.acked += 1;
        } else {
            debug!(tag, "Ack for unknown or already-acked tag");
        }
        Ok(())
    }
}
