//! Subscription hub: push-on-change fan-out of aggregate snapshots
//!
//! Every successful apply is pushed to all live subscribers through a
//! bounded broadcast channel, replacing periodic re-querying with
//! event-driven delivery. A slow subscriber overflows its own bounded view
//! of the channel and skips ahead to the newest retained snapshot; it never
//! blocks delivery to anyone else. Dropping a `Subscription` is the
//! unsubscribe: disconnect and error are not distinguished.

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::broadcast;
use tracing::{debug, trace};

use types::aggregate::Aggregate;

/// Configuration for the subscription hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Snapshots retained for subscribers that fall behind. A subscriber
    /// lagging past this many undelivered snapshots skips to the newest.
    pub channel_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 64,
        }
    }
}

/// Fan-out of aggregate snapshots to live subscribers.
pub struct SubscriptionHub {
    tx: broadcast::Sender<Aggregate>,
    next_id: AtomicU64,
}

impl SubscriptionHub {
    pub fn new(config: HubConfig) -> Self {
        let (tx, _) = broadcast::channel(config.channel_capacity);
        Self {
            tx,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(HubConfig::default())
    }

    /// Register a new subscriber.
    pub fn subscribe(&self) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        debug!(subscriber_id = id, "Subscriber connected");
        Subscription {
            id,
            rx: self.tx.subscribe(),
            snapshots_skipped: 0,
        }
    }

    /// Push a snapshot to every live subscriber.
    ///
    /// Called after each successful apply, in mutation order, so
    /// subscribers observe a sequence with monotonically non-decreasing
    /// `total_count`. Never blocks: a full channel costs the laggards
    /// intermediate values, not the sender its throughput.
    pub fn notify(&self, snapshot: Aggregate) {
        // Err means no live subscribers, which is fine.
        match self.tx.send(snapshot) {
            Ok(receivers) => {
                trace!(
                    receivers,
                    total_count = snapshot.total_count,
                    "Snapshot fanned out"
                )
            }
            Err(_) => trace!("No subscribers for snapshot"),
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// One subscriber's handle. Dropping it unsubscribes.
pub struct Subscription {
    id: u64,
    rx: broadcast::Receiver<Aggregate>,
    snapshots_skipped: u64,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Snapshots this subscriber skipped by lagging.
    pub fn snapshots_skipped(&self) -> u64 {
        self.snapshots_skipped
    }

    /// Wait for the next snapshot.
    ///
    /// A subscriber that lagged past the channel capacity skips the lost
    /// intermediate values and resumes at the oldest retained one, so it
    /// always converges on the current aggregate. Returns `None` once the
    /// hub is gone.
    pub async fn recv(&mut self) -> Option<Aggregate> {
        loop {
            match self.rx.recv().await {
                Ok(snapshot) => return Some(snapshot),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.snapshots_skipped += skipped;
                    debug!(
                        subscriber_id = self.id,
                        skipped, "Slow subscriber skipped to newer snapshots"
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        debug!(subscriber_id = self.id, "Subscriber disconnected");
    }
}
