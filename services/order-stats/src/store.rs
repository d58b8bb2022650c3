//! Aggregate store: the single owner of the running aggregate
//!
//! Applies events idempotently: a bounded window of recently seen event ids
//! makes redelivered duplicates a no-op. All mutations go through one mutex,
//! so the aggregate moves through a single serialized history even when
//! apply is invoked from concurrent paths, and every snapshot a reader sees
//! is a value that actually occurred.

use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

use tracing::{debug, info};

use types::aggregate::Aggregate;
use types::event::OrderEvent;
use types::ids::EventId;

/// Configuration for the aggregate store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum number of recent event ids tracked for deduplication.
    ///
    /// Ids evicted from a full window can in principle be double-counted
    /// if the broker redelivers them extremely late. That is a sizing
    /// tradeoff, not a bug: the window should cover the broker's
    /// redelivery horizon.
    pub dedup_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dedup_capacity: 10_000,
        }
    }
}

/// Outcome of applying one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The event was new; the snapshot reflects it.
    Applied(Aggregate),
    /// The event id was already seen; nothing changed. Not an error.
    Duplicate(Aggregate),
}

impl ApplyOutcome {
    /// The aggregate value after the call, applied or not.
    pub fn snapshot(&self) -> Aggregate {
        match self {
            ApplyOutcome::Applied(agg) | ApplyOutcome::Duplicate(agg) => *agg,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied(_))
    }
}

/// Bounded set of recently seen event ids, FIFO eviction.
struct DedupWindow {
    seen: HashSet<EventId>,
    order: VecDeque<EventId>,
    capacity: usize,
}

impl DedupWindow {
    fn new(capacity: usize) -> Self {
        Self {
            seen: HashSet::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Insert an id; returns true if it was not already present.
    fn insert(&mut self, id: EventId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.order.push_back(id);
        if self.order.len() > self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    fn len(&self) -> usize {
        self.order.len()
    }
}

struct StoreInner {
    aggregate: Aggregate,
    window: DedupWindow,
    events_applied: u64,
    duplicates_ignored: u64,
}

/// Single-owner running aggregate with idempotent application.
pub struct AggregateStore {
    inner: Mutex<StoreInner>,
}

impl AggregateStore {
    pub fn new(config: StoreConfig) -> Self {
        info!(
            dedup_capacity = config.dedup_capacity,
            "AggregateStore initialized"
        );
        Self {
            inner: Mutex::new(StoreInner {
                aggregate: Aggregate::zero(),
                window: DedupWindow::new(config.dedup_capacity),
                events_applied: 0,
                duplicates_ignored: 0,
            }),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(StoreConfig::default())
    }

    /// Rebuild a store from checkpointed state.
    ///
    /// Durability itself is out of scope; this is the seam a checkpointer
    /// would restore through after a restart.
    pub fn restore(
        aggregate: Aggregate,
        seen_ids: impl IntoIterator<Item = EventId>,
        config: StoreConfig,
    ) -> Self {
        let mut window = DedupWindow::new(config.dedup_capacity);
        for id in seen_ids {
            window.insert(id);
        }
        info!(
            total_count = aggregate.total_count,
            window_len = window.len(),
            "AggregateStore restored from checkpoint"
        );
        Self {
            inner: Mutex::new(StoreInner {
                aggregate,
                window,
                events_applied: 0,
                duplicates_ignored: 0,
            }),
        }
    }

    /// Apply one event, idempotently.
    ///
    /// A duplicate id is a no-op returning the current snapshot; a new id
    /// increments the count and adds the exact decimal amount. Serialized
    /// by the internal mutex: single-writer semantics regardless of how
    /// many ingestion paths call in.
    pub fn apply(&self, event: &OrderEvent) -> ApplyOutcome {
        let mut inner = self.inner.lock().expect("store mutex poisoned");

        if !inner.window.insert(event.id) {
            inner.duplicates_ignored += 1;
            debug!(event_id = %event.id, "Duplicate event ignored");
            return ApplyOutcome::Duplicate(inner.aggregate);
        }

        inner.aggregate.total_count += 1;
        inner.aggregate.total_amount += event.amount;
        inner.events_applied += 1;

        debug!(
            event_id = %event.id,
            amount = %event.amount,
            total_count = inner.aggregate.total_count,
            "Event applied"
        );

        ApplyOutcome::Applied(inner.aggregate)
    }

    /// Current aggregate value. Read-only; blocks at most one mutation.
    pub fn snapshot(&self) -> Aggregate {
        self.inner.lock().expect("store mutex poisoned").aggregate
    }

    /// Distinct events applied since creation (or restore).
    pub fn events_applied(&self) -> u64 {
        self.inner.lock().expect("store mutex poisoned").events_applied
    }

    /// Duplicate deliveries absorbed since creation (or restore).
    pub fn duplicates_ignored(&self) -> u64 {
        self.inner
            .lock()
            .expect("store mutex poisoned")
            .duplicates_ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn event(amount: &str) -> OrderEvent {
        OrderEvent::new(Decimal::from_str(amount).unwrap())
    }

    #[test]
    fn test_fixed_scenario() {
        let store = AggregateStore::with_defaults();
        let a = event("10.00");
        let b = event("20.00");

        store.apply(&a);
        let outcome = store.apply(&b);
        let snap = outcome.snapshot();
        assert_eq!(snap.total_count, 2);
        assert_eq!(snap.total_amount, Decimal::from_str("30.00").unwrap());

        // Re-applying A changes nothing
        let outcome = store.apply(&a);
        assert!(!outcome.is_applied());
        assert_eq!(outcome.snapshot(), snap);

        // 5.005 rounds HALF-UP to 35.01 at the response boundary
        store.apply(&event("5.005"));
        let snap = store.snapshot();
        assert_eq!(snap.total_count, 3);
        assert_eq!(
            snap.rounded_amount(),
            Decimal::from_str("35.01").unwrap()
        );
    }

    #[test]
    fn test_duplicate_counters() {
        let store = AggregateStore::with_defaults();
        let a = event("1.00");

        store.apply(&a);
        store.apply(&a);
        store.apply(&a);

        assert_eq!(store.events_applied(), 1);
        assert_eq!(store.duplicates_ignored(), 2);
        assert_eq!(store.snapshot().total_count, 1);
    }

    #[test]
    fn test_window_eviction_tradeoff() {
        let store = AggregateStore::new(StoreConfig { dedup_capacity: 2 });
        let a = event("1.00");
        let b = event("1.00");
        let c = event("1.00");

        store.apply(&a);
        store.apply(&b);
        store.apply(&c); // evicts a from the window

        // An id evicted from a full window is no longer deduplicated:
        // the documented sizing tradeoff.
        let outcome = store.apply(&a);
        assert!(outcome.is_applied());
        assert_eq!(store.snapshot().total_count, 4);
    }

    #[test]
    fn test_restore_dedups_checkpointed_ids() {
        let a = event("10.00");
        let checkpoint = Aggregate {
            total_count: 1,
            total_amount: a.amount,
        };
        let store = AggregateStore::restore(checkpoint, [a.id], StoreConfig::default());

        let outcome = store.apply(&a);
        assert!(!outcome.is_applied());
        assert_eq!(store.snapshot().total_count, 1);
    }

    #[test]
    fn test_concurrent_applies_serialize() {
        use std::sync::Arc;

        let store = Arc::new(AggregateStore::with_defaults());
        let events: Vec<OrderEvent> = (0..100).map(|_| event("1.00")).collect();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                let events = events.clone();
                std::thread::spawn(move || {
                    for e in &events {
                        store.apply(e);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        // 4 threads applied the same 100 events: each counted exactly once.
        let snap = store.snapshot();
        assert_eq!(snap.total_count, 100);
        assert_eq!(snap.total_amount, Decimal::from_str("100.00").unwrap());
        assert_eq!(store.duplicates_ignored(), 300);
    }

    proptest! {
        /// Final aggregate depends only on the distinct events, not on
        /// delivery order or duplication.
        #[test]
        fn prop_order_and_duplication_independence(
            cents in proptest::collection::vec(0i64..100_000, 1..50),
            dup_picks in proptest::collection::vec(0usize..50, 0..100),
        ) {
            let events: Vec<OrderEvent> = cents
                .iter()
                .map(|c| OrderEvent::new(Decimal::new(*c, 2)))
                .collect();

            // Delivery schedule: every event once, plus arbitrary duplicates,
            // applied in an arbitrary interleaving.
            let mut schedule: Vec<OrderEvent> = events.clone();
            for pick in &dup_picks {
                schedule.push(events[pick % events.len()]);
            }
            let rotation = dup_picks.len() % schedule.len().max(1);
            schedule.rotate_left(rotation);

            let store = AggregateStore::with_defaults();
            for e in &schedule {
                store.apply(e);
            }

            let expected_sum: Decimal = events.iter().map(|e| e.amount).sum();
            let snap = store.snapshot();
            prop_assert_eq!(snap.total_count, events.len() as u64);
            prop_assert_eq!(snap.total_amount, expected_sum);
        }
    }
}
