//! Dead-letter sink for events that can never be applied
//!
//! A malformed payload is permanent for that event: retrying it would fail
//! forever and dropping it silently would hide producer bugs. The consumer
//! routes it here and moves on.

use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use tracing::warn;

/// One dead-lettered payload with the reason it could not be applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterEntry {
    /// Raw payload as received from the transport
    pub payload: Vec<u8>,
    /// Why it could not be applied
    pub reason: String,
    /// Unix nanoseconds when it was dead-lettered
    pub at: i64,
}

/// Sink for unapplyable events. External collaborators (an ops queue, a
/// database table) implement this; the in-memory variant serves tests and
/// the demo wiring.
pub trait DeadLetterSink: Send + Sync {
    fn push(&self, payload: &[u8], reason: &str);
}

/// In-memory dead-letter store.
#[derive(Default)]
pub struct InMemoryDeadLetters {
    entries: Mutex<Vec<DeadLetterEntry>>,
}

impl InMemoryDeadLetters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of dead-lettered events.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("dead-letter mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries
            .lock()
            .expect("dead-letter mutex poisoned")
            .clone()
    }
}

impl DeadLetterSink for InMemoryDeadLetters {
    fn push(&self, payload: &[u8], reason: &str) {
        let at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as i64)
            .unwrap_or(0);

        warn!(reason, payload_len = payload.len(), "Event dead-lettered");

        self.entries
            .lock()
            .expect("dead-letter mutex poisoned")
            .push(DeadLetterEntry {
                payload: payload.to_vec(),
                reason: reason.to_string(),
                at,
            });
    }
}
