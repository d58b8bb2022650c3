//! Error taxonomy for the order stats pipeline
//!
//! Transport faults are transient and retried with backoff; a malformed
//! event is permanent for that event and is dead-lettered. A duplicate
//! delivery is not an error at all: the aggregate store reports it as a
//! non-error apply outcome.

use thiserror::Error;

/// Errors at the broker boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("Transport unavailable: {0}")]
    Unavailable(String),

    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// Whether the caller should retry after a backoff delay.
    ///
    /// `Closed` is terminal: the broker is shutting down and redelivery
    /// will never happen.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Unavailable(_))
    }
}

/// Errors for a single event payload
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Malformed event payload: {0}")]
    Malformed(String),

    #[error("Negative amount: {amount}")]
    NegativeAmount { amount: String },
}
