//! Transport trait: the contract between the pipeline and the log broker

use async_trait::async_trait;
use types::errors::TransportError;

/// Broker-assigned tag identifying one delivery attempt.
///
/// Redelivery of the same message gets a fresh tag; deduplication by
/// event id is the consumer's job, not the tag's.
pub type DeliveryTag = u64;

/// One delivered message awaiting acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    /// Raw topic payload (JSON-encoded order event)
    pub payload: Vec<u8>,
    /// Tag to pass to [`EventTransport::ack`]
    pub tag: DeliveryTag,
}

/// The broker boundary.
///
/// Implementations must provide at-least-once semantics: a delivery that
/// is never acked must eventually be delivered again.
#[async_trait]
pub trait EventTransport: Send + Sync {
    /// Publish a payload to the topic.
    async fn publish(&self, payload: &[u8]) -> Result<(), TransportError>;

    /// Receive the next message, waiting if the topic is empty.
    ///
    /// Returns `Unavailable` immediately when the broker is unreachable so
    /// the consumer can enter its backoff path, and `Closed` once the
    /// broker has shut down and drained.
    async fn receive(&self) -> Result<Delivery, TransportError>;

    /// Acknowledge a delivery, removing it from redelivery.
    ///
    /// Acking an unknown or already-acked tag is a no-op.
    async fn ack(&self, tag: DeliveryTag) -> Result<(), TransportError>;
}
