//! Order event wire format and validation
//!
//! One event per placed order: `{"order_id": "<uuid>", "amount": <number>}`,
//! JSON-encoded on the broker topic. Amounts travel as JSON numbers but are
//! decoded into exact decimals immediately; nothing downstream ever sums
//! floats.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::EventError;
use crate::ids::EventId;

/// A single order event, immutable once created.
///
/// Logically consumed exactly once by the aggregate: the ingestion side
/// deduplicates by `id`, so redelivery of the same event is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderEvent {
    /// Opaque unique identifier, the deduplication key
    #[serde(rename = "order_id")]
    pub id: EventId,
    /// Monetary amount, non-negative, two decimal places on the wire
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl OrderEvent {
    /// Create a new event with a fresh id.
    pub fn new(amount: Decimal) -> Self {
        Self {
            id: EventId::new(),
            amount,
        }
    }

    /// Decode and validate a raw topic payload.
    ///
    /// Any payload that does not parse as the wire shape, or carries a
    /// negative amount, is malformed: permanent for that event, routed to
    /// the dead-letter sink by the caller.
    pub fn from_payload(payload: &[u8]) -> Result<Self, EventError> {
        let event: OrderEvent = serde_json::from_slice(payload)
            .map_err(|e| EventError::Malformed(e.to_string()))?;

        if event.amount.is_sign_negative() {
            return Err(EventError::NegativeAmount {
                amount: event.amount.to_string(),
            });
        }

        Ok(event)
    }

    /// Encode to the JSON topic payload.
    pub fn to_payload(&self) -> Vec<u8> {
        // OrderEvent has no non-serializable fields; encoding cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_payload_roundtrip() {
        let event = OrderEvent::new(Decimal::from_str("42.50").unwrap());
        let payload = event.to_payload();
        let decoded = OrderEvent::from_payload(&payload).unwrap();
        assert_eq!(event, decoded);
    }

    #[test]
    fn test_wire_field_names() {
        let event = OrderEvent::new(Decimal::from_str("10.00").unwrap());
        let json = String::from_utf8(event.to_payload()).unwrap();
        assert!(json.contains("\"order_id\""));
        assert!(json.contains("\"amount\""));
    }

    #[test]
    fn test_amount_is_json_number() {
        let payload = br#"{"order_id":"0192c7a1-0000-7000-8000-000000000001","amount":12.34}"#;
        let event = OrderEvent::from_payload(payload).unwrap();
        assert_eq!(event.amount, Decimal::from_str("12.34").unwrap());
    }

    #[test]
    fn test_malformed_payload_rejected() {
        let err = OrderEvent::from_payload(b"not json").unwrap_err();
        assert!(matches!(err, EventError::Malformed(_)));

        let err = OrderEvent::from_payload(br#"{"order_id":"abc"}"#).unwrap_err();
        assert!(matches!(err, EventError::Malformed(_)));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let payload = br#"{"order_id":"0192c7a1-0000-7000-8000-000000000001","amount":-5.00}"#;
        let err = OrderEvent::from_payload(payload).unwrap_err();
        assert!(matches!(err, EventError::NegativeAmount { .. }));
    }
}
