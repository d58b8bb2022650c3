//! Running aggregate and its query-facing representation
//!
//! The aggregate accumulates exact decimals internally; rounding to the
//! two-decimal wire form happens once, at the query/response boundary,
//! using HALF-UP (midpoint away from zero) so the result is deterministic.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places in query responses.
pub const AMOUNT_DECIMAL_PLACES: u32 = 2;

/// The single running summary derived from all applied events.
///
/// Invariants (maintained by the aggregate store):
/// - `total_count` equals the number of distinct event ids ever applied
/// - `total_amount` equals the exact decimal sum of their amounts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Aggregate {
    /// Number of distinct events applied
    pub total_count: u64,
    /// Exact sum of applied amounts
    pub total_amount: Decimal,
}

impl Aggregate {
    /// The empty aggregate, before any event has been applied.
    pub fn zero() -> Self {
        Self::default()
    }

    /// The sum rounded to response precision, HALF-UP.
    pub fn rounded_amount(&self) -> Decimal {
        self.total_amount.round_dp_with_strategy(
            AMOUNT_DECIMAL_PLACES,
            RoundingStrategy::MidpointAwayFromZero,
        )
    }
}

/// Query-boundary representation of an [`Aggregate`].
///
/// Serialized shape: `{"total_orders": <int>, "total_amount": <number>}`
/// with `total_amount` rounded to two decimals.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatsResponse {
    pub total_orders: u64,
    pub total_amount: f64,
}

impl From<&Aggregate> for StatsResponse {
    fn from(aggregate: &Aggregate) -> Self {
        Self {
            total_orders: aggregate.total_count,
            // A two-decimal value is always representable as f64
            total_amount: aggregate.rounded_amount().to_f64().unwrap_or(0.0),
        }
    }
}

impl From<Aggregate> for StatsResponse {
    fn from(aggregate: Aggregate) -> Self {
        Self::from(&aggregate)
    }
}
