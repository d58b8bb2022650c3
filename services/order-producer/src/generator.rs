//! Random order event generation

use rand::Rng;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use types::aggregate::AMOUNT_DECIMAL_PLACES;
use types::event::OrderEvent;

/// Generates order events with fresh ids and amounts uniform in a
/// configured positive range, rounded to two decimal places at generation
/// so the wire value and the applied value are identical.
#[derive(Debug, Clone)]
pub struct OrderGenerator {
    amount_min: f64,
    amount_max: f64,
}

impl OrderGenerator {
    /// Create a generator for amounts in `[amount_min, amount_max]`.
    ///
    /// # Panics
    /// Panics if the range is empty or not positive.
    pub fn new(amount_min: f64, amount_max: f64) -> Self {
        assert!(
            amount_min >= 0.0 && amount_min < amount_max,
            "amount range must be positive and non-empty"
        );
        Self {
            amount_min,
            amount_max,
        }
    }

    /// Generate the next event using the supplied RNG.
    pub fn next_event<R: Rng>(&self, rng: &mut R) -> OrderEvent {
        let raw = rng.gen_range(self.amount_min..=self.amount_max);
        let amount = Decimal::from_f64(raw)
            .unwrap_or(Decimal::ZERO)
            .round_dp_with_strategy(
                AMOUNT_DECIMAL_PLACES,
                RoundingStrategy::MidpointAwayFromZero,
            );
        OrderEvent::new(amount)
    }
}

impl Default for OrderGenerator {
    fn default() -> Self {
        Self::new(10.0, 100.0)
    }
}
