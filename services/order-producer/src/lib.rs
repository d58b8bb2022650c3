//! Event source for the order stats pipeline
//!
//! Produces one random order event per tick and publishes it to the broker
//! topic. A publish failure retries the *same* event after a backoff delay,
//! so a broker outage delays events but never drops or duplicates a
//! generation attempt. The loop runs until the shutdown signal fires.

pub mod generator;
pub mod source;

pub use generator::OrderGenerator;
pub use source::{run, ProducerConfig, ProducerStats};
