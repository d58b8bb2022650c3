//! Broker boundary for the order stats pipeline
//!
//! The external log broker is a collaborator, not part of this system; this
//! crate pins down the contract the pipeline relies on:
//! - at-least-once delivery: an unacknowledged message is redelivered
//! - acknowledge-after-apply: consumers ack only once an event is durable
//!   in the aggregate, so a crash between receive and apply loses nothing
//! - dead-lettering: a payload that can never be applied is routed to a
//!   sink instead of crashing the consumer
//!
//! `InMemoryBroker` is the in-process implementation used by the demo
//! wiring and every test; it supports fault injection so tests can drive
//! the reconnect/backoff paths.

pub mod broker;
pub mod dead_letter;
pub mod memory;

pub use broker::{Delivery, DeliveryTag, EventTransport};
pub use dead_letter::{DeadLetterEntry, DeadLetterSink, InMemoryDeadLetters};
pub use memory::InMemoryBroker;
