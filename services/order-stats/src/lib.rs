//! Order Stats Service
//!
//! Consumes order events from the broker topic and produces:
//! - A single running aggregate (count, sum) with exactly-once-per-event
//!   application under at-least-once delivery
//! - One-shot aggregate queries (`GET /stats`)
//! - A live push feed with rate coalescing (`GET /stats/stream`, SSE)
//!
//! # Architecture
//!
//! ```text
//! Broker topic (at-least-once)
//!        │
//!   ┌────▼─────┐
//!   │Ingestion │  ← receive, decode, dedup, ack-after-apply
//!   └────┬─────┘
//!        │
//!   ┌────▼─────┐      ┌───────────┐
//!   │Aggregate │─────▶│Subscription│
//!   │  Store   │      │    Hub     │
//!   └────┬─────┘      └─────┬──────┘
//!        │                  │
//!   ┌────▼──────────────────▼──┐
//!   │   HTTP: /stats, /stream  │
//!   └──────────────────────────┘
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod hub;
pub mod ingestion;
pub mod router;
pub mod state;
pub mod store;

// Library version
pub const SERVICE_VERSION: &str = "0.1.0";
