//! Types library for the order stats pipeline
//!
//! This library provides the core type definitions shared by the producer
//! and aggregation services, ensuring a single wire format and a single
//! rounding rule across the system.
//!
//! # Modules
//! - `ids`: Unique identifiers (EventId)
//! - `event`: Order event wire format and validation
//! - `aggregate`: Running aggregate and its query-facing representation
//! - `errors`: Error taxonomy

pub mod aggregate;
pub mod errors;
pub mod event;
pub mod ids;

// Library version constant
pub const LIB_VERSION: &str = "1.0.0";

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::aggregate::*;
    pub use crate::errors::*;
    pub use crate::event::*;
    pub use crate::ids::*;
}
