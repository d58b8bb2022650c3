//! Shared application state for the HTTP layer

use std::sync::Arc;
use std::time::Duration;

use types::aggregate::Aggregate;

use crate::error::ServiceError;
use crate::hub::SubscriptionHub;
use crate::store::AggregateStore;

/// The query side's view of the aggregate.
///
/// The in-process [`AggregateStore`] implements this directly; a deployment
/// that materializes the aggregate in an external backend implements it
/// with a client, and its failures surface as `BackendUnavailable`.
pub trait StatsBackend: Send + Sync {
    fn stats(&self) -> Result<Aggregate, ServiceError>;
}

impl StatsBackend for AggregateStore {
    fn stats(&self) -> Result<Aggregate, ServiceError> {
        Ok(self.snapshot())
    }
}

#[derive(Clone)]
pub struct AppState {
    pub backend: Arc<dyn StatsBackend>,
    pub hub: Arc<SubscriptionHub>,
    /// Minimum interval between frames on one stream connection.
    pub stream_min_interval: Duration,
}

impl AppState {
    pub fn new(
        backend: Arc<dyn StatsBackend>,
        hub: Arc<SubscriptionHub>,
        stream_min_interval: Duration,
    ) -> Self {
        Self {
            backend,
            hub,
            stream_min_interval,
        }
    }
}
