//! Service configuration
//!
//! Defaults match the documented tunables; each can be overridden through
//! an environment variable for deployment.

use std::net::SocketAddr;
use std::time::Duration;

use tracing::warn;

use crate::hub::HubConfig;
use crate::ingestion::IngestionConfig;
use crate::store::StoreConfig;
use order_producer::ProducerConfig;

/// Top-level configuration for the order stats service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP bind address (`STATS_HTTP_ADDR`).
    pub http_addr: SocketAddr,
    /// Minimum interval between frames per stream connection
    /// (`STATS_STREAM_INTERVAL_SECS`).
    pub stream_min_interval: Duration,
    pub store: StoreConfig,
    pub ingestion: IngestionConfig,
    pub hub: HubConfig,
    pub producer: ProducerConfig,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            http_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            stream_min_interval: Duration::from_secs(5),
            store: StoreConfig::default(),
            ingestion: IngestionConfig::default(),
            hub: HubConfig::default(),
            producer: ProducerConfig::default(),
        }
    }
}

impl ServiceConfig {
    /// Defaults with environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(addr) = parse_env("STATS_HTTP_ADDR") {
            config.http_addr = addr;
        }
        if let Some(secs) = parse_env::<u64>("STATS_STREAM_INTERVAL_SECS") {
            config.stream_min_interval = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_env("STATS_DEDUP_CAPACITY") {
            config.store.dedup_capacity = capacity;
        }
        if let Some(millis) = parse_env::<u64>("STATS_EMIT_INTERVAL_MS") {
            config.producer.emit_interval = Duration::from_millis(millis);
        }

        config
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(name, raw, "Ignoring unparseable environment override");
            None
        }
    }
}
