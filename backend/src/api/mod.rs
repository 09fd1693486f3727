pub mod health;
pub mod metrics;
pub mod openapi;
pub mod peers;
pub mod response;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::Config;
use crate::registry::PeerRegistry;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: PeerRegistry,
    pub config: Config,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        let registry = PeerRegistry::new(config.liveness_timeout());
        Self::with_registry(registry, config)
    }

    /// Build state around an existing registry (tests inject a manual clock this way)
    pub fn with_registry(registry: PeerRegistry, config: Config) -> Self {
        Self {
            registry,
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics = Some(handle);
        self
    }
}
