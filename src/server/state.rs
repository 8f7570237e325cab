use std::sync::Arc;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusHandle;

use crate::config::ServerConfig;
use crate::engine::EmbeddingEngine;

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub engine: Arc<EmbeddingEngine>,
    /// Present when the Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    pub started: Instant,
}

impl ServerState {
    pub fn new(config: ServerConfig, engine: Arc<EmbeddingEngine>) -> Self {
        Self {
            config: Arc::new(config),
            engine,
            metrics: None,
            started: Instant::now(),
        }
    }

    pub fn with_metrics(mut self, handle: Option<PrometheusHandle>) -> Self {
        self.metrics = handle;
        self
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
