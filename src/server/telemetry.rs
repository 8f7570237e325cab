//! Process-wide observability: JSON logs and the Prometheus recorder.

use std::time::Duration;

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

use crate::error::EmbedError;
use crate::modality::Modality;
use crate::observe::EngineMetrics;

/// Install the JSON `tracing` subscriber. `RUST_LOG` wins over `default_level`.
pub fn init_tracing(default_level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .json()
        .try_init();
}

/// Install the global Prometheus recorder once and return its handle.
/// Returns `None` if another recorder already owns the process.
pub fn prometheus_handle() -> Option<PrometheusHandle> {
    static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();
    HANDLE
        .get_or_try_init(|| PrometheusBuilder::new().install_recorder())
        .map_err(|e| tracing::warn!(error = %e, "prometheus recorder unavailable"))
        .ok()
        .cloned()
}

/// [`EngineMetrics`] backed by the `metrics` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct PrometheusMetrics;

fn outcome(result: Result<(), &EmbedError>) -> &'static str {
    match result {
        Ok(()) => "ok",
        Err(e) => e.error_type(),
    }
}

impl EngineMetrics for PrometheusMetrics {
    fn record_validation(&self, latency: Duration, items: usize, result: Result<(), &EmbedError>) {
        metrics::histogram!("mmembed_validation_seconds", "outcome" => outcome(result))
            .record(latency.as_secs_f64());
        metrics::counter!("mmembed_items_validated_total").increment(items as u64);
    }

    fn record_dispatch(
        &self,
        modality: Modality,
        items: usize,
        latency: Duration,
        result: Result<(), &EmbedError>,
    ) {
        metrics::histogram!(
            "mmembed_dispatch_seconds",
            "modality" => modality.as_str(),
            "outcome" => outcome(result)
        )
        .record(latency.as_secs_f64());
        metrics::counter!("mmembed_items_embedded_total", "modality" => modality.as_str())
            .increment(items as u64);
    }

    fn record_batch(&self, latency: Duration, items: usize, result: Result<(), &EmbedError>) {
        metrics::histogram!("mmembed_batch_seconds", "outcome" => outcome(result))
            .record(latency.as_secs_f64());
        metrics::histogram!("mmembed_batch_items").record(items as f64);
    }
}
