//! Pluggable observer for engine stages.
//!
//! The engine reports stage latencies and outcomes to whatever recorder is
//! installed with [`set_engine_metrics`]. Nothing is recorded when none is
//! installed. The server installs a Prometheus-backed recorder.

use std::sync::{Arc, OnceLock, RwLock};
use std::time::{Duration, Instant};

use crate::error::EmbedError;
use crate::modality::Modality;

/// Metrics observer for engine stages.
pub trait EngineMetrics: Send + Sync {
    /// Classification plus per-item validation of a whole batch.
    fn record_validation(&self, latency: Duration, items: usize, result: Result<(), &EmbedError>);
    /// One modality group sent to the backend.
    fn record_dispatch(
        &self,
        modality: Modality,
        items: usize,
        latency: Duration,
        result: Result<(), &EmbedError>,
    );
    /// A complete `embed` call.
    fn record_batch(&self, latency: Duration, items: usize, result: Result<(), &EmbedError>);
}

/// Install or clear the global engine metrics recorder.
pub fn set_engine_metrics(recorder: Option<Arc<dyn EngineMetrics>>) {
    let mut guard = metrics_lock()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    *guard = recorder;
}

fn metrics_lock() -> &'static RwLock<Option<Arc<dyn EngineMetrics>>> {
    static METRICS: OnceLock<RwLock<Option<Arc<dyn EngineMetrics>>>> = OnceLock::new();
    METRICS.get_or_init(|| RwLock::new(None))
}

fn metrics_recorder() -> Option<Arc<dyn EngineMetrics>> {
    let guard = metrics_lock()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner());
    guard.clone()
}

pub(crate) struct MetricsSpan {
    recorder: Arc<dyn EngineMetrics>,
    start: Instant,
}

impl MetricsSpan {
    pub(crate) fn start() -> Option<Self> {
        metrics_recorder().map(|recorder| Self {
            recorder,
            start: Instant::now(),
        })
    }

    pub(crate) fn record_validation<T>(self, items: usize, result: &Result<T, EmbedError>) {
        self.recorder
            .record_validation(self.start.elapsed(), items, outcome(result));
    }

    pub(crate) fn record_dispatch<T>(
        self,
        modality: Modality,
        items: usize,
        result: &Result<T, EmbedError>,
    ) {
        self.recorder
            .record_dispatch(modality, items, self.start.elapsed(), outcome(result));
    }

    pub(crate) fn record_batch<T>(self, items: usize, result: &Result<T, EmbedError>) {
        self.recorder
            .record_batch(self.start.elapsed(), items, outcome(result));
    }
}

fn outcome<T>(result: &Result<T, EmbedError>) -> Result<(), &EmbedError> {
    result.as_ref().map(|_| ())
}
