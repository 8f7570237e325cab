//! Embedding backends.
//!
//! The engine only talks to [`EmbeddingBackend`]; the adapter is chosen once
//! from configuration by [`build_backend`].

pub mod infinity;
pub mod retry;
pub mod stub;

use std::sync::Arc;

use async_trait::async_trait;
use image::RgbImage;

use crate::config::{BackendConfig, BackendKind};
use crate::error::{EmbedError, EmbedResult};

pub use infinity::InfinityBackend;
pub use stub::StubBackend;

/// Vectors for one backend call, in input order, plus the usage it reported.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BackendOutput {
    pub vectors: Vec<Vec<f32>>,
    pub usage: u64,
}

/// An embedding provider. One call per modality group.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Short identifier for logs.
    fn name(&self) -> &str;

    /// Models this backend serves. Empty means it accepts any name.
    fn models(&self) -> &[String];

    async fn embed_text(&self, model: &str, texts: &[String]) -> EmbedResult<BackendOutput>;

    async fn embed_images(&self, model: &str, images: &[RgbImage]) -> EmbedResult<BackendOutput>;

    /// Reject models the backend does not serve.
    fn ensure_model(&self, model: &str) -> EmbedResult<()> {
        let models = self.models();
        if models.is_empty() || models.iter().any(|m| m == model) {
            Ok(())
        } else {
            Err(EmbedError::model_not_available(model, models))
        }
    }
}

/// Build the configured backend.
pub fn build_backend(config: &BackendConfig) -> EmbedResult<Arc<dyn EmbeddingBackend>> {
    let backend: Arc<dyn EmbeddingBackend> = match config.kind {
        BackendKind::Infinity => Arc::new(InfinityBackend::new(config)?),
        BackendKind::Stub => Arc::new(StubBackend::from_config(config)),
    };
    tracing::info!(
        backend = backend.name(),
        models = ?backend.models(),
        "embedding backend ready"
    );
    Ok(backend)
}
