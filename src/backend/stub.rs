//! Deterministic in-process backend for tests, benches and offline runs.

use async_trait::async_trait;
use fxhash::hash64;
use image::RgbImage;

use super::{BackendOutput, EmbeddingBackend};
use crate::config::BackendConfig;
use crate::error::{EmbedError, EmbedResult};
use crate::modality::Modality;

/// Deterministic in-process backend. Generates sinusoid values derived from a
/// hash of the input, so equal inputs always map to equal unit vectors.
/// Usage is reported as one unit per item.
#[derive(Debug, Clone)]
pub struct StubBackend {
    dimensions: usize,
    models: Vec<String>,
    text_only: bool,
}

impl StubBackend {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            models: Vec::new(),
            text_only: false,
        }
    }

    pub fn from_config(cfg: &BackendConfig) -> Self {
        Self::new(cfg.stub_dimensions)
            .with_models(cfg.models.clone())
            .text_only(cfg.stub_text_only)
    }

    pub fn with_models(mut self, models: Vec<String>) -> Self {
        self.models = models;
        self
    }

    /// Reject image groups like a text-only model would.
    pub fn text_only(mut self, text_only: bool) -> Self {
        self.text_only = text_only;
        self
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// The vector this backend produces for `bytes` under `model`.
    pub fn vector_for(&self, model: &str, bytes: &[u8]) -> Vec<f32> {
        let h = hash64(model.as_bytes()) ^ hash64(bytes);
        let mut v = vec![0f32; self.dimensions];
        for (idx, value) in v.iter_mut().enumerate() {
            *value = ((h >> (idx % 32)) as f32 * 0.0001 + idx as f32).sin();
        }
        l2_normalize_in_place(&mut v);
        v
    }
}

#[async_trait]
impl EmbeddingBackend for StubBackend {
    fn name(&self) -> &str {
        "stub"
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn embed_text(&self, model: &str, texts: &[String]) -> EmbedResult<BackendOutput> {
        self.ensure_model(model)?;
        Ok(BackendOutput {
            vectors: texts
                .iter()
                .map(|t| self.vector_for(model, t.as_bytes()))
                .collect(),
            usage: texts.len() as u64,
        })
    }

    async fn embed_images(&self, model: &str, images: &[RgbImage]) -> EmbedResult<BackendOutput> {
        self.ensure_model(model)?;
        if self.text_only {
            return Err(EmbedError::unsupported_modality(model, Modality::Image));
        }
        Ok(BackendOutput {
            vectors: images
                .iter()
                .map(|img| self.vector_for(model, img.as_raw()))
                .collect(),
            usage: images.len() as u64,
        })
    }
}

/// In-place L2 normalization. Zero vectors are left untouched.
pub(crate) fn l2_normalize_in_place(v: &mut [f32]) {
    let norm_sq: f32 = v.iter().map(|x| x * x).sum();
    if norm_sq > 0.0 {
        let inv_norm = norm_sq.sqrt().recip();
        for x in v.iter_mut() {
            *x *= inv_norm;
        }
    }
}
