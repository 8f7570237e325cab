//! The orchestration entry point.
//!
//! [`EmbeddingEngine::embed`] runs one batch end to end:
//!
//! 1. resolve the model and the explicit modality, if any
//! 2. classify every item (per item by default, or from the first item)
//! 3. validate and partition concurrently, downloading image URLs through the shared pool
//! 4. dispatch one backend call per modality group, concurrently
//! 5. merge the vectors back into input order
//!
//! The batch is atomic: any failure fails the call and nothing partial is returned.

use std::sync::Arc;

use crate::backend::{EmbeddingBackend, build_backend};
use crate::config::EngineConfig;
use crate::dispatch::dispatch;
use crate::error::{EmbedError, EmbedResult};
use crate::merge::{BatchResult, merge};
use crate::modality::{
    EmbeddingInput, Modality, classify_batch_uniform, classify_per_item, parse_modality,
};
use crate::observe::MetricsSpan;
use crate::partition::partition;
use crate::pool::ResourceManager;
use crate::response::{EmbeddingResponse, ModelList};

/// How modalities are inferred when the request does not name one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Detection {
    /// Classify every item independently. Mixed batches work.
    #[default]
    PerItem,
    /// Classify the first item and apply the result to the whole batch.
    FirstItem,
}

/// One batch to embed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EmbeddingRequest {
    /// Backend model; `None` uses the engine default.
    pub model: Option<String>,
    pub input: Vec<EmbeddingInput>,
    /// Explicit modality tag applied to every item. Empty or `None` means auto-detect.
    pub modality: Option<String>,
    pub detection: Detection,
}

impl EmbeddingRequest {
    pub fn new<I, T>(input: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<EmbeddingInput>,
    {
        Self {
            input: input.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn modality(mut self, modality: impl Into<String>) -> Self {
        self.modality = Some(modality.into());
        self
    }

    pub fn detection(mut self, detection: Detection) -> Self {
        self.detection = detection;
        self
    }
}

/// Owns the backend and the pool lifecycle. Cheap to share behind an `Arc`.
pub struct EmbeddingEngine {
    backend: Arc<dyn EmbeddingBackend>,
    resources: Arc<ResourceManager>,
    default_model: String,
}

impl std::fmt::Debug for EmbeddingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingEngine")
            .field("backend", &self.backend.name())
            .field("default_model", &self.default_model)
            .finish_non_exhaustive()
    }
}

impl EmbeddingEngine {
    pub fn new(
        backend: Arc<dyn EmbeddingBackend>,
        resources: Arc<ResourceManager>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            resources,
            default_model: default_model.into(),
        }
    }

    /// Build the configured backend and an idle resource manager.
    pub fn from_config(config: &EngineConfig) -> EmbedResult<Self> {
        let backend = build_backend(&config.backend)?;
        let resources = Arc::new(ResourceManager::new(config.http.clone()));
        Ok(Self::new(
            backend,
            resources,
            config.backend.default_model.clone(),
        ))
    }

    /// Create the shared download pool ahead of the first image request.
    pub async fn start(&self) -> EmbedResult<()> {
        self.resources.acquire().await.map(|_| ())
    }

    /// Close the shared pool. Safe to call more than once.
    pub async fn stop(&self) {
        if self.resources.release().await {
            tracing::info!("engine stopped");
        }
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    pub fn backend(&self) -> &Arc<dyn EmbeddingBackend> {
        &self.backend
    }

    pub fn resources(&self) -> &Arc<ResourceManager> {
        &self.resources
    }

    /// Models the engine can serve. Falls back to the default model when the
    /// backend does not advertise a list.
    pub fn list_models(&self) -> ModelList {
        let models = self.backend.models();
        if models.is_empty() {
            ModelList::new([&self.default_model])
        } else {
            ModelList::new(models)
        }
    }

    /// Embed one batch. `result.items[i]` always belongs to `request.input[i]`.
    pub async fn embed(&self, request: EmbeddingRequest) -> EmbedResult<BatchResult> {
        let items = request.input.len();
        let span = MetricsSpan::start();
        let result = self.run(request).await;
        if let Some(span) = span {
            span.record_batch(items, &result);
        }
        match &result {
            Ok(_) => {}
            Err(e) if e.is_internal() => tracing::error!(items, error = %e, "batch failed"),
            Err(e) => tracing::warn!(
                items,
                index = e.index(),
                error_type = e.error_type(),
                error = %e,
                "batch rejected"
            ),
        }
        result
    }

    /// [`embed`](Self::embed), shaped as an OpenAI-compatible response.
    pub async fn embed_response(&self, request: EmbeddingRequest) -> EmbedResult<EmbeddingResponse> {
        let model = self.resolve_model(request.model.as_deref()).to_string();
        let batch = self.embed(request).await?;
        Ok(EmbeddingResponse::from_batch(batch, model))
    }

    fn resolve_model<'a>(&'a self, requested: Option<&'a str>) -> &'a str {
        match requested {
            Some(model) if !model.is_empty() => model,
            _ => &self.default_model,
        }
    }

    async fn run(&self, request: EmbeddingRequest) -> EmbedResult<BatchResult> {
        let model = self.resolve_model(request.model.as_deref()).to_string();
        let explicit = parse_modality(request.modality.as_deref())?;
        let input = request.input;
        // Non-empty audio batches fail in partition, tagged with the item index.
        if input.is_empty() && explicit == Some(Modality::Audio) {
            return Err(EmbedError::audio_not_implemented());
        }
        self.backend.ensure_model(&model)?;

        if input.is_empty() {
            tracing::debug!(model = %model, "empty batch");
            return Ok(BatchResult::default());
        }

        let modalities = match (explicit, request.detection) {
            (Some(modality), _) => vec![modality; input.len()],
            (None, Detection::PerItem) => classify_per_item(&input),
            (None, Detection::FirstItem) => {
                vec![classify_batch_uniform(&input, None); input.len()]
            }
        };

        let pool = if modalities.contains(&Modality::Image) {
            Some(self.resources.acquire().await?)
        } else {
            None
        };

        let parts = partition(&input, &modalities, pool.as_ref()).await?;
        let total = parts.total();
        let groups = parts.into_groups();
        tracing::info!(
            model = %model,
            items = total,
            groups = groups.len(),
            backend = self.backend.name(),
            "embedding batch"
        );

        let results = dispatch(self.backend.as_ref(), &model, groups).await?;
        merge(results, total)
    }
}
