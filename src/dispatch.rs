//! Fan-out: one backend call per modality group, all in flight at once.
//!
//! The first failing group fails the whole dispatch; sibling calls are
//! dropped, not awaited.

use futures::future::try_join_all;

use crate::backend::EmbeddingBackend;
use crate::error::{EmbedError, EmbedResult};
use crate::modality::Modality;
use crate::observe::MetricsSpan;
use crate::partition::ModalityGroup;
use crate::validate::NormalizedPayload;

/// Vectors for one group, aligned with its original positions.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupResult {
    pub modality: Modality,
    pub indices: Vec<usize>,
    pub vectors: Vec<Vec<f32>>,
    pub usage: u64,
}

/// Embed every group concurrently.
pub async fn dispatch(
    backend: &dyn EmbeddingBackend,
    model: &str,
    groups: Vec<ModalityGroup>,
) -> EmbedResult<Vec<GroupResult>> {
    try_join_all(
        groups
            .into_iter()
            .filter(|group| !group.is_empty())
            .map(|group| dispatch_group(backend, model, group)),
    )
    .await
}

async fn dispatch_group(
    backend: &dyn EmbeddingBackend,
    model: &str,
    group: ModalityGroup,
) -> EmbedResult<GroupResult> {
    let modality = group.modality;
    let (indices, payloads) = group.into_parts();
    let span = MetricsSpan::start();

    let result = match modality {
        Modality::Text => {
            let texts = payloads
                .into_iter()
                .map(|p| match p {
                    NormalizedPayload::Text(text) => Ok(text),
                    NormalizedPayload::Image(_) => Err(mixed_group(modality)),
                })
                .collect::<EmbedResult<Vec<_>>>();
            match texts {
                Ok(texts) => backend.embed_text(model, &texts).await,
                Err(e) => Err(e),
            }
        }
        Modality::Image => {
            let images = payloads
                .into_iter()
                .map(|p| match p {
                    NormalizedPayload::Image(img) => Ok(img),
                    NormalizedPayload::Text(_) => Err(mixed_group(modality)),
                })
                .collect::<EmbedResult<Vec<_>>>();
            match images {
                Ok(images) => backend.embed_images(model, &images).await,
                Err(e) => Err(e),
            }
        }
        Modality::Audio => Err(EmbedError::audio_not_implemented()),
    };

    if let Some(span) = span {
        span.record_dispatch(modality, indices.len(), &result);
    }
    let output = result.inspect_err(|e| {
        tracing::warn!(backend = backend.name(), modality = %modality, error = %e, "group failed");
    })?;

    if output.vectors.len() != indices.len() {
        return Err(EmbedError::Internal(format!(
            "backend returned {} vectors for {} {modality} items",
            output.vectors.len(),
            indices.len()
        )));
    }

    Ok(GroupResult {
        modality,
        indices,
        vectors: output.vectors,
        usage: output.usage,
    })
}

fn mixed_group(modality: Modality) -> EmbedError {
    EmbedError::Internal(format!("{modality} group contains a payload of another modality"))
}
