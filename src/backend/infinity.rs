//! Adapter for OpenAI-compatible embedding servers (Infinity and friends).
//!
//! Texts go out as plain strings. Images are sent as PNG data URIs with
//! `"modality": "image"`, which is how Infinity selects its vision path.

use std::time::Duration;

use async_trait::async_trait;
use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::retry::{Attempt, RetryConfig, execute_with_retry_async, is_retryable_status};
use super::{BackendOutput, EmbeddingBackend};
use crate::config::BackendConfig;
use crate::error::{EmbedError, EmbedResult};
use crate::imaging::encode_png_data_uri;
use crate::modality::Modality;

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    modality: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingsReply {
    data: Vec<ReplyItem>,
    #[serde(default)]
    usage: Option<ReplyUsage>,
}

#[derive(Debug, Deserialize)]
struct ReplyItem {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ReplyUsage {
    #[serde(default)]
    prompt_tokens: Option<u64>,
    #[serde(default)]
    total_tokens: Option<u64>,
}

/// HTTP client for a remote `/embeddings` endpoint.
#[derive(Debug, Clone)]
pub struct InfinityBackend {
    client: reqwest::Client,
    endpoint: String,
    models: Vec<String>,
    retry: RetryConfig,
}

impl InfinityBackend {
    pub fn new(cfg: &BackendConfig) -> EmbedResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout())
            .connect_timeout(Duration::from_secs(10))
            .pool_max_idle_per_host(32)
            .build()
            .map_err(|e| EmbedError::Internal(format!("failed to build backend client: {e}")))?;
        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", cfg.base_url.trim_end_matches('/')),
            models: cfg.models.clone(),
            retry: cfg.retry,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(
        &self,
        model: &str,
        input: &[String],
        modality: Modality,
    ) -> EmbedResult<BackendOutput> {
        let payload = EmbeddingsRequest {
            model,
            input,
            encoding_format: "float",
            modality: (modality == Modality::Image).then_some("image"),
        };

        let payload = &payload;
        let outcome = execute_with_retry_async(&self.retry, move |attempt| {
            async move {
                if attempt > 0 {
                    tracing::warn!(attempt, endpoint = %self.endpoint, "retrying backend request");
                }
                self.send_once(payload, model, modality).await
            }
        })
        .await;

        tracing::debug!(
            model,
            modality = %modality,
            items = input.len(),
            attempts = outcome.attempts,
            elapsed_ms = outcome.total_duration.as_millis() as u64,
            "backend call finished"
        );

        let reply = outcome.into_result()?;
        into_output(reply, input.len())
    }

    async fn send_once(
        &self,
        payload: &EmbeddingsRequest<'_>,
        model: &str,
        modality: Modality,
    ) -> Result<EmbeddingsReply, Attempt<EmbedError>> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(payload)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(endpoint = %self.endpoint, error = %e, "backend transport error");
                let reason = if e.is_timeout() { "timed out" } else { "connection failed" };
                Attempt::Retry(EmbedError::Internal(format!(
                    "Failed to connect to embedding backend ({reason})"
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let code = status.as_u16();
            tracing::warn!(status = code, model, modality = %modality, body = %body, "backend rejected request");
            let err = rejection(code, &body, model, modality);
            return Err(if is_retryable_status(code) {
                Attempt::Retry(err)
            } else {
                Attempt::Abort(err)
            });
        }

        response.json::<EmbeddingsReply>().await.map_err(|e| {
            Attempt::Abort(EmbedError::Internal(format!(
                "Invalid response from embedding backend: {e}"
            )))
        })
    }
}

/// Map a non-2xx reply to the caller-facing error. Server-side bodies stay in
/// the log; client errors carry a short reason.
fn rejection(code: u16, body: &str, model: &str, modality: Modality) -> EmbedError {
    match code {
        401 | 403 => EmbedError::Internal(format!(
            "embedding backend refused credentials (HTTP {code})"
        )),
        400 | 404 | 422 if modality == Modality::Image => {
            EmbedError::unsupported_modality(model, modality)
        }
        404 => EmbedError::BackendUnavailable(format!(
            "Model '{model}' is not deployed on the embedding backend (HTTP 404)"
        )),
        c if is_retryable_status(c) => {
            EmbedError::Internal(format!("embedding backend unavailable (HTTP {c})"))
        }
        c => EmbedError::InvalidRequest(format!(
            "Embedding backend rejected the request (HTTP {c}): {}",
            short_reason(body)
        )),
    }
}

const MAX_REASON_CHARS: usize = 200;

/// First line of the upstream reason, preferring a JSON `detail`/`message`.
fn short_reason(body: &str) -> String {
    let parsed = serde_json::from_str::<serde_json::Value>(body).ok();
    let from_json = parsed.as_ref().and_then(|v| {
        v.get("detail")
            .or_else(|| v.get("message"))
            .or_else(|| v.pointer("/error/message"))
            .and_then(|d| d.as_str())
    });
    let text = from_json.unwrap_or(body).trim();
    let line = text.lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return "no reason given".to_string();
    }
    line.chars().take(MAX_REASON_CHARS).collect()
}

/// Order vectors by their reported index and check the count.
fn into_output(reply: EmbeddingsReply, expected: usize) -> EmbedResult<BackendOutput> {
    let mut items = reply.data;
    if items.len() != expected {
        return Err(EmbedError::Internal(format!(
            "backend returned {} embeddings for {expected} inputs",
            items.len()
        )));
    }
    if items.iter().all(|item| item.index.is_some()) {
        items.sort_by_key(|item| item.index);
    }
    let usage = reply
        .usage
        .and_then(|u| u.prompt_tokens.or(u.total_tokens))
        .unwrap_or(expected as u64);
    Ok(BackendOutput {
        vectors: items.into_iter().map(|item| item.embedding).collect(),
        usage,
    })
}

#[async_trait]
impl EmbeddingBackend for InfinityBackend {
    fn name(&self) -> &str {
        "infinity"
    }

    fn models(&self) -> &[String] {
        &self.models
    }

    async fn embed_text(&self, model: &str, texts: &[String]) -> EmbedResult<BackendOutput> {
        self.ensure_model(model)?;
        self.post(model, texts, Modality::Text).await
    }

    async fn embed_images(&self, model: &str, images: &[RgbImage]) -> EmbedResult<BackendOutput> {
        self.ensure_model(model)?;
        let uris = images
            .iter()
            .map(encode_png_data_uri)
            .collect::<EmbedResult<Vec<_>>>()?;
        self.post(model, &uris, Modality::Image).await
    }
}
