//! OpenAI-compatible wire shapes for results, errors and the model list.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::EmbedError;
use crate::merge::BatchResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingData {
    pub object: String,
    pub index: usize,
    pub embedding: Vec<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageBody {
    pub prompt_tokens: u64,
    pub total_tokens: u64,
}

/// Success body: `{object:"list", data, model, usage}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResponse {
    pub object: String,
    pub data: Vec<EmbeddingData>,
    pub model: String,
    pub usage: UsageBody,
}

impl EmbeddingResponse {
    pub fn from_batch(batch: BatchResult, model: impl Into<String>) -> Self {
        Self {
            object: "list".to_string(),
            data: batch
                .items
                .into_iter()
                .map(|item| EmbeddingData {
                    object: "embedding".to_string(),
                    index: item.index,
                    embedding: item.vector,
                })
                .collect(),
            model: model.into(),
            usage: UsageBody {
                prompt_tokens: batch.usage.input_count,
                total_tokens: batch.usage.total_count,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub code: u16,
}

/// Failure body: `{error:{message, type, code}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorBody,
}

impl From<&EmbedError> for ErrorResponse {
    fn from(err: &EmbedError) -> Self {
        Self {
            error: ErrorBody {
                message: err.to_string(),
                kind: err.error_type().to_string(),
                code: err.status_code(),
            },
        }
    }
}

impl EmbedError {
    /// Wire body for this error.
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse::from(self)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub object: String,
    /// Unix seconds at listing time.
    pub created: u64,
    pub owned_by: String,
}

/// `GET /v1/models` body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelList {
    pub object: String,
    pub data: Vec<ModelCard>,
}

impl ModelList {
    pub fn new<'a>(models: impl IntoIterator<Item = &'a String>) -> Self {
        let created = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self {
            object: "list".to_string(),
            data: models
                .into_iter()
                .map(|id| ModelCard {
                    id: id.clone(),
                    object: "model".to_string(),
                    created,
                    owned_by: "mmembed".to_string(),
                })
                .collect(),
        }
    }
}
