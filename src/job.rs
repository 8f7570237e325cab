//! Serverless job envelope handling.
//!
//! A job is `{"input": {...}}`. The inner object is one of:
//!
//! - `{"openai_route": "/v1/embeddings", "openai_input": {"model", "input", "modality"?}}`:
//!   auto-detects per item unless a modality is given; the reply is a one-element list
//! - `{"openai_route": "/v1/models"}`
//! - `{"input": .., "modality"?: ..}`: modality defaults to `text`
//! - `{"text": ..}` or `{"image": ..}`
//!
//! `model` is optional everywhere and falls back to the engine default.
//! Failures are returned as `{error:{message,type,code}}`, never as a list.

use serde::Serialize;
use serde_json::{Map, Value, json};

use crate::engine::{Detection, EmbeddingEngine, EmbeddingRequest};
use crate::error::{EmbedError, EmbedResult};
use crate::modality::EmbeddingInput;

pub const EMBEDDINGS_ROUTE: &str = "/v1/embeddings";
pub const MODELS_ROUTE: &str = "/v1/models";

/// A parsed job.
#[derive(Debug, Clone, PartialEq)]
pub enum JobRequest {
    /// Embeddings through the OpenAI route.
    OpenAiEmbeddings(EmbeddingRequest),
    /// Model listing through the OpenAI route.
    OpenAiModels,
    /// One of the standard input formats.
    Standard(EmbeddingRequest),
}

/// Parse a job envelope without running it.
pub fn parse_job(job: &Value) -> EmbedResult<JobRequest> {
    let empty = Map::new();
    let job_input = match job.get("input") {
        None | Some(Value::Null) => &empty,
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(EmbedError::InvalidRequest(
                "Job 'input' must be an object".into(),
            ));
        }
    };

    if let Some(route) = job_input.get("openai_route") {
        return parse_openai_route(route, job_input.get("openai_input"));
    }
    parse_standard(job_input)
}

fn parse_openai_route(route: &Value, openai_input: Option<&Value>) -> EmbedResult<JobRequest> {
    match route.as_str() {
        Some(MODELS_ROUTE) => Ok(JobRequest::OpenAiModels),
        Some(EMBEDDINGS_ROUTE) => {
            parse_openai_embeddings(openai_input).map(JobRequest::OpenAiEmbeddings)
        }
        other => Err(EmbedError::InvalidRequest(format!(
            "Unsupported OpenAI route: {}",
            other.map(str::to_string).unwrap_or_else(|| route.to_string())
        ))),
    }
}

/// Parse an OpenAI-style embeddings body `{model?, input, modality?}`.
/// Without a modality every item is classified on its own.
pub fn parse_openai_embeddings(body: Option<&Value>) -> EmbedResult<EmbeddingRequest> {
    let body = match body {
        Some(Value::Object(map)) if !map.is_empty() => map,
        _ => {
            return Err(EmbedError::InvalidRequest(
                "Missing openai_input for embeddings request".into(),
            ));
        }
    };
    let input = match body.get("input") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.is_empty() => None,
        Some(value) => Some(value),
    }
    .ok_or_else(|| EmbedError::InvalidRequest("Missing 'input' field in openai_input".into()))?;

    let modality = string_field(body, "modality")?.filter(|m| !m.is_empty());
    Ok(EmbeddingRequest {
        model: string_field(body, "model")?,
        input: EmbeddingInput::batch_from_json(input)?,
        modality,
        detection: Detection::PerItem,
    })
}

fn parse_standard(job_input: &Map<String, Value>) -> EmbedResult<JobRequest> {
    let model = string_field(job_input, "model")?;
    let (input, modality) = if let Some(input) = job_input.get("input") {
        // The standard form never auto-detects; a blank modality means text.
        let modality = string_field(job_input, "modality")?
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| "text".into());
        (input, modality)
    } else if let Some(text) = job_input.get("text") {
        (text, "text".to_string())
    } else if let Some(image) = job_input.get("image") {
        (image, "image".to_string())
    } else {
        return Err(EmbedError::InvalidRequest(
            "Invalid input format. Expected 'input', 'text', or 'image' field.".into(),
        ));
    };

    Ok(JobRequest::Standard(EmbeddingRequest {
        model,
        input: EmbeddingInput::batch_from_json(input)?,
        modality: Some(modality),
        detection: Detection::PerItem,
    }))
}

fn string_field(map: &Map<String, Value>, key: &str) -> EmbedResult<Option<String>> {
    match map.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(EmbedError::InvalidRequest(format!(
            "'{key}' must be a string"
        ))),
    }
}

/// Run one job and return its JSON reply.
pub async fn handle_job(engine: &EmbeddingEngine, job: &Value) -> Value {
    match run_job(engine, job).await {
        Ok(value) => value,
        Err(err) => {
            tracing::warn!(error_type = err.error_type(), error = %err, "job failed");
            to_json(&err.to_response())
        }
    }
}

async fn run_job(engine: &EmbeddingEngine, job: &Value) -> EmbedResult<Value> {
    match parse_job(job)? {
        JobRequest::OpenAiModels => Ok(to_json(&engine.list_models())),
        JobRequest::OpenAiEmbeddings(request) => {
            let response = engine.embed_response(request).await?;
            Ok(Value::Array(vec![to_json(&response)]))
        }
        JobRequest::Standard(request) => {
            let response = engine.embed_response(request).await?;
            Ok(to_json(&response))
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap_or_else(|e| {
        json!({
            "error": {
                "message": format!("Internal error while processing embeddings: {e}"),
                "type": "Internal",
                "code": 500
            }
        })
    })
}
