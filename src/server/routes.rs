use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use serde_json::{Value, json};

use super::error::{ServerError, ServerResult};
use super::state::ServerState;
use crate::job::{handle_job, parse_openai_embeddings};
use crate::response::{EmbeddingResponse, ModelList};

/// Liveness probe
pub async fn health_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "service": "mmembed",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
    }))
}

/// Readiness probe. The download pool is created lazily, so "idle" is ready too.
pub async fn readiness_check(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let pool = match state.engine.resources().current().await {
        Some(pool) if !pool.is_closed() => "ready",
        Some(_) => "closed",
        None => "idle",
    };
    Json(json!({
        "status": "ready",
        "service": "mmembed",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": state.uptime_seconds(),
        "components": {
            "backend": state.engine.backend().name(),
            "default_model": state.engine.default_model(),
            "http_pool": pool,
        }
    }))
}

/// Prometheus text exposition
pub async fn metrics(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let body = state
        .metrics
        .as_ref()
        .map(|handle| handle.render())
        .unwrap_or_default();
    ([(CONTENT_TYPE, "text/plain; version=0.0.4")], body)
}

/// `POST /v1/embeddings`
pub async fn create_embeddings(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<EmbeddingResponse>> {
    let Json(body) = body?;
    let request = parse_openai_embeddings(Some(&body))?;
    let response = state.engine.embed_response(request).await?;
    Ok(Json(response))
}

/// `GET /v1/models`
pub async fn list_models(State(state): State<Arc<ServerState>>) -> Json<ModelList> {
    Json(state.engine.list_models())
}

/// `POST /runsync`: run one serverless job envelope synchronously.
pub async fn run_sync(
    State(state): State<Arc<ServerState>>,
    body: Result<Json<Value>, JsonRejection>,
) -> ServerResult<Json<Value>> {
    let Json(job) = body?;
    let output = handle_job(&state.engine, &job).await;
    let status = if output.get("error").is_some() {
        "FAILED"
    } else {
        "COMPLETED"
    };
    Ok(Json(json!({
        "id": job
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
        "status": status,
        "output": output,
    })))
}

pub async fn not_found() -> ServerError {
    ServerError::NotFound
}
