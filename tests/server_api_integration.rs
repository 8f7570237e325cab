//! HTTP surface tests. The router is driven in-process with `tower::ServiceExt`.

#![cfg(feature = "server")]

mod common;

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use common::{RecordingBackend, TEST_MODEL, engine_with, png_data_uri};
use mmembed::config::ServerConfig;
use mmembed::server::{ServerState, build_router};

fn create_test_app() -> axum::Router {
    let engine = Arc::new(engine_with(Arc::new(RecordingBackend::new())));
    build_router(Arc::new(ServerState::new(ServerConfig::default(), engine)))
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_and_ready() {
    let (status, body) = send(create_test_app(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(create_test_app(), get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["components"]["backend"], "recording");
    assert_eq!(body["components"]["http_pool"], "idle");
}

#[tokio::test]
async fn embeddings_endpoint_returns_ordered_data() {
    let (status, body) = send(
        create_test_app(),
        post_json(
            "/v1/embeddings",
            json!({"input": ["hello", png_data_uri(2, 2), "world"]}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["object"], "list");
    assert_eq!(body["model"], TEST_MODEL);
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 3);
    for (pos, item) in data.iter().enumerate() {
        assert_eq!(item["index"], pos);
    }
    assert_eq!(body["usage"]["total_tokens"], 3);
}

#[tokio::test]
async fn embeddings_errors_map_to_status_codes() {
    let (status, body) = send(
        create_test_app(),
        post_json("/v1/embeddings", json!({"input": ["a"], "modality": "audio"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "NotImplemented");
    assert_eq!(body["error"]["code"], 400);

    let (status, body) = send(
        create_test_app(),
        post_json("/v1/embeddings", json!({"model": "m"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "InvalidRequest");
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/v1/embeddings")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send(create_test_app(), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["type"], "InvalidRequest");
}

#[tokio::test]
async fn models_endpoint() {
    let (status, body) = send(create_test_app(), get("/v1/models")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["id"], TEST_MODEL);
    assert!(body["data"][0]["created"].as_u64().unwrap() > 0);
    assert!(body["data"][0].get("backend").is_none());
}

#[tokio::test]
async fn runsync_wraps_job_output() {
    let (status, body) = send(
        create_test_app(),
        post_json(
            "/runsync",
            json!({"id": "job-1", "input": {"text": "hello"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "job-1");
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(body["output"]["data"][0]["index"], 0);

    let (_, body) = send(
        create_test_app(),
        post_json("/runsync", json!({"input": {"audio": "x"}})),
    )
    .await;
    assert_eq!(body["status"], "FAILED");
    assert_eq!(body["output"]["error"]["type"], "InvalidRequest");
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let (status, body) = send(create_test_app(), get("/v1/rerank")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], 404);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "abc-123")
        .body(Body::empty())
        .unwrap();
    let response = create_test_app().oneshot(request).await.unwrap();
    assert_eq!(response.headers()["x-request-id"], "abc-123");
}
