//! HTTP surface: OpenAI-compatible embeddings, a serverless-style job
//! endpoint, and probes.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `POST /v1/embeddings` | [`routes::create_embeddings`] |
//! | `GET /v1/models` | [`routes::list_models`] |
//! | `POST /runsync` | [`routes::run_sync`] |
//! | `GET /health` | liveness |
//! | `GET /ready` | readiness, including the pool state |
//! | `GET /metrics` | Prometheus text |

pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;
pub mod telemetry;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::config::EngineConfig;
use crate::engine::EmbeddingEngine;
use crate::observe::set_engine_metrics;

pub use error::{ServerError, ServerResult};
pub use state::ServerState;

/// Build the router. Middleware runs outermost first: trace, request id,
/// request logging, CORS, timeout, body limit.
pub fn build_router(state: Arc<ServerState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(routes::health_check))
        .route("/ready", get(routes::readiness_check))
        .route("/metrics", get(routes::metrics))
        .route("/v1/embeddings", post(routes::create_embeddings))
        .route("/v1/models", get(routes::list_models))
        .route("/runsync", post(routes::run_sync))
        .fallback(routes::not_found)
        .layer(DefaultBodyLimit::max(state.config.max_body_size()))
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            state.config.timeout(),
        ))
        .layer(cors)
        .layer(from_fn(middleware::log_requests))
        .layer(from_fn(middleware::request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server and block until SIGTERM or Ctrl+C.
///
/// Initializes JSON logging, installs the Prometheus-backed metrics observer,
/// builds the engine from `config`, and stops the engine (closing the shared
/// download pool) once the listener has drained.
pub async fn start_server(config: EngineConfig) -> anyhow::Result<()> {
    telemetry::init_tracing(&config.server.log_level);

    let handle = if config.server.metrics_enabled {
        let handle = telemetry::prometheus_handle();
        if handle.is_some() {
            set_engine_metrics(Some(Arc::new(telemetry::PrometheusMetrics)));
        }
        handle
    } else {
        None
    };

    let engine = Arc::new(EmbeddingEngine::from_config(&config)?);
    let state = Arc::new(
        ServerState::new(config.server.clone(), Arc::clone(&engine)).with_metrics(handle),
    );
    let app = build_router(state);

    let addr: SocketAddr = config.server.socket_addr()?;
    tracing::info!(
        %addr,
        backend = engine.backend().name(),
        default_model = engine.default_model(),
        timeout_secs = config.server.timeout_secs,
        max_body_mb = config.server.max_body_size_mb,
        "starting mmembed server"
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.stop().await;
    set_engine_metrics(None);
    tracing::info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
