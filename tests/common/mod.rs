//! Shared fixtures: synthetic images, a recording backend and a local image server.

#![allow(dead_code)]

use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Redirect};
use axum::routing::get;
use base64::Engine as _;
use image::{ImageFormat, Rgb, RgbImage};

use mmembed::config::HttpPoolConfig;
use mmembed::{
    BackendOutput, EmbedError, EmbedResult, EmbeddingBackend, EmbeddingEngine, Modality,
    ResourceManager, StubBackend,
};

pub const TEST_MODEL: &str = "test-model";

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([200, 40, 90]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).unwrap();
    buf.into_inner()
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb([10, 120, 250]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Jpeg).unwrap();
    buf.into_inner()
}

pub fn png_data_uri(width: u32, height: u32) -> String {
    format!(
        "data:image/png;base64,{}",
        base64::engine::general_purpose::STANDARD.encode(png_bytes(width, height))
    )
}

/// One backend call as seen by [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    pub modality: Modality,
    pub model: String,
    pub items: usize,
    /// Text payloads, or image dimensions rendered as `WxH`.
    pub payloads: Vec<String>,
}

/// Wraps [`StubBackend`], records every call, and can delay or fail one modality.
pub struct RecordingBackend {
    inner: StubBackend,
    calls: Mutex<Vec<Call>>,
    delay: Mutex<Option<(Modality, Duration)>>,
    fail: Mutex<Option<(Modality, EmbedError)>>,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self {
            inner: StubBackend::new(8),
            calls: Mutex::new(Vec::new()),
            delay: Mutex::new(None),
            fail: Mutex::new(None),
        }
    }

    pub fn delay(self, modality: Modality, by: Duration) -> Self {
        *self.delay.lock().unwrap() = Some((modality, by));
        self
    }

    pub fn fail(self, modality: Modality, err: EmbedError) -> Self {
        *self.fail.lock().unwrap() = Some((modality, err));
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn expected_text_vector(&self, model: &str, text: &str) -> Vec<f32> {
        self.inner.vector_for(model, text.as_bytes())
    }

    async fn before(&self, modality: Modality) -> EmbedResult<()> {
        let delay = *self.delay.lock().unwrap();
        if let Some((m, by)) = delay {
            if m == modality {
                tokio::time::sleep(by).await;
            }
        }
        let fail = self.fail.lock().unwrap().clone();
        match fail {
            Some((m, err)) if m == modality => Err(err),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EmbeddingBackend for RecordingBackend {
    fn name(&self) -> &str {
        "recording"
    }

    fn models(&self) -> &[String] {
        &[]
    }

    async fn embed_text(&self, model: &str, texts: &[String]) -> EmbedResult<BackendOutput> {
        self.calls.lock().unwrap().push(Call {
            modality: Modality::Text,
            model: model.to_string(),
            items: texts.len(),
            payloads: texts.to_vec(),
        });
        self.before(Modality::Text).await?;
        self.inner.embed_text(model, texts).await
    }

    async fn embed_images(&self, model: &str, images: &[RgbImage]) -> EmbedResult<BackendOutput> {
        self.calls.lock().unwrap().push(Call {
            modality: Modality::Image,
            model: model.to_string(),
            items: images.len(),
            payloads: images
                .iter()
                .map(|img| format!("{}x{}", img.width(), img.height()))
                .collect(),
        });
        self.before(Modality::Image).await?;
        self.inner.embed_images(model, images).await
    }
}

pub fn engine_with(backend: Arc<dyn EmbeddingBackend>) -> EmbeddingEngine {
    engine_with_pool(backend, HttpPoolConfig::default())
}

pub fn engine_with_pool(
    backend: Arc<dyn EmbeddingBackend>,
    pool: HttpPoolConfig,
) -> EmbeddingEngine {
    EmbeddingEngine::new(backend, Arc::new(ResourceManager::new(pool)), TEST_MODEL)
}

/// Request counters; `max_in_flight` is tracked by the `/tracked/{n}` route.
#[derive(Debug, Default)]
pub struct ServerStats {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub requests: AtomicUsize,
}

/// A local HTTP server serving synthetic images.
pub struct ImageServer {
    pub addr: SocketAddr,
    pub stats: Arc<ServerStats>,
}

impl ImageServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

async fn cat_png(State(stats): State<Arc<ServerStats>>) -> impl IntoResponse {
    stats.requests.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], png_bytes(4, 3))
}

async fn dog_jpg(State(stats): State<Arc<ServerStats>>) -> impl IntoResponse {
    stats.requests.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/jpeg")], jpeg_bytes(6, 5))
}

async fn garbage_png(State(stats): State<Arc<ServerStats>>) -> impl IntoResponse {
    stats.requests.fetch_add(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], b"this is not an image".to_vec())
}

async fn missing_png(State(stats): State<Arc<ServerStats>>) -> impl IntoResponse {
    stats.requests.fetch_add(1, Ordering::SeqCst);
    StatusCode::NOT_FOUND
}

async fn tracked_png(State(stats): State<Arc<ServerStats>>) -> impl IntoResponse {
    stats.requests.fetch_add(1, Ordering::SeqCst);
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(50)).await;
    stats.in_flight.fetch_sub(1, Ordering::SeqCst);
    ([(header::CONTENT_TYPE, "image/png")], png_bytes(2, 2))
}

async fn stalled_png() -> impl IntoResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    ([(header::CONTENT_TYPE, "image/png")], png_bytes(2, 2))
}

/// Spawn the image server on an ephemeral port.
pub async fn spawn_image_server() -> ImageServer {
    let stats = Arc::new(ServerStats::default());
    let app = Router::new()
        .route("/cat.png", get(cat_png))
        .route("/dog.jpg", get(dog_jpg))
        .route("/garbage.png", get(garbage_png))
        .route("/missing.png", get(missing_png))
        .route("/tracked/{n}", get(tracked_png))
        .route("/stalled.png", get(stalled_png))
        .route("/moved.png", get(|| async { Redirect::temporary("/cat.png") }))
        .with_state(Arc::clone(&stats));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    ImageServer { addr, stats }
}
