//! Modality-aware embedding orchestration.
//!
//! `mmembed` takes a batch of heterogeneous items (free text, image URLs,
//! base64 or data-URI images, raw image bytes, decoded images), works out
//! each item's modality, validates and normalizes it, sends one backend call
//! per modality group concurrently, and returns vectors in exactly the input
//! order.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use mmembed::{EmbeddingEngine, EmbeddingRequest, ResourceManager, StubBackend};
//! use mmembed::config::HttpPoolConfig;
//!
//! # async fn run() -> Result<(), mmembed::EmbedError> {
//! let engine = EmbeddingEngine::new(
//!     Arc::new(StubBackend::new(512)),
//!     Arc::new(ResourceManager::new(HttpPoolConfig::default())),
//!     "patrickjohncyh/fashion-clip",
//! );
//! let batch = engine
//!     .embed(EmbeddingRequest::new(["a red dress", "https://cdn.example.com/dress.png"]))
//!     .await?;
//! assert_eq!(batch.items[1].index, 1);
//! engine.stop().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`modality`]: input items and the pure classifier
//! - [`imaging`]: URL download, base64/data-URI decoding, RGB normalization
//! - [`validate`]: per-item validation with index attribution
//! - [`partition`], [`dispatch`], [`merge`]: the fan-out/fan-in core
//! - [`pool`]: the shared HTTP client and its lifecycle
//! - [`backend`]: the backend trait plus Infinity and stub adapters
//! - [`job`]: serverless job envelopes
//! - `server` (feature `server`): the axum HTTP surface

pub mod backend;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod imaging;
pub mod job;
pub mod merge;
pub mod modality;
pub mod observe;
pub mod partition;
pub mod pool;
pub mod response;
pub mod validate;

#[cfg(feature = "server")]
pub mod server;

pub use backend::{BackendOutput, EmbeddingBackend, InfinityBackend, StubBackend, build_backend};
pub use crate::config::{BackendConfig, BackendKind, ConfigError, EngineConfig, HttpPoolConfig, ServerConfig};
pub use dispatch::{GroupResult, dispatch};
pub use engine::{Detection, EmbeddingEngine, EmbeddingRequest};
pub use error::{EmbedError, EmbedResult};
pub use imaging::{decode_base64, decode_bytes, download_image, ensure_rgb, normalize_image};
pub use job::{JobRequest, handle_job, parse_job};
pub use merge::{BatchResult, EmbeddingResultItem, Usage, merge};
pub use modality::{
    EmbeddingInput, Modality, classify, classify_batch_uniform, classify_per_item, parse_modality,
};
pub use observe::{EngineMetrics, set_engine_metrics};
pub use partition::{ModalityGroup, Partition, partition};
pub use pool::{HttpPool, ResourceManager};
pub use response::{EmbeddingResponse, ErrorResponse, ModelList};
pub use validate::{NormalizedPayload, validate_item, validate_item_for_modality};
