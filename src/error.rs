//! Error types produced by the orchestration engine.
//!
//! Every failure the engine can report is a variant of [`EmbedError`]. The
//! variants mirror the taxonomy exposed on the wire (`error.type`), so callers
//! can branch on the kind without parsing messages.
//!
//! # Error Categories
//!
//! | Error | Wire type | Code | Description |
//! |-------|-----------|------|-------------|
//! | [`InvalidModality`](EmbedError::InvalidModality) | `InvalidModality` | 400 | Unrecognized modality tag |
//! | [`LengthMismatch`](EmbedError::LengthMismatch) | `LengthMismatch` | 400 | Items and modalities differ in length |
//! | [`Conversion`](EmbedError::Conversion) | `ConversionError` | 400 | Item cannot be turned into text |
//! | [`Download`](EmbedError::Download) | `DownloadError` | 400 | Image URL could not be fetched |
//! | [`Decode`](EmbedError::Decode) | `DecodeError` | 400 | Bytes or base64 are not an image |
//! | [`NotImplemented`](EmbedError::NotImplemented) | `NotImplemented` | 400 | Audio requested |
//! | [`BackendUnavailable`](EmbedError::BackendUnavailable) | `BackendUnavailable` | 400 | Backend rejected the model/modality |
//! | [`InvalidRequest`](EmbedError::InvalidRequest) | `InvalidRequest` | 400 | Malformed job envelope |
//! | [`Internal`](EmbedError::Internal) | `Internal` | 500 | Anything unanticipated |
//!
//! Item-level failures are wrapped in [`EmbedError::Item`] so the batch error
//! still names the offending position. The wrapper is transparent for
//! [`error_type`](EmbedError::error_type) and [`status_code`](EmbedError::status_code).
//!
//! ```rust
//! use mmembed::EmbedError;
//!
//! let err = EmbedError::Decode("not an image".into()).at(3);
//! assert_eq!(err.index(), Some(3));
//! assert_eq!(err.error_type(), "DecodeError");
//! assert_eq!(err.status_code(), 400);
//! assert_eq!(err.to_string(), "Item at index 3: not an image");
//! ```
use thiserror::Error;

use crate::modality::Modality;

/// Result alias used across the crate.
pub type EmbedResult<T> = Result<T, EmbedError>;

/// Message attached to every audio request.
pub const AUDIO_NOT_IMPLEMENTED: &str =
    "Audio modality is not yet implemented. Currently supported modalities: 'text', 'image'";

/// Errors surfaced by classification, validation, dispatch and merge.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EmbedError {
    /// The modality tag is not one of `text`, `image`, `audio`.
    #[error(
        "Invalid modality: '{0}'. Supported modalities: 'text', 'image', 'audio' (not yet implemented)"
    )]
    InvalidModality(String),

    /// Parallel item/modality sequences differ in length.
    #[error("items and modalities must have the same length (got {items} items, {modalities} modalities)")]
    LengthMismatch { items: usize, modalities: usize },

    /// A text item could not be stringified.
    #[error("{0}")]
    Conversion(String),

    /// Image URL fetch failed (transport error, timeout, non-2xx).
    #[error("{0}")]
    Download(String),

    /// Bytes or base64 payload could not be decoded as an image.
    #[error("{0}")]
    Decode(String),

    /// Audio modality was requested.
    #[error("{0}")]
    NotImplemented(String),

    /// The backend does not serve the requested model/modality combination.
    #[error("{0}")]
    BackendUnavailable(String),

    /// The request envelope itself is malformed.
    #[error("{0}")]
    InvalidRequest(String),

    /// Unanticipated failure. Carries a human-readable summary only.
    #[error("Internal error while processing embeddings: {0}")]
    Internal(String),

    /// An item-level failure annotated with the item's position in the batch.
    #[error("Item at index {index}: {source}")]
    Item {
        index: usize,
        source: Box<EmbedError>,
    },
}

impl EmbedError {
    /// The fixed audio rejection.
    pub fn audio_not_implemented() -> Self {
        EmbedError::NotImplemented(AUDIO_NOT_IMPLEMENTED.to_string())
    }

    /// Rejection for a model that cannot embed the given modality, with a
    /// suggestion for what to use instead.
    pub fn unsupported_modality(model: &str, modality: Modality) -> Self {
        let message = match modality {
            Modality::Image => format!(
                "Model '{model}' does not support image embeddings. \
                 Please use a multimodal model (e.g., 'jinaai/jina-clip-v1') \
                 or use modality='text' instead."
            ),
            other => format!(
                "Model '{model}' is not deployed or does not support {other} embeddings."
            ),
        };
        EmbedError::BackendUnavailable(message)
    }

    /// Rejection for a model the backend does not serve at all.
    pub fn model_not_available(model: &str, available: &[String]) -> Self {
        EmbedError::BackendUnavailable(format!(
            "Model '{model}' is not available. Available models: {}",
            available.join(", ")
        ))
    }

    /// Attach the item position. Already-annotated errors keep their original index.
    pub fn at(self, index: usize) -> Self {
        match self {
            EmbedError::Item { .. } => self,
            other => EmbedError::Item {
                index,
                source: Box::new(other),
            },
        }
    }

    /// Position of the failing item, if the error is item-level.
    pub fn index(&self) -> Option<usize> {
        match self {
            EmbedError::Item { index, .. } => Some(*index),
            _ => None,
        }
    }

    /// The underlying error with any index annotation peeled off.
    pub fn kind(&self) -> &EmbedError {
        match self {
            EmbedError::Item { source, .. } => source.kind(),
            other => other,
        }
    }

    /// Taxonomy name surfaced as `error.type`.
    pub fn error_type(&self) -> &'static str {
        match self.kind() {
            EmbedError::InvalidModality(_) => "InvalidModality",
            EmbedError::LengthMismatch { .. } => "LengthMismatch",
            EmbedError::Conversion(_) => "ConversionError",
            EmbedError::Download(_) => "DownloadError",
            EmbedError::Decode(_) => "DecodeError",
            EmbedError::NotImplemented(_) => "NotImplemented",
            EmbedError::BackendUnavailable(_) => "BackendUnavailable",
            EmbedError::InvalidRequest(_) => "InvalidRequest",
            EmbedError::Internal(_) | EmbedError::Item { .. } => "Internal",
        }
    }

    /// Status code surfaced as `error.code`.
    pub fn status_code(&self) -> u16 {
        if self.is_internal() { 500 } else { 400 }
    }

    /// Whether this is a server-side failure rather than a caller mistake.
    pub fn is_internal(&self) -> bool {
        matches!(self.kind(), EmbedError::Internal(_))
    }
}
