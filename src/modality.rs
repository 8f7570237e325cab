//! Input items and modality classification.
//!
//! Classification is a pure function of the item and an optional explicit
//! override: no I/O, no failures. Two batch entry points exist on purpose:
//!
//! - [`classify_batch_uniform`] looks at the first element only and applies the
//!   result to the whole batch.
//! - [`classify_per_item`] classifies every element independently, which is
//!   what mixed text/image batches need.

use std::fmt;
use std::str::FromStr;

use bytes::Bytes;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::EmbedError;

/// Extensions that mark an `http(s)://` string as an image reference.
pub const IMAGE_EXTENSIONS: [&str; 9] = [
    ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".webp", ".svg", ".tiff", ".ico",
];

/// Input category that decides which backend path handles an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
    /// Recognized but never served; always yields `NotImplemented`.
    Audio,
}

impl Modality {
    /// Modalities the engine can actually embed.
    pub const SUPPORTED: [Modality; 2] = [Modality::Text, Modality::Image];

    pub fn as_str(self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
            Modality::Audio => "audio",
        }
    }

    pub fn is_supported(self) -> bool {
        Self::SUPPORTED.contains(&self)
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Modality {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Modality::Text),
            "image" => Ok(Modality::Image),
            "audio" => Ok(Modality::Audio),
            other => Err(EmbedError::InvalidModality(other.to_string())),
        }
    }
}

/// Parse an optional caller-supplied modality tag. Empty strings count as absent.
pub fn parse_modality(tag: Option<&str>) -> Result<Option<Modality>, EmbedError> {
    match tag {
        None => Ok(None),
        Some(t) if t.is_empty() => Ok(None),
        Some(t) => t.parse().map(Some),
    }
}

/// One caller-supplied item. Closed set: anything else is rejected at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingInput {
    /// Free text, an image URL, or a base64/data-URI image.
    Text(String),
    /// Encoded image bytes (PNG, JPEG, ...).
    Bytes(Bytes),
    /// An already-decoded image.
    Image(DynamicImage),
}

impl EmbeddingInput {
    /// Short label used in logs and error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            EmbeddingInput::Text(_) => "text",
            EmbeddingInput::Bytes(_) => "bytes",
            EmbeddingInput::Image(_) => "image",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EmbeddingInput::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Best-effort conversion to text. Bytes must be valid UTF-8; decoded
    /// images have no textual form.
    pub fn to_text(&self) -> Result<String, EmbedError> {
        match self {
            EmbeddingInput::Text(s) => Ok(s.clone()),
            EmbeddingInput::Bytes(b) => String::from_utf8(b.to_vec()).map_err(|_| {
                EmbedError::Conversion("Cannot convert item to text: bytes are not valid UTF-8".into())
            }),
            EmbeddingInput::Image(_) => Err(EmbedError::Conversion(
                "Cannot convert item to text: item is a decoded image".into(),
            )),
        }
    }

    /// Build an item from one JSON array element. Strings pass through, numbers
    /// and booleans are stringified, everything else is rejected.
    pub fn from_json(value: &Value) -> Result<Self, EmbedError> {
        match value {
            Value::String(s) => Ok(EmbeddingInput::Text(s.clone())),
            Value::Number(n) => Ok(EmbeddingInput::Text(n.to_string())),
            Value::Bool(b) => Ok(EmbeddingInput::Text(b.to_string())),
            Value::Null => Err(EmbedError::Conversion(
                "Cannot convert item to text: null".into(),
            )),
            Value::Array(_) => Err(EmbedError::Conversion(
                "Cannot convert item to text: nested array".into(),
            )),
            Value::Object(_) => Err(EmbedError::Conversion(
                "Cannot convert item to text: object".into(),
            )),
        }
    }

    /// Accept either a single JSON item or an array of them.
    pub fn batch_from_json(value: &Value) -> Result<Vec<Self>, EmbedError> {
        match value {
            Value::Array(values) => values
                .iter()
                .enumerate()
                .map(|(idx, v)| Self::from_json(v).map_err(|e| e.at(idx)))
                .collect(),
            single => Ok(vec![Self::from_json(single)?]),
        }
    }
}

impl From<&str> for EmbeddingInput {
    fn from(value: &str) -> Self {
        EmbeddingInput::Text(value.to_string())
    }
}

impl From<String> for EmbeddingInput {
    fn from(value: String) -> Self {
        EmbeddingInput::Text(value)
    }
}

impl From<Vec<u8>> for EmbeddingInput {
    fn from(value: Vec<u8>) -> Self {
        EmbeddingInput::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for EmbeddingInput {
    fn from(value: Bytes) -> Self {
        EmbeddingInput::Bytes(value)
    }
}

impl From<DynamicImage> for EmbeddingInput {
    fn from(value: DynamicImage) -> Self {
        EmbeddingInput::Image(value)
    }
}

impl From<RgbImage> for EmbeddingInput {
    fn from(value: RgbImage) -> Self {
        EmbeddingInput::Image(DynamicImage::ImageRgb8(value))
    }
}

/// Whether a string refers to an image by data-URI prefix or by URL extension.
///
/// The extension test is a case-insensitive substring match over the whole
/// string, so `https://cdn/x.png?w=200` and `https://host/a.jpg/view` both count.
pub fn looks_like_image(text: &str) -> bool {
    if text.starts_with("data:image/") {
        return true;
    }
    if text.starts_with("http://") || text.starts_with("https://") {
        let lower = text.to_ascii_lowercase();
        return IMAGE_EXTENSIONS.iter().any(|ext| lower.contains(ext));
    }
    false
}

/// Classify one item. An explicit modality always wins, without checking content.
pub fn classify(item: &EmbeddingInput, explicit: Option<Modality>) -> Modality {
    if let Some(modality) = explicit {
        return modality;
    }
    match item {
        EmbeddingInput::Text(text) if looks_like_image(text) => Modality::Image,
        EmbeddingInput::Text(_) => Modality::Text,
        EmbeddingInput::Bytes(_) | EmbeddingInput::Image(_) => Modality::Image,
    }
}

/// One modality for the whole batch, decided by the first element. Empty
/// batches are `Text`.
pub fn classify_batch_uniform(items: &[EmbeddingInput], explicit: Option<Modality>) -> Modality {
    if let Some(modality) = explicit {
        return modality;
    }
    items
        .first()
        .map(|first| classify(first, None))
        .unwrap_or(Modality::Text)
}

/// Classify every element independently.
pub fn classify_per_item(items: &[EmbeddingInput]) -> Vec<Modality> {
    items.iter().map(|item| classify(item, None)).collect()
}
