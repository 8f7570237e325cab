//! Image normalization: every accepted image form ends up as an 8-bit RGB bitmap.
//!
//! Accepted forms, checked in this order:
//!
//! | Input | Handling |
//! |-------|----------|
//! | decoded image | converted to RGB (alpha dropped, palette expanded) |
//! | raw bytes | decoded by content sniffing |
//! | `http(s)://` string | downloaded through the shared [`HttpPool`], then decoded |
//! | `data:image/<fmt>;base64,<payload>` | payload base64-decoded, then decoded |
//! | any other string | treated as bare base64 |

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{DynamicImage, ImageFormat, RgbImage};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{EmbedError, EmbedResult};
use crate::modality::EmbeddingInput;
use crate::pool::HttpPool;

static DATA_URI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^data:image/[^;]+;base64,(.+)$").expect("data URI pattern compiles")
});

/// Convert any decoded image to RGB.
pub fn ensure_rgb(image: DynamicImage) -> RgbImage {
    match image {
        DynamicImage::ImageRgb8(rgb) => rgb,
        other => other.to_rgb8(),
    }
}

/// Decode encoded image bytes (format sniffed from content).
pub fn decode_bytes(bytes: &[u8]) -> EmbedResult<RgbImage> {
    image::load_from_memory(bytes)
        .map(ensure_rgb)
        .map_err(|e| EmbedError::Decode(format!("Failed to decode image bytes: {e}")))
}

/// Decode a data URI or bare base64 string.
pub fn decode_base64(text: &str) -> EmbedResult<RgbImage> {
    let payload = if text.starts_with("data:") {
        DATA_URI
            .captures(text)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str())
            .ok_or_else(invalid_image_string)?
    } else {
        text
    };

    let bytes = STANDARD
        .decode(payload.trim())
        .map_err(|_| invalid_image_string())?;
    decode_bytes(&bytes).map_err(|_| invalid_image_string())
}

fn invalid_image_string() -> EmbedError {
    EmbedError::Decode(
        "String is not a valid image format. Expected URL, base64, or data URI".into(),
    )
}

pub fn is_url(text: &str) -> bool {
    text.starts_with("http://") || text.starts_with("https://")
}

/// Download through the shared pool and decode.
pub async fn download_image(url: &str, pool: &HttpPool) -> EmbedResult<RgbImage> {
    let bytes = pool.fetch(url).await?;
    tracing::debug!(url, bytes = bytes.len(), "downloaded image");
    decode_bytes(&bytes).map_err(|e| {
        EmbedError::Decode(format!("Failed to decode image from URL: {url} ({e})"))
    })
}

/// Normalize one image item. `pool` is only consulted for URL strings.
pub async fn normalize_image(
    item: &EmbeddingInput,
    pool: Option<&HttpPool>,
) -> EmbedResult<RgbImage> {
    match item {
        EmbeddingInput::Image(image) => Ok(ensure_rgb(image.clone())),
        EmbeddingInput::Bytes(bytes) => decode_bytes(bytes),
        EmbeddingInput::Text(text) if is_url(text) => match pool {
            Some(pool) => download_image(text, pool).await,
            None => Err(EmbedError::Download(
                "HTTP client required for downloading images from URLs".into(),
            )),
        },
        EmbeddingInput::Text(text) => decode_base64(text),
    }
}

/// PNG-encode an image and wrap it in a `data:image/png;base64,` URI.
pub fn encode_png_data_uri(image: &RgbImage) -> EmbedResult<String> {
    let mut buf = Cursor::new(Vec::new());
    image
        .write_to(&mut buf, ImageFormat::Png)
        .map_err(|e| EmbedError::Internal(format!("failed to encode image as PNG: {e}")))?;
    Ok(format!(
        "data:image/png;base64,{}",
        STANDARD.encode(buf.into_inner())
    ))
}
