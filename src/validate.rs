//! Per-item validation: turn a classified item into a backend-ready payload.
//!
//! Any failure is annotated with the item's position so the batch error says
//! which element was bad.

use image::RgbImage;

use crate::error::{EmbedError, EmbedResult};
use crate::imaging::normalize_image;
use crate::modality::{EmbeddingInput, Modality};
use crate::pool::HttpPool;

/// A validated item, ready to hand to a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizedPayload {
    Text(String),
    Image(RgbImage),
}

impl NormalizedPayload {
    pub fn modality(&self) -> Modality {
        match self {
            NormalizedPayload::Text(_) => Modality::Text,
            NormalizedPayload::Image(_) => Modality::Image,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            NormalizedPayload::Text(s) => Some(s),
            NormalizedPayload::Image(_) => None,
        }
    }

    pub fn as_image(&self) -> Option<&RgbImage> {
        match self {
            NormalizedPayload::Image(img) => Some(img),
            NormalizedPayload::Text(_) => None,
        }
    }
}

pub fn validate_text_item(item: &EmbeddingInput) -> EmbedResult<NormalizedPayload> {
    item.to_text().map(NormalizedPayload::Text)
}

pub async fn validate_image_item(
    item: &EmbeddingInput,
    pool: Option<&HttpPool>,
) -> EmbedResult<NormalizedPayload> {
    normalize_image(item, pool).await.map(NormalizedPayload::Image)
}

/// Validate one item against its modality.
pub async fn validate_item(
    item: &EmbeddingInput,
    modality: Modality,
    index: usize,
    pool: Option<&HttpPool>,
) -> EmbedResult<NormalizedPayload> {
    let result = match modality {
        Modality::Text => validate_text_item(item),
        Modality::Image => validate_image_item(item, pool).await,
        Modality::Audio => Err(EmbedError::audio_not_implemented()),
    };
    result.map_err(|e| {
        tracing::debug!(index, modality = %modality, error = %e, "item rejected");
        e.at(index)
    })
}

/// Like [`validate_item`], for callers holding an untyped modality tag.
pub async fn validate_item_for_modality(
    item: &EmbeddingInput,
    modality: &str,
    index: usize,
    pool: Option<&HttpPool>,
) -> EmbedResult<NormalizedPayload> {
    let modality: Modality = modality.parse()?;
    validate_item(item, modality, index, pool).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use std::io::Cursor;

    fn png_data_uri() -> String {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([1, 2, 3]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(buf.into_inner())
        )
    }

    #[tokio::test]
    async fn text_passes_through() {
        let payload = validate_item(&"hello".into(), Modality::Text, 0, None)
            .await
            .unwrap();
        assert_eq!(payload, NormalizedPayload::Text("hello".into()));
        assert_eq!(payload.modality(), Modality::Text);
    }

    #[tokio::test]
    async fn url_forced_to_text_is_not_fetched() {
        let payload = validate_item(&"https://x/y.png".into(), Modality::Text, 0, None)
            .await
            .unwrap();
        assert_eq!(payload.as_text(), Some("https://x/y.png"));
    }

    #[tokio::test]
    async fn image_is_normalized() {
        let payload = validate_item(&png_data_uri().into(), Modality::Image, 0, None)
            .await
            .unwrap();
        assert_eq!(payload.as_image().unwrap().dimensions(), (2, 2));
    }

    #[tokio::test]
    async fn audio_always_fails_with_index() {
        let err = validate_item(&"song".into(), Modality::Audio, 4, None)
            .await
            .unwrap_err();
        assert_eq!(err.index(), Some(4));
        assert_eq!(err.kind(), &EmbedError::audio_not_implemented());
    }

    #[tokio::test]
    async fn bad_image_reports_index() {
        let err = validate_item(&"not an image".into(), Modality::Image, 2, None)
            .await
            .unwrap_err();
        assert_eq!(err.index(), Some(2));
        assert_eq!(err.error_type(), "DecodeError");
    }

    #[tokio::test]
    async fn tag_variant_rejects_unknown_modality() {
        let err = validate_item_for_modality(&"x".into(), "video", 0, None)
            .await
            .unwrap_err();
        assert_eq!(err, EmbedError::InvalidModality("video".into()));

        let ok = validate_item_for_modality(&"x".into(), "text", 0, None)
            .await
            .unwrap();
        assert_eq!(ok.as_text(), Some("x"));
    }
}
