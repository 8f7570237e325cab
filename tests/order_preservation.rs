//! Fan-out/fan-in ordering: results always line up with the input positions,
//! however the batch was split and whichever backend call finished first.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{RecordingBackend, TEST_MODEL, engine_with, png_data_uri};
use mmembed::{Detection, EmbeddingRequest, Modality};

fn indices(result: &mmembed::BatchResult) -> Vec<usize> {
    result.items.iter().map(|item| item.index).collect()
}

#[tokio::test]
async fn text_batch_keeps_order_and_counts_usage() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(backend.clone());

    let result = engine
        .embed(EmbeddingRequest::new(["a", "b", "c"]).modality("text"))
        .await
        .unwrap();

    assert_eq!(indices(&result), vec![0, 1, 2]);
    assert_eq!(result.usage.input_count, 3);
    assert_eq!(result.usage.total_count, 3);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(
        result.items[1].vector,
        backend.expected_text_vector(TEST_MODEL, "b")
    );
}

#[tokio::test]
async fn mixed_batch_splits_into_two_groups() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(backend.clone());
    let image = png_data_uri(3, 2);

    let result = engine
        .embed(EmbeddingRequest::new(["hello".to_string(), image]))
        .await
        .unwrap();

    assert_eq!(indices(&result), vec![0, 1]);
    let calls = backend.calls();
    assert_eq!(calls.len(), 2);
    let text = calls.iter().find(|c| c.modality == Modality::Text).unwrap();
    let images = calls.iter().find(|c| c.modality == Modality::Image).unwrap();
    assert_eq!(text.payloads, vec!["hello"]);
    assert_eq!(images.payloads, vec!["3x2"]);
    assert_eq!(
        result.items[0].vector,
        backend.expected_text_vector(TEST_MODEL, "hello")
    );
}

#[tokio::test]
async fn interleaved_batch_survives_out_of_order_completion() {
    // The text group finishes last; positions must still be restored.
    let backend =
        Arc::new(RecordingBackend::new().delay(Modality::Text, Duration::from_millis(80)));
    let engine = engine_with(backend.clone());

    let input = vec![
        "t0".to_string(),
        png_data_uri(1, 1),
        "t2".to_string(),
        png_data_uri(2, 2),
        png_data_uri(3, 3),
        "t5".to_string(),
    ];
    let result = engine.embed(EmbeddingRequest::new(input)).await.unwrap();

    assert_eq!(indices(&result), (0..6).collect::<Vec<_>>());
    for (pos, text) in [(0, "t0"), (2, "t2"), (5, "t5")] {
        assert_eq!(
            result.items[pos].vector,
            backend.expected_text_vector(TEST_MODEL, text),
            "position {pos}"
        );
    }

    let images = backend
        .calls()
        .into_iter()
        .find(|c| c.modality == Modality::Image)
        .unwrap();
    // Group members keep ascending index order.
    assert_eq!(images.payloads, vec!["1x1", "2x2", "3x3"]);
    assert_eq!(result.usage.input_count, 6);
}

#[tokio::test]
async fn empty_batch_makes_no_backend_call() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(backend.clone());

    let result = engine
        .embed(EmbeddingRequest::new(Vec::<String>::new()))
        .await
        .unwrap();

    assert!(result.items.is_empty());
    assert_eq!(result.usage.input_count, 0);
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn first_item_detection_sends_one_group() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(backend.clone());

    let result = engine
        .embed(
            EmbeddingRequest::new([png_data_uri(2, 2), png_data_uri(4, 4)])
                .detection(Detection::FirstItem),
        )
        .await
        .unwrap();

    assert_eq!(indices(&result), vec![0, 1]);
    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].modality, Modality::Image);
}

#[tokio::test]
async fn explicit_text_overrides_image_looking_items() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(backend.clone());

    engine
        .embed(EmbeddingRequest::new(["https://x/y.png", "plain"]).modality("text"))
        .await
        .unwrap();

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].payloads, vec!["https://x/y.png", "plain"]);
    assert_eq!(engine.resources().pools_created(), 0);
}

#[tokio::test]
async fn model_is_passed_through() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = engine_with(backend.clone());

    engine
        .embed(EmbeddingRequest::new(["x"]).model("jinaai/jina-clip-v1"))
        .await
        .unwrap();
    assert_eq!(backend.calls()[0].model, "jinaai/jina-clip-v1");
}
