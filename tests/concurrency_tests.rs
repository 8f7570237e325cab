//! Concurrency: many batches against one engine share one pool and never mix results.

mod common;

use std::sync::Arc;

use common::{RecordingBackend, TEST_MODEL, engine_with, spawn_image_server};
use mmembed::EmbeddingRequest;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_batches_keep_their_own_order() {
    let backend = Arc::new(RecordingBackend::new());
    let engine = Arc::new(engine_with(backend.clone()));

    let handles: Vec<_> = (0..16)
        .map(|batch| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move {
                let input: Vec<String> = (0..5).map(|i| format!("batch-{batch}-item-{i}")).collect();
                let result = engine
                    .embed(EmbeddingRequest::new(input.clone()))
                    .await
                    .unwrap();
                (input, result)
            })
        })
        .collect();

    for handle in handles {
        let (input, result) = handle.await.unwrap();
        assert_eq!(result.len(), input.len());
        for (pos, text) in input.iter().enumerate() {
            assert_eq!(result.items[pos].index, pos);
            assert_eq!(
                result.items[pos].vector,
                backend.expected_text_vector(TEST_MODEL, text)
            );
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_image_requests_create_one_pool() {
    let server = spawn_image_server().await;
    let engine = Arc::new(engine_with(Arc::new(RecordingBackend::new())));

    let handles: Vec<_> = (0..12)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let url = server.url("/cat.png");
            tokio::spawn(async move { engine.embed(EmbeddingRequest::new([url])).await })
        })
        .collect();

    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    assert_eq!(engine.resources().pools_created(), 1);
}

#[tokio::test]
async fn stop_is_idempotent_under_concurrency() {
    let engine = Arc::new(engine_with(Arc::new(RecordingBackend::new())));
    engine.start().await.unwrap();

    let stops: Vec<_> = (0..8)
        .map(|_| {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.stop().await })
        })
        .collect();
    for stop in stops {
        stop.await.unwrap();
    }
    assert!(engine.resources().current().await.is_none());
    assert_eq!(engine.resources().pools_created(), 1);
}
