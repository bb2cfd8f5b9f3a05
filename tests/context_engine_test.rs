// tests/context_engine_test.rs
// Vectorization engine: queueing, drops, retrieval, pruning, shutdown

mod common;

use std::sync::Arc;
use std::time::Duration;

use lumen_backend::config::ContextEngineConfig;
use lumen_backend::context_engine::ContextEngine;
use serde_json::json;

async fn engine_with(config: ContextEngineConfig) -> Arc<ContextEngine> {
    let embedder = common::embedder().await;
    Arc::new(ContextEngine::start(embedder, &config))
}

/// Poll until the queue drains or the deadline passes.
async fn wait_for_processed(engine: &ContextEngine, expected: u64) {
    for _ in 0..200 {
        if engine.stats().processed_count >= expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "engine never processed {expected} jobs (stats: {:?})",
        engine.stats()
    );
}

#[tokio::test]
async fn preserve_vectorizes_in_background() {
    let engine = engine_with(common::engine_config()).await;

    let accepted = engine.preserve(
        "session-1",
        &json!({ "user_message": "hello", "assistant_response": "hi" }),
        None,
    );
    assert!(accepted);

    wait_for_processed(&engine, 1).await;

    let vector = engine.get_vector("session-1").expect("vector stored");
    assert!(!vector.is_empty());

    let stats = engine.stats();
    assert_eq!(stats.sessions_stored, 1);
    assert_eq!(stats.processed_count, 1);
    assert_eq!(stats.error_count, 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn search_similar_finds_preserved_contexts() {
    let engine = engine_with(common::engine_config()).await;

    engine.preserve(
        "session-a",
        &json!({ "topic": "database indexing strategies" }),
        Some(json!({ "model": "llama3.2" })),
    );
    engine.preserve(
        "session-b",
        &json!({ "topic": "sourdough bread recipes" }),
        None,
    );

    wait_for_processed(&engine, 2).await;

    // The hash embedder is deterministic, so the exact flattened payload
    // scores 1.0 against itself
    let results = engine
        .search_similar(r#"{"topic":"database indexing strategies"}"#, 5, 0.9)
        .await;
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].session_id, "session-a");
    assert_eq!(results[0].metadata["model"], "llama3.2");

    engine.shutdown().await;
}

#[tokio::test]
async fn same_session_overwrites_its_vector() {
    let engine = engine_with(common::engine_config()).await;

    engine.preserve("session-1", &json!({ "v": 1 }), None);
    wait_for_processed(&engine, 1).await;
    let first = engine.get_vector("session-1").unwrap();

    engine.preserve("session-1", &json!({ "v": 2 }), None);
    wait_for_processed(&engine, 2).await;
    let second = engine.get_vector("session-1").unwrap();

    assert_ne!(first, second);
    assert_eq!(engine.stats().sessions_stored, 1);

    engine.shutdown().await;
}

#[tokio::test]
async fn full_queue_drops_without_blocking() {
    // One worker and a tiny queue so submissions outrun the drain
    let engine = engine_with(ContextEngineConfig {
        workers: 1,
        retention_days: 30.0,
        queue_capacity: 1,
        shutdown_timeout_secs: 5,
    })
    .await;

    let mut accepted = 0;
    let mut dropped = 0;
    for i in 0..200 {
        if engine.preserve(&format!("session-{i}"), &json!({ "i": i }), None) {
            accepted += 1;
        } else {
            dropped += 1;
        }
    }

    // Submission never blocks; under this load at least one job must drop
    assert!(dropped > 0, "expected drops with a capacity-1 queue");
    assert_eq!(engine.stats().dropped_count, dropped);
    assert!(accepted > 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn prune_removes_only_old_vectors() {
    let engine = engine_with(common::engine_config()).await;

    engine.preserve("session-1", &json!({ "x": 1 }), None);
    wait_for_processed(&engine, 1).await;

    // Nothing is older than a day
    assert_eq!(engine.prune_older_than(1.0), 0);
    assert_eq!(engine.stats().sessions_stored, 1);

    // Zero and negative day arguments are no-ops
    assert_eq!(engine.prune_older_than(0.0), 0);

    engine.shutdown().await;
}

#[tokio::test]
async fn shutdown_terminates_workers_with_queued_jobs() {
    let engine = engine_with(ContextEngineConfig {
        workers: 2,
        retention_days: 30.0,
        queue_capacity: 256,
        shutdown_timeout_secs: 5,
    })
    .await;

    for i in 0..50 {
        engine.preserve(&format!("session-{i}"), &json!({ "i": i }), None);
    }

    // Workers stop on sentinel reception even with the queue non-empty
    engine.shutdown().await;
}

#[tokio::test]
async fn stats_report_configuration() {
    let engine = engine_with(ContextEngineConfig {
        workers: 3,
        retention_days: 7.0,
        queue_capacity: 16,
        shutdown_timeout_secs: 5,
    })
    .await;

    let stats = engine.stats();
    assert_eq!(stats.workers, 3);
    assert!((stats.retention_days - 7.0).abs() < 1e-9);
    assert_eq!(stats.sessions_stored, 0);

    engine.shutdown().await;
}
