// tests/semantic_index_test.rs
// Semantic index: pre-computation contract, cache behavior, thresholds

mod common;

use lumen_backend::memory::ConversationEvent;

#[tokio::test]
async fn unindexed_messages_never_match() {
    let (store, index, _) = common::semantic_index().await;
    let session = store
        .create_session("user-1", "Fresh", "llama3.2", None)
        .await
        .unwrap();

    store
        .append_message(
            &session.id,
            &ConversationEvent::user("database optimization strategies for sqlite"),
        )
        .await
        .unwrap();

    // No embedding persisted yet: search falls back to zero hits, not to
    // on-the-fly embedding
    let hits = index
        .search("database optimization", 5, "user-1", Some(0.0))
        .await
        .unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn indexed_messages_are_found() {
    let (store, index, _) = common::semantic_index().await;
    let session = store
        .create_session("user-1", "Indexed", "llama3.2", None)
        .await
        .unwrap();

    let content = "database optimization strategies for sqlite";
    let message_id = store
        .append_message(&session.id, &ConversationEvent::user(content))
        .await
        .unwrap();
    let indexed = index.index_message(message_id, &session.id, content).await.unwrap();
    assert!(indexed);

    // The hash embedder maps identical text to an identical vector, so the
    // exact query scores similarity 1.0
    let hits = index.search(content, 5, "user-1", Some(0.9)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].message_id, message_id);
    assert!(hits[0].similarity > 0.99);
}

#[tokio::test]
async fn short_messages_are_never_indexed() {
    let (store, index, _) = common::semantic_index().await;
    let session = store
        .create_session("user-1", "Short", "llama3.2", None)
        .await
        .unwrap();

    let message_id = store
        .append_message(&session.id, &ConversationEvent::user("ok"))
        .await
        .unwrap();
    let indexed = index.index_message(message_id, &session.id, "ok").await.unwrap();
    assert!(!indexed);

    let hits = index.search("ok", 5, "user-1", Some(0.0)).await.unwrap();
    assert!(hits.is_empty());
}

#[tokio::test]
async fn search_scope_is_per_user() {
    let (store, index, _) = common::semantic_index().await;

    let mine = store
        .create_session("user-1", "Mine", "llama3.2", None)
        .await
        .unwrap();
    let theirs = store
        .create_session("user-2", "Theirs", "llama3.2", None)
        .await
        .unwrap();

    let content = "shared topic about distributed systems";
    for (session, _user) in [(&mine, "user-1"), (&theirs, "user-2")] {
        let id = store
            .append_message(&session.id, &ConversationEvent::user(content))
            .await
            .unwrap();
        index.index_message(id, &session.id, content).await.unwrap();
    }

    let hits = index.search(content, 10, "user-1", Some(0.5)).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].session_id, mine.id);
}

#[tokio::test]
async fn identical_searches_return_identical_results() {
    let (store, index, _) = common::semantic_index().await;
    let session = store
        .create_session("user-1", "Cache", "llama3.2", None)
        .await
        .unwrap();

    for i in 0..5 {
        let content = format!("database optimization note number {i}");
        let id = store
            .append_message(&session.id, &ConversationEvent::user(content.clone()))
            .await
            .unwrap();
        index.index_message(id, &session.id, &content).await.unwrap();
    }

    let first = index
        .search("database optimization", 5, "user-1", None)
        .await
        .unwrap();
    let second = index
        .search("database optimization", 5, "user-1", None)
        .await
        .unwrap();

    let first_ids: Vec<i64> = first.iter().map(|h| h.message_id).collect();
    let second_ids: Vec<i64> = second.iter().map(|h| h.message_id).collect();
    assert_eq!(first_ids, second_ids);
    assert!(index.cache_entries() >= 1);
}

#[tokio::test]
async fn results_are_ordered_by_similarity() {
    let (store, index, _) = common::semantic_index().await;
    let session = store
        .create_session("user-1", "Ranked", "llama3.2", None)
        .await
        .unwrap();

    let exact = "rust borrow checker lifetimes";
    let exact_id = store
        .append_message(&session.id, &ConversationEvent::user(exact))
        .await
        .unwrap();
    index.index_message(exact_id, &session.id, exact).await.unwrap();

    let other = "completely unrelated cooking recipe for pancakes";
    let other_id = store
        .append_message(&session.id, &ConversationEvent::user(other))
        .await
        .unwrap();
    index.index_message(other_id, &session.id, other).await.unwrap();

    let hits = index.search(exact, 10, "user-1", Some(-1.0)).await.unwrap();
    assert!(!hits.is_empty());
    assert_eq!(hits[0].message_id, exact_id);
    for pair in hits.windows(2) {
        assert!(pair[0].similarity >= pair[1].similarity);
    }
}

#[tokio::test]
async fn limit_is_honored() {
    let (store, index, _) = common::semantic_index().await;
    let session = store
        .create_session("user-1", "Limit", "llama3.2", None)
        .await
        .unwrap();

    for i in 0..8 {
        let content = format!("memory allocation question variant {i}");
        let id = store
            .append_message(&session.id, &ConversationEvent::user(content.clone()))
            .await
            .unwrap();
        index.index_message(id, &session.id, &content).await.unwrap();
    }

    let hits = index
        .search("memory allocation question", 3, "user-1", Some(-1.0))
        .await
        .unwrap();
    assert_eq!(hits.len(), 3);
}
