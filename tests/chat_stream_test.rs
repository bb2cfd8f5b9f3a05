// tests/chat_stream_test.rs
// End-to-end orchestrator runs against a mock inference server:
// auto-titling, ephemeral RAG injection, mid-stream failure semantics

mod common;

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::routing::{get, post};
use futures_util::StreamExt;
use lumen_backend::chat::{ChatOrchestrator, ChatStreamEvent, chunk_document};
use lumen_backend::config::UpstreamConfig;
use lumen_backend::context_engine::ContextEngine;
use parking_lot::Mutex;
use serde_json::{Value, json};

/// Captured bodies of every /api/chat call the mock received.
type CapturedRequests = Arc<Mutex<Vec<Value>>>;

/// Mock inference server speaking the NDJSON chat protocol. `fail` makes
/// the stream error mid-response.
async fn spawn_mock_upstream(fail_mid_stream: bool) -> (String, CapturedRequests) {
    let captured: CapturedRequests = Arc::new(Mutex::new(Vec::new()));
    let captured_for_handler = Arc::clone(&captured);

    let app = axum::Router::new()
        .route(
            "/api/tags",
            get(|| async {
                Json(json!({ "models": [{ "name": "llama3.2", "size": 1, "modified_at": "" }] }))
            }),
        )
        .route(
            "/api/chat",
            post(move |State(captured): State<CapturedRequests>, Json(body): Json<Value>| async move {
                captured.lock().push(body);

                let lines = if fail_mid_stream {
                    vec![
                        json!({ "message": { "role": "assistant", "content": "partial " } }).to_string(),
                        json!({ "error": "model crashed" }).to_string(),
                    ]
                } else {
                    vec![
                        json!({ "message": { "role": "assistant", "content": "Hello " } }).to_string(),
                        json!({ "message": { "role": "assistant", "content": "there!" } }).to_string(),
                        json!({ "done": true }).to_string(),
                    ]
                };

                let body = lines.join("\n") + "\n";
                (
                    [("content-type", "application/x-ndjson")],
                    body,
                )
            }),
        )
        .with_state(captured_for_handler);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}"), captured)
}

async fn orchestrator_against(
    base_url: &str,
) -> (
    ChatOrchestrator,
    Arc<lumen_backend::memory::ChatMemoryStore>,
    Arc<lumen_backend::auth::AuthFabric>,
    Arc<lumen_backend::embedding::Embedder>,
) {
    let (store, semantic, embedder) = common::semantic_index().await;
    let fabric = common::fabric().await;
    let engine = Arc::new(ContextEngine::start(
        Arc::clone(&embedder),
        &common::engine_config(),
    ));

    let upstream_config = UpstreamConfig {
        base_url: base_url.to_string(),
        default_model: "llama3.2".to_string(),
        request_timeout_secs: 10,
    };

    let chat = ChatOrchestrator::new(
        Arc::clone(&store),
        semantic,
        Arc::clone(&embedder),
        engine,
        Arc::clone(&fabric),
        &upstream_config,
        &common::memory_config(),
        &common::semantic_config(),
    );

    (chat, store, fabric, embedder)
}

async fn collect(
    stream: impl futures_util::Stream<Item = ChatStreamEvent>,
) -> Vec<ChatStreamEvent> {
    futures_util::pin_mut!(stream);
    let mut events = Vec::new();
    while let Some(event) = stream.next().await {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn first_message_auto_titles_the_session() {
    let (base_url, _) = spawn_mock_upstream(false).await;
    let (chat, store, _, _) = orchestrator_against(&base_url).await;

    let session = store
        .create_session("user-1", "New Chat", "llama3.2", None)
        .await
        .unwrap();
    assert_eq!(session.message_count, 0);

    let stream = chat
        .send_message(
            &session.id,
            "user-1",
            "How do I implement authentication in FastAPI?",
            None,
        )
        .await
        .unwrap();
    let events = collect(stream).await;

    assert_eq!(events.first(), Some(&ChatStreamEvent::Start));
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));

    let content: String = events
        .iter()
        .filter_map(|e| match e {
            ChatStreamEvent::Content(c) => Some(c.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(content, "Hello there!");

    let fetched = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "How do I implement authentication in FastAPI?");
    assert!(fetched.auto_titled);
    assert_eq!(fetched.message_count, 2);

    // Assistant turn carries the model and a word-count token estimate
    let messages = store.get_messages(&session.id, None).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[1].event.model.as_deref(), Some("llama3.2"));
    assert_eq!(messages[1].event.tokens, Some(2));
}

#[tokio::test]
async fn second_message_does_not_retitle() {
    let (base_url, _) = spawn_mock_upstream(false).await;
    let (chat, store, _, _) = orchestrator_against(&base_url).await;

    let session = store
        .create_session("user-1", "New Chat", "llama3.2", None)
        .await
        .unwrap();

    let stream = chat
        .send_message(&session.id, "user-1", "First question about rust?", None)
        .await
        .unwrap();
    collect(stream).await;

    let stream = chat
        .send_message(&session.id, "user-1", "Another question entirely?", None)
        .await
        .unwrap();
    collect(stream).await;

    let fetched = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "First question about rust?");
    assert_eq!(fetched.message_count, 4);
}

#[tokio::test]
async fn rag_block_is_sent_upstream_but_never_persisted() {
    let (base_url, captured) = spawn_mock_upstream(false).await;
    let (chat, store, _, embedder) = orchestrator_against(&base_url).await;

    let session = store
        .create_session("user-1", "New Chat", "llama3.2", None)
        .await
        .unwrap();

    // Upload one chunk of documentation
    let chunks = chunk_document(&embedder, "file-1", "auth-notes.txt", "Use OAuth2 password flow").await;
    assert_eq!(chunks.len(), 1);
    store.store_document_chunks(&session.id, &chunks).await.unwrap();

    let stream = chat
        .send_message(&session.id, "user-1", "how do I authenticate users", None)
        .await
        .unwrap();
    collect(stream).await;

    // The outgoing request's last user message carries the question plus
    // the context block
    let requests = captured.lock();
    assert_eq!(requests.len(), 1);
    let outgoing_messages = requests[0]["messages"].as_array().unwrap();
    let last_user = outgoing_messages
        .iter()
        .rev()
        .find(|m| m["role"] == "user")
        .unwrap();
    let outgoing_content = last_user["content"].as_str().unwrap();
    assert!(outgoing_content.contains("how do I authenticate users"));
    assert!(outgoing_content.contains("Relevant document context:"));
    assert!(outgoing_content.contains("Use OAuth2 password flow"));
    drop(requests);

    // The persisted user message contains only the question
    let messages = store.get_messages(&session.id, None).await.unwrap();
    assert_eq!(messages[0].event.content, "how do I authenticate users");
    assert!(!messages[0].event.content.contains("Relevant document context:"));
}

#[tokio::test]
async fn mid_stream_failure_keeps_user_turn_drops_assistant_turn() {
    let (base_url, _) = spawn_mock_upstream(true).await;
    let (chat, store, _, _) = orchestrator_against(&base_url).await;

    let session = store
        .create_session("user-1", "New Chat", "llama3.2", None)
        .await
        .unwrap();

    let stream = chat
        .send_message(&session.id, "user-1", "will this survive a crash?", None)
        .await
        .unwrap();
    let events = collect(stream).await;

    assert!(matches!(events.last(), Some(ChatStreamEvent::Error(_))));

    // Atomic-or-nothing for the assistant; the user turn stays committed
    let messages = store.get_messages(&session.id, None).await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].event.content, "will this survive a crash?");

    let fetched = store.get_session(&session.id).await.unwrap().unwrap();
    assert_eq!(fetched.message_count, 1);
}

#[tokio::test]
async fn non_owner_is_denied() {
    let (base_url, _) = spawn_mock_upstream(false).await;
    let (chat, store, _, _) = orchestrator_against(&base_url).await;

    let session = store
        .create_session("user-1", "Private", "llama3.2", None)
        .await
        .unwrap();

    let result = chat
        .send_message(&session.id, "intruder", "let me in", None)
        .await;
    assert!(result.is_err());

    // Nothing was persisted on the denied path
    assert!(store.get_messages(&session.id, None).await.unwrap().is_empty());
}

#[tokio::test]
async fn founder_rights_can_use_any_session() {
    let (base_url, _) = spawn_mock_upstream(false).await;
    let (chat, store, fabric, _) = orchestrator_against(&base_url).await;

    fabric
        .teams
        .grant_founder_rights("the-founder", None, None)
        .await
        .unwrap();

    let session = store
        .create_session("user-1", "Shared", "llama3.2", None)
        .await
        .unwrap();

    let stream = chat
        .send_message(&session.id, "the-founder", "founder checking in?", None)
        .await
        .unwrap();
    let events = collect(stream).await;
    assert!(matches!(events.last(), Some(ChatStreamEvent::Done { .. })));
}

#[tokio::test]
async fn model_override_reaches_the_upstream() {
    let (base_url, captured) = spawn_mock_upstream(false).await;
    let (chat, store, _, _) = orchestrator_against(&base_url).await;

    let session = store
        .create_session("user-1", "Override", "llama3.2", None)
        .await
        .unwrap();

    let stream = chat
        .send_message(
            &session.id,
            "user-1",
            "answer with the other model please",
            Some("mistral".to_string()),
        )
        .await
        .unwrap();
    collect(stream).await;

    let requests = captured.lock();
    assert_eq!(requests[0]["model"], "mistral");
}

#[tokio::test]
async fn list_models_proxies_the_tags_endpoint() {
    let (base_url, _) = spawn_mock_upstream(false).await;
    let (chat, _, _, _) = orchestrator_against(&base_url).await;

    let models = chat.list_models().await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "llama3.2");
}
