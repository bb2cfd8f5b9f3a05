// src/chat/orchestrator.rs
// End-to-end streaming chat: history + RAG assembly, upstream token
// streaming, assistant persistence, background vectorization

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::auth::AuthFabric;
use crate::config::{MemoryConfig, SemanticConfig, UpstreamConfig};
use crate::context_engine::ContextEngine;
use crate::embedding::Embedder;
use crate::error::{LumenError, LumenResult};
use crate::memory::{ChatMemoryStore, ConversationEvent, MessageRole};
use crate::semantic::SemanticIndex;
use crate::utils::word_count;

use super::title::generate_title;
use super::upstream::{ChatTurn, UpstreamClient, UpstreamEvent};

/// Event emitted to the client stream. The HTTP adapter owns the SSE
/// framing; the orchestrator owns the sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatStreamEvent {
    Start,
    Content(String),
    Done { message_id: i64 },
    Error(String),
}

pub struct ChatOrchestrator {
    store: Arc<ChatMemoryStore>,
    semantic: Arc<SemanticIndex>,
    embedder: Arc<Embedder>,
    engine: Arc<ContextEngine>,
    fabric: Arc<AuthFabric>,
    upstream: UpstreamClient,
    default_model: String,
    context_recent_messages: usize,
    rag_top_k: usize,
}

impl ChatOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<ChatMemoryStore>,
        semantic: Arc<SemanticIndex>,
        embedder: Arc<Embedder>,
        engine: Arc<ContextEngine>,
        fabric: Arc<AuthFabric>,
        upstream_config: &UpstreamConfig,
        memory_config: &MemoryConfig,
        semantic_config: &SemanticConfig,
    ) -> Self {
        Self {
            store,
            semantic,
            embedder,
            engine,
            fabric,
            upstream: UpstreamClient::new(upstream_config),
            default_model: upstream_config.default_model.clone(),
            context_recent_messages: memory_config.context_recent_messages,
            rag_top_k: semantic_config.rag_top_k,
        }
    }

    pub async fn list_models(&self) -> LumenResult<Vec<super::upstream::ModelInfo>> {
        self.upstream.list_models().await
    }

    /// Run the full send-message sequence. Pre-stream failures return an
    /// error; once the stream is open, failures surface as a final
    /// `Error` event and nothing is persisted for the assistant turn.
    /// The user turn is committed before streaming starts and is never
    /// rolled back.
    pub async fn send_message(
        &self,
        session_id: &str,
        user_id: &str,
        user_content: &str,
        model_override: Option<String>,
    ) -> LumenResult<BoxStream<'static, ChatStreamEvent>> {
        if user_content.trim().is_empty() {
            return Err(LumenError::validation("message content must not be empty"));
        }

        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| LumenError::not_found(format!("session {session_id}")))?;

        let decision = self
            .fabric
            .can_use_chat(user_id, &session.owner_user_id, session_id)
            .await?;
        if !decision.allowed {
            return Err(LumenError::forbidden(decision.reason));
        }

        // First message titles the session
        if session.message_count == 0 {
            let title = generate_title(user_content);
            self.store
                .update_session_title(session_id, &title, true)
                .await?;
            debug!("Auto-titled session {session_id}: {title}");
        }

        // The user turn is committed here; everything after may fail
        // without rolling it back
        let user_event = ConversationEvent::user(user_content);
        let user_message_id = self.store.append_message(session_id, &user_event).await?;
        self.semantic
            .index_after_append(user_message_id, session_id, user_content);

        let history = self
            .store
            .get_recent_messages(session_id, self.context_recent_messages)
            .await?;

        let mut outgoing: Vec<ChatTurn> = history
            .iter()
            .map(|m| ChatTurn {
                role: m.event.role.as_str().to_string(),
                content: m.event.content.clone(),
            })
            .collect();

        // RAG block goes into the outgoing request only, never into memory
        let query_vec = self.embedder.embed(user_content).await;
        let chunks = self
            .semantic
            .search_chunks(session_id, &query_vec, self.rag_top_k)
            .await?;
        if !chunks.is_empty() {
            if let Some(last) = outgoing.iter_mut().rev().find(|t| t.role == "user") {
                let mut block = String::from("\n\nRelevant document context:\n");
                for chunk in &chunks {
                    block.push_str(&format!("[{}] {}\n", chunk.filename, chunk.content));
                }
                last.content.push_str(&block);
                debug!("Injected {} RAG chunks into outgoing request", chunks.len());
            }
        }

        let effective_model = model_override.unwrap_or_else(|| {
            if session.default_model.is_empty() {
                self.default_model.clone()
            } else {
                session.default_model.clone()
            }
        });

        let upstream_stream = self
            .upstream
            .stream_chat(&effective_model, &outgoing)
            .await?;

        Ok(self.run_stream(
            session.id,
            upstream_stream,
            user_content.to_string(),
            effective_model,
        ))
    }

    fn run_stream(
        &self,
        session_id: String,
        mut upstream: BoxStream<'static, LumenResult<UpstreamEvent>>,
        user_content: String,
        model: String,
    ) -> BoxStream<'static, ChatStreamEvent> {
        let store = Arc::clone(&self.store);
        let semantic = Arc::clone(&self.semantic);
        let engine = Arc::clone(&self.engine);

        let stream = async_stream::stream! {
            yield ChatStreamEvent::Start;

            let mut full_response = String::new();
            let mut completed = false;

            while let Some(event) = upstream.next().await {
                match event {
                    Ok(UpstreamEvent::Token(chunk)) => {
                        full_response.push_str(&chunk);
                        yield ChatStreamEvent::Content(chunk);
                    }
                    Ok(UpstreamEvent::Done) => {
                        completed = true;
                        break;
                    }
                    Err(e) => {
                        // Atomic-or-nothing: the partial assistant turn is
                        // discarded, the user turn stays committed
                        warn!("Upstream stream failed mid-response: {e}");
                        yield ChatStreamEvent::Error(e.to_string());
                        return;
                    }
                }
            }

            if !completed {
                yield ChatStreamEvent::Error("upstream closed before completion".to_string());
                return;
            }

            let assistant_event = ConversationEvent {
                timestamp: Utc::now(),
                role: MessageRole::Assistant,
                content: full_response.clone(),
                model: Some(model.clone()),
                tokens: Some(word_count(&full_response)),
                files: None,
            };

            match store.append_message(&session_id, &assistant_event).await {
                Ok(message_id) => {
                    semantic.index_after_append(message_id, &session_id, &full_response);

                    engine.preserve(
                        &session_id,
                        &json!({
                            "user_message": user_content,
                            "assistant_response": full_response,
                            "model": model,
                            "timestamp": assistant_event.timestamp.to_rfc3339(),
                        }),
                        None,
                    );

                    info!("Assistant turn persisted for session {session_id}");
                    yield ChatStreamEvent::Done { message_id };
                }
                Err(e) => {
                    yield ChatStreamEvent::Error(format!("failed to persist response: {e}"));
                }
            }
        };

        stream.boxed()
    }
}
