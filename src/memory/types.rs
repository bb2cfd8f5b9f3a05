// src/memory/types.rs
// Persisted chat memory entities

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat session metadata row
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: String,
    pub title: String,
    pub owner_user_id: String,
    pub team_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub default_model: String,
    pub message_count: i64,
    /// Distinct models that produced messages in this session, sorted
    pub models_used: Vec<String>,
    pub summary: Option<String>,
    pub auto_titled: bool,
}

/// Single conversation event (message)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub timestamp: DateTime<Utc>,
    pub role: MessageRole,
    pub content: String,
    pub model: Option<String>,
    pub tokens: Option<i64>,
    pub files: Option<serde_json::Value>,
}

impl ConversationEvent {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            role: MessageRole::User,
            content: content.into(),
            model: None,
            tokens: None,
            files: None,
        }
    }

    pub fn assistant(content: impl Into<String>, model: impl Into<String>, tokens: i64) -> Self {
        Self {
            timestamp: Utc::now(),
            role: MessageRole::Assistant,
            content: content.into(),
            model: Some(model.into()),
            tokens: Some(tokens),
            files: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::str::FromStr for MessageRole {
    type Err = crate::error::LumenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(crate::error::LumenError::validation(format!(
                "unknown message role: {other}"
            ))),
        }
    }
}

/// Stored message with its row id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub session_id: String,
    #[serde(flatten)]
    pub event: ConversationEvent,
}

/// Rolling summary row (one per session)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub summary: String,
    pub models_used: Vec<String>,
}

/// Document chunk for RAG over uploads
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub file_id: String,
    pub filename: String,
    pub chunk_index: i64,
    pub total_chunks: i64,
    pub content: String,
    pub embedding: Vec<f32>,
}

/// Chunk search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkHit {
    pub id: i64,
    pub file_id: String,
    pub filename: String,
    pub chunk_index: i64,
    pub content: String,
    pub similarity: f32,
}

/// Per-session or global usage analytics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryAnalytics {
    pub total_sessions: i64,
    pub total_messages: i64,
    pub total_tokens: i64,
    pub model_usage: Vec<ModelUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelUsage {
    pub model: String,
    pub count: i64,
}
