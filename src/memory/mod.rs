// src/memory/mod.rs
// Durable chat memory: sessions, messages, rolling summaries, RAG chunks,
// and message embeddings

pub mod schema;
pub mod store;
pub mod summary;
pub mod types;

pub use store::{ChatMemoryStore, EmbeddedMessage};
pub use types::{
    ChatSession, ChunkHit, ConversationEvent, ConversationSummary, DocumentChunk, MemoryAnalytics,
    MessageRole, StoredMessage,
};
