// src/chat/mod.rs
// Streaming chat orchestration over the local inference server

pub mod chunker;
pub mod orchestrator;
pub mod title;
pub mod upstream;

pub use chunker::{chunk_document, chunk_text};
pub use orchestrator::{ChatOrchestrator, ChatStreamEvent};
pub use title::generate_title;
pub use upstream::{ChatTurn, ModelInfo, UpstreamClient, UpstreamEvent};
