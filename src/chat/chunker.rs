// src/chat/chunker.rs
// Paragraph-aware document chunking for RAG uploads

use crate::embedding::Embedder;
use crate::memory::DocumentChunk;

const CHUNK_SIZE: usize = 500;
const CHUNK_OVERLAP: usize = 50;

/// Split text into overlapping chunks along paragraph boundaries.
pub fn chunk_text(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let para = para.trim();
        if para.is_empty() {
            continue;
        }

        if current.chars().count() + para.chars().count() > CHUNK_SIZE && !current.is_empty() {
            // Carry the tail of the finished chunk forward as overlap
            let overlap: String = current
                .chars()
                .skip(current.chars().count().saturating_sub(CHUNK_OVERLAP))
                .collect();
            chunks.push(std::mem::take(&mut current));
            current = format!("{overlap}\n\n{para}");
        } else if current.is_empty() {
            current = para.to_string();
        } else {
            current.push_str("\n\n");
            current.push_str(para);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Chunk a document and embed every chunk. The resulting chunk_index range
/// is contiguous 0..total_chunks.
pub async fn chunk_document(
    embedder: &Embedder,
    file_id: &str,
    filename: &str,
    text: &str,
) -> Vec<DocumentChunk> {
    let chunks = chunk_text(text);
    let total = chunks.len() as i64;

    let mut out = Vec::with_capacity(chunks.len());
    for (i, content) in chunks.into_iter().enumerate() {
        let embedding = embedder.embed(&content).await;
        out.push(DocumentChunk {
            file_id: file_id.to_string(),
            filename: filename.to_string(),
            chunk_index: i as i64,
            total_chunks: total,
            content,
            embedding,
        });
    }
    out
}
