// src/semantic/mod.rs
// Semantic index: cached query-by-text retrieval over persisted messages
// and per-session chunk search

pub mod cache;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::SemanticConfig;
use crate::embedding::{Embedder, cosine_similarity};
use crate::error::LumenResult;
use crate::memory::{ChatMemoryStore, ChunkHit};

pub use cache::SearchCache;

/// Message search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub session_id: String,
    pub message_id: i64,
    pub content_excerpt: String,
    pub similarity: f32,
}

/// Content-addressed retrieval over Memory Store rows.
///
/// A downstream observer of the store: the orchestrator notifies it after
/// each append via `index_after_append`; the store never calls back up.
pub struct SemanticIndex {
    store: Arc<ChatMemoryStore>,
    embedder: Arc<Embedder>,
    cache: SearchCache,
    config: SemanticConfig,
}

impl SemanticIndex {
    pub fn new(store: Arc<ChatMemoryStore>, embedder: Arc<Embedder>, config: SemanticConfig) -> Self {
        Self {
            cache: SearchCache::new(config.cache_ttl_secs),
            store,
            embedder,
            config,
        }
    }

    /// Search the caller's messages by meaning.
    ///
    /// Results come from pre-computed embeddings only; messages whose
    /// embedding has not landed yet simply don't match. Cached per
    /// (query, scope, limit) for the configured TTL.
    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        user_scope: &str,
        similarity_threshold: Option<f32>,
    ) -> LumenResult<Vec<SearchHit>> {
        let key = SearchCache::fingerprint(query, user_scope, limit);
        if let Some(cached) = self.cache.get(&key) {
            return Ok(cached);
        }

        let threshold = similarity_threshold.unwrap_or(self.config.similarity_threshold);
        let query_vec = self.embedder.embed(query).await;

        let candidates = self
            .store
            .recent_embedded_messages(user_scope, self.config.search_candidates)
            .await?;

        let mut hits: Vec<(SearchHit, chrono::DateTime<chrono::Utc>)> = candidates
            .into_iter()
            .filter_map(|candidate| {
                let similarity = cosine_similarity(&query_vec, &candidate.embedding);
                if similarity < threshold {
                    return None;
                }
                Some((
                    SearchHit {
                        session_id: candidate.session_id,
                        message_id: candidate.message_id,
                        content_excerpt: excerpt(&candidate.content),
                        similarity,
                    },
                    candidate.timestamp,
                ))
            })
            .collect();

        // Highest similarity first; ties go to the newer message
        hits.sort_by(|(a, ta), (b, tb)| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| tb.cmp(ta))
        });
        hits.truncate(limit);

        let hits: Vec<SearchHit> = hits.into_iter().map(|(hit, _)| hit).collect();
        debug!("Semantic search returned {} hits", hits.len());

        self.cache.put(key, hits.clone());
        Ok(hits)
    }

    /// Top-k document chunks of one session by similarity to a query vector.
    pub async fn search_chunks(
        &self,
        session_id: &str,
        query_vector: &[f32],
        top_k: usize,
    ) -> LumenResult<Vec<ChunkHit>> {
        self.store
            .search_document_chunks(session_id, query_vector, top_k)
            .await
    }

    /// Observer hook invoked after every append. Embeds and persists
    /// asynchronously when the content meets the length floor; short
    /// messages are stored without embeddings and never surface in search.
    pub fn index_after_append(self: &Arc<Self>, message_id: i64, session_id: &str, content: &str) {
        if content.chars().count() < self.config.embed_min_chars {
            return;
        }

        let index = Arc::clone(self);
        let session_id = session_id.to_string();
        let content = content.to_string();

        tokio::spawn(async move {
            let vector = index.embedder.embed(&content).await;
            if let Err(e) = index
                .store
                .store_message_embedding(message_id, &session_id, &vector)
                .await
            {
                warn!("Failed to store embedding for message {message_id}: {e}");
            }
        });
    }

    /// Embed and persist synchronously. Used by tests and backfill paths
    /// that need the index fresh before the next read.
    pub async fn index_message(
        &self,
        message_id: i64,
        session_id: &str,
        content: &str,
    ) -> LumenResult<bool> {
        if content.chars().count() < self.config.embed_min_chars {
            return Ok(false);
        }

        let vector = self.embedder.embed(content).await;
        self.store
            .store_message_embedding(message_id, session_id, &vector)
            .await?;
        Ok(true)
    }

    pub fn cache_entries(&self) -> usize {
        self.cache.len()
    }
}

fn excerpt(content: &str) -> String {
    crate::utils::truncate_chars(content, 200)
}
