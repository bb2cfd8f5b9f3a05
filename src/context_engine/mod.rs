// src/context_engine/mod.rs
// Background vectorization engine: worker pool over a bounded job queue,
// in-memory vector set with TTL retention

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::ContextEngineConfig;
use crate::embedding::{Embedder, cosine_similarity};

/// Job pulled by the workers. `None` is the shutdown sentinel.
struct VectorizationJob {
    session_id: String,
    text: String,
    enqueued_at: DateTime<Utc>,
}

/// Vectors, timestamps, and metadata live in parallel maps keyed by
/// session_id; a write to any one of them holds the lock for all three.
#[derive(Default)]
struct VectorStore {
    vectors: HashMap<String, Vec<f32>>,
    timestamps: HashMap<String, DateTime<Utc>>,
    metadata: HashMap<String, Value>,
}

impl VectorStore {
    fn prune_older_than(&mut self, retention_secs: f64) -> usize {
        if retention_secs <= 0.0 {
            return 0;
        }

        let cutoff = Utc::now() - chrono::Duration::milliseconds((retention_secs * 1000.0) as i64);
        let stale: Vec<String> = self
            .timestamps
            .iter()
            .filter(|(_, ts)| **ts < cutoff)
            .map(|(sid, _)| sid.clone())
            .collect();

        for sid in &stale {
            self.vectors.remove(sid);
            self.timestamps.remove(sid);
            self.metadata.remove(sid);
        }

        stale.len()
    }
}

#[derive(Default)]
struct Counters {
    processed: u64,
    errors: u64,
    dropped: u64,
}

/// Engine statistics snapshot
#[derive(Debug, Clone, Serialize)]
pub struct EngineStats {
    pub sessions_stored: usize,
    pub processed_count: u64,
    pub error_count: u64,
    pub dropped_count: u64,
    pub queue_size: usize,
    pub workers: usize,
    pub retention_days: f64,
}

/// Similar-context search result
#[derive(Debug, Clone, Serialize)]
pub struct SimilarContext {
    pub session_id: String,
    pub similarity: f32,
    pub metadata: Value,
}

/// Asynchronously vectorizes free-form context snapshots and answers
/// nearest-neighbour queries over the in-memory result set.
pub struct ContextEngine {
    sender: mpsc::Sender<Option<VectorizationJob>>,
    store: Arc<Mutex<VectorStore>>,
    counters: Arc<Mutex<Counters>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    embedder: Arc<Embedder>,
    worker_count: usize,
    retention_secs: f64,
    shutdown_timeout: Duration,
}

impl ContextEngine {
    pub fn start(embedder: Arc<Embedder>, config: &ContextEngineConfig) -> Self {
        let worker_count = config.workers.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let receiver = Arc::new(tokio::sync::Mutex::new(receiver));

        let store = Arc::new(Mutex::new(VectorStore::default()));
        let counters = Arc::new(Mutex::new(Counters::default()));
        let retention_secs = (config.retention_days * 86_400.0).max(0.0);

        let mut workers = Vec::with_capacity(worker_count);
        for i in 0..worker_count {
            workers.push(tokio::spawn(worker_loop(
                i,
                Arc::clone(&receiver),
                Arc::clone(&embedder),
                Arc::clone(&store),
                Arc::clone(&counters),
                retention_secs,
            )));
        }

        info!(
            "Context engine started ({} workers, {:.1}d retention)",
            worker_count, config.retention_days
        );

        Self {
            sender,
            store,
            counters,
            workers: Mutex::new(workers),
            embedder,
            worker_count,
            retention_secs,
            shutdown_timeout: Duration::from_secs(config.shutdown_timeout_secs),
        }
    }

    /// Queue a context snapshot for vectorization. Never blocks: when the
    /// queue is at capacity the job is dropped and `false` is returned.
    pub fn preserve(
        &self,
        session_id: &str,
        context: &Value,
        metadata: Option<Value>,
    ) -> bool {
        let text = flatten_context(context);
        let job = VectorizationJob {
            session_id: session_id.to_string(),
            text,
            enqueued_at: Utc::now(),
        };

        if let Some(metadata) = metadata {
            self.store.lock().metadata.insert(session_id.to_string(), metadata);
        }

        match self.sender.try_send(Some(job)) {
            Ok(()) => {
                debug!("Queued context for session {session_id}");
                true
            }
            Err(_) => {
                self.counters.lock().dropped += 1;
                warn!("Context queue full, dropped job for session {session_id}");
                false
            }
        }
    }

    /// Embed the query synchronously and scan the in-memory vector set.
    /// The embedding happens before the lock is taken.
    pub async fn search_similar(
        &self,
        query: &str,
        top_k: usize,
        threshold: f32,
    ) -> Vec<SimilarContext> {
        let query_vec = self.embedder.embed(query).await;

        let mut results: Vec<SimilarContext> = {
            let store = self.store.lock();
            store
                .vectors
                .iter()
                .filter_map(|(session_id, vec)| {
                    let similarity = cosine_similarity(&query_vec, vec);
                    if similarity < threshold {
                        return None;
                    }
                    Some(SimilarContext {
                        session_id: session_id.clone(),
                        similarity,
                        metadata: store
                            .metadata
                            .get(session_id)
                            .cloned()
                            .unwrap_or(Value::Null),
                    })
                })
                .collect()
        };

        results.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        results.truncate(top_k);
        results
    }

    pub fn get_vector(&self, session_id: &str) -> Option<Vec<f32>> {
        self.store.lock().vectors.get(session_id).cloned()
    }

    pub fn stats(&self) -> EngineStats {
        let store = self.store.lock();
        let counters = self.counters.lock();

        EngineStats {
            sessions_stored: store.vectors.len(),
            processed_count: counters.processed,
            error_count: counters.errors,
            dropped_count: counters.dropped,
            queue_size: self.sender.max_capacity() - self.sender.capacity(),
            workers: self.worker_count,
            retention_days: self.retention_secs / 86_400.0,
        }
    }

    pub fn prune_older_than(&self, days: f64) -> usize {
        if days <= 0.0 {
            return 0;
        }
        let pruned = self.store.lock().prune_older_than(days * 86_400.0);
        info!("Pruned {pruned} old context vectors");
        pruned
    }

    /// Emit one sentinel per worker and join them within the timeout.
    /// Workers terminate on sentinel reception even with jobs still queued.
    pub async fn shutdown(&self) {
        info!("Shutting down context engine...");

        for _ in 0..self.worker_count {
            // Sentinels go through the same queue; blocking send so they
            // land even when the queue is momentarily full.
            if self.sender.send(None).await.is_err() {
                break;
            }
        }

        let workers: Vec<JoinHandle<()>> = self.workers.lock().drain(..).collect();
        for worker in workers {
            if tokio::time::timeout(self.shutdown_timeout, worker)
                .await
                .is_err()
            {
                warn!("Context worker did not stop within timeout");
            }
        }

        info!("Context engine shutdown complete");
    }
}

/// Deterministically flatten a context object to a text payload:
/// canonical key order, UTF-8.
pub fn flatten_context(context: &Value) -> String {
    fn canonicalize(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted: Vec<(&String, &Value)> = map.iter().collect();
                sorted.sort_by(|(a, _), (b, _)| a.cmp(b));
                Value::Object(
                    sorted
                        .into_iter()
                        .map(|(k, v)| (k.clone(), canonicalize(v)))
                        .collect(),
                )
            }
            Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
            other => other.clone(),
        }
    }

    serde_json::to_string(&canonicalize(context)).unwrap_or_else(|_| context.to_string())
}

async fn worker_loop(
    worker_id: usize,
    receiver: Arc<tokio::sync::Mutex<mpsc::Receiver<Option<VectorizationJob>>>>,
    embedder: Arc<Embedder>,
    store: Arc<Mutex<VectorStore>>,
    counters: Arc<Mutex<Counters>>,
    retention_secs: f64,
) {
    debug!("Context worker {worker_id} started");

    loop {
        let job = {
            let mut rx = receiver.lock().await;
            rx.recv().await
        };

        let job = match job {
            Some(Some(job)) => job,
            // Sentinel or closed channel: exit cleanly
            Some(None) | None => break,
        };

        let vector = embedder.embed(&job.text).await;
        if vector.is_empty() {
            counters.lock().errors += 1;
            error!("Worker {worker_id} failed to vectorize session {}", job.session_id);
            continue;
        }

        {
            let mut store = store.lock();
            store.vectors.insert(job.session_id.clone(), vector);
            store.timestamps.insert(job.session_id.clone(), job.enqueued_at);
            store.prune_older_than(retention_secs);
        }
        counters.lock().processed += 1;

        debug!("Worker {worker_id} vectorized session {}", job.session_id);
    }

    debug!("Context worker {worker_id} stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn flatten_is_deterministic_and_key_ordered() {
        let a = json!({"zebra": 1, "alpha": {"y": 2, "x": 3}});
        let b = json!({"alpha": {"x": 3, "y": 2}, "zebra": 1});
        assert_eq!(flatten_context(&a), flatten_context(&b));
        assert!(flatten_context(&a).find("alpha").unwrap() < flatten_context(&a).find("zebra").unwrap());
    }
}
