// src/semantic/cache.rs
// Time-bounded search result cache

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::debug;

use super::SearchHit;
use crate::utils::sha256_hex;

struct CachedResult {
    hits: Vec<SearchHit>,
    expires_at: Instant,
}

/// TTL cache for semantic search results, keyed by a fingerprint of
/// (query, scope, limit).
pub struct SearchCache {
    entries: Mutex<HashMap<String, CachedResult>>,
    ttl: Duration,
    max_size: usize,
}

impl SearchCache {
    pub fn new(ttl_secs: u64) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            ttl: Duration::from_secs(ttl_secs),
            max_size: 500,
        }
    }

    /// Fingerprint of the search inputs. The scope is the searching user;
    /// team-scoped search would need to extend this key.
    pub fn fingerprint(query: &str, scope: &str, limit: usize) -> String {
        sha256_hex(&format!("{query}\x1f{scope}\x1f{limit}"))
    }

    pub fn get(&self, key: &str) -> Option<Vec<SearchHit>> {
        let mut entries = self.entries.lock();

        match entries.get(key) {
            Some(entry) if entry.expires_at > Instant::now() => {
                debug!("Search cache hit");
                Some(entry.hits.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn put(&self, key: String, hits: Vec<SearchHit>) {
        let mut entries = self.entries.lock();

        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            // Drop the entry closest to expiry
            if let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, v)| v.expires_at)
                .map(|(k, _)| k.clone())
            {
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key,
            CachedResult {
                hits,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
