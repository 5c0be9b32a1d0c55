//! Semantic cache for retrieval-augmented prompts.
//!
//! [`SemanticCache`] maps queries to previously computed results when a new
//! query embeds close enough to a cached one. Entries are scoped per user,
//! expire after a TTL, and the oldest entries are evicted in batches when
//! the cache is full.
//!
//! Caching is best-effort: lookups and inserts never fail, they miss.
//!
//! # Example
//!
//! ```rust,ignore
//! use backlink_rag::{SemanticCache, CacheConfig};
//!
//! let cache = SemanticCache::new(CacheConfig::default());
//! if let Some(prompt) = cache.get("user-42", query, embedder.as_ref()).await {
//!     return prompt;
//! }
//! let prompt = assemble_prompt(query).await;
//! cache.set("user-42", query, &prompt, embedder.as_ref()).await;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::config::CacheConfig;
use crate::embedding::{EmbeddingProvider, cosine_similarity};
use crate::error::Result;

/// A source of wall-clock time in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

/// [`Clock`] backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// A cached result and the embedding of the query that produced it.
#[derive(Debug, Clone)]
struct CacheEntry {
    query_embedding: Vec<f32>,
    result: String,
    timestamp: i64,
    hit_count: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    expired: u64,
    evicted: u64,
}

/// Point-in-time cache statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    /// Entries currently held (including not-yet-evicted expired ones).
    pub size: usize,
    pub max_size: usize,
    pub ttl: Duration,
    /// Sum of hit counters across held entries.
    pub entry_hits: u64,
    pub hits: u64,
    pub misses: u64,
    /// Entries removed because they outlived the TTL.
    pub expired: u64,
    /// Entries removed to make room.
    pub evicted: u64,
}

/// Per-user semantic cache with TTL expiry and batch eviction.
///
/// Keys are `"{user_id}:{timestamp_ms}"`. The state sits behind a
/// `tokio::sync::RwLock` that is never held across an embedding call, so
/// two concurrent requests may both miss and both insert.
pub struct SemanticCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    state: RwLock<CacheState>,
}

impl SemanticCache {
    /// Create a cache using the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create a cache with a custom time source.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self { config, clock, state: RwLock::new(CacheState::default()) }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Look up a cached result for a semantically similar query.
    ///
    /// Scans the user's entries oldest first, dropping any that outlived the
    /// TTL, and returns the first whose query embedding is at least
    /// `similarity_threshold` similar. Embedding failures count as a miss.
    pub async fn get(
        &self,
        user_id: &str,
        query: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Option<String> {
        let query_embedding = match embedder.embed(query).await {
            Ok(embedding) => embedding,
            Err(e) => {
                warn!(user_id, error = %e, "cache lookup skipped: embedding failed");
                self.state.write().await.misses += 1;
                return None;
            }
        };

        let now = self.clock.now_millis();
        let ttl_ms = i64::try_from(self.config.ttl.as_millis()).unwrap_or(i64::MAX);
        let prefix = format!("{user_id}:");

        let mut state = self.state.write().await;

        let mut candidates: Vec<(String, i64)> = state
            .entries
            .iter()
            .filter(|(key, _)| key.starts_with(&prefix))
            .map(|(key, entry)| (key.clone(), entry.timestamp))
            .collect();
        candidates.sort_by_key(|(_, timestamp)| *timestamp);

        let mut found = None;
        for (key, timestamp) in candidates {
            if now.saturating_sub(timestamp) > ttl_ms {
                state.entries.remove(&key);
                state.expired += 1;
                debug!(user_id, key = %key, "evicted expired cache entry");
                continue;
            }
            let Some(entry) = state.entries.get_mut(&key) else { continue };
            let similarity = cosine_similarity(&query_embedding, &entry.query_embedding);
            if similarity >= self.config.similarity_threshold {
                entry.hit_count += 1;
                debug!(user_id, similarity, hit_count = entry.hit_count, "semantic cache hit");
                found = Some(entry.result.clone());
                break;
            }
        }

        if found.is_some() {
            state.hits += 1;
        } else {
            state.misses += 1;
        }
        found
    }

    /// Cache `result` for `query`. Failures are logged and swallowed.
    pub async fn set(
        &self,
        user_id: &str,
        query: &str,
        result: &str,
        embedder: &dyn EmbeddingProvider,
    ) {
        if let Err(e) = self.try_set(user_id, query, result, embedder).await {
            warn!(user_id, error = %e, "failed to cache result");
        }
    }

    async fn try_set(
        &self,
        user_id: &str,
        query: &str,
        result: &str,
        embedder: &dyn EmbeddingProvider,
    ) -> Result<()> {
        let query_embedding = embedder.embed(query).await?;
        let now = self.clock.now_millis();

        let mut state = self.state.write().await;
        if state.entries.len() >= self.config.max_size {
            let evicted = evict_oldest(&mut state.entries, self.config.eviction_batch());
            state.evicted += evicted as u64;
            debug!(evicted, "cache full, evicted oldest entries");
        }

        state.entries.insert(
            format!("{user_id}:{now}"),
            CacheEntry {
                query_embedding,
                result: result.to_string(),
                timestamp: now,
                hit_count: 0,
            },
        );
        Ok(())
    }

    /// Remove every entry belonging to `user_id`.
    pub async fn clear_user_cache(&self, user_id: &str) {
        let prefix = format!("{user_id}:");
        let mut state = self.state.write().await;
        let before = state.entries.len();
        state.entries.retain(|key, _| !key.starts_with(&prefix));
        debug!(user_id, removed = before - state.entries.len(), "cleared user cache");
    }

    /// Remove every entry and reset counters.
    pub async fn clear_all(&self) {
        *self.state.write().await = CacheState::default();
    }

    pub async fn stats(&self) -> CacheStats {
        let state = self.state.read().await;
        CacheStats {
            size: state.entries.len(),
            max_size: self.config.max_size,
            ttl: self.config.ttl,
            entry_hits: state.entries.values().map(|e| e.hit_count).sum(),
            hits: state.hits,
            misses: state.misses,
            expired: state.expired,
            evicted: state.evicted,
        }
    }
}

/// Remove the `count` oldest entries by timestamp; returns how many were removed.
fn evict_oldest(entries: &mut HashMap<String, CacheEntry>, count: usize) -> usize {
    let mut by_age: Vec<(i64, String)> =
        entries.iter().map(|(key, entry)| (entry.timestamp, key.clone())).collect();
    by_age.sort();

    let mut removed = 0;
    for (_, key) in by_age.into_iter().take(count) {
        if entries.remove(&key).is_some() {
            removed += 1;
        }
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(timestamp: i64) -> CacheEntry {
        CacheEntry { query_embedding: vec![1.0], result: String::new(), timestamp, hit_count: 0 }
    }

    #[test]
    fn evicts_oldest_first() {
        let mut entries: HashMap<String, CacheEntry> =
            (0..10).map(|i| (format!("u:{i}"), entry(i))).collect();
        assert_eq!(evict_oldest(&mut entries, 3), 3);
        assert_eq!(entries.len(), 7);
        assert!(!entries.contains_key("u:0"));
        assert!(!entries.contains_key("u:2"));
        assert!(entries.contains_key("u:3"));
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
