//! Caching layer for colloquy-runtime.
//!
//! Provides in-memory caching of judge scores to reduce LLM costs when
//! the same response is evaluated repeatedly under the same perspective.

use moka::future::Cache;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use colloquy_core::PerspectiveScore;

use crate::config::CacheSettings;

/// Cache key for judge scores.
#[derive(Clone, Debug)]
pub struct ScoreCacheKey {
    perspective_hash: u64,
    query_hash: u64,
    response_hash: u64,
}

impl ScoreCacheKey {
    /// Create a cache key from judging inputs.
    pub fn new(perspective_id: &str, query: &str, response: &str) -> Self {
        Self {
            perspective_hash: hash_str(perspective_id),
            query_hash: hash_str(query),
            response_hash: hash_str(response),
        }
    }
}

impl Hash for ScoreCacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.perspective_hash.hash(state);
        self.query_hash.hash(state);
        self.response_hash.hash(state);
    }
}

impl PartialEq for ScoreCacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.perspective_hash == other.perspective_hash
            && self.query_hash == other.query_hash
            && self.response_hash == other.response_hash
    }
}

impl Eq for ScoreCacheKey {}

/// Judge-score cache using moka.
pub struct ScoreCache {
    cache: Cache<ScoreCacheKey, PerspectiveScore>,
}

impl ScoreCache {
    /// Create a new cache with the given capacity and entry lifetime.
    pub fn new(max_entries: u64, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(ttl)
            .build();

        Self { cache }
    }

    /// Build a cache from provider settings, or `None` when caching is
    /// disabled.
    pub fn from_settings(settings: &CacheSettings) -> Option<Self> {
        settings
            .enabled
            .then(|| Self::new(settings.capacity, settings.ttl))
    }

    /// Get a cached score.
    pub async fn get(&self, key: &ScoreCacheKey) -> Option<PerspectiveScore> {
        self.cache.get(key).await
    }

    /// Store a score in the cache.
    pub async fn insert(&self, key: ScoreCacheKey, score: PerspectiveScore) {
        self.cache.insert(key, score).await;
    }

    /// Clear the cache.
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Get cache statistics.
    pub fn entry_count(&self) -> u64 {
        self.cache.entry_count()
    }
}

impl Default for ScoreCache {
    fn default() -> Self {
        Self::new(1024, Duration::from_secs(600))
    }
}

fn hash_str(value: &str) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}
