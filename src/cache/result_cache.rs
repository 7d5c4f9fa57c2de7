//! TTL + insertion-order LRU cache of retrieval results
//!
//! Expiry is lazy: stale entries are removed only when read, or pushed out by
//! capacity pressure. There is no background sweep.

use crate::rag::types::RetrievalResult;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Maximum characters of normalized query text used as a cache key
pub const KEY_PREFIX_CHARS: usize = 200;

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Time-to-live in milliseconds (default: 1 hour)
    pub ttl_ms: u64,

    /// Maximum entries (default: 1000)
    pub capacity: usize,

    /// Whether the orchestrator consults the cache at all
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 3_600_000,
            capacity: 1_000,
            enabled: true,
        }
    }
}

/// One cached result
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: String,
    pub result: RetrievalResult,
    pub created_at: DateTime<Utc>,
}

/// Cache counters
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
    pub size: usize,
    pub capacity: usize,
    /// hits / (hits + misses), 0.0 before any lookup
    pub hit_rate: f64,
}

#[derive(Debug, Default)]
struct CacheInner {
    entries: IndexMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
    expirations: u64,
}

/// Bounded result cache keyed by normalized query text
#[derive(Debug)]
pub struct ResultCache {
    config: CacheConfig,
    inner: Mutex<CacheInner>,
}

/// Case-fold, trim and truncate query text into a cache key
pub fn normalize_key(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .take(KEY_PREFIX_CHARS)
        .collect()
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_config(CacheConfig::default())
    }

    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(CacheInner::default()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Saturates instead of wrapping for TTLs past the signed range
    fn ttl(&self) -> ChronoDuration {
        i64::try_from(self.config.ttl_ms)
            .ok()
            .and_then(ChronoDuration::try_milliseconds)
            .unwrap_or(ChronoDuration::MAX)
    }

    /// Look up a result by raw query text
    pub fn get(&self, text: &str) -> Option<RetrievalResult> {
        self.get_at(text, Utc::now())
    }

    pub fn get_at(&self, text: &str, now: DateTime<Utc>) -> Option<RetrievalResult> {
        let key = normalize_key(text);
        let ttl = self.ttl();
        let mut inner = self.inner.lock();

        let fresh = match inner.entries.get(&key) {
            Some(entry) => now - entry.created_at < ttl,
            None => {
                inner.misses += 1;
                return None;
            }
        };

        if fresh {
            inner.hits += 1;
            inner.entries.get(&key).map(|entry| entry.result.clone())
        } else {
            inner.entries.shift_remove(&key);
            inner.expirations += 1;
            inner.misses += 1;
            debug!(key = %key, "cache entry expired");
            None
        }
    }

    /// Store a result, evicting the oldest-inserted entry when full
    pub fn put(&self, text: &str, result: RetrievalResult) {
        self.put_at(text, result, Utc::now());
    }

    pub fn put_at(&self, text: &str, result: RetrievalResult, now: DateTime<Utc>) {
        let key = normalize_key(text);
        let mut inner = self.inner.lock();

        // Re-inserting refreshes the entry and its insertion position
        inner.entries.shift_remove(&key);

        while inner.entries.len() >= self.config.capacity.max(1) {
            if let Some((evicted, _)) = inner.entries.shift_remove_index(0) {
                inner.evictions += 1;
                debug!(key = %evicted, "cache entry evicted");
            } else {
                break;
            }
        }

        inner.entries.insert(
            key.clone(),
            CacheEntry {
                key,
                result,
                created_at: now,
            },
        );
    }

    /// Remove one entry; returns whether it was present
    pub fn invalidate(&self, text: &str) -> bool {
        self.inner
            .lock()
            .entries
            .shift_remove(&normalize_key(text))
            .is_some()
    }

    pub fn clear(&self) {
        self.inner.lock().entries.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
            expirations: inner.expirations,
            size: inner.entries.len(),
            capacity: self.config.capacity,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                inner.hits as f64 / lookups as f64
            },
        }
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}
