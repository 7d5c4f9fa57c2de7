//! Result cache for repeated queries

pub mod result_cache;

pub use result_cache::{normalize_key, CacheConfig, CacheEntry, CacheStats, ResultCache};
