//! Registry of named circuit breakers
//!
//! One breaker per dependency name, created lazily on first use and kept for
//! the lifetime of the registry.

use crate::resilience::breaker::CircuitBreaker;
use crate::resilience::types::{BreakerConfig, BreakerSnapshot, CircuitState};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Embedding provider dependency
pub const EMBEDDING: &str = "embedding";

/// Vector store dependency (similarity and hybrid search, upsert)
pub const VECTOR_STORE: &str = "vector-store";

/// Keyword / relational full-text store dependency
pub const KEYWORD_STORE: &str = "keyword-store";

/// Breaker registry
#[derive(Debug)]
pub struct BreakerRegistry {
    defaults: BreakerConfig,
    overrides: HashMap<String, BreakerConfig>,
    critical: HashSet<String>,
    breakers: RwLock<HashMap<String, Arc<CircuitBreaker>>>,
}

impl BreakerRegistry {
    /// Create a registry with default breaker settings
    pub fn new() -> Self {
        Self::with_config(BreakerConfig::default(), HashMap::new())
    }

    /// Create a registry with default settings plus per-dependency overrides
    pub fn with_config(defaults: BreakerConfig, overrides: HashMap<String, BreakerConfig>) -> Self {
        Self {
            defaults,
            overrides,
            critical: [EMBEDDING, VECTOR_STORE]
                .iter()
                .map(|name| name.to_string())
                .collect(),
            breakers: RwLock::new(HashMap::new()),
        }
    }

    /// Replace the set of dependencies treated as critical
    pub fn with_critical<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.critical = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn is_critical(&self, name: &str) -> bool {
        self.critical.contains(name)
    }

    /// Get the breaker for `name`, creating it on first use
    pub fn get(&self, name: &str) -> Arc<CircuitBreaker> {
        if let Some(breaker) = self.breakers.read().get(name) {
            return breaker.clone();
        }

        let mut breakers = self.breakers.write();
        breakers
            .entry(name.to_string())
            .or_insert_with(|| {
                let config = self
                    .overrides
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| self.defaults.clone());
                Arc::new(CircuitBreaker::new(name, config).with_critical(self.is_critical(name)))
            })
            .clone()
    }

    /// Snapshots of every breaker created so far, sorted by name
    pub fn snapshots(&self) -> Vec<BreakerSnapshot> {
        let mut snapshots: Vec<BreakerSnapshot> = self
            .breakers
            .read()
            .values()
            .map(|breaker| breaker.snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Names of breakers currently open
    pub fn open_breakers(&self) -> Vec<String> {
        self.snapshots()
            .into_iter()
            .filter(|snapshot| snapshot.state == CircuitState::Open)
            .map(|snapshot| snapshot.name)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for BreakerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
