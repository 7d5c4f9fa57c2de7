//! Contracts for the external collaborators
//!
//! The orchestrator only sees these narrow traits; concrete clients live
//! outside the core. `memory` provides in-process implementations.

use crate::errors::Result;
use crate::rag::types::{Passage, SearchFilter};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Feature flag gating the entity-aware strategy
pub const ENTITY_AWARE_FLAG: &str = "entity_aware_search";

/// Scored vector store hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorMatch {
    pub source_id: String,
    pub content: String,
    pub score: f32,
    pub domain_tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

impl From<VectorMatch> for Passage {
    fn from(hit: VectorMatch) -> Self {
        Passage {
            content: hit.content,
            source_id: hit.source_id,
            score: hit.score,
            domain_tags: hit.domain_tags,
        }
    }
}

/// Unscored full-text hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordHit {
    pub source_id: String,
    pub content: String,
    pub domain_tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Record written to the vector store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub domain_tags: Vec<String>,
    pub metadata: BTreeMap<String, String>,
}

/// Document to ingest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Document {
    pub fn new(id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            domain_tags: Vec::new(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_tags = domains.into_iter().map(Into::into).collect();
        self
    }
}

/// Text embedding provider
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str, domain_hint: Option<&str>) -> Result<Vec<f32>>;

    /// Length of vectors returned by `embed`
    fn dimension(&self) -> usize;

    /// Provider name used for pricing
    fn provider(&self) -> &str;

    /// Model id used for pricing
    fn model(&self) -> &str;
}

/// Vector similarity store
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Nearest neighbours, score-descending
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<VectorMatch>>;

    /// Store-side combined vector + keyword search, score-descending
    async fn hybrid_search(
        &self,
        text: &str,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<VectorMatch>>;

    /// Insert or replace records; returns the number written
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize>;

    fn provider(&self) -> &str;

    fn model(&self) -> &str;
}

/// Full-text store
#[async_trait]
pub trait KeywordStore: Send + Sync {
    /// Unordered hits matching any query term
    async fn full_text_search(
        &self,
        text: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<KeywordHit>>;
}

/// Boolean feature flag source
pub trait FeatureFlags: Send + Sync {
    fn is_enabled(&self, flag: &str) -> bool;
}

/// Flags held in memory, togglable at runtime
#[derive(Debug, Default)]
pub struct StaticFeatureFlags {
    enabled: RwLock<HashSet<String>>,
}

impl StaticFeatureFlags {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_flag(self, flag: impl Into<String>) -> Self {
        self.enabled.write().insert(flag.into());
        self
    }

    pub fn set(&self, flag: &str, enabled: bool) {
        let mut flags = self.enabled.write();
        if enabled {
            flags.insert(flag.to_string());
        } else {
            flags.remove(flag);
        }
    }
}

impl FeatureFlags for StaticFeatureFlags {
    fn is_enabled(&self, flag: &str) -> bool {
        self.enabled.read().contains(flag)
    }
}
