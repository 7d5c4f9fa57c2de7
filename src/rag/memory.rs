//! In-process collaborators
//!
//! `HashEmbedder` and `InMemoryKnowledgeStore` back the CLI demo and the
//! tests. Neither needs network access.

use crate::errors::Result;
use crate::rag::providers::{
    EmbeddingProvider, KeywordHit, KeywordStore, VectorMatch, VectorRecord, VectorStore,
};
use crate::rag::text::{term_overlap, terms};
use crate::rag::types::SearchFilter;
use async_trait::async_trait;
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Weight of cosine similarity in the hybrid score; term overlap gets the rest
pub const HYBRID_VECTOR_WEIGHT: f32 = 0.7;

/// Hashed bag-of-words embedder
#[derive(Debug, Clone)]
pub struct HashEmbedder {
    dimensions: usize,
    seed: u64,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            seed: 1337,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Synchronous embedding, L2-normalised
    pub fn embed_text(&self, text: &str, domain_hint: Option<&str>) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions];
        for term in terms(text) {
            vector[self.bucket_for(&term)] += 1.0;
        }
        if let Some(hint) = domain_hint {
            for term in terms(hint) {
                vector[self.bucket_for(&term)] += 0.5;
            }
        }
        normalize(&mut vector);
        vector
    }

    fn bucket_for(&self, term: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        hasher.write_u64(self.seed);
        term.hash(&mut hasher);
        (hasher.finish() as usize) % self.dimensions
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed(&self, text: &str, domain_hint: Option<&str>) -> Result<Vec<f32>> {
        Ok(self.embed_text(text, domain_hint))
    }

    fn dimension(&self) -> usize {
        self.dimensions
    }

    fn provider(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        "hash-embedder"
    }
}

fn normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm == 0.0 {
        return;
    }
    for value in vector.iter_mut() {
        *value /= norm;
    }
}

/// Cosine similarity; 0.0 when either vector is all zeros
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut a_norm = 0.0f32;
    let mut b_norm = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        a_norm += x * x;
        b_norm += y * y;
    }
    if a_norm == 0.0 || b_norm == 0.0 {
        return 0.0;
    }
    dot / (a_norm.sqrt() * b_norm.sqrt())
}

/// Vector and full-text store over one in-memory record set
#[derive(Debug, Default)]
pub struct InMemoryKnowledgeStore {
    records: RwLock<IndexMap<String, VectorRecord>>,
}

impl InMemoryKnowledgeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn rank<F>(
        &self,
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
        score: F,
    ) -> Vec<VectorMatch>
    where
        F: Fn(&VectorRecord) -> f32,
    {
        let records = self.records.read();
        let mut matches: Vec<VectorMatch> = records
            .values()
            .filter(|record| filter.matches(&record.domain_tags))
            .filter_map(|record| {
                let score = score(record);
                (score >= min_score).then(|| VectorMatch {
                    source_id: record.id.clone(),
                    content: record.content.clone(),
                    score,
                    domain_tags: record.domain_tags.clone(),
                    metadata: record.metadata.clone(),
                })
            })
            .collect();

        matches.sort_by(|a, b| b.score.total_cmp(&a.score));
        matches.truncate(top_k);
        matches
    }
}

#[async_trait]
impl VectorStore for InMemoryKnowledgeStore {
    async fn search(
        &self,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<VectorMatch>> {
        Ok(self.rank(top_k, min_score, filter, |record| {
            cosine_similarity(vector, &record.vector)
        }))
    }

    async fn hybrid_search(
        &self,
        text: &str,
        vector: &[f32],
        top_k: usize,
        min_score: f32,
        filter: &SearchFilter,
    ) -> Result<Vec<VectorMatch>> {
        let query_terms = terms(text);
        Ok(self.rank(top_k, min_score, filter, |record| {
            HYBRID_VECTOR_WEIGHT * cosine_similarity(vector, &record.vector)
                + (1.0 - HYBRID_VECTOR_WEIGHT) * term_overlap(&query_terms, &record.content)
        }))
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        let count = records.len();
        let mut stored = self.records.write();
        for record in records {
            stored.insert(record.id.clone(), record);
        }
        Ok(count)
    }

    fn provider(&self) -> &str {
        "local"
    }

    fn model(&self) -> &str {
        "in-memory"
    }
}

#[async_trait]
impl KeywordStore for InMemoryKnowledgeStore {
    async fn full_text_search(
        &self,
        text: &str,
        filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        let query_terms = terms(text);
        let records = self.records.read();
        Ok(records
            .values()
            .filter(|record| filter.matches(&record.domain_tags))
            .filter(|record| term_overlap(&query_terms, &record.content) > 0.0)
            .take(limit)
            .map(|record| KeywordHit {
                source_id: record.id.clone(),
                content: record.content.clone(),
                domain_tags: record.domain_tags.clone(),
                metadata: record.metadata.clone(),
            })
            .collect())
    }
}
