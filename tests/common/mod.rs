//! Scripted collaborators shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use unified_rag::rag::{
    EmbeddingProvider, KeywordHit, KeywordStore, SearchFilter, StaticFeatureFlags, VectorMatch,
    VectorRecord, VectorStore, ENTITY_AWARE_FLAG,
};
use unified_rag::{Collaborators, Config, RagError, Result, UnifiedRagService};

/// Which dependencies fail, and how often each was invoked
#[derive(Default)]
pub struct Backend {
    pub fail_embed: AtomicBool,
    pub fail_vector: AtomicBool,
    pub fail_hybrid_only: AtomicBool,
    pub fail_keyword: AtomicBool,
    pub embed_calls: AtomicUsize,
    pub search_calls: AtomicUsize,
    pub hybrid_calls: AtomicUsize,
    pub keyword_calls: AtomicUsize,
    pub matches: Mutex<Vec<VectorMatch>>,
    pub hits: Mutex<Vec<KeywordHit>>,
}

impl Backend {
    pub fn with_scores(scores: &[f32]) -> Arc<Self> {
        let backend = Self::default();
        *backend.matches.lock() = scores
            .iter()
            .enumerate()
            .map(|(i, score)| VectorMatch {
                source_id: format!("doc-{}", i + 1),
                content: format!("glucose trends passage {}", i + 1),
                score: *score,
                domain_tags: vec!["clinical".to_string()],
                metadata: BTreeMap::new(),
            })
            .collect();
        *backend.hits.lock() = vec![KeywordHit {
            source_id: "kw-1".to_string(),
            content: "Metformin glucose trends in Type-2 patients".to_string(),
            domain_tags: vec!["clinical".to_string()],
            metadata: BTreeMap::new(),
        }];
        Arc::new(backend)
    }

    pub fn calls(&self) -> usize {
        self.embed_calls.load(Ordering::SeqCst)
            + self.search_calls.load(Ordering::SeqCst)
            + self.hybrid_calls.load(Ordering::SeqCst)
            + self.keyword_calls.load(Ordering::SeqCst)
    }

    pub fn set(flag: &AtomicBool, value: bool) {
        flag.store(value, Ordering::SeqCst);
    }
}

pub struct Scripted(pub Arc<Backend>);

#[async_trait]
impl EmbeddingProvider for Scripted {
    async fn embed(&self, _text: &str, _hint: Option<&str>) -> Result<Vec<f32>> {
        self.0.embed_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_embed.load(Ordering::SeqCst) {
            return Err(RagError::dependency("embedding", "provider returned 503"));
        }
        Ok(vec![0.6, 0.8, 0.0])
    }

    fn dimension(&self) -> usize {
        3
    }

    fn provider(&self) -> &str {
        "openai"
    }

    fn model(&self) -> &str {
        "text-embedding-3-small"
    }
}

#[async_trait]
impl VectorStore for Scripted {
    async fn search(
        &self,
        _vector: &[f32],
        top_k: usize,
        _min_score: f32,
        _filter: &SearchFilter,
    ) -> Result<Vec<VectorMatch>> {
        self.0.search_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_vector.load(Ordering::SeqCst) {
            return Err(RagError::dependency("vector-store", "connection reset"));
        }
        let mut matches = self.0.matches.lock().clone();
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn hybrid_search(
        &self,
        _text: &str,
        _vector: &[f32],
        top_k: usize,
        _min_score: f32,
        _filter: &SearchFilter,
    ) -> Result<Vec<VectorMatch>> {
        self.0.hybrid_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self.0.fail_vector.load(Ordering::SeqCst)
            || self.0.fail_hybrid_only.load(Ordering::SeqCst);
        if failing {
            return Err(RagError::dependency("vector-store", "hybrid rpc failed"));
        }
        let mut matches = self.0.matches.lock().clone();
        matches.truncate(top_k);
        Ok(matches)
    }

    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<usize> {
        if self.0.fail_vector.load(Ordering::SeqCst) {
            return Err(RagError::dependency("vector-store", "connection reset"));
        }
        Ok(records.len())
    }

    fn provider(&self) -> &str {
        "pinecone"
    }

    fn model(&self) -> &str {
        "serverless"
    }
}

#[async_trait]
impl KeywordStore for Scripted {
    async fn full_text_search(
        &self,
        _text: &str,
        _filter: &SearchFilter,
        limit: usize,
    ) -> Result<Vec<KeywordHit>> {
        self.0.keyword_calls.fetch_add(1, Ordering::SeqCst);
        if self.0.fail_keyword.load(Ordering::SeqCst) {
            return Err(RagError::dependency("keyword-store", "statement timeout"));
        }
        let mut hits = self.0.hits.lock().clone();
        hits.truncate(limit);
        Ok(hits)
    }
}

pub fn collaborators(backend: &Arc<Backend>, entity_aware: bool) -> Collaborators {
    let scripted = Arc::new(Scripted(backend.clone()));
    let flags = StaticFeatureFlags::new();
    flags.set(ENTITY_AWARE_FLAG, entity_aware);
    Collaborators::new(scripted.clone(), scripted.clone(), scripted).with_flags(Arc::new(flags))
}

pub fn service(backend: &Arc<Backend>) -> UnifiedRagService {
    UnifiedRagService::new(collaborators(backend, false), &Config::default())
}

pub fn service_with(
    backend: &Arc<Backend>,
    config: &Config,
    entity_aware: bool,
) -> UnifiedRagService {
    UnifiedRagService::new(collaborators(backend, entity_aware), config)
}
