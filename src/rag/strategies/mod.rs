//! Retrieval strategies
//!
//! Each strategy implements [`RetrievalStrategy`] and is selected through a
//! [`StrategyTable`] keyed by [`StrategyKind`]. Every dependency call goes
//! through the breaker registered under that dependency's name.

pub mod agent;
pub mod entity;
pub mod hybrid;
pub mod keyword;
pub mod semantic;

pub use agent::AgentOptimizedStrategy;
pub use entity::EntityAwareStrategy;
pub use hybrid::HybridStrategy;
pub use keyword::KeywordStrategy;
pub use semantic::SemanticStrategy;

use crate::errors::Result;
use crate::rag::providers::{
    EmbeddingProvider, FeatureFlags, KeywordStore, StaticFeatureFlags, VectorMatch, VectorStore,
};
use crate::rag::types::{Passage, PhaseTiming, Query, SearchFilter, StrategyKind};
use crate::resilience::{BreakerRegistry, CallOutcome, EMBEDDING, VECTOR_STORE};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// External collaborators shared by all strategies
#[derive(Clone)]
pub struct Collaborators {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub vector_store: Arc<dyn VectorStore>,
    pub keyword_store: Arc<dyn KeywordStore>,
    pub flags: Arc<dyn FeatureFlags>,
}

impl Collaborators {
    /// Collaborators with every feature flag off
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        vector_store: Arc<dyn VectorStore>,
        keyword_store: Arc<dyn KeywordStore>,
    ) -> Self {
        Self {
            embedder,
            vector_store,
            keyword_store,
            flags: Arc::new(StaticFeatureFlags::new()),
        }
    }

    pub fn with_flags(mut self, flags: Arc<dyn FeatureFlags>) -> Self {
        self.flags = flags;
        self
    }
}

/// Collaborators plus the breakers guarding them
#[derive(Clone)]
pub struct StrategyDeps {
    pub collaborators: Collaborators,
    pub breakers: Arc<BreakerRegistry>,
}

/// Billable work a strategy performed, priced by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Usage {
    Embedding { tokens: u64 },
    VectorSearch { vectors: u64 },
    Rerank { documents: u64 },
    Extraction { tokens: u64 },
}

/// What a strategy hands back to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutput {
    pub passages: Vec<Passage>,
    /// Strategy that actually produced the passages
    pub strategy_used: StrategyKind,
    /// Requested strategy when this output came from a fallback
    pub degraded_from: Option<StrategyKind>,
    /// Measured phase timing; None when the strategy cannot split phases
    pub timing: Option<PhaseTiming>,
    pub usage: Vec<Usage>,
}

impl StrategyOutput {
    pub fn new(strategy_used: StrategyKind, passages: Vec<Passage>) -> Self {
        Self {
            passages,
            strategy_used,
            degraded_from: None,
            timing: None,
            usage: Vec::new(),
        }
    }

    pub fn with_timing(mut self, timing: PhaseTiming) -> Self {
        self.timing = Some(timing);
        self
    }

    pub fn with_usage(mut self, usage: Vec<Usage>) -> Self {
        self.usage = usage;
        self
    }

    /// Put usage billed by an abandoned attempt ahead of this output's own
    pub fn with_prior_usage(mut self, mut prior: Vec<Usage>) -> Self {
        prior.append(&mut self.usage);
        self.usage = prior;
        self
    }

    /// Mark this output as a fallback for `requested`
    pub fn degraded(mut self, requested: StrategyKind) -> Self {
        self.degraded_from = Some(requested);
        self
    }
}

/// One retrieval algorithm
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;

    async fn retrieve(&self, query: &Query) -> Result<StrategyOutput>;
}

/// Lookup table from strategy kind to implementation
#[derive(Clone, Default)]
pub struct StrategyTable {
    strategies: HashMap<StrategyKind, Arc<dyn RetrievalStrategy>>,
}

impl StrategyTable {
    /// The five built-in strategies wired to shared dependencies
    pub fn standard(deps: StrategyDeps) -> Self {
        let semantic = Arc::new(SemanticStrategy::new(deps.clone()));
        let hybrid = Arc::new(HybridStrategy::new(deps.clone(), semantic.clone()));
        let keyword = Arc::new(KeywordStrategy::new(deps.clone()));
        let agent = Arc::new(AgentOptimizedStrategy::new(deps.clone()));
        let entity = Arc::new(EntityAwareStrategy::new(deps, hybrid.clone()));

        let mut table = Self::default();
        table.register(semantic);
        table.register(hybrid);
        table.register(keyword);
        table.register(agent);
        table.register(entity);
        table
    }

    /// Add or replace the implementation for the strategy's kind
    pub fn register(&mut self, strategy: Arc<dyn RetrievalStrategy>) {
        self.strategies.insert(strategy.kind(), strategy);
    }

    pub fn get(&self, kind: StrategyKind) -> Option<Arc<dyn RetrievalStrategy>> {
        self.strategies.get(&kind).cloned()
    }

    pub fn kinds(&self) -> Vec<StrategyKind> {
        let mut kinds: Vec<StrategyKind> = self.strategies.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

pub(crate) fn millis(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Embed through the breaker, substituting a zero vector on rejection or failure
pub(crate) async fn embed_or_zero(
    deps: &StrategyDeps,
    text: &str,
    domain_hint: Option<&str>,
) -> Result<CallOutcome<Vec<f32>>> {
    let embedder = &deps.collaborators.embedder;
    let dimension = embedder.dimension();
    deps.breakers
        .get(EMBEDDING)
        .execute(
            || embedder.embed(text, domain_hint),
            |_| async move { Ok(vec![0.0; dimension]) },
        )
        .await
}

/// Vector search through the breaker, substituting no matches on rejection or failure
pub(crate) async fn search_or_empty(
    deps: &StrategyDeps,
    vector: &[f32],
    top_k: usize,
    min_score: f32,
    filter: &SearchFilter,
) -> Result<CallOutcome<Vec<VectorMatch>>> {
    let store = &deps.collaborators.vector_store;
    deps.breakers
        .get(VECTOR_STORE)
        .execute(
            || store.search(vector, top_k, min_score, filter),
            |_| async { Ok(Vec::new()) },
        )
        .await
}

/// Vector reads billed for one search; at least one per call
pub(crate) fn vectors_read(matches: usize) -> u64 {
    matches.max(1) as u64
}

/// Sort score-descending; equal scores keep their order
pub(crate) fn sort_by_score(passages: &mut [Passage]) {
    passages.sort_by(|a, b| b.score.total_cmp(&a.score));
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_standard_table_has_all_strategies() {
        let script = Arc::new(Script::default());
        let table = StrategyTable::standard(deps(&script, Arc::new(StaticFeatureFlags::new())));
        assert_eq!(table.kinds(), StrategyKind::ALL.to_vec());
        for kind in StrategyKind::ALL {
            assert_eq!(table.get(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn test_sort_by_score_is_stable() {
        let passage = |id: &str, score: f32| Passage {
            content: String::new(),
            source_id: id.to_string(),
            score,
            domain_tags: Vec::new(),
        };
        let mut passages = vec![passage("a", 0.5), passage("b", 0.9), passage("c", 0.5)];
        sort_by_score(&mut passages);
        let ids: Vec<&str> = passages.iter().map(|p| p.source_id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_vectors_read_minimum_one() {
        assert_eq!(vectors_read(0), 1);
        assert_eq!(vectors_read(7), 7);
    }
}
