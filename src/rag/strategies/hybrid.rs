//! Hybrid strategy: store-side combined vector + keyword search
//!
//! Any failure degrades to the semantic strategy. The fallback output keeps
//! reporting "semantic" as the strategy used and records hybrid as the
//! requested one.

use super::{
    millis, vectors_read, RetrievalStrategy, SemanticStrategy, StrategyDeps, StrategyOutput, Usage,
};
use crate::errors::Result;
use crate::rag::text::estimate_tokens;
use crate::rag::types::{Passage, Query, StrategyKind};
use crate::resilience::{EMBEDDING, VECTOR_STORE};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

pub struct HybridStrategy {
    deps: StrategyDeps,
    semantic: Arc<SemanticStrategy>,
}

impl HybridStrategy {
    pub fn new(deps: StrategyDeps, semantic: Arc<SemanticStrategy>) -> Self {
        Self { deps, semantic }
    }

    /// Billable calls land in `usage` as they succeed, so a failed attempt
    /// still reports what it spent.
    async fn combined(&self, query: &Query, usage: &mut Vec<Usage>) -> Result<StrategyOutput> {
        let embedder = &self.deps.collaborators.embedder;
        let vector = self
            .deps
            .breakers
            .get(EMBEDDING)
            .call(|| embedder.embed(&query.text, None))
            .await?;
        usage.push(Usage::Embedding {
            tokens: estimate_tokens(&query.text),
        });

        let store = &self.deps.collaborators.vector_store;
        let filter = query.filter();
        let matches = self
            .deps
            .breakers
            .get(VECTOR_STORE)
            .call(|| {
                store.hybrid_search(
                    &query.text,
                    &vector,
                    query.max_results,
                    query.similarity_threshold,
                    &filter,
                )
            })
            .await?;
        usage.push(Usage::VectorSearch {
            vectors: vectors_read(matches.len()),
        });

        let passages: Vec<Passage> = matches.into_iter().map(Passage::from).collect();
        Ok(StrategyOutput::new(StrategyKind::Hybrid, passages).with_usage(std::mem::take(usage)))
    }
}

#[async_trait]
impl RetrievalStrategy for HybridStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Hybrid
    }

    async fn retrieve(&self, query: &Query) -> Result<StrategyOutput> {
        let started = Instant::now();
        let mut spent = Vec::new();
        match self.combined(query, &mut spent).await {
            Ok(output) => {
                debug!(passages = output.passages.len(), "hybrid retrieval complete");
                Ok(output)
            }
            Err(err) => {
                warn!(
                    error = %err,
                    elapsed_ms = millis(started.elapsed()),
                    "hybrid search failed, degrading to semantic"
                );
                let output = self.semantic.retrieve(query).await?;
                Ok(output
                    .degraded(StrategyKind::Hybrid)
                    .with_prior_usage(spent))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::errors::RagError;
    use crate::rag::providers::StaticFeatureFlags;
    use std::sync::atomic::Ordering;

    fn setup() -> (Arc<Script>, HybridStrategy) {
        let script = Arc::new(Script::default());
        *script.matches.lock() = vec![vector_match("a", 0.9, &[]), vector_match("b", 0.6, &[])];
        let deps = deps(&script, Arc::new(StaticFeatureFlags::new()));
        let semantic = Arc::new(SemanticStrategy::new(deps.clone()));
        (script, HybridStrategy::new(deps, semantic))
    }

    #[tokio::test]
    async fn test_hybrid_success() {
        let (script, strategy) = setup();
        let output = strategy.retrieve(&Query::new("q")).await.unwrap();
        assert_eq!(output.strategy_used, StrategyKind::Hybrid);
        assert_eq!(output.degraded_from, None);
        // Timing is left to the orchestrator's estimate
        assert!(output.timing.is_none());
        assert_eq!(script.hybrid_calls.load(Ordering::SeqCst), 1);
        assert_eq!(script.search_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vector_layer_failure_degrades_to_semantic() {
        let (script, strategy) = setup();
        script.fail_hybrid.store(true, Ordering::SeqCst);
        let output = strategy.retrieve(&Query::new("q")).await.unwrap();
        assert_eq!(output.strategy_used, StrategyKind::Semantic);
        assert_eq!(output.degraded_from, Some(StrategyKind::Hybrid));
        assert_eq!(output.passages.len(), 2);
    }

    #[tokio::test]
    async fn test_fallback_keeps_embedding_already_spent() {
        let (script, strategy) = setup();
        script.fail_hybrid.store(true, Ordering::SeqCst);
        let output = strategy.retrieve(&Query::new("glucose trends")).await.unwrap();

        assert_eq!(script.embed_calls.load(Ordering::SeqCst), 2);
        let embeddings = output
            .usage
            .iter()
            .filter(|u| matches!(u, Usage::Embedding { .. }))
            .count();
        assert_eq!(embeddings, 2);
        assert_eq!(output.usage.len(), 3);
    }

    #[tokio::test]
    async fn test_semantic_failure_surfaces() {
        let (script, strategy) = setup();
        script.fail_embed.store(true, Ordering::SeqCst);
        script.fail_search.store(true, Ordering::SeqCst);
        let err = strategy.retrieve(&Query::new("q")).await.unwrap_err();
        assert!(matches!(err, RagError::AllDependenciesFailed { .. }));
    }
}
