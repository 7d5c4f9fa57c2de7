//! Keyword strategy: full-text search only, no fallback

use super::{sort_by_score, RetrievalStrategy, StrategyDeps, StrategyOutput};
use crate::errors::Result;
use crate::rag::providers::KeywordHit;
use crate::rag::text::{term_overlap, terms};
use crate::rag::types::{Passage, Query, StrategyKind};
use crate::resilience::KEYWORD_STORE;
use async_trait::async_trait;
use tracing::debug;

/// Hits fetched per requested result, so scoring has room to reorder
const OVERFETCH: usize = 3;

pub struct KeywordStrategy {
    deps: StrategyDeps,
}

impl KeywordStrategy {
    pub fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }
}

/// Score unordered hits by query-term overlap, best first
pub(crate) fn score_hits(query_terms: &[String], hits: Vec<KeywordHit>) -> Vec<Passage> {
    let mut passages: Vec<Passage> = hits
        .into_iter()
        .map(|hit| Passage {
            score: term_overlap(query_terms, &hit.content),
            content: hit.content,
            source_id: hit.source_id,
            domain_tags: hit.domain_tags,
        })
        .collect();
    sort_by_score(&mut passages);
    passages
}

#[async_trait]
impl RetrievalStrategy for KeywordStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Keyword
    }

    async fn retrieve(&self, query: &Query) -> Result<StrategyOutput> {
        let store = &self.deps.collaborators.keyword_store;
        let filter = query.filter();
        let hits = self
            .deps
            .breakers
            .get(KEYWORD_STORE)
            .call(|| {
                store.full_text_search(
                    &query.text,
                    &filter,
                    query.max_results.saturating_mul(OVERFETCH),
                )
            })
            .await?;

        let mut passages = score_hits(&terms(&query.text), hits);
        passages.truncate(query.max_results);
        debug!(passages = passages.len(), "keyword retrieval complete");

        Ok(StrategyOutput::new(StrategyKind::Keyword, passages))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::*;
    use super::*;
    use crate::errors::RagError;
    use crate::rag::providers::StaticFeatureFlags;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_scores_by_overlap_and_truncates() {
        let script = Arc::new(Script::default());
        *script.hits.lock() = vec![
            keyword_hit("partial", "glucose only"),
            keyword_hit("full", "glucose trends over time"),
            keyword_hit("other", "trends"),
        ];
        let strategy = KeywordStrategy::new(deps(&script, Arc::new(StaticFeatureFlags::new())));

        let output = strategy
            .retrieve(&Query::new("glucose trends").with_max_results(2))
            .await
            .unwrap();
        let ids: Vec<&str> = output.passages.iter().map(|p| p.source_id.as_str()).collect();
        assert_eq!(ids, vec!["full", "partial"]);
        assert_eq!(output.passages[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_store_failure_is_typed() {
        let script = Arc::new(Script::default());
        script.fail_keyword.store(true, Ordering::SeqCst);
        let strategy = KeywordStrategy::new(deps(&script, Arc::new(StaticFeatureFlags::new())));
        let err = strategy.retrieve(&Query::new("q")).await.unwrap_err();
        assert!(matches!(err, RagError::Dependency { .. }));
        assert!(err.is_dependency_failure());
    }
}
