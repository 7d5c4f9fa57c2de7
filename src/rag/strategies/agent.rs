//! Agent-optimized strategy
//!
//! Requires a requester or agent identity. Embeds with the query's domains as
//! a hint, over-fetches candidates without a domain filter, then boosts
//! candidates tagged with one of the query's domains.

use super::{
    embed_or_zero, millis, search_or_empty, sort_by_score, vectors_read, RetrievalStrategy,
    StrategyDeps, StrategyOutput, Usage,
};
use crate::errors::{RagError, Result};
use crate::rag::text::estimate_tokens;
use crate::rag::types::{Passage, PhaseTiming, Query, SearchFilter, StrategyKind};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::debug;

/// Score multiplier for passages in one of the query's domains
pub const DOMAIN_BOOST: f32 = 1.2;

/// Candidates fetched per requested result
const CANDIDATE_MULTIPLIER: usize = 2;

pub struct AgentOptimizedStrategy {
    deps: StrategyDeps,
}

impl AgentOptimizedStrategy {
    pub fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }
}

/// Boost in-domain passages (capped at 1.0), re-sort, keep `limit`
pub(crate) fn boost_domains(
    mut passages: Vec<Passage>,
    domains: &BTreeSet<String>,
    limit: usize,
) -> Vec<Passage> {
    if !domains.is_empty() {
        for passage in passages.iter_mut() {
            if passage.domain_tags.iter().any(|tag| domains.contains(tag)) {
                passage.score = (passage.score * DOMAIN_BOOST).min(1.0);
            }
        }
    }
    sort_by_score(&mut passages);
    passages.truncate(limit);
    passages
}

#[async_trait]
impl RetrievalStrategy for AgentOptimizedStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::AgentOptimized
    }

    async fn retrieve(&self, query: &Query) -> Result<StrategyOutput> {
        let identity = query.identity().ok_or_else(|| {
            RagError::Precondition(
                "agent-optimized retrieval requires a requester or agent identity".to_string(),
            )
        })?;

        let hint = (!query.domain_filter.is_empty())
            .then(|| query.domain_filter.iter().cloned().collect::<Vec<_>>().join(" "));

        let started = Instant::now();
        let embedding = embed_or_zero(&self.deps, &query.text, hint.as_deref()).await?;
        let embedding_ms = millis(started.elapsed());
        let embedding_substituted = embedding.is_fallback();

        let search_started = Instant::now();
        let vector = embedding.into_inner();
        let candidates = search_or_empty(
            &self.deps,
            &vector,
            query.max_results.saturating_mul(CANDIDATE_MULTIPLIER),
            query.similarity_threshold,
            &SearchFilter::default(),
        )
        .await?;
        let search_ms = millis(search_started.elapsed());

        if embedding_substituted && candidates.is_fallback() {
            return Err(RagError::AllDependenciesFailed {
                strategy: StrategyKind::AgentOptimized.to_string(),
            });
        }
        let search_substituted = candidates.is_fallback();
        let candidates: Vec<Passage> = candidates
            .into_inner()
            .into_iter()
            .map(Passage::from)
            .collect();
        let candidate_count = candidates.len();

        let rerank_started = Instant::now();
        let passages = boost_domains(candidates, &query.domain_filter, query.max_results);
        let rerank_ms = millis(rerank_started.elapsed());

        let mut usage = Vec::new();
        if !embedding_substituted {
            usage.push(Usage::Embedding {
                tokens: estimate_tokens(&query.text),
            });
        }
        if !search_substituted {
            usage.push(Usage::VectorSearch {
                vectors: vectors_read(candidate_count),
            });
        }
        usage.push(Usage::Rerank {
            documents: candidate_count as u64,
        });

        debug!(
            identity,
            candidates = candidate_count,
            passages = passages.len(),
            "agent-optimized retrieval complete"
        );

        Ok(StrategyOutput::new(StrategyKind::AgentOptimized, passages)
            .with_timing(PhaseTiming::measured(embedding_ms, search_ms, rerank_ms))
            .with_usage(usage))
    }
}
