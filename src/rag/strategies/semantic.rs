//! Semantic strategy: embed, then vector similarity search
//!
//! Each step has a substitute when its breaker rejects or the call fails
//! (zero vector, empty result set). Only when both steps were substituted
//! does the strategy fail.

use super::{
    embed_or_zero, millis, search_or_empty, vectors_read, RetrievalStrategy, StrategyDeps,
    StrategyOutput, Usage,
};
use crate::errors::{RagError, Result};
use crate::rag::text::estimate_tokens;
use crate::rag::types::{Passage, PhaseTiming, Query, StrategyKind};
use async_trait::async_trait;
use std::time::Instant;
use tracing::debug;

pub struct SemanticStrategy {
    deps: StrategyDeps,
}

impl SemanticStrategy {
    pub fn new(deps: StrategyDeps) -> Self {
        Self { deps }
    }
}

#[async_trait]
impl RetrievalStrategy for SemanticStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Semantic
    }

    async fn retrieve(&self, query: &Query) -> Result<StrategyOutput> {
        let started = Instant::now();
        let embedding = embed_or_zero(&self.deps, &query.text, None).await?;
        let embedding_ms = millis(started.elapsed());
        let embedding_substituted = embedding.is_fallback();

        let search_started = Instant::now();
        let vector = embedding.into_inner();
        let matches = search_or_empty(
            &self.deps,
            &vector,
            query.max_results,
            query.similarity_threshold,
            &query.filter(),
        )
        .await?;
        let search_ms = millis(search_started.elapsed());

        if embedding_substituted && matches.is_fallback() {
            return Err(RagError::AllDependenciesFailed {
                strategy: StrategyKind::Semantic.to_string(),
            });
        }

        let mut usage = Vec::new();
        if !embedding_substituted {
            usage.push(Usage::Embedding {
                tokens: estimate_tokens(&query.text),
            });
        }
        let search_substituted = matches.is_fallback();
        let matches = matches.into_inner();
        if !search_substituted {
            usage.push(Usage::VectorSearch {
                vectors: vectors_read(matches.len()),
            });
        }

        debug!(
            passages = matches.len(),
            embedding_substituted,
            search_substituted,
            "semantic retrieval complete"
        );

        let passages: Vec<Passage> = matches.into_iter().map(Passage::from).collect();
        Ok(StrategyOutput::new(StrategyKind::Semantic, passages)
            .with_timing(PhaseTiming::measured(embedding_ms, search_ms, 0.0))
            .with_usage(usage))
    }
}
