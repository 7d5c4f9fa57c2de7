//! Entity-aware strategy
//!
//! Gated by the `entity_aware_search` flag; when off, queries go to hybrid
//! unchanged. When on, entities pulled from the query each drive a keyword
//! search, a vector search covers the whole query, and the results merge with
//! first occurrence per source id winning. Any failure, including a query
//! with no entities, falls back to hybrid.

use super::keyword::score_hits;
use super::{
    sort_by_score, vectors_read, HybridStrategy, RetrievalStrategy, StrategyDeps, StrategyOutput,
    Usage,
};
use crate::errors::{RagError, Result};
use crate::rag::providers::ENTITY_AWARE_FLAG;
use crate::rag::text::{estimate_tokens, extract_entities, terms};
use crate::rag::types::{Passage, Query, StrategyKind};
use crate::resilience::{EMBEDDING, KEYWORD_STORE, VECTOR_STORE};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

pub struct EntityAwareStrategy {
    deps: StrategyDeps,
    hybrid: Arc<HybridStrategy>,
}

impl EntityAwareStrategy {
    pub fn new(deps: StrategyDeps, hybrid: Arc<HybridStrategy>) -> Self {
        Self { deps, hybrid }
    }

    async fn entity_search(
        &self,
        query: &Query,
        usage: &mut Vec<Usage>,
    ) -> Result<StrategyOutput> {
        let entities = extract_entities(&query.text);
        if entities.is_empty() {
            return Err(RagError::Generic("no entities found in query".to_string()));
        }
        debug!(entities = ?entities, "extracted query entities");

        usage.push(Usage::Extraction {
            tokens: estimate_tokens(&query.text),
        });
        let query_terms = terms(&query.text);
        let filter = query.filter();
        let mut merged: Vec<Passage> = Vec::new();

        let keyword_store = &self.deps.collaborators.keyword_store;
        for entity in &entities {
            let hits = self
                .deps
                .breakers
                .get(KEYWORD_STORE)
                .call(|| keyword_store.full_text_search(entity, &filter, query.max_results))
                .await?;
            merged.extend(score_hits(&query_terms, hits));
        }

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

        let vector_store = &self.deps.collaborators.vector_store;
        let matches = self
            .deps
            .breakers
            .get(VECTOR_STORE)
            .call(|| {
                vector_store.search(&vector, query.max_results, query.similarity_threshold, &filter)
            })
            .await?;
        usage.push(Usage::VectorSearch {
            vectors: vectors_read(matches.len()),
        });
        merged.extend(matches.into_iter().map(Passage::from));

        let mut passages = dedupe_by_source(merged);
        sort_by_score(&mut passages);
        passages.truncate(query.max_results);

        let output = StrategyOutput::new(StrategyKind::EntityAware, passages);
        Ok(output.with_usage(std::mem::take(usage)))
    }
}

/// Keep the first passage seen for each source id
pub(crate) fn dedupe_by_source(passages: Vec<Passage>) -> Vec<Passage> {
    let mut seen = HashSet::new();
    passages
        .into_iter()
        .filter(|passage| seen.insert(passage.source_id.clone()))
        .collect()
}

#[async_trait]
impl RetrievalStrategy for EntityAwareStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::EntityAware
    }

    async fn retrieve(&self, query: &Query) -> Result<StrategyOutput> {
        if !self.deps.collaborators.flags.is_enabled(ENTITY_AWARE_FLAG) {
            debug!("entity-aware search disabled, delegating to hybrid");
            return self.hybrid.retrieve(query).await;
        }

        let mut spent = Vec::new();
        match self.entity_search(query, &mut spent).await {
            Ok(output) => Ok(output),
            Err(err) => {
                warn!(error = %err, "entity-aware search failed, falling back to hybrid");
                let output = self.hybrid.retrieve(query).await?;
                Ok(output
                    .degraded(StrategyKind::EntityAware)
                    .with_prior_usage(spent))
            }
        }
    }
}
