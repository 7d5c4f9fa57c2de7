//! Retrieval orchestrator
//!
//! `query()` is the single public entry point: cache lookup, strategy
//! dispatch through the [`StrategyTable`], context assembly, latency and cost
//! recording, cache write. It never fails; a strategy error or a panic in a
//! collaborator becomes an error-flavored [`RetrievalResult`].

use crate::cache::ResultCache;
use crate::config::Config;
use crate::dashboard::{DashboardSnapshot, MetricsDashboard};
use crate::errors::{RagError, Result};
use crate::metrics::{Attribution, CostTracker, LatencySample, LatencyTracker, PricingTable};
use crate::rag::context::ContextBuilder;
use crate::rag::providers::{Document, VectorRecord};
use crate::rag::strategies::{
    millis, Collaborators, RetrievalStrategy, StrategyDeps, StrategyOutput, StrategyTable, Usage,
};
use crate::rag::text::estimate_tokens;
use crate::rag::types::{count_sources, PhaseTiming, Query, RetrievalResult, StrategyKind};
use crate::resilience::{BreakerRegistry, EMBEDDING, VECTOR_STORE};
use chrono::Utc;
use futures_util::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Pricing key for the in-process domain boost pass
const RERANK_PROVIDER: (&str, &str) = ("local", "domain-boost");

/// Pricing key for heuristic entity extraction
const EXTRACTION_PROVIDER: (&str, &str) = ("local", "entity-heuristic");

/// Composition root for retrieval
///
/// Owns one cache, one latency tracker, one cost tracker and one breaker
/// registry; strategies share the registry so breaker state is per
/// dependency, not per strategy.
pub struct UnifiedRagService {
    collaborators: Collaborators,
    strategies: StrategyTable,
    default_strategy: StrategyKind,
    context: ContextBuilder,
    cache: Arc<ResultCache>,
    latency: Arc<LatencyTracker>,
    costs: Arc<CostTracker>,
    breakers: Arc<BreakerRegistry>,
    dashboard: MetricsDashboard,
}

impl UnifiedRagService {
    /// Build a service from collaborators and configuration
    ///
    /// Feature flags come from `collaborators.flags`; see
    /// [`crate::config::FeaturesConfig::flags`] for a config-backed source.
    pub fn new(collaborators: Collaborators, config: &Config) -> Self {
        Self::with_pricing(collaborators, config, PricingTable::standard())
    }

    pub fn with_pricing(
        collaborators: Collaborators,
        config: &Config,
        pricing: PricingTable,
    ) -> Self {
        let breakers = Arc::new(BreakerRegistry::with_config(
            config.breaker.defaults.clone(),
            config.breaker.overrides.clone(),
        ));
        let cache = Arc::new(ResultCache::with_config(config.cache.clone()));
        let latency = Arc::new(LatencyTracker::with_config(config.latency.clone()));
        let costs = Arc::new(CostTracker::with_config(
            config.cost.clone(),
            config.budget.clone(),
            pricing,
        ));

        let strategies = StrategyTable::standard(StrategyDeps {
            collaborators: collaborators.clone(),
            breakers: breakers.clone(),
        });

        let dashboard = MetricsDashboard::new(
            latency.clone(),
            costs.clone(),
            cache.clone(),
            breakers.clone(),
            config.slo.clone(),
        );

        Self {
            collaborators,
            strategies,
            default_strategy: config.retrieval.default_strategy,
            context: ContextBuilder::with_config(config.retrieval.context.clone()),
            cache,
            latency,
            costs,
            breakers,
            dashboard,
        }
    }

    /// Replace the implementation used for one strategy kind
    pub fn with_strategy(mut self, strategy: Arc<dyn RetrievalStrategy>) -> Self {
        self.strategies.register(strategy);
        self
    }

    pub fn default_strategy(&self) -> StrategyKind {
        self.default_strategy
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn latency(&self) -> &Arc<LatencyTracker> {
        &self.latency
    }

    pub fn costs(&self) -> &Arc<CostTracker> {
        &self.costs
    }

    pub fn breakers(&self) -> &Arc<BreakerRegistry> {
        &self.breakers
    }

    /// Run one query; never fails
    pub async fn query(&self, query: Query) -> RetrievalResult {
        let query_id = Uuid::new_v4();
        let started = Instant::now();

        if self.cache.is_enabled() {
            if let Some(mut hit) = self.cache.get(&query.text) {
                let elapsed_ms = millis(started.elapsed());
                hit.query_id = query_id;
                hit.cached = true;
                hit.elapsed_ms = elapsed_ms;
                self.latency.record(LatencySample::cache_hit(
                    query_id,
                    hit.strategy_used.clone(),
                    elapsed_ms,
                ));
                debug!(query_id = %query_id, strategy = %hit.strategy_used, "cache hit");
                return hit;
            }
        }

        let requested = query.strategy.unwrap_or(self.default_strategy);
        let outcome = AssertUnwindSafe(self.retrieve_with(requested, &query))
            .catch_unwind()
            .await
            .unwrap_or_else(|payload| {
                Err(RagError::Generic(format!(
                    "strategy {} panicked: {}",
                    requested,
                    panic_message(payload.as_ref())
                )))
            });

        match outcome {
            Ok(output) => self.complete(query_id, &query, output, started),
            Err(err) => {
                let elapsed_ms = millis(started.elapsed());
                warn!(
                    query_id = %query_id,
                    strategy = %requested,
                    error = %err,
                    "retrieval failed"
                );
                self.latency.record(sample(
                    query_id,
                    RetrievalResult::ERROR_STRATEGY,
                    &PhaseTiming::default(),
                    elapsed_ms,
                ));
                RetrievalResult::error(query_id, err.to_string(), elapsed_ms)
            }
        }
    }

    /// Run one strategy directly, surfacing its errors
    pub async fn retrieve_with(&self, kind: StrategyKind, query: &Query) -> Result<StrategyOutput> {
        let strategy = self
            .strategies
            .get(kind)
            .ok_or_else(|| RagError::ConfigError(format!("No strategy registered for {}", kind)))?;
        strategy.retrieve(query).await
    }

    fn complete(
        &self,
        query_id: Uuid,
        query: &Query,
        output: StrategyOutput,
        started: Instant,
    ) -> RetrievalResult {
        let retrieval_ms = millis(started.elapsed());
        let timing = output
            .timing
            .unwrap_or_else(|| PhaseTiming::estimated(retrieval_ms));

        let context_text = self.context.build(&output.passages);
        let elapsed_ms = millis(started.elapsed());

        self.latency.record(sample(
            query_id,
            output.strategy_used.as_str(),
            &timing,
            elapsed_ms,
        ));
        self.track_usage(query_id, query, &output.usage);

        if let Some(from) = output.degraded_from {
            info!(
                query_id = %query_id,
                requested = %from,
                used = %output.strategy_used,
                "served by fallback strategy"
            );
        }

        let result = RetrievalResult {
            query_id,
            total_sources: count_sources(&output.passages),
            passages: output.passages,
            context_text,
            strategy_used: output.strategy_used.to_string(),
            degraded_from: output.degraded_from,
            cached: false,
            elapsed_ms,
            timing,
            error: None,
        };

        // Degraded results would pin the fallback answer for the whole TTL
        if self.cache.is_enabled() && !result.is_degraded() {
            self.cache.put(&query.text, result.clone());
        }

        debug!(
            query_id = %query_id,
            strategy = %result.strategy_used,
            passages = result.passages.len(),
            elapsed_ms = result.elapsed_ms,
            "query complete"
        );
        result
    }

    fn track_usage(&self, query_id: Uuid, query: &Query, usage: &[Usage]) {
        if usage.is_empty() {
            return;
        }

        let attribution = Attribution::new(query_id)
            .with_requester(query.requester_id.clone())
            .with_agent(query.agent_id.clone());
        let embedder = &self.collaborators.embedder;
        let store = &self.collaborators.vector_store;

        for item in usage {
            match *item {
                Usage::Embedding { tokens } => {
                    self.costs.track_embedding(
                        &attribution,
                        embedder.provider(),
                        embedder.model(),
                        tokens,
                    );
                }
                Usage::VectorSearch { vectors } => {
                    self.costs.track_vector_search(
                        &attribution,
                        store.provider(),
                        store.model(),
                        vectors,
                    );
                }
                Usage::Rerank { documents } => {
                    let (provider, model) = RERANK_PROVIDER;
                    self.costs.track_rerank(&attribution, provider, model, documents);
                }
                Usage::Extraction { tokens } => {
                    let (provider, model) = EXTRACTION_PROVIDER;
                    self.costs.track_extraction(&attribution, provider, model, tokens);
                }
            }
        }

        if let Some(alert) = self.costs.check_query_budget(query_id) {
            warn!(query_id = %query_id, alert = %alert, "budget alert");
        }
    }

    /// Embed and upsert documents; returns the number stored
    ///
    /// Unlike queries, ingestion has no substitute values: a rejected or
    /// failed dependency call aborts the batch.
    pub async fn ingest(&self, documents: Vec<Document>) -> Result<usize> {
        if documents.is_empty() {
            return Ok(0);
        }

        let attribution = Attribution::new(Uuid::new_v4());
        let embedder = &self.collaborators.embedder;
        let embedding_breaker = self.breakers.get(EMBEDDING);

        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            let hint = document.domain_tags.first().map(String::as_str);
            let vector = embedding_breaker
                .call(|| embedder.embed(&document.content, hint))
                .await?;
            self.costs.track_embedding(
                &attribution,
                embedder.provider(),
                embedder.model(),
                estimate_tokens(&document.content),
            );
            records.push(VectorRecord {
                id: document.id,
                content: document.content,
                vector,
                domain_tags: document.domain_tags,
                metadata: document.metadata,
            });
        }

        let store = &self.collaborators.vector_store;
        let written = self
            .breakers
            .get(VECTOR_STORE)
            .call(|| store.upsert(records))
            .await?;

        // Cached answers may predate the new documents
        self.cache.clear();
        info!(documents = written, "ingested documents");
        Ok(written)
    }

    /// Consolidated operator view over the last `window_minutes`
    pub fn dashboard(&self, window_minutes: u64) -> DashboardSnapshot {
        self.dashboard.snapshot(window_minutes)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

fn sample(query_id: Uuid, strategy: &str, timing: &PhaseTiming, total_ms: f64) -> LatencySample {
    LatencySample {
        query_id,
        timestamp: Utc::now(),
        strategy: strategy.to_string(),
        cache_hit: false,
        embedding_ms: timing.embedding_ms,
        vector_search_ms: timing.search_ms,
        rerank_ms: timing.rerank_ms,
        total_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::providers::StaticFeatureFlags;
    use crate::rag::strategies::testing::*;
    use std::sync::atomic::Ordering;

    fn service(script: &Arc<Script>) -> UnifiedRagService {
        let deps = deps(script, Arc::new(StaticFeatureFlags::new()));
        UnifiedRagService::new(deps.collaborators, &Config::default())
    }

    #[tokio::test]
    async fn test_default_strategy_is_hybrid() {
        let script = Arc::new(Script::default());
        script.matches.lock().push(vector_match("a", 0.9, &[]));

        let result = service(&script).query(Query::new("glucose")).await;
        assert_eq!(result.strategy_used, "hybrid");
        assert_eq!(script.hybrid_calls.load(Ordering::SeqCst), 1);
        assert!(result.timing.estimated);
    }

    #[tokio::test]
    async fn test_precondition_becomes_error_result() {
        let script = Arc::new(Script::default());
        let service = service(&script);

        let query = Query::new("glucose").with_strategy(StrategyKind::AgentOptimized);
        let err = service
            .retrieve_with(StrategyKind::AgentOptimized, &query)
            .await
            .unwrap_err();
        assert!(err.is_precondition());

        let result = service.query(query).await;
        assert!(result.is_error());
        assert!(result.passages.is_empty());
        assert!(result.error.unwrap().contains("Precondition"));
        assert_eq!(service.latency().recent(1)[0].strategy, "error");
    }

    #[tokio::test]
    async fn test_degraded_result_not_cached() {
        let script = Arc::new(Script::default());
        script.fail_hybrid.store(true, Ordering::SeqCst);
        script.matches.lock().push(vector_match("a", 0.9, &[]));
        let service = service(&script);

        let result = service.query(Query::new("glucose")).await;
        assert_eq!(result.strategy_used, "semantic");
        assert_eq!(result.degraded_from, Some(StrategyKind::Hybrid));
        assert!(service.cache().is_empty());
    }

    #[tokio::test]
    async fn test_usage_priced_with_attribution() {
        let script = Arc::new(Script::default());
        script.matches.lock().push(vector_match("a", 0.9, &[]));
        let service = service(&script);

        let result = service
            .query(
                Query::new("glucose trends")
                    .with_strategy(StrategyKind::Semantic)
                    .with_requester("clinician-7"),
            )
            .await;

        assert!(service.costs().cost_for_query(result.query_id) > 0.0);
        let by_requester = service.costs().cost_by_requester(60);
        assert!(by_requester.contains_key("clinician-7"));
    }

    #[tokio::test]
    async fn test_ingest_clears_cache_and_upserts() {
        let script = Arc::new(Script::default());
        let service = service(&script);
        service.query(Query::new("glucose")).await;
        assert_eq!(service.cache().len(), 1);

        let written = service
            .ingest(vec![
                Document::new("d1", "insulin dosing").with_domains(["clinical"]),
                Document::new("d2", "adverse events"),
            ])
            .await
            .unwrap();
        assert_eq!(written, 2);
        assert!(service.cache().is_empty());
        // one embed per document on top of the earlier query
        assert_eq!(script.embed_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_ingest_fails_when_embedding_down() {
        let script = Arc::new(Script::default());
        script.fail_embed.store(true, Ordering::SeqCst);
        let service = service(&script);

        let err = service
            .ingest(vec![Document::new("d1", "insulin")])
            .await
            .unwrap_err();
        assert!(err.is_dependency_failure());
    }
}
