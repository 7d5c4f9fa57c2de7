//! Demo workload over the in-memory collaborators

use crate::config::Config;
use crate::errors::Result;
use crate::rag::memory::{HashEmbedder, InMemoryKnowledgeStore};
use crate::rag::providers::Document;
use crate::rag::service::UnifiedRagService;
use crate::rag::strategies::Collaborators;
use crate::rag::types::{Query, RetrievalResult, StrategyKind};
use std::sync::Arc;

/// Requester used by demo queries that need an identity
pub const DEMO_REQUESTER: &str = "clinician-7";

const CORPUS: &[(&str, &str, &[&str])] = &[
    (
        "cgm-review",
        "Continuous glucose monitoring shows glucose trends across the day and flags \
        nocturnal lows.",
        &["clinical"],
    ),
    (
        "hba1c-targets",
        "HbA1c targets below 7 percent reduce microvascular complications for most \
        Type-2 patients.",
        &["clinical"],
    ),
    (
        "insulin-dosing",
        "Basal insulin dosing guidelines start at 10 units daily with weekly titration \
        against fasting glucose.",
        &["clinical"],
    ),
    (
        "metformin-label",
        "Metformin remains first-line therapy for Type-2 diabetes; dosing is reduced \
        when eGFR falls below 45.",
        &["clinical", "regulatory"],
    ),
    (
        "faers-summary",
        "FAERS reports list adverse events by preferred term; lactic acidosis is a rare \
        Metformin adverse event.",
        &["safety", "regulatory"],
    ),
    (
        "sglt2-safety",
        "SGLT2 inhibitors carry ketoacidosis warnings and require monitoring of adverse \
        events after surgery.",
        &["safety"],
    ),
    (
        "fda-submission",
        "An FDA 510(k) submission for a glucose meter needs accuracy data against a \
        laboratory reference.",
        &["regulatory"],
    ),
];

pub fn documents() -> Vec<Document> {
    CORPUS
        .iter()
        .map(|(id, content, domains)| {
            Document::new(*id, *content).with_domains(domains.iter().copied())
        })
        .collect()
}

/// Service over a fresh in-memory store, flags taken from `config`
pub fn build_service(config: &Config) -> UnifiedRagService {
    let store = Arc::new(InMemoryKnowledgeStore::new());
    let collaborators = Collaborators::new(Arc::new(HashEmbedder::default()), store.clone(), store)
        .with_flags(Arc::new(config.features.flags()));
    UnifiedRagService::new(collaborators, config)
}

/// Service with the demo corpus already ingested
pub async fn seeded_service(config: &Config) -> Result<UnifiedRagService> {
    let service = build_service(config);
    service.ingest(documents()).await?;
    Ok(service)
}

/// One query per strategy, then a repeat that the cache answers
pub fn queries() -> Vec<Query> {
    vec![
        Query::new("glucose trends").with_strategy(StrategyKind::Semantic),
        Query::new("insulin dosing guidelines").with_strategy(StrategyKind::Hybrid),
        Query::new("adverse events").with_strategy(StrategyKind::Keyword),
        Query::new("HbA1c targets for patients")
            .with_strategy(StrategyKind::AgentOptimized)
            .with_requester(DEMO_REQUESTER)
            .with_domains(["clinical"]),
        Query::new("dosing of Metformin for Type-2 diabetes")
            .with_strategy(StrategyKind::EntityAware),
        Query::new("glucose trends").with_strategy(StrategyKind::Semantic),
    ]
}

pub async fn run_workload(service: &UnifiedRagService) -> Vec<(Query, RetrievalResult)> {
    let mut results = Vec::new();
    for query in queries() {
        let result = service.query(query.clone()).await;
        results.push((query, result));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workload_never_errors_and_ends_cached() {
        let service = seeded_service(&Config::default()).await.unwrap();
        let results = run_workload(&service).await;

        assert_eq!(results.len(), queries().len());
        assert!(results.iter().all(|(_, result)| !result.is_error()));
        let (_, last) = results.last().unwrap();
        assert!(last.cached);
        assert_eq!(last.strategy_used, "semantic");
        assert_eq!(service.latency().len(), results.len());
    }

    #[tokio::test]
    async fn test_keyword_finds_adverse_events() {
        let service = seeded_service(&Config::default()).await.unwrap();
        let result = service
            .query(Query::new("adverse events").with_strategy(StrategyKind::Keyword))
            .await;
        let ids: Vec<&str> = result.passages.iter().map(|p| p.source_id.as_str()).collect();
        assert!(ids.contains(&"faers-summary"));
        assert!(ids.contains(&"sglt2-safety"));
        assert_eq!(result.passages[0].score, 1.0);
    }

    #[tokio::test]
    async fn test_entity_query_delegates_when_flag_off() {
        let service = seeded_service(&Config::default()).await.unwrap();
        let result = service
            .query(Query::new("dosing of Metformin").with_strategy(StrategyKind::EntityAware))
            .await;
        assert_eq!(result.strategy_used, "hybrid");
        assert_eq!(result.degraded_from, None);
    }
}
