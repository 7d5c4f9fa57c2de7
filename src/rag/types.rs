//! Query and result types for retrieval orchestration

use crate::errors::RagError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::str::FromStr;
use uuid::Uuid;

/// Named retrieval strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Semantic,
    Hybrid,
    Keyword,
    AgentOptimized,
    EntityAware,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 5] = [
        StrategyKind::Semantic,
        StrategyKind::Hybrid,
        StrategyKind::Keyword,
        StrategyKind::AgentOptimized,
        StrategyKind::EntityAware,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyKind::Semantic => "semantic",
            StrategyKind::Hybrid => "hybrid",
            StrategyKind::Keyword => "keyword",
            StrategyKind::AgentOptimized => "agent_optimized",
            StrategyKind::EntityAware => "entity_aware",
        }
    }
}

impl Default for StrategyKind {
    fn default() -> Self {
        StrategyKind::Hybrid
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = RagError;

    /// Accepts snake_case, kebab-case and camelCase spellings
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_lowercase();

        match normalized.as_str() {
            "semantic" => Ok(StrategyKind::Semantic),
            "hybrid" => Ok(StrategyKind::Hybrid),
            "keyword" => Ok(StrategyKind::Keyword),
            "agentoptimized" | "agent" => Ok(StrategyKind::AgentOptimized),
            "entityaware" | "entity" => Ok(StrategyKind::EntityAware),
            _ => Err(RagError::ConfigError(format!("Unknown retrieval strategy: {}", s))),
        }
    }
}

/// Domain scoping for searches; an empty filter matches everything
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub domains: BTreeSet<String>,
}

impl SearchFilter {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            domains: domains.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }

    /// True when the filter is empty or shares a domain with `tags`
    pub fn matches(&self, tags: &[String]) -> bool {
        self.is_empty() || tags.iter().any(|tag| self.domains.contains(tag))
    }
}

/// One retrieval request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub text: String,
    pub requester_id: Option<String>,
    pub agent_id: Option<String>,
    pub session_id: Option<String>,
    pub domain_filter: BTreeSet<String>,
    /// None uses the service's default strategy
    pub strategy: Option<StrategyKind>,
    pub max_results: usize,
    pub similarity_threshold: f32,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            requester_id: None,
            agent_id: None,
            session_id: None,
            domain_filter: BTreeSet::new(),
            strategy: None,
            max_results: 10,
            similarity_threshold: 0.3,
        }
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = Some(strategy);
        self
    }

    pub fn with_requester(mut self, requester_id: impl Into<String>) -> Self {
        self.requester_id = Some(requester_id.into());
        self
    }

    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_domains<I, S>(mut self, domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.domain_filter = domains.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn filter(&self) -> SearchFilter {
        SearchFilter {
            domains: self.domain_filter.clone(),
        }
    }

    /// Non-empty requester or agent identity, requester first
    pub fn identity(&self) -> Option<&str> {
        [self.requester_id.as_deref(), self.agent_id.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .find(|id| !id.is_empty())
    }
}

/// One retrieved content fragment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    pub source_id: String,
    pub score: f32,
    pub domain_tags: Vec<String>,
}

/// Phase timing in milliseconds
///
/// When `estimated` is set the split is not measured: embedding is taken as
/// 30% of retrieval time and search as the remainder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseTiming {
    pub embedding_ms: f64,
    pub search_ms: f64,
    pub rerank_ms: f64,
    pub estimated: bool,
}

impl PhaseTiming {
    pub const EMBEDDING_SHARE: f64 = 0.3;

    pub fn measured(embedding_ms: f64, search_ms: f64, rerank_ms: f64) -> Self {
        Self {
            embedding_ms,
            search_ms,
            rerank_ms,
            estimated: false,
        }
    }

    /// 30/70 split of total retrieval time
    pub fn estimated(retrieval_ms: f64) -> Self {
        let embedding_ms = retrieval_ms * Self::EMBEDDING_SHARE;
        Self {
            embedding_ms,
            search_ms: retrieval_ms - embedding_ms,
            rerank_ms: 0.0,
            estimated: true,
        }
    }
}

/// Outcome of one `query()` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query_id: Uuid,
    pub passages: Vec<Passage>,
    pub context_text: String,
    /// Strategy that actually produced the passages, or "error"
    pub strategy_used: String,
    /// Requested strategy when the result came from a fallback
    pub degraded_from: Option<StrategyKind>,
    pub cached: bool,
    pub elapsed_ms: f64,
    /// Distinct source ids among the passages
    pub total_sources: usize,
    pub timing: PhaseTiming,
    pub error: Option<String>,
}

impl RetrievalResult {
    pub const ERROR_STRATEGY: &'static str = "error";

    pub fn empty(query_id: Uuid, strategy_used: impl Into<String>) -> Self {
        Self {
            query_id,
            passages: Vec::new(),
            context_text: String::new(),
            strategy_used: strategy_used.into(),
            degraded_from: None,
            cached: false,
            elapsed_ms: 0.0,
            total_sources: 0,
            timing: PhaseTiming::default(),
            error: None,
        }
    }

    /// Error-flavored result with no passages
    pub fn error(query_id: Uuid, message: impl Into<String>, elapsed_ms: f64) -> Self {
        Self {
            elapsed_ms,
            error: Some(message.into()),
            ..Self::empty(query_id, Self::ERROR_STRATEGY)
        }
    }

    pub fn is_error(&self) -> bool {
        self.strategy_used == Self::ERROR_STRATEGY
    }

    pub fn is_degraded(&self) -> bool {
        self.degraded_from.is_some()
    }
}

/// Number of distinct source ids in a passage list
pub fn count_sources(passages: &[Passage]) -> usize {
    passages
        .iter()
        .map(|passage| passage.source_id.as_str())
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_parse_spellings() {
        assert_eq!("semantic".parse::<StrategyKind>().unwrap(), StrategyKind::Semantic);
        assert_eq!(
            "agent-optimized".parse::<StrategyKind>().unwrap(),
            StrategyKind::AgentOptimized
        );
        assert_eq!(
            "entityAware".parse::<StrategyKind>().unwrap(),
            StrategyKind::EntityAware
        );
        assert!("vector".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn test_strategy_round_trips_through_as_str() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.as_str().parse::<StrategyKind>().unwrap(), kind);
        }
    }

    #[test]
    fn test_identity_skips_blank() {
        let query = Query::new("q").with_requester("  ").with_agent("agent-1");
        assert_eq!(query.identity(), Some("agent-1"));
        assert_eq!(Query::new("q").identity(), None);
    }

    #[test]
    fn test_filter_matches() {
        let filter = SearchFilter::new(["clinical"]);
        assert!(filter.matches(&["clinical".to_string(), "safety".to_string()]));
        assert!(!filter.matches(&["regulatory".to_string()]));
        assert!(SearchFilter::default().matches(&[]));
    }

    #[test]
    fn test_estimated_timing_split() {
        let timing = PhaseTiming::estimated(100.0);
        assert!(timing.estimated);
        assert!((timing.embedding_ms - 30.0).abs() < 1e-9);
        assert!((timing.search_ms - 70.0).abs() < 1e-9);
    }

    #[test]
    fn test_error_result() {
        let result = RetrievalResult::error(Uuid::new_v4(), "boom", 12.0);
        assert!(result.is_error());
        assert!(result.passages.is_empty());
        assert_eq!(result.error.as_deref(), Some("boom"));
    }

    #[test]
    fn test_count_sources() {
        let passage = |id: &str| Passage {
            content: String::new(),
            source_id: id.to_string(),
            score: 1.0,
            domain_tags: Vec::new(),
        };
        assert_eq!(count_sources(&[passage("a"), passage("b"), passage("a")]), 2);
    }
}
