//! Snapshot aggregation and recommendation rules
//!
//! Reads the trackers, the cache and the breaker registry; never writes to
//! them.

use crate::cache::ResultCache;
use crate::dashboard::types::{DashboardSnapshot, OverallStatus, SloCheck, SloConfig, SloReport};
use crate::metrics::{CostTracker, LatencyTracker};
use crate::resilience::{BreakerRegistry, BreakerSnapshot, CircuitState};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::debug;

/// Default dashboard window
pub const DEFAULT_WINDOW_MINUTES: u64 = 60;

/// Slow queries listed in a snapshot
const SLOW_QUERY_LIMIT: usize = 5;

/// Cache hit rate below which a longer TTL is suggested
const LOW_HIT_RATE: f64 = 0.30;

/// Share of total P95 above which embedding is called out
const EMBEDDING_DOMINANCE: f64 = 0.5;

pub const ALL_NOMINAL: &str = "All systems nominal";

type Rule = fn(&DashboardSnapshot, &SloConfig) -> Vec<String>;

/// Recommendation rules, evaluated in order
const RULES: [Rule; 7] = [
    latency_rule,
    cache_rule,
    embedding_rule,
    cost_rule,
    breaker_rule,
    availability_rule,
    budget_rule,
];

/// Aggregates observability state into snapshots
pub struct MetricsDashboard {
    latency: Arc<LatencyTracker>,
    cost: Arc<CostTracker>,
    cache: Arc<ResultCache>,
    breakers: Arc<BreakerRegistry>,
    slo: SloConfig,
}

impl MetricsDashboard {
    pub fn new(
        latency: Arc<LatencyTracker>,
        cost: Arc<CostTracker>,
        cache: Arc<ResultCache>,
        breakers: Arc<BreakerRegistry>,
        slo: SloConfig,
    ) -> Self {
        Self {
            latency,
            cost,
            cache,
            breakers,
            slo,
        }
    }

    pub fn slo(&self) -> &SloConfig {
        &self.slo
    }

    pub fn snapshot(&self, window_minutes: u64) -> DashboardSnapshot {
        self.snapshot_at(Utc::now(), window_minutes)
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>, window_minutes: u64) -> DashboardSnapshot {
        let latency = self.latency.breakdown_at(now, window_minutes);
        let cost = self.cost.stats_at(now, window_minutes);
        let breakers = self.breakers.snapshots();
        let unhealthy_services: Vec<String> = breakers
            .iter()
            .filter(|breaker| breaker.state == CircuitState::Open)
            .map(|breaker| breaker.name.clone())
            .collect();

        let slo = SloReport {
            latency_p95_ms: SloCheck::below(self.slo.latency_p95_target_ms, latency.total.p95),
            availability: SloCheck::at_least(self.slo.availability_target, availability(&breakers)),
            cost_per_query_usd: SloCheck::below(
                self.slo.cost_per_query_ceiling_usd,
                cost.cost_per_query_usd,
            ),
        };

        let mut snapshot = DashboardSnapshot {
            generated_at: now,
            window_minutes,
            overall_status: overall_status(&breakers),
            latency_by_strategy: self.latency.breakdown_by_strategy_at(now, window_minutes),
            slow_queries: self.latency.slow_queries_at(now, window_minutes, SLOW_QUERY_LIMIT),
            latency,
            cost,
            budget: self.cost.check_budget_at(now),
            cache: self.cache.stats(),
            breakers,
            unhealthy_services,
            slo,
            recommendations: Vec::new(),
        };
        snapshot.recommendations = recommendations(&snapshot, &self.slo);

        debug!(
            status = %snapshot.overall_status,
            recommendations = snapshot.recommendations.len(),
            "dashboard snapshot built"
        );
        snapshot
    }
}

/// Critical if a critical dependency is open, degraded if any other is
pub fn overall_status(breakers: &[BreakerSnapshot]) -> OverallStatus {
    let open = breakers.iter().filter(|b| b.state == CircuitState::Open);
    let mut status = OverallStatus::Healthy;
    for breaker in open {
        if breaker.critical {
            return OverallStatus::Critical;
        }
        status = OverallStatus::Degraded;
    }
    status
}

/// Successful / total requests across breakers; 1.0 with no traffic
pub fn availability(breakers: &[BreakerSnapshot]) -> f64 {
    let total: u64 = breakers.iter().map(|b| b.total_requests).sum();
    if total == 0 {
        return 1.0;
    }
    let successful: u64 = breakers.iter().map(|b| b.successful_requests).sum();
    successful as f64 / total as f64
}

/// Run the rule table; "All systems nominal" when nothing fires
pub fn recommendations(snapshot: &DashboardSnapshot, slo: &SloConfig) -> Vec<String> {
    let mut out: Vec<String> = RULES.iter().flat_map(|rule| rule(snapshot, slo)).collect();
    if out.is_empty() {
        out.push(ALL_NOMINAL.to_string());
    }
    out
}

fn latency_rule(snapshot: &DashboardSnapshot, _slo: &SloConfig) -> Vec<String> {
    if snapshot.slo.latency_p95_ms.compliant {
        return Vec::new();
    }
    vec![format!(
        "P95 latency {:.0}ms exceeds the {:.0}ms target: enable result caching or extend its TTL",
        snapshot.slo.latency_p95_ms.actual, snapshot.slo.latency_p95_ms.target
    )]
}

fn cache_rule(snapshot: &DashboardSnapshot, _slo: &SloConfig) -> Vec<String> {
    if snapshot.latency.sample_count == 0 || snapshot.latency.cache_hit_rate >= LOW_HIT_RATE {
        return Vec::new();
    }
    vec![format!(
        "Cache hit rate {:.0}% is below {:.0}%: consider raising the cache TTL",
        snapshot.latency.cache_hit_rate * 100.0,
        LOW_HIT_RATE * 100.0
    )]
}

fn embedding_rule(snapshot: &DashboardSnapshot, _slo: &SloConfig) -> Vec<String> {
    let total = snapshot.latency.total.p95;
    let embedding = snapshot.latency.embedding.p95;
    if total <= 0.0 || embedding <= total * EMBEDDING_DOMINANCE {
        return Vec::new();
    }
    vec![format!(
        "Embedding accounts for {:.0}ms of {:.0}ms P95: cache embeddings or use a \
        faster embedding model",
        embedding, total
    )]
}

fn cost_rule(snapshot: &DashboardSnapshot, _slo: &SloConfig) -> Vec<String> {
    if snapshot.slo.cost_per_query_usd.compliant {
        return Vec::new();
    }
    vec![format!(
        "Cost per query ${:.4} exceeds the ${:.4} ceiling: route routine queries to \
        keyword search or the cache",
        snapshot.slo.cost_per_query_usd.actual, snapshot.slo.cost_per_query_usd.target
    )]
}

fn breaker_rule(snapshot: &DashboardSnapshot, _slo: &SloConfig) -> Vec<String> {
    if snapshot.unhealthy_services.is_empty() {
        return Vec::new();
    }
    vec![format!(
        "Circuit open for {}: check dependency health before the cool-down ends",
        snapshot.unhealthy_services.join(", ")
    )]
}

fn availability_rule(snapshot: &DashboardSnapshot, _slo: &SloConfig) -> Vec<String> {
    if snapshot.slo.availability.compliant {
        return Vec::new();
    }
    vec![format!(
        "Availability {:.2}% is below the {:.2}% target",
        snapshot.slo.availability.actual * 100.0,
        snapshot.slo.availability.target * 100.0
    )]
}

fn budget_rule(snapshot: &DashboardSnapshot, _slo: &SloConfig) -> Vec<String> {
    snapshot.budget.alert_messages()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::RagError;
    use crate::metrics::{CostEntry, CostOperation, LatencySample};
    use crate::resilience::{BreakerConfig, EMBEDDING, KEYWORD_STORE};
    use uuid::Uuid;

    fn breaker(name: &str, state: CircuitState, critical: bool) -> BreakerSnapshot {
        BreakerSnapshot {
            name: name.to_string(),
            state,
            critical,
            consecutive_failures: 0,
            last_failure_at: None,
            total_requests: 10,
            successful_requests: 10,
            failed_requests: 0,
            rejected_requests: 0,
            fallback_invocations: 0,
            current_cooldown_ms: 30_000,
        }
    }

    fn dashboard() -> (
        MetricsDashboard,
        Arc<LatencyTracker>,
        Arc<CostTracker>,
        Arc<BreakerRegistry>,
    ) {
        let latency = Arc::new(LatencyTracker::new());
        let cost = Arc::new(CostTracker::new());
        let breakers = Arc::new(BreakerRegistry::new());
        let dashboard = MetricsDashboard::new(
            latency.clone(),
            cost.clone(),
            Arc::new(ResultCache::new()),
            breakers.clone(),
            SloConfig::default(),
        );
        (dashboard, latency, cost, breakers)
    }

    fn sample(total_ms: f64, cache_hit: bool) -> LatencySample {
        LatencySample {
            query_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            strategy: "hybrid".to_string(),
            cache_hit,
            embedding_ms: total_ms * 0.3,
            vector_search_ms: total_ms * 0.7,
            rerank_ms: 0.0,
            total_ms,
        }
    }

    #[test]
    fn test_overall_status() {
        assert_eq!(overall_status(&[]), OverallStatus::Healthy);
        assert_eq!(
            overall_status(&[breaker("keyword-store", CircuitState::Open, false)]),
            OverallStatus::Degraded
        );
        assert_eq!(
            overall_status(&[
                breaker("keyword-store", CircuitState::Open, false),
                breaker("embedding", CircuitState::Open, true),
            ]),
            OverallStatus::Critical
        );
        assert_eq!(
            overall_status(&[breaker("embedding", CircuitState::HalfOpen, true)]),
            OverallStatus::Healthy
        );
    }

    #[test]
    fn test_availability() {
        assert_eq!(availability(&[]), 1.0);
        let mut flaky = breaker("vector-store", CircuitState::Closed, true);
        flaky.successful_requests = 5;
        assert_eq!(availability(&[breaker("embedding", CircuitState::Closed, true), flaky]), 0.75);
    }

    #[test]
    fn test_empty_snapshot_is_nominal() {
        let (dashboard, _, _, _) = dashboard();
        let snapshot = dashboard.snapshot(DEFAULT_WINDOW_MINUTES);
        assert_eq!(snapshot.overall_status, OverallStatus::Healthy);
        assert!(snapshot.slo.all_compliant());
        assert_eq!(snapshot.recommendations, vec![ALL_NOMINAL.to_string()]);
    }

    #[test]
    fn test_slow_uncached_traffic_recommends_caching() {
        let (dashboard, latency, _, _) = dashboard();
        for _ in 0..20 {
            latency.record(sample(2_500.0, false));
        }
        let snapshot = dashboard.snapshot(60);
        assert!(!snapshot.slo.latency_p95_ms.compliant);
        assert!(snapshot.recommendations.iter().any(|r| r.contains("P95 latency")));
        assert!(snapshot.recommendations.iter().any(|r| r.contains("Cache hit rate 0%")));
        assert!(!snapshot.recommendations.iter().any(|r| r == ALL_NOMINAL));
    }

    #[test]
    fn test_cost_ceiling_breach() {
        let (dashboard, _, cost, _) = dashboard();
        cost.record(CostEntry {
            query_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            requester_id: None,
            agent_id: None,
            operation: CostOperation::Completion,
            provider: "openai".to_string(),
            model: "gpt-4o".to_string(),
            units_consumed: 1,
            cost_usd: 0.5,
        });
        let snapshot = dashboard.snapshot(60);
        assert!(!snapshot.slo.cost_per_query_usd.compliant);
        assert!(snapshot.recommendations.iter().any(|r| r.starts_with("Cost per query")));
    }

    #[tokio::test]
    async fn test_open_critical_breaker_is_critical() {
        let (dashboard, _, _, breakers) = dashboard();
        let embedding = breakers.get(EMBEDDING);
        for _ in 0..BreakerConfig::default().failure_threshold {
            let _ = embedding
                .call(|| async { Err::<(), _>(RagError::dependency(EMBEDDING, "down")) })
                .await;
        }
        breakers.get(KEYWORD_STORE);

        let snapshot = dashboard.snapshot(60);
        assert_eq!(snapshot.overall_status, OverallStatus::Critical);
        assert_eq!(snapshot.unhealthy_services, vec![EMBEDDING.to_string()]);
        assert!(!snapshot.slo.availability.compliant);
        assert!(snapshot.recommendations.iter().any(|r| r.contains("Circuit open for embedding")));
    }
}
