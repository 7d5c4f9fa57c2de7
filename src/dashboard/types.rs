//! Dashboard snapshot types

use crate::cache::CacheStats;
use crate::metrics::{BudgetStatus, CostStats, LatencyBreakdown, LatencySample};
use crate::resilience::BreakerSnapshot;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// SLO targets
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SloConfig {
    /// Latency P95 must stay below this (default: 2000ms)
    pub latency_p95_target_ms: f64,

    /// Minimum successful / total dependency requests (default: 0.999)
    pub availability_target: f64,

    /// Average cost per query must stay below this (default: $0.01)
    pub cost_per_query_ceiling_usd: f64,
}

impl Default for SloConfig {
    fn default() -> Self {
        Self {
            latency_p95_target_ms: 2_000.0,
            availability_target: 0.999,
            cost_per_query_ceiling_usd: 0.01,
        }
    }
}

/// Overall health derived from breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Critical,
}

impl OverallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallStatus::Healthy => "healthy",
            OverallStatus::Degraded => "degraded",
            OverallStatus::Critical => "critical",
        }
    }
}

impl std::fmt::Display for OverallStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One SLO check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SloCheck {
    pub target: f64,
    pub actual: f64,
    pub compliant: bool,
}

impl SloCheck {
    /// Compliant when `actual` is strictly below `target`
    pub fn below(target: f64, actual: f64) -> Self {
        Self {
            target,
            actual,
            compliant: actual < target,
        }
    }

    /// Compliant when `actual` is at least `target`
    pub fn at_least(target: f64, actual: f64) -> Self {
        Self {
            target,
            actual,
            compliant: actual >= target,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SloReport {
    pub latency_p95_ms: SloCheck,
    pub availability: SloCheck,
    pub cost_per_query_usd: SloCheck,
}

impl SloReport {
    pub fn all_compliant(&self) -> bool {
        self.latency_p95_ms.compliant
            && self.availability.compliant
            && self.cost_per_query_usd.compliant
    }
}

/// Consolidated operator view over one window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub generated_at: DateTime<Utc>,
    pub window_minutes: u64,
    pub overall_status: OverallStatus,
    pub latency: LatencyBreakdown,
    pub latency_by_strategy: BTreeMap<String, LatencyBreakdown>,
    pub slow_queries: Vec<LatencySample>,
    pub cost: CostStats,
    pub budget: BudgetStatus,
    pub cache: CacheStats,
    pub breakers: Vec<BreakerSnapshot>,
    pub unhealthy_services: Vec<String>,
    pub slo: SloReport,
    pub recommendations: Vec<String>,
}
