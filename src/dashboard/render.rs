//! Terminal rendering of dashboard snapshots

use crate::dashboard::types::{DashboardSnapshot, OverallStatus, SloCheck};
use crate::metrics::PercentileStats;
use crate::resilience::CircuitState;
use colored::*;
use std::fmt::Write;

/// Multi-line colored report
pub fn render(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();

    let status = match snapshot.overall_status {
        OverallStatus::Healthy => "HEALTHY".green().bold(),
        OverallStatus::Degraded => "DEGRADED".yellow().bold(),
        OverallStatus::Critical => "CRITICAL".red().bold(),
    };
    let _ = writeln!(
        out,
        "{} {} (last {} min, generated {})",
        "Retrieval Dashboard:".bold().cyan(),
        status,
        snapshot.window_minutes,
        snapshot.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    );

    let _ = writeln!(out, "\n{}", "Latency (ms):".bold());
    let latency = &snapshot.latency;
    let _ = writeln!(
        out,
        "  {:<14} {:>6} {:>9} {:>9} {:>9} {:>9}",
        "phase", "count", "mean", "p50", "p95", "p99"
    );
    for (label, stats) in [
        ("embedding", &latency.embedding),
        ("vector search", &latency.vector_search),
        ("rerank", &latency.rerank),
        ("total", &latency.total),
    ] {
        let _ = writeln!(out, "  {}", stats_row(label, stats));
    }
    let _ = writeln!(
        out,
        "  cache hit rate {:.1}% (hit avg {:.1}ms, miss avg {:.1}ms)",
        latency.cache_hit_rate * 100.0,
        latency.avg_cache_hit_ms,
        latency.avg_cache_miss_ms
    );
    for (strategy, breakdown) in &snapshot.latency_by_strategy {
        let _ = writeln!(
            out,
            "  {:<16} {} queries, p95 {:.1}ms",
            strategy, breakdown.sample_count, breakdown.total.p95
        );
    }

    let _ = writeln!(out, "\n{}", "Cost:".bold());
    let _ = writeln!(
        out,
        "  total ${:.6} over {} queries (${:.6}/query)",
        snapshot.cost.total_cost_usd, snapshot.cost.query_count, snapshot.cost.cost_per_query_usd
    );
    for (operation, cost) in &snapshot.cost.by_operation {
        let _ = writeln!(out, "  {:<16} ${:.6}", operation.as_str(), cost);
    }
    let _ = writeln!(
        out,
        "  budget: daily {:.1}% of ${:.2}, monthly {:.1}% of ${:.2}",
        snapshot.budget.daily_percent_used,
        snapshot.budget.daily_limit_usd,
        snapshot.budget.monthly_percent_used,
        snapshot.budget.monthly_limit_usd
    );

    let _ = writeln!(out, "\n{}", "Cache:".bold());
    let cache = &snapshot.cache;
    let _ = writeln!(
        out,
        "  {}/{} entries, {} hits, {} misses, {} evictions, {} expirations",
        cache.size, cache.capacity, cache.hits, cache.misses, cache.evictions, cache.expirations
    );

    let _ = writeln!(out, "\n{}", "Dependencies:".bold());
    if snapshot.breakers.is_empty() {
        let _ = writeln!(out, "  (no calls yet)");
    }
    for breaker in &snapshot.breakers {
        let state = match breaker.state {
            CircuitState::Closed => breaker.state.as_str().green(),
            CircuitState::HalfOpen => breaker.state.as_str().yellow(),
            CircuitState::Open => breaker.state.as_str().red(),
        };
        let _ = writeln!(
            out,
            "  {:<16} {:<10} {} ok / {} total, {} rejected",
            breaker.name,
            state,
            breaker.successful_requests,
            breaker.total_requests,
            breaker.rejected_requests
        );
    }

    let _ = writeln!(out, "\n{}", "SLOs:".bold());
    let slo = &snapshot.slo;
    let _ = writeln!(out, "  {}", slo_row("latency p95 (ms)", &slo.latency_p95_ms, 1));
    let _ = writeln!(out, "  {}", slo_row("availability", &slo.availability, 4));
    let _ = writeln!(out, "  {}", slo_row("cost/query ($)", &slo.cost_per_query_usd, 6));

    let _ = writeln!(out, "\n{}", "Recommendations:".bold());
    for recommendation in &snapshot.recommendations {
        let _ = writeln!(out, "  - {}", recommendation);
    }

    out
}

fn stats_row(label: &str, stats: &PercentileStats) -> String {
    format!(
        "{:<14} {:>6} {:>9.1} {:>9.1} {:>9.1} {:>9.1}",
        label, stats.count, stats.mean, stats.p50, stats.p95, stats.p99
    )
}

fn slo_row(label: &str, check: &SloCheck, precision: usize) -> String {
    let mark = if check.compliant { "✓".green() } else { "✗".red() };
    format!(
        "{} {:<18} actual {:.*} target {:.*}",
        mark, label, precision, check.actual, precision, check.target
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ResultCache;
    use crate::dashboard::{MetricsDashboard, SloConfig};
    use crate::metrics::{CostTracker, LatencyTracker};
    use crate::resilience::BreakerRegistry;
    use std::sync::Arc;

    #[test]
    fn test_render_sections() {
        colored::control::set_override(false);
        let dashboard = MetricsDashboard::new(
            Arc::new(LatencyTracker::new()),
            Arc::new(CostTracker::new()),
            Arc::new(ResultCache::new()),
            Arc::new(BreakerRegistry::new()),
            SloConfig::default(),
        );
        let text = render(&dashboard.snapshot(60));
        assert!(text.contains("HEALTHY"));
        assert!(text.contains("Latency (ms):"));
        assert!(text.contains("(no calls yet)"));
        assert!(text.contains("All systems nominal"));
    }
}
