//! Latency and cost observability
//!
//! Both trackers retain records in fixed-capacity ring buffers and aggregate
//! over sliding time windows on demand.

pub mod cost;
pub mod latency;
pub mod pricing;
pub mod ring;
pub mod stats;

pub use cost::{
    Attribution, BudgetAlert, BudgetConfig, BudgetStatus, BudgetWindow, CostConfig, CostEntry,
    CostStats, CostTracker,
};
pub use latency::{LatencyBreakdown, LatencyConfig, LatencySample, LatencyTracker, SlowQueryAlert};
pub use pricing::{CostOperation, PriceEntry, PricingTable};
pub use ring::RingBuffer;
pub use stats::PercentileStats;

use chrono::{DateTime, Duration as ChronoDuration, Utc};

/// Start of a window of `minutes` ending at `now`
///
/// Returns `None` when the window reaches past the earliest representable
/// timestamp; callers treat that as an unbounded window.
pub(crate) fn window_start(now: DateTime<Utc>, minutes: u64) -> Option<DateTime<Utc>> {
    let minutes = i64::try_from(minutes).ok()?;
    ChronoDuration::try_minutes(minutes).and_then(|span| now.checked_sub_signed(span))
}

/// Whether `at` falls inside the window `[start, now]`
pub(crate) fn in_window(
    at: DateTime<Utc>,
    start: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> bool {
    at <= now && start.map_or(true, |start| at >= start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_start_regular() {
        let now = Utc::now();
        assert_eq!(window_start(now, 60), Some(now - ChronoDuration::minutes(60)));
        assert_eq!(window_start(now, 0), Some(now));
    }

    #[test]
    fn test_window_start_overflow_is_unbounded() {
        let now = Utc::now();
        assert_eq!(window_start(now, 1_000_000_000_000), None);
        assert_eq!(window_start(now, u64::MAX), None);
        assert!(in_window(now - ChronoDuration::days(36_500), None, now));
        assert!(!in_window(now + ChronoDuration::seconds(1), None, now));
    }
}
