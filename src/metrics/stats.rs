//! Percentile statistics
//!
//! Percentile index = floor(count × p), clamped to the last element, over the
//! ascending sort. Empty input yields all-zero statistics.

use serde::{Deserialize, Serialize};

/// Summary statistics for one latency series (milliseconds)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PercentileStats {
    pub count: usize,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

impl PercentileStats {
    /// Compute statistics for a set of values
    pub fn from_values(values: &[f64]) -> Self {
        if values.is_empty() {
            return Self::default();
        }

        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let sum: f64 = sorted.iter().sum();
        Self {
            count: sorted.len(),
            mean: sum / sorted.len() as f64,
            p50: percentile_sorted(&sorted, 0.50),
            p95: percentile_sorted(&sorted, 0.95),
            p99: percentile_sorted(&sorted, 0.99),
        }
    }
}

/// Percentile of an ascending-sorted slice; 0.0 when empty
pub fn percentile_sorted(sorted: &[f64], percentile: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let index = (sorted.len() as f64 * percentile.clamp(0.0, 1.0)).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

/// Percentile of unsorted values
pub fn percentile(values: &[f64], percentile: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, percentile)
}

/// Arithmetic mean; 0.0 when empty
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck_macros::quickcheck;

    #[test]
    fn test_known_sample_set() {
        let stats = PercentileStats::from_values(&[10.0, 20.0, 30.0, 40.0, 100.0]);
        assert_eq!(stats.count, 5);
        assert_eq!(stats.mean, 40.0);
        // floor(5 × 0.5) = 2
        assert_eq!(stats.p50, 30.0);
        // floor(5 × 0.95) = 4
        assert_eq!(stats.p95, 100.0);
        // floor(5 × 0.99) = 4
        assert_eq!(stats.p99, 100.0);
    }

    #[test]
    fn test_unsorted_input() {
        let stats = PercentileStats::from_values(&[100.0, 10.0, 40.0, 30.0, 20.0]);
        assert_eq!(stats.p50, 30.0);
    }

    #[test]
    fn test_empty_is_zero() {
        let stats = PercentileStats::from_values(&[]);
        assert_eq!(stats, PercentileStats::default());
        assert_eq!(percentile(&[], 0.95), 0.0);
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn test_single_value() {
        let stats = PercentileStats::from_values(&[42.0]);
        assert_eq!(stats.p50, 42.0);
        assert_eq!(stats.p99, 42.0);
    }

    #[test]
    fn test_percentile_clamps_upper_bound() {
        assert_eq!(percentile_sorted(&[1.0, 2.0], 1.0), 2.0);
    }

    #[quickcheck]
    fn prop_percentiles_ordered_and_bounded(values: Vec<u16>) -> bool {
        let values: Vec<f64> = values.into_iter().map(f64::from).collect();
        let stats = PercentileStats::from_values(&values);
        if values.is_empty() {
            return stats == PercentileStats::default();
        }
        let min = values.iter().cloned().fold(f64::MAX, f64::min);
        let max = values.iter().cloned().fold(f64::MIN, f64::max);
        stats.p50 <= stats.p95 && stats.p95 <= stats.p99 && stats.p50 >= min && stats.p99 <= max
    }
}
