//! Latency tracker
//!
//! Retains the most recent samples in a ring buffer and computes P50/P95/P99
//! per retrieval phase over a sliding time window.

use crate::metrics::ring::RingBuffer;
use crate::metrics::stats::{mean, PercentileStats};
use crate::metrics::{in_window, window_start};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::warn;
use uuid::Uuid;

/// Timing record for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencySample {
    pub query_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub strategy: String,
    pub cache_hit: bool,
    pub embedding_ms: f64,
    pub vector_search_ms: f64,
    pub rerank_ms: f64,
    pub total_ms: f64,
}

impl LatencySample {
    /// Sample for a query answered from the cache
    pub fn cache_hit(query_id: Uuid, strategy: impl Into<String>, total_ms: f64) -> Self {
        Self {
            query_id,
            timestamp: Utc::now(),
            strategy: strategy.into(),
            cache_hit: true,
            embedding_ms: 0.0,
            vector_search_ms: 0.0,
            rerank_ms: 0.0,
            total_ms,
        }
    }
}

/// Latency tracker configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Samples retained (default: 10000)
    pub max_samples: usize,

    /// Single-sample slow query ceiling (default: 2000ms)
    pub slow_query_threshold_ms: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            max_samples: 10_000,
            slow_query_threshold_ms: 2_000.0,
        }
    }
}

/// Raised when a single sample exceeds the slow query ceiling
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlowQueryAlert {
    pub query_id: Uuid,
    pub strategy: String,
    pub total_ms: f64,
    pub threshold_ms: f64,
}

/// Per-phase statistics over a window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyBreakdown {
    pub window_minutes: u64,
    pub sample_count: usize,
    pub embedding: PercentileStats,
    pub vector_search: PercentileStats,
    pub rerank: PercentileStats,
    pub total: PercentileStats,
    /// Fraction of samples served from cache (0.0 to 1.0)
    pub cache_hit_rate: f64,
    pub avg_cache_hit_ms: f64,
    pub avg_cache_miss_ms: f64,
}

impl LatencyBreakdown {
    fn compute(samples: &[&LatencySample], window_minutes: u64) -> Self {
        if samples.is_empty() {
            return Self {
                window_minutes,
                ..Default::default()
            };
        }

        let phase = |f: fn(&LatencySample) -> f64| -> Vec<f64> {
            samples.iter().map(|s| f(s)).collect()
        };

        let hits: Vec<f64> = samples
            .iter()
            .filter(|s| s.cache_hit)
            .map(|s| s.total_ms)
            .collect();
        let misses: Vec<f64> = samples
            .iter()
            .filter(|s| !s.cache_hit)
            .map(|s| s.total_ms)
            .collect();

        Self {
            window_minutes,
            sample_count: samples.len(),
            embedding: PercentileStats::from_values(&phase(|s| s.embedding_ms)),
            vector_search: PercentileStats::from_values(&phase(|s| s.vector_search_ms)),
            rerank: PercentileStats::from_values(&phase(|s| s.rerank_ms)),
            total: PercentileStats::from_values(&phase(|s| s.total_ms)),
            cache_hit_rate: hits.len() as f64 / samples.len() as f64,
            avg_cache_hit_ms: mean(&hits),
            avg_cache_miss_ms: mean(&misses),
        }
    }
}

/// Latency tracker
#[derive(Debug)]
pub struct LatencyTracker {
    config: LatencyConfig,
    samples: Mutex<RingBuffer<LatencySample>>,
    slow_query_alerts: AtomicU64,
}

impl LatencyTracker {
    /// Create tracker with default configuration
    pub fn new() -> Self {
        Self::with_config(LatencyConfig::default())
    }

    /// Create tracker with custom configuration
    pub fn with_config(config: LatencyConfig) -> Self {
        let samples = Mutex::new(RingBuffer::with_capacity(config.max_samples));
        Self {
            config,
            samples,
            slow_query_alerts: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &LatencyConfig {
        &self.config
    }

    /// Append a sample and evaluate the slow query rule
    pub fn record(&self, sample: LatencySample) -> Option<SlowQueryAlert> {
        let alert = if sample.total_ms > self.config.slow_query_threshold_ms {
            Some(SlowQueryAlert {
                query_id: sample.query_id,
                strategy: sample.strategy.clone(),
                total_ms: sample.total_ms,
                threshold_ms: self.config.slow_query_threshold_ms,
            })
        } else {
            None
        };

        self.samples.lock().push(sample);

        if let Some(alert) = &alert {
            self.slow_query_alerts.fetch_add(1, Ordering::Relaxed);
            warn!(
                query_id = %alert.query_id,
                strategy = %alert.strategy,
                total_ms = alert.total_ms,
                threshold_ms = alert.threshold_ms,
                "slow query"
            );
        }
        alert
    }

    /// Statistics over the last `window_minutes`
    pub fn breakdown(&self, window_minutes: u64) -> LatencyBreakdown {
        self.breakdown_at(Utc::now(), window_minutes)
    }

    pub fn breakdown_at(&self, now: DateTime<Utc>, window_minutes: u64) -> LatencyBreakdown {
        let samples = self.window(now, window_minutes);
        let refs: Vec<&LatencySample> = samples.iter().collect();
        LatencyBreakdown::compute(&refs, window_minutes)
    }

    /// Statistics over the last `window_minutes`, partitioned by strategy
    pub fn breakdown_by_strategy(&self, window_minutes: u64) -> BTreeMap<String, LatencyBreakdown> {
        self.breakdown_by_strategy_at(Utc::now(), window_minutes)
    }

    pub fn breakdown_by_strategy_at(
        &self,
        now: DateTime<Utc>,
        window_minutes: u64,
    ) -> BTreeMap<String, LatencyBreakdown> {
        let samples = self.window(now, window_minutes);
        let mut groups: BTreeMap<String, Vec<&LatencySample>> = BTreeMap::new();
        for sample in &samples {
            groups.entry(sample.strategy.clone()).or_default().push(sample);
        }
        groups
            .into_iter()
            .map(|(strategy, group)| (strategy, LatencyBreakdown::compute(&group, window_minutes)))
            .collect()
    }

    /// Samples slower than the window's P95, slowest first; ties go to the
    /// most recent sample
    pub fn slow_queries(&self, window_minutes: u64, limit: usize) -> Vec<LatencySample> {
        self.slow_queries_at(Utc::now(), window_minutes, limit)
    }

    pub fn slow_queries_at(
        &self,
        now: DateTime<Utc>,
        window_minutes: u64,
        limit: usize,
    ) -> Vec<LatencySample> {
        let samples = self.window(now, window_minutes);
        let totals: Vec<f64> = samples.iter().map(|s| s.total_ms).collect();
        let p95 = PercentileStats::from_values(&totals).p95;

        let mut slow: Vec<LatencySample> = samples
            .into_iter()
            .rev()
            .filter(|s| s.total_ms > p95)
            .collect();
        slow.sort_by(|a, b| b.total_ms.total_cmp(&a.total_ms));
        slow.truncate(limit);
        slow
    }

    /// The `n` most recent samples, oldest first
    pub fn recent(&self, n: usize) -> Vec<LatencySample> {
        self.samples.lock().recent(n).into_iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn slow_query_alert_count(&self) -> u64 {
        self.slow_query_alerts.load(Ordering::Relaxed)
    }

    fn window(&self, now: DateTime<Utc>, window_minutes: u64) -> Vec<LatencySample> {
        let start = window_start(now, window_minutes);
        self.samples
            .lock()
            .iter()
            .filter(|s| in_window(s.timestamp, start, now))
            .cloned()
            .collect()
    }
}

impl Default for LatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}
