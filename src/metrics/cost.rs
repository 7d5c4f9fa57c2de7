//! Cost tracker
//!
//! Attributes a USD cost to every billable operation and checks rolling
//! spend against the configured budget. Budget checks are advisory: tracking
//! never blocks an operation.

use crate::metrics::pricing::{CostOperation, PricingTable};
use crate::metrics::ring::RingBuffer;
use crate::metrics::{in_window, window_start};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::warn;
use uuid::Uuid;

/// One billable operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostEntry {
    pub query_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub requester_id: Option<String>,
    pub agent_id: Option<String>,
    pub operation: CostOperation,
    pub provider: String,
    pub model: String,
    pub units_consumed: u64,
    pub cost_usd: f64,
}

/// Who an operation is billed to
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attribution {
    pub query_id: Uuid,
    pub requester_id: Option<String>,
    pub agent_id: Option<String>,
}

impl Attribution {
    pub fn new(query_id: Uuid) -> Self {
        Self {
            query_id,
            ..Default::default()
        }
    }

    pub fn with_requester(mut self, requester_id: Option<String>) -> Self {
        self.requester_id = requester_id;
        self
    }

    pub fn with_agent(mut self, agent_id: Option<String>) -> Self {
        self.agent_id = agent_id;
        self
    }
}

/// Budget limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BudgetConfig {
    /// Rolling 24h limit (default: $50)
    pub daily_limit_usd: f64,

    /// Rolling 30d limit (default: $1000)
    pub monthly_limit_usd: f64,

    /// Limit for a single query (default: $0.05)
    pub per_query_limit_usd: f64,

    /// Percent of a limit that triggers an early warning (default: 80)
    pub alert_threshold_percent: f64,
}

impl Default for BudgetConfig {
    fn default() -> Self {
        Self {
            daily_limit_usd: 50.0,
            monthly_limit_usd: 1_000.0,
            per_query_limit_usd: 0.05,
            alert_threshold_percent: 80.0,
        }
    }
}

/// Cost tracker retention
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Entries retained (default: 50000)
    pub max_entries: usize,
}

impl Default for CostConfig {
    fn default() -> Self {
        Self { max_entries: 50_000 }
    }
}

/// Budget windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetWindow {
    Daily,
    Monthly,
}

impl std::fmt::Display for BudgetWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetWindow::Daily => f.write_str("daily"),
            BudgetWindow::Monthly => f.write_str("monthly"),
        }
    }
}

/// Budget alert types
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BudgetAlert {
    /// Spend crossed the alert threshold
    ApproachingLimit {
        window: BudgetWindow,
        spent_usd: f64,
        limit_usd: f64,
        percent_used: f64,
    },

    /// Spend reached or passed the limit
    LimitExceeded {
        window: BudgetWindow,
        spent_usd: f64,
        limit_usd: f64,
        percent_used: f64,
    },

    /// A single query cost more than the per-query limit
    QueryLimitExceeded {
        query_id: Uuid,
        spent_usd: f64,
        limit_usd: f64,
    },
}

impl BudgetAlert {
    pub fn is_exceeded(&self) -> bool {
        !matches!(self, BudgetAlert::ApproachingLimit { .. })
    }
}

impl std::fmt::Display for BudgetAlert {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BudgetAlert::ApproachingLimit {
                window,
                spent_usd,
                limit_usd,
                percent_used,
            } => write!(
                f,
                "Approaching {} budget: ${:.4} of ${:.2} ({:.1}%)",
                window, spent_usd, limit_usd, percent_used
            ),
            BudgetAlert::LimitExceeded {
                window,
                spent_usd,
                limit_usd,
                percent_used,
            } => write!(
                f,
                "{} budget exceeded: ${:.4} of ${:.2} ({:.1}%)",
                capitalize(&window.to_string()),
                spent_usd,
                limit_usd,
                percent_used
            ),
            BudgetAlert::QueryLimitExceeded {
                query_id,
                spent_usd,
                limit_usd,
            } => write!(
                f,
                "Query {} cost ${:.4}, above per-query limit ${:.4}",
                query_id, spent_usd, limit_usd
            ),
        }
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Rolling spend against the budget
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetStatus {
    pub daily_spend_usd: f64,
    pub daily_limit_usd: f64,
    pub daily_percent_used: f64,
    pub monthly_spend_usd: f64,
    pub monthly_limit_usd: f64,
    pub monthly_percent_used: f64,
    pub alerts: Vec<BudgetAlert>,
}

impl BudgetStatus {
    pub fn alert_messages(&self) -> Vec<String> {
        self.alerts.iter().map(|alert| alert.to_string()).collect()
    }
}

/// Aggregated cost over a window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CostStats {
    pub window_minutes: u64,
    pub entry_count: usize,
    pub query_count: usize,
    pub total_cost_usd: f64,
    pub cost_per_query_usd: f64,
    pub by_operation: BTreeMap<CostOperation, f64>,
    pub by_provider: BTreeMap<String, f64>,
    pub by_model: BTreeMap<String, f64>,
}

/// Cost tracker
#[derive(Debug)]
pub struct CostTracker {
    budget: BudgetConfig,
    pricing: PricingTable,
    entries: Mutex<RingBuffer<CostEntry>>,
}

impl CostTracker {
    /// Create tracker with default budget and standard pricing
    pub fn new() -> Self {
        Self::with_config(CostConfig::default(), BudgetConfig::default(), PricingTable::standard())
    }

    /// Create tracker with custom configuration
    pub fn with_config(config: CostConfig, budget: BudgetConfig, pricing: PricingTable) -> Self {
        Self {
            budget,
            pricing,
            entries: Mutex::new(RingBuffer::with_capacity(config.max_entries)),
        }
    }

    pub fn budget(&self) -> &BudgetConfig {
        &self.budget
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    /// Append a pre-built entry
    pub fn record(&self, entry: CostEntry) {
        self.entries.lock().push(entry);
    }

    pub fn track_embedding(
        &self,
        attribution: &Attribution,
        provider: &str,
        model: &str,
        tokens: u64,
    ) -> f64 {
        self.track(attribution, CostOperation::Embedding, provider, model, tokens, 0)
    }

    pub fn track_completion(
        &self,
        attribution: &Attribution,
        provider: &str,
        model: &str,
        prompt_tokens: u64,
        completion_tokens: u64,
    ) -> f64 {
        self.track(
            attribution,
            CostOperation::Completion,
            provider,
            model,
            prompt_tokens,
            completion_tokens,
        )
    }

    pub fn track_vector_search(
        &self,
        attribution: &Attribution,
        provider: &str,
        model: &str,
        vectors: u64,
    ) -> f64 {
        self.track(attribution, CostOperation::VectorSearch, provider, model, vectors, 0)
    }

    pub fn track_rerank(
        &self,
        attribution: &Attribution,
        provider: &str,
        model: &str,
        documents: u64,
    ) -> f64 {
        self.track(attribution, CostOperation::Rerank, provider, model, documents, 0)
    }

    pub fn track_extraction(
        &self,
        attribution: &Attribution,
        provider: &str,
        model: &str,
        tokens: u64,
    ) -> f64 {
        self.track(attribution, CostOperation::Extraction, provider, model, tokens, 0)
    }

    fn track(
        &self,
        attribution: &Attribution,
        operation: CostOperation,
        provider: &str,
        model: &str,
        input_units: u64,
        output_units: u64,
    ) -> f64 {
        let resolved = self.pricing.resolve(operation, provider, model);
        let cost_usd = input_units as f64 * resolved.price.input_per_unit
            + output_units as f64 * resolved.price.output_per_unit;

        self.record(CostEntry {
            query_id: attribution.query_id,
            timestamp: Utc::now(),
            requester_id: attribution.requester_id.clone(),
            agent_id: attribution.agent_id.clone(),
            operation,
            provider: resolved.provider,
            model: resolved.model,
            units_consumed: input_units + output_units,
            cost_usd,
        });
        cost_usd
    }

    /// Aggregate cost over the last `window_minutes`
    pub fn stats(&self, window_minutes: u64) -> CostStats {
        self.stats_at(Utc::now(), window_minutes)
    }

    pub fn stats_at(&self, now: DateTime<Utc>, window_minutes: u64) -> CostStats {
        let entries = self.window(now, window_start(now, window_minutes));
        let mut stats = CostStats {
            window_minutes,
            entry_count: entries.len(),
            ..Default::default()
        };

        let mut queries = HashSet::new();
        for entry in &entries {
            stats.total_cost_usd += entry.cost_usd;
            queries.insert(entry.query_id);
            *stats.by_operation.entry(entry.operation).or_default() += entry.cost_usd;
            *stats.by_provider.entry(entry.provider.clone()).or_default() += entry.cost_usd;
            *stats.by_model.entry(entry.model.clone()).or_default() += entry.cost_usd;
        }

        stats.query_count = queries.len();
        if stats.query_count > 0 {
            stats.cost_per_query_usd = stats.total_cost_usd / stats.query_count as f64;
        }
        stats
    }

    /// Cost per requester over the window; unattributed entries are skipped
    pub fn cost_by_requester(&self, window_minutes: u64) -> BTreeMap<String, f64> {
        self.group_by(window_minutes, |entry| entry.requester_id.clone())
    }

    /// Cost per agent over the window; unattributed entries are skipped
    pub fn cost_by_agent(&self, window_minutes: u64) -> BTreeMap<String, f64> {
        self.group_by(window_minutes, |entry| entry.agent_id.clone())
    }

    fn group_by<F>(&self, window_minutes: u64, key: F) -> BTreeMap<String, f64>
    where
        F: Fn(&CostEntry) -> Option<String>,
    {
        let mut groups = BTreeMap::new();
        let now = Utc::now();
        for entry in self.window(now, window_start(now, window_minutes)) {
            if let Some(key) = key(&entry) {
                *groups.entry(key).or_insert(0.0) += entry.cost_usd;
            }
        }
        groups
    }

    /// Total cost attributed to one query
    pub fn cost_for_query(&self, query_id: Uuid) -> f64 {
        self.entries
            .lock()
            .iter()
            .filter(|entry| entry.query_id == query_id)
            .map(|entry| entry.cost_usd)
            .sum()
    }

    /// Alert when a single query went over the per-query limit
    pub fn check_query_budget(&self, query_id: Uuid) -> Option<BudgetAlert> {
        let spent = self.cost_for_query(query_id);
        if spent > self.budget.per_query_limit_usd {
            let alert = BudgetAlert::QueryLimitExceeded {
                query_id,
                spent_usd: spent,
                limit_usd: self.budget.per_query_limit_usd,
            };
            warn!(alert = %alert, "per-query budget exceeded");
            Some(alert)
        } else {
            None
        }
    }

    /// Rolling 24h and 30d spend against the budget
    pub fn check_budget(&self) -> BudgetStatus {
        self.check_budget_at(Utc::now())
    }

    pub fn check_budget_at(&self, now: DateTime<Utc>) -> BudgetStatus {
        let daily = self.sum(now, ChronoDuration::hours(24));
        let monthly = self.sum(now, ChronoDuration::days(30));

        let mut status = BudgetStatus {
            daily_spend_usd: daily,
            daily_limit_usd: self.budget.daily_limit_usd,
            daily_percent_used: percent(daily, self.budget.daily_limit_usd),
            monthly_spend_usd: monthly,
            monthly_limit_usd: self.budget.monthly_limit_usd,
            monthly_percent_used: percent(monthly, self.budget.monthly_limit_usd),
            alerts: Vec::new(),
        };

        for (window, spent, limit, percent_used) in [
            (BudgetWindow::Daily, daily, status.daily_limit_usd, status.daily_percent_used),
            (
                BudgetWindow::Monthly,
                monthly,
                status.monthly_limit_usd,
                status.monthly_percent_used,
            ),
        ] {
            let alert = if percent_used >= 100.0 {
                Some(BudgetAlert::LimitExceeded {
                    window,
                    spent_usd: spent,
                    limit_usd: limit,
                    percent_used,
                })
            } else if percent_used >= self.budget.alert_threshold_percent {
                Some(BudgetAlert::ApproachingLimit {
                    window,
                    spent_usd: spent,
                    limit_usd: limit,
                    percent_used,
                })
            } else {
                None
            };

            if let Some(alert) = alert {
                warn!(alert = %alert, "budget alert");
                status.alerts.push(alert);
            }
        }

        status
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn sum(&self, now: DateTime<Utc>, window: ChronoDuration) -> f64 {
        self.window(now, now.checked_sub_signed(window))
            .iter()
            .map(|entry| entry.cost_usd)
            .sum()
    }

    fn window(&self, now: DateTime<Utc>, start: Option<DateTime<Utc>>) -> Vec<CostEntry> {
        self.entries
            .lock()
            .iter()
            .filter(|entry| in_window(entry.timestamp, start, now))
            .cloned()
            .collect()
    }
}

impl Default for CostTracker {
    fn default() -> Self {
        Self::new()
    }
}

fn percent(spent: f64, limit: f64) -> f64 {
    if limit <= 0.0 {
        0.0
    } else {
        spent / limit * 100.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::pricing::PriceEntry;

    fn entry(cost_usd: f64, operation: CostOperation, at: DateTime<Utc>) -> CostEntry {
        CostEntry {
            query_id: Uuid::new_v4(),
            timestamp: at,
            requester_id: None,
            agent_id: None,
            operation,
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            units_consumed: 1,
            cost_usd,
        }
    }

    fn tracker_with_budget(budget: BudgetConfig) -> CostTracker {
        CostTracker::with_config(CostConfig::default(), budget, PricingTable::standard())
    }

    #[test]
    fn test_track_embedding_cost() {
        let tracker = CostTracker::new();
        let attribution = Attribution::new(Uuid::new_v4());
        let cost =
            tracker.track_embedding(&attribution, "openai", "text-embedding-3-small", 1_000_000);
        assert!((cost - 0.02).abs() < 1e-9);
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_unknown_model_does_not_fail() {
        let tracker = CostTracker::new();
        let attribution = Attribution::new(Uuid::new_v4());
        let cost = tracker.track_embedding(&attribution, "openai", "mystery-model", 1_000_000);
        assert!((cost - 0.02).abs() < 1e-9);
        let stats = tracker.stats(60);
        assert!(stats.by_model.contains_key("mystery-model"));
    }

    #[test]
    fn test_completion_uses_both_rates() {
        let pricing = PricingTable::empty().with_entry(
            "acme",
            "chat",
            PriceEntry::per_million_tokens(1.0, 2.0),
        );
        let tracker =
            CostTracker::with_config(CostConfig::default(), BudgetConfig::default(), pricing);
        let attribution = Attribution::new(Uuid::new_v4());
        let cost = tracker.track_completion(&attribution, "acme", "chat", 1_000_000, 1_000_000);
        assert!((cost - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_stats_breakdowns_and_cost_per_query() {
        let tracker = CostTracker::new();
        let query = Uuid::new_v4();
        let attribution = Attribution::new(query);
        tracker.track_embedding(&attribution, "openai", "text-embedding-3-small", 500_000);
        tracker.track_vector_search(&attribution, "pinecone", "serverless", 1_000_000);
        let other = Attribution::new(Uuid::new_v4());
        tracker.track_embedding(&other, "openai", "text-embedding-3-small", 500_000);

        let stats = tracker.stats(60);
        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.query_count, 2);
        assert!((stats.total_cost_usd - (0.01 + 8.25 + 0.01)).abs() < 1e-9);
        assert!((stats.cost_per_query_usd - stats.total_cost_usd / 2.0).abs() < 1e-12);
        assert!((stats.by_operation[&CostOperation::Embedding] - 0.02).abs() < 1e-9);
        assert!((stats.by_provider["pinecone"] - 8.25).abs() < 1e-9);
    }

    #[test]
    fn test_window_with_no_entries_is_zero() {
        let tracker = CostTracker::new();
        let now = Utc::now();
        tracker.record(entry(1.0, CostOperation::Embedding, now - ChronoDuration::hours(3)));
        let stats = tracker.stats_at(now, 60);
        assert_eq!(stats.total_cost_usd, 0.0);
        assert_eq!(stats.cost_per_query_usd, 0.0);
        assert_eq!(tracker.stats_at(now, 240).total_cost_usd, 1.0);
    }

    #[test]
    fn test_huge_window_covers_everything() {
        let tracker = CostTracker::new();
        let now = Utc::now();
        let mut old = entry(1.0, CostOperation::Embedding, now - ChronoDuration::days(400));
        old.requester_id = Some("clinician-7".to_string());
        tracker.record(old);
        tracker.record(entry(2.0, CostOperation::Embedding, now));

        let stats = tracker.stats_at(now, u64::MAX);
        assert_eq!(stats.entry_count, 2);
        assert_eq!(stats.total_cost_usd, 3.0);
        assert_eq!(tracker.cost_by_requester(1_000_000_000_000)["clinician-7"], 1.0);
    }

    #[test]
    fn test_cost_by_requester_and_agent() {
        let tracker = CostTracker::new();
        let attribution = Attribution::new(Uuid::new_v4())
            .with_requester(Some("user-1".to_string()))
            .with_agent(Some("agent-7".to_string()));
        tracker.track_embedding(&attribution, "openai", "text-embedding-3-small", 1_000_000);
        let anonymous = Attribution::new(Uuid::new_v4());
        tracker.track_embedding(&anonymous, "openai", "text-embedding-3-small", 1_000_000);

        let by_requester = tracker.cost_by_requester(60);
        assert_eq!(by_requester.len(), 1);
        assert!((by_requester["user-1"] - 0.02).abs() < 1e-9);
        assert!(tracker.cost_by_agent(60).contains_key("agent-7"));
    }

    #[test]
    fn test_budget_below_threshold_has_no_alerts() {
        let tracker = CostTracker::new();
        tracker.record(entry(1.0, CostOperation::Completion, Utc::now()));
        let status = tracker.check_budget();
        assert!(status.alerts.is_empty());
        assert!((status.daily_percent_used - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_budget_approaching_and_exceeded() {
        let tracker = tracker_with_budget(BudgetConfig {
            daily_limit_usd: 10.0,
            monthly_limit_usd: 100.0,
            per_query_limit_usd: 1.0,
            alert_threshold_percent: 80.0,
        });
        let now = Utc::now();
        tracker.record(entry(8.5, CostOperation::Completion, now));
        let status = tracker.check_budget_at(now);
        assert_eq!(status.alerts.len(), 1);
        assert!(matches!(
            status.alerts[0],
            BudgetAlert::ApproachingLimit { window: BudgetWindow::Daily, .. }
        ));

        tracker.record(entry(2.0, CostOperation::Completion, now));
        let status = tracker.check_budget_at(now);
        assert!(status.alerts[0].is_exceeded());
        assert!(status.alert_messages()[0].starts_with("Daily budget exceeded"));
    }

    #[test]
    fn test_monthly_window_includes_older_spend() {
        let tracker = tracker_with_budget(BudgetConfig {
            daily_limit_usd: 10.0,
            monthly_limit_usd: 10.0,
            per_query_limit_usd: 1.0,
            alert_threshold_percent: 80.0,
        });
        let now = Utc::now();
        tracker.record(entry(12.0, CostOperation::Completion, now - ChronoDuration::days(3)));
        let status = tracker.check_budget_at(now);
        assert_eq!(status.daily_spend_usd, 0.0);
        assert_eq!(status.monthly_spend_usd, 12.0);
        assert_eq!(status.alerts.len(), 1);
        assert!(matches!(
            status.alerts[0],
            BudgetAlert::LimitExceeded { window: BudgetWindow::Monthly, .. }
        ));
    }

    #[test]
    fn test_per_query_budget() {
        let tracker = CostTracker::new();
        let query = Uuid::new_v4();
        let attribution = Attribution::new(query);
        tracker.track_completion(&attribution, "openai", "gpt-4o", 10_000, 2_000);
        assert!(tracker.check_query_budget(query).is_none());
        tracker.track_completion(&attribution, "openai", "gpt-4o", 20_000, 5_000);
        // 0.045 after the first call, 0.145 after the second
        let alert = tracker.check_query_budget(query).unwrap();
        assert!(alert.is_exceeded());
    }

    #[test]
    fn test_retention_trims_oldest() {
        let tracker = CostTracker::with_config(
            CostConfig { max_entries: 2 },
            BudgetConfig::default(),
            PricingTable::standard(),
        );
        let now = Utc::now();
        tracker.record(entry(1.0, CostOperation::Embedding, now));
        tracker.record(entry(2.0, CostOperation::Embedding, now));
        tracker.record(entry(4.0, CostOperation::Embedding, now));
        assert_eq!(tracker.len(), 2);
        assert_eq!(tracker.stats_at(now, 60).total_cost_usd, 6.0);
    }
}
