//! Circuit breaker type definitions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Calls pass through (initial state)
    Closed,

    /// Calls are short-circuited until the cool-down elapses
    Open,

    /// One trial call is allowed through
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration for a single breaker
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before opening (default: 5)
    pub failure_threshold: u32,

    /// Initial cool-down before a half-open trial (default: 30s)
    pub cooldown_ms: u64,

    /// Cool-down cap for repeated trial failures (default: 5min)
    pub max_cooldown_ms: u64,

    /// Cool-down growth factor after a failed trial (default: 2.0)
    pub backoff_multiplier: f64,

    /// Per-call timeout; exceeding it counts as a failure (default: 10s)
    pub call_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown_ms: 30_000,
            max_cooldown_ms: 300_000,
            backoff_multiplier: 2.0,
            call_timeout_ms: 10_000,
        }
    }
}

impl BreakerConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }

    pub fn max_cooldown(&self) -> Duration {
        Duration::from_millis(self.max_cooldown_ms)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    /// Next cool-down after a failed half-open trial, capped
    pub fn next_cooldown(&self, current: Duration) -> Duration {
        let grown = current.as_millis() as f64 * self.backoff_multiplier.max(1.0);
        let capped = grown.min(self.max_cooldown_ms as f64) as u64;
        Duration::from_millis(capped.max(self.cooldown_ms.min(self.max_cooldown_ms)))
    }
}

/// Point-in-time view of a breaker, consumed by the dashboard
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub critical: bool,
    pub consecutive_failures: u32,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub rejected_requests: u64,
    pub fallback_invocations: u64,
    pub current_cooldown_ms: u64,
}

/// Value produced by a guarded call, tagged with where it came from
#[derive(Debug, Clone, PartialEq)]
pub enum CallOutcome<T> {
    /// The primary action succeeded
    Primary(T),

    /// The fallback action supplied the value
    Fallback(T),
}

impl<T> CallOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        matches!(self, CallOutcome::Fallback(_))
    }

    pub fn into_inner(self) -> T {
        match self {
            CallOutcome::Primary(value) | CallOutcome::Fallback(value) => value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_cooldown_doubles_and_caps() {
        let config = BreakerConfig {
            cooldown_ms: 1_000,
            max_cooldown_ms: 5_000,
            ..Default::default()
        };
        let first = config.next_cooldown(config.cooldown());
        assert_eq!(first, Duration::from_millis(2_000));
        let second = config.next_cooldown(first);
        assert_eq!(second, Duration::from_millis(4_000));
        let third = config.next_cooldown(second);
        assert_eq!(third, Duration::from_millis(5_000));
        assert_eq!(config.next_cooldown(third), Duration::from_millis(5_000));
    }

    #[test]
    fn test_call_outcome() {
        let primary = CallOutcome::Primary(3);
        let fallback = CallOutcome::Fallback(0);
        assert!(!primary.is_fallback());
        assert!(fallback.is_fallback());
        assert_eq!(primary.into_inner(), 3);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(CircuitState::HalfOpen.to_string(), "half_open");
    }
}
