//! Per-dependency circuit breaker
//!
//! State machine:
//! - Closed    → Open      after `failure_threshold` consecutive failures
//! - Open      → Half-Open once the cool-down elapses
//! - Half-Open → Closed    when the single trial call succeeds
//! - Half-Open → Open      when the trial fails; cool-down grows by
//!   `backoff_multiplier` up to `max_cooldown_ms`
//!
//! The lock is never held across an await point, so every admit/record step
//! is atomic while the guarded calls themselves run concurrently.

use crate::errors::{RagError, Result};
use crate::resilience::types::{BreakerConfig, BreakerSnapshot, CallOutcome, CircuitState};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq)]
enum Phase {
    Closed,
    Open { until: Instant },
    HalfOpen { trial_started: Option<Instant> },
}

/// How a call was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Allowed,
    Trial,
    Rejected,
}

#[derive(Debug)]
struct BreakerInner {
    phase: Phase,
    consecutive_failures: u32,
    current_cooldown: Duration,
    last_failure_at: Option<DateTime<Utc>>,
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    rejected_requests: u64,
    fallback_invocations: u64,
}

impl BreakerInner {
    fn new(config: &BreakerConfig) -> Self {
        Self {
            phase: Phase::Closed,
            consecutive_failures: 0,
            current_cooldown: config.cooldown(),
            last_failure_at: None,
            total_requests: 0,
            successful_requests: 0,
            failed_requests: 0,
            rejected_requests: 0,
            fallback_invocations: 0,
        }
    }

    /// Move Open → Half-Open once the cool-down has elapsed
    fn refresh(&mut self, now: Instant) {
        if let Phase::Open { until } = self.phase {
            if now >= until {
                self.phase = Phase::HalfOpen { trial_started: None };
            }
        }
    }

    fn state(&self) -> CircuitState {
        match self.phase {
            Phase::Closed => CircuitState::Closed,
            Phase::Open { .. } => CircuitState::Open,
            Phase::HalfOpen { .. } => CircuitState::HalfOpen,
        }
    }

    fn admit(&mut self, now: Instant, config: &BreakerConfig) -> Admission {
        self.refresh(now);
        match self.phase {
            Phase::Closed => Admission::Allowed,
            Phase::Open { .. } => Admission::Rejected,
            Phase::HalfOpen { trial_started: None } => {
                self.phase = Phase::HalfOpen {
                    trial_started: Some(now),
                };
                Admission::Trial
            }
            Phase::HalfOpen {
                trial_started: Some(started),
            } => {
                // A trial that never reported back is abandoned after one timeout
                if now.duration_since(started) >= config.call_timeout() {
                    self.phase = Phase::HalfOpen {
                        trial_started: Some(now),
                    };
                    Admission::Trial
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    /// Returns true when the call closed the circuit
    fn on_success(&mut self, admission: Admission, config: &BreakerConfig) -> bool {
        self.successful_requests += 1;
        match (admission, self.phase) {
            (Admission::Trial, Phase::HalfOpen { .. }) => {
                self.phase = Phase::Closed;
                self.consecutive_failures = 0;
                self.current_cooldown = config.cooldown();
                true
            }
            (_, Phase::Closed) => {
                self.consecutive_failures = 0;
                false
            }
            _ => false,
        }
    }

    /// Returns the new state when the failure caused a transition
    fn on_failure(
        &mut self,
        admission: Admission,
        now: Instant,
        config: &BreakerConfig,
    ) -> Option<CircuitState> {
        self.failed_requests += 1;
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(Utc::now());

        match (admission, self.phase) {
            (Admission::Trial, Phase::HalfOpen { .. }) => {
                self.current_cooldown = config.next_cooldown(self.current_cooldown);
                self.phase = Phase::Open {
                    until: now + self.current_cooldown,
                };
                Some(CircuitState::Open)
            }
            (_, Phase::Closed) if self.consecutive_failures >= config.failure_threshold => {
                self.current_cooldown = config.cooldown();
                self.phase = Phase::Open {
                    until: now + self.current_cooldown,
                };
                Some(CircuitState::Open)
            }
            _ => None,
        }
    }
}

/// Circuit breaker guarding one named dependency
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    critical: bool,
    config: BreakerConfig,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    /// Create a breaker with the given configuration
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let inner = BreakerInner::new(&config);
        Self {
            name: name.into(),
            critical: false,
            config,
            inner: Mutex::new(inner),
        }
    }

    /// Mark the dependency as critical for health reporting
    pub fn with_critical(mut self, critical: bool) -> Self {
        self.critical = critical;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_critical(&self) -> bool {
        self.critical
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Current state, observing an elapsed cool-down as Half-Open
    pub fn state(&self) -> CircuitState {
        let mut inner = self.inner.lock();
        inner.refresh(Instant::now());
        inner.state()
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.inner.lock().consecutive_failures
    }

    /// Run `primary`, or `fallback` when the breaker rejects the call or the
    /// primary fails. Only a failing fallback surfaces an error.
    pub async fn execute<T, P, PF, F, FF>(&self, primary: P, fallback: F) -> Result<CallOutcome<T>>
    where
        P: FnOnce() -> PF,
        PF: Future<Output = Result<T>>,
        F: FnOnce(RagError) -> FF,
        FF: Future<Output = Result<T>>,
    {
        match self.guarded(primary).await {
            Ok(value) => Ok(CallOutcome::Primary(value)),
            Err(reason) => {
                self.inner.lock().fallback_invocations += 1;
                debug!(dependency = %self.name, reason = %reason, "running fallback");
                match fallback(reason).await {
                    Ok(value) => Ok(CallOutcome::Fallback(value)),
                    Err(err) => {
                        warn!(dependency = %self.name, error = %err, "fallback failed");
                        Err(err)
                    }
                }
            }
        }
    }

    /// Run `primary` with no fallback; rejection and failure are returned
    pub async fn call<T, P, PF>(&self, primary: P) -> Result<T>
    where
        P: FnOnce() -> PF,
        PF: Future<Output = Result<T>>,
    {
        self.guarded(primary).await
    }

    async fn guarded<T, P, PF>(&self, primary: P) -> Result<T>
    where
        P: FnOnce() -> PF,
        PF: Future<Output = Result<T>>,
    {
        let admission = {
            let mut inner = self.inner.lock();
            inner.total_requests += 1;
            let admission = inner.admit(Instant::now(), &self.config);
            if admission == Admission::Rejected {
                inner.rejected_requests += 1;
            }
            admission
        };

        match admission {
            Admission::Rejected => {
                debug!(dependency = %self.name, "call short-circuited");
                return Err(RagError::CircuitOpen {
                    dependency: self.name.clone(),
                });
            }
            Admission::Trial => {
                info!(dependency = %self.name, "circuit half-open, admitting trial call");
            }
            Admission::Allowed => {}
        }

        let timeout = self.config.call_timeout();
        let result = match tokio::time::timeout(timeout, primary()).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout {
                dependency: self.name.clone(),
                duration_ms: timeout.as_millis() as u64,
            }),
        };

        match result {
            Ok(value) => {
                let closed = self.inner.lock().on_success(admission, &self.config);
                if closed {
                    info!(dependency = %self.name, "circuit closed after successful trial");
                }
                Ok(value)
            }
            Err(err) => {
                let (transition, failures, cooldown) = {
                    let mut inner = self.inner.lock();
                    let transition = inner.on_failure(admission, Instant::now(), &self.config);
                    (transition, inner.consecutive_failures, inner.current_cooldown)
                };
                if transition == Some(CircuitState::Open) {
                    warn!(
                        dependency = %self.name,
                        consecutive_failures = failures,
                        cooldown_ms = cooldown.as_millis() as u64,
                        "circuit opened"
                    );
                }
                Err(err)
            }
        }
    }

    /// Force the breaker back to Closed
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.phase = Phase::Closed;
        inner.consecutive_failures = 0;
        inner.current_cooldown = self.config.cooldown();
        info!(dependency = %self.name, "circuit reset");
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let mut inner = self.inner.lock();
        inner.refresh(Instant::now());
        BreakerSnapshot {
            name: self.name.clone(),
            state: inner.state(),
            critical: self.critical,
            consecutive_failures: inner.consecutive_failures,
            last_failure_at: inner.last_failure_at,
            total_requests: inner.total_requests,
            successful_requests: inner.successful_requests,
            failed_requests: inner.failed_requests,
            rejected_requests: inner.rejected_requests,
            fallback_invocations: inner.fallback_invocations,
            current_cooldown_ms: inner.current_cooldown.as_millis() as u64,
        }
    }
}
