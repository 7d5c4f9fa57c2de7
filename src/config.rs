//! Configuration management for the retrieval core
//!
//! TOML file (explicit path or ~/.unified-rag/config.toml), then
//! `UNIFIED_RAG_*` environment overrides, then validation. Every field has a
//! default; no setting is required.

use crate::cache::CacheConfig;
use crate::dashboard::SloConfig;
use crate::errors::{RagError, Result};
use crate::metrics::{BudgetConfig, CostConfig, LatencyConfig};
use crate::rag::context::ContextConfig;
use crate::rag::providers::{StaticFeatureFlags, ENTITY_AWARE_FLAG};
use crate::rag::types::StrategyKind;
use crate::resilience::BreakerConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::warn;

/// Prefix of every environment override
pub const ENV_PREFIX: &str = "UNIFIED_RAG_";

/// Largest cache TTL a signed millisecond duration can hold
pub const MAX_CACHE_TTL_MS: u64 = i64::MAX as u64;

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub breaker: BreakerSettings,
    pub budget: BudgetConfig,
    pub slo: SloConfig,
    pub retrieval: RetrievalConfig,
    pub latency: LatencyConfig,
    pub cost: CostConfig,
    pub features: FeaturesConfig,
}

/// Breaker defaults plus per-dependency overrides
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub defaults: BreakerConfig,
    /// Keyed by dependency name (`embedding`, `vector-store`, `keyword-store`)
    pub overrides: HashMap<String, BreakerConfig>,
}

/// Orchestrator behaviour
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Strategy used when a query names none (default: hybrid)
    pub default_strategy: StrategyKind,
    pub context: ContextConfig,
}

/// Feature flags
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeaturesConfig {
    pub entity_aware_search: bool,
}

impl FeaturesConfig {
    pub fn flags(&self) -> StaticFeatureFlags {
        let flags = StaticFeatureFlags::new();
        flags.set(ENTITY_AWARE_FLAG, self.entity_aware_search);
        flags
    }
}

impl Config {
    /// Load from `path` or the default location, apply env overrides, validate
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read_file(&path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::read_file(&path)?,
                _ => Config::default(),
            },
        };
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate one file, without env overrides
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    fn read_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        toml::from_str(&contents)
            .map_err(|e| RagError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// ~/.unified-rag/config.toml
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".unified-rag").join("config.toml"))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_env_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup
    pub fn apply_env_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(&format!("{}{}", ENV_PREFIX, name));

        if let Some(value) = get("CACHE_TTL_MS") {
            self.cache.ttl_ms = parse_env("CACHE_TTL_MS", &value)?;
        }
        if let Some(value) = get("CACHE_CAPACITY") {
            self.cache.capacity = parse_env("CACHE_CAPACITY", &value)?;
        }
        if let Some(value) = get("CACHE_ENABLED") {
            self.cache.enabled = parse_bool("CACHE_ENABLED", &value)?;
        }
        if let Some(value) = get("BREAKER_THRESHOLD") {
            self.breaker.defaults.failure_threshold = parse_env("BREAKER_THRESHOLD", &value)?;
        }
        let cooldown = get("BREAKER_COOLDOWN_MS")
            .map(|value| parse_env::<u64>("BREAKER_COOLDOWN_MS", &value))
            .transpose()?;
        let max_cooldown = get("BREAKER_MAX_COOLDOWN_MS")
            .map(|value| parse_env::<u64>("BREAKER_MAX_COOLDOWN_MS", &value))
            .transpose()?;
        if let Some(cooldown) = cooldown {
            self.breaker.defaults.cooldown_ms = cooldown;
        }
        if let Some(max_cooldown) = max_cooldown {
            self.breaker.defaults.max_cooldown_ms = max_cooldown;
        } else if let Some(cooldown) = cooldown {
            if cooldown > self.breaker.defaults.max_cooldown_ms {
                warn!(
                    cooldown_ms = cooldown,
                    previous_max_ms = self.breaker.defaults.max_cooldown_ms,
                    "raising breaker max_cooldown_ms to match the cooldown override"
                );
                self.breaker.defaults.max_cooldown_ms = cooldown;
            }
        }
        if let Some(value) = get("DAILY_BUDGET_USD") {
            self.budget.daily_limit_usd = parse_env("DAILY_BUDGET_USD", &value)?;
        }
        if let Some(value) = get("MONTHLY_BUDGET_USD") {
            self.budget.monthly_limit_usd = parse_env("MONTHLY_BUDGET_USD", &value)?;
        }
        if let Some(value) = get("PER_QUERY_BUDGET_USD") {
            self.budget.per_query_limit_usd = parse_env("PER_QUERY_BUDGET_USD", &value)?;
        }
        if let Some(value) = get("ALERT_THRESHOLD_PERCENT") {
            self.budget.alert_threshold_percent = parse_env("ALERT_THRESHOLD_PERCENT", &value)?;
        }
        if let Some(value) = get("DEFAULT_STRATEGY") {
            self.retrieval.default_strategy = StrategyKind::from_str(&value)?;
        }
        if let Some(value) = get("ENTITY_AWARE") {
            self.features.entity_aware_search = parse_bool("ENTITY_AWARE", &value)?;
        }
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.cache.capacity == 0 {
            return Err(RagError::ConfigError(
                "cache.capacity must be greater than 0".to_string(),
            ));
        }

        if self.cache.ttl_ms == 0 || self.cache.ttl_ms > MAX_CACHE_TTL_MS {
            return Err(RagError::ConfigError(format!(
                "cache.ttl_ms must be in 1..={}, got {}",
                MAX_CACHE_TTL_MS, self.cache.ttl_ms
            )));
        }

        validate_breaker("breaker.defaults", &self.breaker.defaults)?;
        for (name, breaker) in &self.breaker.overrides {
            validate_breaker(&format!("breaker.overrides.{}", name), breaker)?;
        }

        let percent = self.budget.alert_threshold_percent;
        if percent <= 0.0 || percent > 100.0 {
            return Err(RagError::ConfigError(format!(
                "budget.alert_threshold_percent must be in (0, 100], got {}",
                percent
            )));
        }

        for (name, limit) in [
            ("daily_limit_usd", self.budget.daily_limit_usd),
            ("monthly_limit_usd", self.budget.monthly_limit_usd),
            ("per_query_limit_usd", self.budget.per_query_limit_usd),
        ] {
            if limit < 0.0 {
                return Err(RagError::ConfigError(format!(
                    "budget.{} must not be negative",
                    name
                )));
            }
        }

        if self.slo.availability_target <= 0.0 || self.slo.availability_target > 1.0 {
            return Err(RagError::ConfigError(
                "slo.availability_target must be in (0, 1]".to_string(),
            ));
        }

        if self.latency.max_samples == 0 {
            return Err(RagError::ConfigError(
                "latency.max_samples must be greater than 0".to_string(),
            ));
        }

        if self.cost.max_entries == 0 {
            return Err(RagError::ConfigError(
                "cost.max_entries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::ConfigError(format!("Failed to create config dir: {}", e))
            })?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RagError::ConfigError(format!("Failed to write config: {}", e)))?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RagError::ConfigError(format!("Failed to serialize config: {}", e)))
    }
}

fn validate_breaker(section: &str, breaker: &BreakerConfig) -> Result<()> {
    if breaker.failure_threshold == 0 {
        return Err(RagError::ConfigError(format!(
            "{}.failure_threshold must be greater than 0",
            section
        )));
    }
    if breaker.max_cooldown_ms < breaker.cooldown_ms {
        return Err(RagError::ConfigError(format!(
            "{}.max_cooldown_ms must not be below cooldown_ms",
            section
        )));
    }
    if breaker.backoff_multiplier < 1.0 {
        return Err(RagError::ConfigError(format!(
            "{}.backoff_multiplier must be at least 1.0",
            section
        )));
    }
    if breaker.call_timeout_ms == 0 {
        return Err(RagError::ConfigError(format!(
            "{}.call_timeout_ms must be greater than 0",
            section
        )));
    }
    Ok(())
}

fn parse_env<T: FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        RagError::ConfigError(format!("Invalid value for {}{}: {}", ENV_PREFIX, name, value))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(RagError::ConfigError(format!(
            "Invalid value for {}{}: {}",
            ENV_PREFIX, name, value
        ))),
    }
}
