//! Operator dashboard
//!
//! Consolidates latency, cost, cache and breaker state into one snapshot
//! with SLO compliance and advisory recommendations.

pub mod builder;
pub mod render;
pub mod types;

pub use builder::{MetricsDashboard, ALL_NOMINAL, DEFAULT_WINDOW_MINUTES};
pub use render::render;
pub use types::{DashboardSnapshot, OverallStatus, SloCheck, SloConfig, SloReport};
