//! Unified RAG - retrieval orchestration core
//!
//! One `query()` entry point over five retrieval strategies, with a result
//! cache, per-dependency circuit breakers, latency and cost tracking, and an
//! operator dashboard.
//!
//! # Architecture
//!
//! - **resilience**: circuit breakers and their registry
//! - **metrics**: latency percentiles, cost attribution and budgets
//! - **cache**: TTL + FIFO result cache keyed by normalized query text
//! - **rag**: collaborator traits, strategies and the orchestrator
//! - **dashboard**: consolidated snapshot with SLOs and recommendations

pub mod errors;
pub mod resilience;
pub mod metrics;
pub mod cache;
pub mod rag;
pub mod dashboard;

// Configuration and binary support
pub mod config;
pub mod logging;
pub mod cli;

// Re-export commonly used types
pub use config::Config;
pub use dashboard::DashboardSnapshot;
pub use errors::{RagError, Result};
pub use rag::{
    Collaborators, Document, Passage, Query, RetrievalResult, StrategyKind, UnifiedRagService,
};
