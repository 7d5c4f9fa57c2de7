//! Retrieval orchestration
//!
//! Components:
//! - Providers: collaborator traits for embedding, vector and keyword stores
//! - Strategies: five retrieval algorithms behind one trait
//! - Context: prompt context assembly from passages
//! - Service: the `query()` orchestrator owning cache, trackers and breakers
//! - Memory: in-process reference collaborators

pub mod context;
pub mod memory;
pub mod providers;
pub mod service;
pub mod strategies;
pub mod text;
pub mod types;

// Re-export key types
pub use context::{ContextBuilder, ContextConfig};
pub use memory::{cosine_similarity, HashEmbedder, InMemoryKnowledgeStore};
pub use providers::{
    Document, EmbeddingProvider, FeatureFlags, KeywordHit, KeywordStore, StaticFeatureFlags,
    VectorMatch, VectorRecord, VectorStore, ENTITY_AWARE_FLAG,
};
pub use service::UnifiedRagService;
pub use strategies::{Collaborators, RetrievalStrategy, StrategyOutput, StrategyTable, Usage};
pub use types::{Passage, PhaseTiming, Query, RetrievalResult, SearchFilter, StrategyKind};
