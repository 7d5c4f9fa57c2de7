//! Static pricing tables
//!
//! Prices are USD per unit: tokens for embedding/completion/extraction,
//! vectors for vector search, documents for rerank. Unknown models resolve to
//! the operation's default model rather than failing.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const PER_MILLION: f64 = 1.0 / 1_000_000.0;

/// Billable operation kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostOperation {
    Embedding,
    Completion,
    VectorSearch,
    Rerank,
    Extraction,
}

impl CostOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            CostOperation::Embedding => "embedding",
            CostOperation::Completion => "completion",
            CostOperation::VectorSearch => "vector_search",
            CostOperation::Rerank => "rerank",
            CostOperation::Extraction => "extraction",
        }
    }
}

impl std::fmt::Display for CostOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unit prices for one provider/model pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceEntry {
    /// Price per input unit
    pub input_per_unit: f64,
    /// Price per output token (completions only)
    pub output_per_unit: f64,
}

impl PriceEntry {
    pub fn per_million_tokens(input: f64, output: f64) -> Self {
        Self {
            input_per_unit: input * PER_MILLION,
            output_per_unit: output * PER_MILLION,
        }
    }

    pub fn per_unit(price: f64) -> Self {
        Self {
            input_per_unit: price,
            output_per_unit: 0.0,
        }
    }
}

/// A resolved price, with the provider/model it was resolved to
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPrice {
    pub provider: String,
    pub model: String,
    pub price: PriceEntry,
    pub used_default: bool,
}

/// Provider/model price lookup with per-operation defaults
#[derive(Debug, Clone)]
pub struct PricingTable {
    entries: HashMap<(String, String), PriceEntry>,
    defaults: HashMap<CostOperation, (String, String)>,
}

static STANDARD: Lazy<PricingTable> = Lazy::new(|| {
    PricingTable::empty()
        // Embeddings
        .with_entry("openai", "text-embedding-3-small", PriceEntry::per_million_tokens(0.02, 0.0))
        .with_entry("openai", "text-embedding-3-large", PriceEntry::per_million_tokens(0.13, 0.0))
        .with_entry("openai", "text-embedding-ada-002", PriceEntry::per_million_tokens(0.10, 0.0))
        .with_entry("local", "hash-embedder", PriceEntry::per_unit(0.0))
        // Completions and extraction
        .with_entry("openai", "gpt-4o-mini", PriceEntry::per_million_tokens(0.15, 0.60))
        .with_entry("openai", "gpt-4o", PriceEntry::per_million_tokens(2.50, 10.00))
        .with_entry("openai", "gpt-4-turbo", PriceEntry::per_million_tokens(10.00, 30.00))
        // Vector search, per vector read
        .with_entry("pinecone", "serverless", PriceEntry::per_unit(8.25 * PER_MILLION))
        .with_entry("supabase", "pgvector", PriceEntry::per_unit(0.0))
        .with_entry("local", "in-memory", PriceEntry::per_unit(0.0))
        // Rerank, per document
        .with_entry("cohere", "rerank-english-v3.0", PriceEntry::per_unit(0.000_02))
        .with_entry("local", "domain-boost", PriceEntry::per_unit(0.0))
        // Extraction
        .with_entry("local", "entity-heuristic", PriceEntry::per_unit(0.0))
        .with_default(CostOperation::Embedding, "openai", "text-embedding-3-small")
        .with_default(CostOperation::Completion, "openai", "gpt-4o-mini")
        .with_default(CostOperation::Extraction, "openai", "gpt-4o-mini")
        .with_default(CostOperation::VectorSearch, "pinecone", "serverless")
        .with_default(CostOperation::Rerank, "cohere", "rerank-english-v3.0")
});

impl PricingTable {
    /// Table with no entries or defaults
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
            defaults: HashMap::new(),
        }
    }

    /// Published prices for the providers this core talks to
    pub fn standard() -> Self {
        STANDARD.clone()
    }

    pub fn with_entry(mut self, provider: &str, model: &str, price: PriceEntry) -> Self {
        self.entries
            .insert((provider.to_lowercase(), model.to_lowercase()), price);
        self
    }

    pub fn with_default(mut self, operation: CostOperation, provider: &str, model: &str) -> Self {
        self.defaults
            .insert(operation, (provider.to_lowercase(), model.to_lowercase()));
        self
    }

    /// Exact price for a provider/model pair
    pub fn get(&self, provider: &str, model: &str) -> Option<PriceEntry> {
        self.entries
            .get(&(provider.to_lowercase(), model.to_lowercase()))
            .copied()
    }

    /// Resolve a price, falling back to the operation's default model
    pub fn resolve(&self, operation: CostOperation, provider: &str, model: &str) -> ResolvedPrice {
        if let Some(price) = self.get(provider, model) {
            return ResolvedPrice {
                provider: provider.to_string(),
                model: model.to_string(),
                price,
                used_default: false,
            };
        }

        match self.defaults.get(&operation) {
            Some((default_provider, default_model)) => ResolvedPrice {
                provider: provider.to_string(),
                model: model.to_string(),
                price: self
                    .get(default_provider, default_model)
                    .unwrap_or(PriceEntry::per_unit(0.0)),
                used_default: true,
            },
            None => ResolvedPrice {
                provider: provider.to_string(),
                model: model.to_string(),
                price: PriceEntry::per_unit(0.0),
                used_default: true,
            },
        }
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::standard()
    }
}
