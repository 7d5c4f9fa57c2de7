//! Context text assembly for retrieved passages
use serde::{Deserialize, Serialize};

use crate::rag::text::estimate_tokens;
use crate::rag::types::Passage;

/// Context assembly configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum estimated tokens of passage content in the context
    pub max_context_tokens: u64,
    /// Include the relevance score next to each source id
    pub include_scores: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: 2000,
            include_scores: true,
        }
    }
}

/// Builds the numbered context block handed to downstream consumers
#[derive(Debug, Clone, Default)]
pub struct ContextBuilder {
    config: ContextConfig,
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ContextConfig) -> Self {
        Self { config }
    }

    /// Numbered passages with source ids, in the given order, until the
    /// token budget would be exceeded
    pub fn build(&self, passages: &[Passage]) -> String {
        let mut parts = Vec::new();
        let mut total_tokens = 0;

        for passage in passages {
            let tokens = estimate_tokens(&passage.content);
            if total_tokens + tokens > self.config.max_context_tokens {
                break;
            }
            parts.push(self.format_passage(parts.len() + 1, passage));
            total_tokens += tokens;
        }

        parts.join("\n\n")
    }

    fn format_passage(&self, index: usize, passage: &Passage) -> String {
        if self.config.include_scores {
            format!(
                "[{}] (source: {}, score: {:.2})\n{}",
                index, passage.source_id, passage.score, passage.content
            )
        } else {
            format!("[{}] (source: {})\n{}", index, passage.source_id, passage.content)
        }
    }

    pub fn config(&self) -> &ContextConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passage(id: &str, content: &str, score: f32) -> Passage {
        Passage {
            content: content.to_string(),
            source_id: id.to_string(),
            score,
            domain_tags: Vec::new(),
        }
    }

    #[test]
    fn test_numbered_with_sources() {
        let text = ContextBuilder::new().build(&[
            passage("doc-1", "first", 0.9),
            passage("doc-2", "second", 0.8),
        ]);
        assert_eq!(
            text,
            "[1] (source: doc-1, score: 0.90)\nfirst\n\n[2] (source: doc-2, score: 0.80)\nsecond"
        );
    }

    #[test]
    fn test_without_scores() {
        let builder = ContextBuilder::with_config(ContextConfig {
            include_scores: false,
            ..Default::default()
        });
        assert_eq!(builder.build(&[passage("a", "x", 0.1)]), "[1] (source: a)\nx");
    }

    #[test]
    fn test_token_budget_stops_assembly() {
        let builder = ContextBuilder::with_config(ContextConfig {
            max_context_tokens: 30,
            include_scores: false,
        });
        let long = "a".repeat(100);
        let text = builder.build(&[passage("a", &long, 0.9), passage("b", &long, 0.8)]);
        assert!(text.contains("(source: a)"));
        assert!(!text.contains("(source: b)"));
    }

    #[test]
    fn test_empty() {
        assert_eq!(ContextBuilder::new().build(&[]), "");
    }
}
