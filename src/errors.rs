//! Error types for the retrieval core
//!
//! Dependency failures are recovered locally by the circuit breakers and the
//! strategy fallback chain; precondition violations fail fast to the direct
//! caller of a strategy. The public `query()` surface never returns these.

use thiserror::Error;

/// Main error type for retrieval orchestration
#[derive(Error, Debug)]
pub enum RagError {
    /// External dependency call failed (embedding, vector store, keyword store)
    #[error("Dependency '{dependency}' failed: {message}")]
    Dependency { dependency: String, message: String },

    /// Call short-circuited because the dependency's breaker is open
    #[error("Circuit open for dependency '{dependency}'")]
    CircuitOpen { dependency: String },

    /// Dependency call exceeded its timeout
    #[error("Dependency '{dependency}' timed out after {duration_ms}ms")]
    Timeout { dependency: String, duration_ms: u64 },

    /// Strategy precondition not met (e.g. missing agent identity)
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// Every dependency a strategy relies on was served by a fallback
    #[error("All dependencies failed for strategy '{strategy}'")]
    AllDependenciesFailed { strategy: String },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("Retrieval error: {0}")]
    Generic(String),
}

/// Result type alias for retrieval operations
pub type Result<T> = std::result::Result<T, RagError>;

impl RagError {
    /// Shorthand for a failed dependency call
    pub fn dependency(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        RagError::Dependency {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    /// True for errors that must propagate to the strategy caller unchanged
    pub fn is_precondition(&self) -> bool {
        matches!(self, RagError::Precondition(_))
    }

    /// True for errors the breaker and fallback chain are expected to absorb
    pub fn is_dependency_failure(&self) -> bool {
        matches!(
            self,
            RagError::Dependency { .. }
                | RagError::CircuitOpen { .. }
                | RagError::Timeout { .. }
                | RagError::AllDependenciesFailed { .. }
        )
    }
}

/// Convert anyhow errors to RagError
impl From<anyhow::Error> for RagError {
    fn from(err: anyhow::Error) -> Self {
        RagError::Generic(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RagError::Timeout {
            dependency: "embedding".to_string(),
            duration_ms: 5000,
        };
        assert!(err.to_string().contains("embedding"));
        assert!(err.to_string().contains("5000"));
    }

    #[test]
    fn test_error_classification() {
        assert!(RagError::Precondition("no agent".to_string()).is_precondition());
        assert!(!RagError::Precondition("no agent".to_string()).is_dependency_failure());
        assert!(RagError::dependency("vector-store", "boom").is_dependency_failure());
        assert!(RagError::CircuitOpen {
            dependency: "embedding".to_string()
        }
        .is_dependency_failure());
        assert!(!RagError::ConfigError("bad".to_string()).is_dependency_failure());
    }

    #[test]
    fn test_from_anyhow() {
        let err: RagError = anyhow::anyhow!("wrapped").into();
        assert!(matches!(err, RagError::Generic(ref msg) if msg == "wrapped"));
    }
}
