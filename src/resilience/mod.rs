//! Failure isolation for external dependencies
//! Circuit breakers per dependency name, with fallback execution

pub mod breaker;
pub mod registry;
pub mod types;

pub use breaker::CircuitBreaker;
pub use registry::{BreakerRegistry, EMBEDDING, KEYWORD_STORE, VECTOR_STORE};
pub use types::{BreakerConfig, BreakerSnapshot, CallOutcome, CircuitState};
