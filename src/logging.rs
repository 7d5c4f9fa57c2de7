//! Tracing subscriber setup for the binary

use tracing_subscriber::EnvFilter;

/// Environment variable holding a filter directive, checked before `RUST_LOG`
pub const LOG_ENV: &str = "UNIFIED_RAG_LOG";

/// Default directive for a `-v` count
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "unified_rag=warn",
        1 => "unified_rag=info",
        2 => "unified_rag=debug",
        _ => "unified_rag=trace",
    }
}

/// Install the global subscriber; later calls are no-ops
pub fn init(verbosity: u8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
