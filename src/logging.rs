//! Diagnostic logging to stderr. stdout carries reports only.

use tracing_subscriber::EnvFilter;

/// Filter env var; falls back to `warn`.
pub const LOG_ENV: &str = "CA_INSPECT_LOG";

/// Install the global subscriber. Safe to call more than once.
pub fn init() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
