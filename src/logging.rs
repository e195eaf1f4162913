//! Logging setup

use tracing_subscriber::{EnvFilter, fmt};

/// Install the global subscriber.
///
/// The level comes from `RUST_LOG` (for example `RUST_LOG=industry_planner=debug`)
/// and defaults to `info`. Log lines go to stderr so command output stays clean.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Verbose logging captured by the test harness
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
