//! Diagnostic tracing for sanity runs.
//!
//! Tracing goes to stderr and is controlled by `RUST_LOG`. The test report itself
//! is printed to stdout by [`crate::report`] and is unaffected by the filter.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize the tracing subscriber.
///
/// Reads `RUST_LOG`, defaulting to `warn` so skipped versions and missing libyaml
/// are still reported.
///
/// # Example
/// ```bash
/// RUST_LOG=sanity=debug sanity import --host docker:default plugins/modules/ping.py
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
