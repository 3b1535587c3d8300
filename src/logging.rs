// Logging setup on top of `tracing-subscriber`.
//
// The level filter comes from `RUST_LOG` and defaults to `info`, e.g.
// `RUST_LOG=sorting_deviation=debug` to see cache hits and fetch details.
use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber for the binary.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .init();
}

/// Verbose subscriber for tests. Safe to call from every test.
pub fn init_test() {
    let _ = fmt()
        .with_env_filter(EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}
