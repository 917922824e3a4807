//! Tracing/logging initialization.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset or unparsable.
pub const DEFAULT_FILTER: &str = "info";

/// Initialize tracing/logging for the process using `RUST_LOG`.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Initialize with an explicit filter directive (e.g. `"enrollhub_infra=debug"`).
///
/// Returns `false` if a global subscriber was already installed.
pub fn init_with_filter(directives: &str) -> bool {
    let filter = EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter)
}

fn install(filter: EnvFilter) -> bool {
    // JSON logs + timestamps on stderr; stdout belongs to the program's output.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init()
        .is_ok()
}
