//! Tracing and logging setup shared by every binary and test harness.

/// Initialize process-wide tracing from `RUST_LOG` (default `info`).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

pub use self::tracing::{DEFAULT_FILTER, init_with_filter};
