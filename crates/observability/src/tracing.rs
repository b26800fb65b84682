//! Tracing/logging initialization.
//!
//! JSON lines on stdout, filtered through `RUST_LOG`. Money movement is
//! logged with structured fields (account, reference, amounts) so a
//! posting can be traced end to end from the logs alone.

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the process. Defaults to `info` for the ledger
/// crates when `RUST_LOG` is unset.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_with_default("info,centavo=debug");
}

/// Initialize with an explicit fallback filter (tests use a quieter one).
pub fn init_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
