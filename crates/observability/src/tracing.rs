//! Tracing/logging initialization.
//!
//! Single stdout pipeline (container-friendly), JSON output, level driven by
//! `RUST_LOG` with an optional explicit override.

use tracing_subscriber::EnvFilter;

/// Initialize tracing/logging for the process.
///
/// Safe to call multiple times (subsequent calls are no-ops).
pub fn init() {
    init_filter(None);
}

/// Initialize with an explicit level/filter directive (e.g. `"debug"` or
/// `"rewind_jobs=debug"`), overriding `RUST_LOG`.
pub fn init_with_level(level: &str) {
    init_filter(Some(level));
}

fn init_filter(level: Option<&str>) {
    let filter = match level {
        Some(directive) => EnvFilter::new(directive),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };

    // JSON logs + timestamps, configurable via RUST_LOG.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_timer(tracing_subscriber::fmt::time::SystemTime)
        .with_target(false)
        .try_init();
}
