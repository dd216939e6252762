//! Tracing and logging setup shared by binaries and test harnesses.
//!
//! Library crates only *emit* via `tracing`; installing a subscriber is the
//! composition root's call, made here.

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Initialize with an explicit level directive, overriding `RUST_LOG`.
pub fn init_with_level(level: &str) {
    tracing::init_with_level(level);
}
