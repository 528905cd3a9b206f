//! # Logging
//!
//! Structured logging for the engine and the binaries built on it.
//!
//! Every verb runs inside a span carrying the resource kind and the verb, so a compact
//! line reads like `create{kind="gremlin_database" verb="create"}: Created identifier=...`.
//! Lifecycle transitions log at `info`, full payloads at `debug` (once, at the start of
//! a verb), and recoverable conditions such as a setting that can't be provisioned at
//! `warn`.
//!
//! ```bash
//! RUST_LOG=info cargo run
//! RUST_LOG=reconcile_engine=debug cargo run
//! ```

use tracing_subscriber::EnvFilter;

/// Installs a compact, target-less subscriber filtered by `RUST_LOG`.
///
/// Panics if a global subscriber is already installed.
pub fn setup_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();
}

/// Like [`setup_tracing`], but leaves an existing subscriber in place. Safe to call
/// from every test.
pub fn try_setup_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init();
}
