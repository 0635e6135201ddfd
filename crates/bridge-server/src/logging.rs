//! Process-wide logging initialization (spec.md §11.1).
//!
//! Grounded on `infra-common/src/logging/setup.rs`'s `setup_logging`: an
//! `EnvFilter` seeded from a level, layered with `RUST_LOG` so an operator
//! can override per-module verbosity without a rebuild.

use tracing_subscriber::EnvFilter;

/// Initialize the global `tracing` subscriber. `level` comes from
/// `--log-level`/`LOG_LEVEL`; `RUST_LOG`, if set, still takes precedence
/// for directives it names.
pub fn init(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
