//! Tracing setup for binaries, demos and tests

use tracing_subscriber::EnvFilter;

/// Default filter when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "gobs=info";

/// Install a global fmt subscriber honoring `RUST_LOG`.
///
/// Safe to call more than once: later calls leave the first subscriber in
/// place and return false.
pub fn init_tracing() -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .is_ok()
}
