//! Tracing subscriber setup for hosts embedding the engine

use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or invalid
pub const DEFAULT_FILTER: &str = "citemigrate_core=info,zotero_client=info";

/// Install a formatting subscriber. Safe to call more than once; only the
/// first call takes effect.
pub fn init() {
    init_with(DEFAULT_FILTER);
}

pub fn init_with(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}
