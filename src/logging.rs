//! Diagnostic logging setup for the binary.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt};

static SUBSCRIBER: OnceLock<Result<(), String>> = OnceLock::new();

/// Install a stderr subscriber filtered by `RUST_LOG` (default `warn`).
///
/// Only the first call installs anything; later calls return its outcome.
pub fn init_logging() -> Result<(), String> {
    SUBSCRIBER
        .get_or_init(|| {
            let filter =
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
            fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .with_target(false)
                .try_init()
                .map_err(|error| error.to_string())
        })
        .clone()
}
