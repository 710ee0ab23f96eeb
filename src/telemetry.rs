//! Logging initialisation for the `classifyd` binary.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a `fmt` subscriber filtered at `default_level`.
///
/// Logs go to stderr. `RUST_LOG` overrides the configured level when set.
/// Calling this twice is harmless; the second subscriber is ignored and
/// `false` is returned.
pub fn init_tracing(default_level: &str) -> bool {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr),
        )
        .with(env_filter)
        .try_init()
        .is_ok()
}
