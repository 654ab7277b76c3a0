//! # Structured logging setup.
//!
//! Installs a global `tracing` subscriber: an [`EnvFilter`] (from `RUST_LOG` when set,
//! otherwise from the configured [`LogLevel`]) plus a `fmt` layer writing to stdout.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{AppEnv, LogLevel};

/// Installs the global subscriber.
///
/// Returns `false` if a subscriber was already installed (the existing one is kept).
pub fn init_tracing(level: LogLevel, env: AppEnv) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_level_filter().to_string()));

    // ANSI colors for local runs only.
    let ansi = matches!(env, AppEnv::Local);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true).with_ansi(ansi))
        .try_init()
        .is_ok()
}
