//! Tracing setup for hosts that do not install their own subscriber.
use std::sync::OnceLock;
use tracing_subscriber::{EnvFilter, fmt, prelude::*, reload};

use crate::config::LoggingConfig;

static LOG_RELOAD_HANDLE: OnceLock<reload::Handle<EnvFilter, tracing_subscriber::Registry>> =
    OnceLock::new();

/// Builds the filter for `level`. `RUST_LOG` wins when it parses.
fn build_filter(level: &str) -> EnvFilter {
    std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .or_else(|| EnvFilter::try_new(level).ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}

/// Installs a global `fmt` subscriber at `logging.level`.
///
/// Returns `false` and does nothing if a global subscriber is already set.
pub fn init_tracing(logging: &LoggingConfig) -> bool {
    init_tracing_with_level(&logging.level)
}

pub fn init_tracing_with_level(level: &str) -> bool {
    let (reload_layer, handle) = reload::Layer::new(build_filter(level));

    let installed = tracing_subscriber::registry()
        .with(reload_layer)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok();
    if installed {
        let _ = LOG_RELOAD_HANDLE.set(handle);
    }
    installed
}

/// Swaps the active level if [`init_tracing`] installed the subscriber.
pub fn apply_logging_level(level: &str) -> bool {
    match LOG_RELOAD_HANDLE.get() {
        Some(handle) => handle.modify(|f| *f = build_filter(level)).is_ok(),
        None => false,
    }
}
