//! Logging setup.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the embedding application, which can use [`init_tracing`].
//!
//! # Example
//!
//! ```no_run
//! use ncf_core::logging::{init_tracing, LogLevel};
//!
//! init_tracing(LogLevel::Debug);
//! tracing::info!("processing station pairs");
//! ```

mod types;

pub use types::{LogConfig, LogLevel};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize global tracing subscriber for application-wide logging.
///
/// This sets up a subscriber that:
/// - Respects RUST_LOG environment variable
/// - Falls back to the provided default level
/// - Outputs to stderr
///
/// Should be called once at application startup.
pub fn init_tracing(default_level: LogLevel) {
    init_tracing_with(&LogConfig {
        level: default_level,
        ..LogConfig::default()
    });
}

/// Same as [`init_tracing`] with explicit formatting options.
pub fn init_tracing_with(config: &LogConfig) {
    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_target(config.show_target)
                .with_thread_ids(config.show_thread_ids),
        )
        .with(env_filter(config.level))
        .init();
}

/// Initialize tracing for tests (only logs warnings and above).
#[cfg(test)]
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("warn")
        .with_test_writer()
        .try_init();
}

fn env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_filter_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_strings_match_levels() {
        assert_eq!(LogLevel::Debug.as_filter_str(), "debug");
        assert_eq!(LogLevel::Info.as_filter_str(), "info");
    }

    #[test]
    fn test_tracing_can_be_installed_twice() {
        init_test_tracing();
        init_test_tracing();
        tracing::warn!("visible in test output");
    }
}
