//! # trilho-logging
//!
//! Installs the global `tracing` subscriber: an [`EnvFilter`] built from the
//! configured level (overridden by `RUST_LOG`) feeding either a
//! human-readable or a JSON `fmt` layer.

#![deny(unsafe_code)]

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, Layer};
use trilho_settings::LoggingSettings;

/// Level used when the configured directive does not parse.
const FALLBACK_LEVEL: &str = "info";

/// Errors from subscriber installation.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Initialize logging. Call once at startup.
///
/// Logs go to stderr so that stdout stays free for command output.
pub fn init_logging(settings: &LoggingSettings) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| filter_from_level(&settings.level));

    let fmt_layer = if settings.json {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()?;
    Ok(())
}

/// Build a filter from a configured directive such as `"info"` or
/// `"info,trilho_bridge=debug"`, falling back to `info` when it does not parse.
pub fn filter_from_level(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|e| {
        eprintln!("trilho-logging: invalid log level {level:?} ({e}), using {FALLBACK_LEVEL}");
        EnvFilter::new(FALLBACK_LEVEL)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_level_directive() {
        let filter = filter_from_level("debug");
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn per_module_directive() {
        let filter = filter_from_level("info,trilho_bridge=trace");
        let rendered = filter.to_string();
        assert!(rendered.contains("trilho_bridge=trace"));
        assert!(rendered.contains("info"));
    }

    #[test]
    fn invalid_directive_falls_back() {
        let filter = filter_from_level("trilho=verbose");
        assert_eq!(filter.to_string(), FALLBACK_LEVEL);
    }

    #[test]
    fn second_init_fails_instead_of_panicking() {
        let settings = LoggingSettings::default();
        let _ = init_logging(&settings);
        assert!(init_logging(&settings).is_err());
    }
}
