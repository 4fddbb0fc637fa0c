//! Logging setup for the `sqlkv` binary.
//!
//! The library only emits `tracing` events; installing a subscriber is left
//! to the application. This module provides the one the binary uses.

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Logging format options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Pretty human-readable output
    Pretty,
    /// Compact single-line output (default)
    #[default]
    Compact,
    /// JSON output for log aggregation
    Json,
}

/// Initialize the global tracing subscriber.
///
/// Respects `RUST_LOG` when set, otherwise filters at `default_level`.
/// Calling it twice is harmless; the second call is ignored.
pub fn init_logging(format: LogFormat, default_level: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);

    // Logs go to stderr so command output on stdout stays machine-readable.
    let result = match format {
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
    };

    if result.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}
