#![warn(missing_docs)]
#![deny(unused_must_use, rust_2018_idioms)]

//! Logging initialization for the mempool tracker.
//!
//! Kept deliberately small: one global `EnvFilter`-driven format layer to stdout, with the
//! filter directive coming from `--log-level`/`RUST_LOG`. Process supervision (log rotation to
//! disk, structured export to a collector) is left to whatever wraps the binary; this crate only
//! owns the default "what you see when you run it" experience.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// The coarse log verbosity levels exposed on the CLI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// The default: errors, warnings, and informational events.
    Info,
    /// Info plus debug-level detail.
    Debug,
    /// Everything, including per-message tracing.
    Trace,
}

impl Default for LogLevel {
    fn default() -> Self {
        Self::Info
    }
}

impl LogLevel {
    fn directive(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Installs the global tracing subscriber.
///
/// `RUST_LOG`, if set, takes precedence over `level` for any target it names explicitly; `level`
/// is used as the default directive otherwise.
pub fn init(level: LogLevel) -> eyre::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::from_str(level.directive()))?;

    let fmt_layer = tracing_subscriber::fmt::layer().with_target(true).with_filter(filter);

    tracing_subscriber::registry().with(fmt_layer).try_init()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_level_is_info() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }
}
