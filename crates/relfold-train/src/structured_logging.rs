//! Structured logging setup using the `tracing` crate.
//!
//! The library only emits `tracing` events (fold boundaries, evaluation
//! scores, degenerate AUPRC classes, entity span mismatches). This module
//! installs a subscriber for them and is only available with the
//! `structured-logging` feature:
//!
//! ```toml
//! [dependencies]
//! relfold-train = { version = "0.1", features = ["structured-logging"] }
//! ```
//!
//! # Examples
//!
//! ```no_run
//! use relfold_train::structured_logging::{LogFormat, LogLevel, TracingLogger};
//!
//! let logger = TracingLogger::builder()
//!     .with_format(LogFormat::Json)
//!     .with_level(LogLevel::Info)
//!     .build()
//!     .expect("Failed to initialize logger");
//!
//! tracing::info!(fold = 1, micro_f1 = 71.2, "Finished fold");
//! ```

use crate::{TrainError, TrainResult};
use std::fmt;
use std::str::FromStr;
use tracing_subscriber::{fmt as tracing_fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line format.
    Pretty,
    /// Single-line format.
    Compact,
    /// JSON objects, one per line.
    Json,
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogFormat::Pretty => "pretty",
            LogFormat::Compact => "compact",
            LogFormat::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for LogFormat {
    type Err = TrainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" => Ok(LogFormat::Pretty),
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(TrainError::ConfigError(format!(
                "Unknown log format: {}",
                other
            ))),
        }
    }
}

/// Log level filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    /// Show all logs.
    Trace,
    /// Show debug and higher.
    Debug,
    /// Show info and higher.
    Info,
    /// Show warnings and errors only.
    Warn,
    /// Show only errors.
    Error,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Level for a `-v` count: 0 is info, 1 debug, 2 or more trace.
    pub fn from_verbosity(count: u8) -> Self {
        match count {
            0 => LogLevel::Info,
            1 => LogLevel::Debug,
            _ => LogLevel::Trace,
        }
    }
}

/// Configuration builder for structured logging.
#[derive(Debug, Clone)]
pub struct TracingLoggerBuilder {
    format: LogFormat,
    level: LogLevel,
    env_filter: Option<String>,
    with_targets: bool,
    with_file_location: bool,
    with_ansi: bool,
}

impl Default for TracingLoggerBuilder {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            level: LogLevel::Info,
            env_filter: None,
            with_targets: true,
            with_file_location: false,
            with_ansi: true,
        }
    }
}

impl TracingLoggerBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the output format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the log level filter.
    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    /// Set a custom environment filter (overrides the level).
    ///
    /// # Examples
    ///
    /// ```
    /// # use relfold_train::structured_logging::TracingLoggerBuilder;
    /// let builder = TracingLoggerBuilder::new().with_env_filter("relfold_train=debug");
    /// ```
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Include target names (module paths).
    pub fn with_targets(mut self, enabled: bool) -> Self {
        self.with_targets = enabled;
        self
    }

    /// Include `file:line` locations.
    pub fn with_file_location(mut self, enabled: bool) -> Self {
        self.with_file_location = enabled;
        self
    }

    /// Use ANSI colors in the pretty and compact formats.
    pub fn with_ansi(mut self, enabled: bool) -> Self {
        self.with_ansi = enabled;
        self
    }

    fn filter(&self) -> TrainResult<EnvFilter> {
        match &self.env_filter {
            Some(custom) => EnvFilter::try_new(custom)
                .map_err(|e| TrainError::ConfigError(format!("Invalid env filter: {}", e))),
            None => Ok(EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(self.level.as_str()))),
        }
    }

    /// Build and install the global subscriber.
    ///
    /// Only the first call in a process succeeds.
    pub fn build(self) -> TrainResult<TracingLogger> {
        let filter = self.filter()?;
        let base = tracing_fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(self.with_targets)
            .with_file(self.with_file_location)
            .with_line_number(self.with_file_location);

        let registry = tracing_subscriber::registry().with(filter);
        let installed = match self.format {
            LogFormat::Pretty => registry
                .with(base.with_ansi(self.with_ansi).pretty())
                .try_init(),
            LogFormat::Compact => registry
                .with(base.with_ansi(self.with_ansi).compact())
                .try_init(),
            LogFormat::Json => registry.with(base.with_ansi(false).json()).try_init(),
        };
        installed
            .map_err(|e| TrainError::ConfigError(format!("Failed to initialize tracing: {}", e)))?;

        Ok(TracingLogger {
            format: self.format,
            level: self.level,
        })
    }
}

/// Handle of the installed subscriber.
#[derive(Debug)]
pub struct TracingLogger {
    format: LogFormat,
    level: LogLevel,
}

impl TracingLogger {
    /// Create a new logger builder.
    pub fn builder() -> TracingLoggerBuilder {
        TracingLoggerBuilder::new()
    }

    /// Initialize with default settings (pretty format, info level).
    pub fn init() -> TrainResult<Self> {
        Self::builder().build()
    }

    /// Format in use.
    pub fn format(&self) -> LogFormat {
        self.format
    }

    /// Level requested at build time (an env filter may override it).
    pub fn level(&self) -> LogLevel {
        self.level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_creation() {
        let builder = TracingLoggerBuilder::new();
        assert_eq!(builder.format, LogFormat::Pretty);
        assert_eq!(builder.level, LogLevel::Info);
        assert!(builder.with_ansi);
    }

    #[test]
    fn test_builder_configuration() {
        let builder = TracingLoggerBuilder::new()
            .with_format(LogFormat::Json)
            .with_level(LogLevel::Debug)
            .with_targets(false)
            .with_file_location(true)
            .with_ansi(false);

        assert_eq!(builder.format, LogFormat::Json);
        assert_eq!(builder.level, LogLevel::Debug);
        assert!(!builder.with_targets);
        assert!(builder.with_file_location);
        assert!(!builder.with_ansi);
    }

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Compact".parse::<LogFormat>().unwrap(), LogFormat::Compact);
        assert_eq!(LogFormat::Pretty.to_string(), "pretty");
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_verbosity_levels() {
        assert_eq!(LogLevel::from_verbosity(0), LogLevel::Info);
        assert_eq!(LogLevel::from_verbosity(1), LogLevel::Debug);
        assert_eq!(LogLevel::from_verbosity(5), LogLevel::Trace);
        assert_eq!(LogLevel::Warn.as_str(), "warn");
    }

    #[test]
    fn test_invalid_env_filter() {
        let builder = TracingLoggerBuilder::new().with_env_filter("relfold_train=loud");
        assert!(builder.filter().is_err());
    }
}
