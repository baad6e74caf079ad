//! Structured logging for magictask
//!
//! Skip decisions are silent at the default level and visible with
//! `MAGICTASK_DEBUG=1` or `RUST_LOG=magictask=debug`. All logs use structured
//! fields for easy parsing and analysis.
//!
//! # Log Format Conventions
//!
//! - `task`: The task name
//! - `operation`: The operation being performed (e.g., "load", "save", "clean")
//! - `status`: The result status ("success", "miss", "error")
//! - `path`: File the operation touched
//!
//! # Examples
//!
//! ```rust
//! use magictask::logging::{operations, status};
//! use tracing::debug;
//!
//! debug!(
//!     task = "print_peoples_ages",
//!     operation = operations::LOAD,
//!     status = status::MISS,
//!     "no saved return value"
//! );
//! ```

use std::str::FromStr;
use std::{fmt as std_fmt, io};
use tracing::{Event, Subscriber};
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{
    fmt::{self, format::Writer},
    prelude::*,
    EnvFilter,
};

use crate::settings::LogConfig;

/// Environment variable switching the crate's own logs to debug
pub const DEBUG_ENV: &str = "MAGICTASK_DEBUG";
/// Environment variable selecting the log format
pub const LOG_FORMAT_ENV: &str = "MAGICTASK_LOG_FORMAT";

/// Custom formatter that shows "magictask" instead of full module path
struct MagicFormatter {
    with_ansi: bool,
}

impl<S, N> FormatEvent<S, N> for MagicFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> std_fmt::Result {
        let meta = event.metadata();

        write!(
            writer,
            "{} ",
            chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f")
        )?;

        if self.with_ansi {
            let level_style = match *meta.level() {
                tracing::Level::ERROR => "\x1b[31m", // Red
                tracing::Level::WARN => "\x1b[33m",  // Yellow
                tracing::Level::INFO => "\x1b[32m",  // Green
                tracing::Level::DEBUG => "\x1b[34m", // Blue
                tracing::Level::TRACE => "\x1b[35m", // Magenta
            };
            write!(writer, "{}{:5}(magictask)\x1b[0m: ", level_style, meta.level())?;
        } else {
            write!(writer, "{:5}(magictask): ", meta.level())?;
        }

        ctx.field_format().format_fields(writer.by_ref(), event)?;

        writeln!(writer)
    }
}

/// Log format options
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format (default for development)
    Pretty,
    /// Compact format (for CI)
    Compact,
    /// JSON format (for log aggregation systems)
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown log format '{other}' (expected pretty, compact or json)"
            )),
        }
    }
}

/// Logging setup, read once from settings and the environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// `EnvFilter` directives
    pub filter: String,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl LogSettings {
    /// Settings from the environment alone
    pub fn from_env() -> Self {
        Self::from_config(&LogConfig::default())
    }

    /// Start from the settings file and let the environment override it
    ///
    /// # Environment Variables
    ///
    /// - `RUST_LOG`: Filter directives, replacing `log.level`
    /// - `MAGICTASK_DEBUG`: Any non-empty value except `0`/`false` adds `magictask=debug`
    /// - `MAGICTASK_LOG_FORMAT`: "pretty", "compact" or "json", replacing `log.format`
    /// - `CI`: If set and no format is given anywhere, use compact
    pub fn from_config(config: &LogConfig) -> Self {
        Self::resolve(config, |name| std::env::var(name).ok())
    }

    fn resolve(config: &LogConfig, env: impl Fn(&str) -> Option<String>) -> Self {
        let mut filter = env("RUST_LOG")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| config.level.clone());

        let debug = env(DEBUG_ENV)
            .is_some_and(|v| !v.is_empty() && v != "0" && !v.eq_ignore_ascii_case("false"));
        if debug {
            filter.push_str(",magictask=debug");
        }

        let format = env(LOG_FORMAT_ENV)
            .and_then(|v| v.parse().ok())
            .or_else(|| config.format.as_deref().and_then(|f| f.parse().ok()))
            .unwrap_or_else(|| {
                // Default: pretty for dev, compact for CI
                if env("CI").is_some() {
                    LogFormat::Compact
                } else {
                    LogFormat::Pretty
                }
            });

        Self { filter, format }
    }
}

/// Install the global tracing subscriber
///
/// Returns `false` when a subscriber was already installed, so libraries and
/// tests may call this more than once.
pub fn init(settings: &LogSettings) -> bool {
    let filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new("info"));

    let installed = match settings.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .event_format(MagicFormatter { with_ansi: true })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .event_format(MagicFormatter { with_ansi: false })
                    .with_writer(io::stderr),
            )
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false)
                    .with_ansi(false)
                    .with_writer(io::stderr)
                    .json(),
            )
            .try_init(),
    };

    installed.is_ok()
}

/// Operation names for consistent logging
pub mod operations {
    pub const LOAD: &str = "load";
    pub const SAVE: &str = "save";
    pub const CLEAN: &str = "clean";
    pub const CHECK: &str = "check";
    pub const RUN: &str = "run";
}

/// Status values for consistent logging
pub mod status {
    pub const SUCCESS: &str = "success";
    pub const SKIPPED: &str = "skipped";
    pub const MISS: &str = "miss";
    pub const ERROR: &str = "error";
}
