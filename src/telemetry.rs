//! Structured logging setup.
//!
//! Everything the engine does is reported through `tracing` events. This
//! module installs a subscriber for binaries: JSON for production, pretty
//! output for development, optionally through a non-blocking writer.
//! Logs go to stderr so that command output on stdout stays clean.
//!
//! | Variable | Default | Meaning |
//! |---|---|---|
//! | `BRRTS_LOG_LEVEL` | `info` | base level when `RUST_LOG` is unset |
//! | `BRRTS_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `BRRTS_LOG_ASYNC` | `false` | write through a background thread |
//! | `BRRTS_LOG_TARGET_FILTER` | unset | extra comma-separated directives |

use anyhow::{Context, Result};
use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

pub const ENV_LOG_LEVEL: &str = "BRRTS_LOG_LEVEL";
pub const ENV_LOG_FORMAT: &str = "BRRTS_LOG_FORMAT";
pub const ENV_LOG_ASYNC: &str = "BRRTS_LOG_ASYNC";
pub const ENV_LOG_TARGET_FILTER: &str = "BRRTS_LOG_TARGET_FILTER";

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

impl LogFormat {
    /// Anything other than `pretty` means JSON.
    pub fn from_name(name: &str) -> Self {
        if name.trim().eq_ignore_ascii_case("pretty") {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    pub async_logging: bool,
    /// Extra directives, e.g. `brrtserializer::engine=debug`
    pub target_filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: false,
            target_filter: None,
        }
    }
}

impl LogConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset or unparsable values keep the default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            config.log_level = level;
        }
        if let Some(format) = lookup(ENV_LOG_FORMAT) {
            config.format = LogFormat::from_name(&format);
        }
        if let Some(flag) = lookup(ENV_LOG_ASYNC).and_then(|v| v.trim().parse().ok()) {
            config.async_logging = flag;
        }
        config.target_filter = lookup(ENV_LOG_TARGET_FILTER).filter(|v| !v.trim().is_empty());
        config
    }

    /// Pretty output at `level`, for local runs.
    pub fn pretty(level: &str) -> Self {
        Self {
            log_level: level.to_string(),
            format: LogFormat::Pretty,
            ..Self::default()
        }
    }

    /// The configured level, `INFO` when it does not parse.
    pub fn level(&self) -> Level {
        Level::from_str(self.log_level.trim()).unwrap_or(Level::INFO)
    }

    /// `RUST_LOG` wins over the configured level; target directives are
    /// added on top. Invalid directives are skipped.
    pub fn env_filter(&self) -> EnvFilter {
        let base = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));
        self.target_filter
            .iter()
            .flat_map(|targets| targets.split(','))
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .fold(base, |filter, directive| match directive.parse() {
                Ok(parsed) => filter.add_directive(parsed),
                Err(_) => {
                    eprintln!("Warning: Invalid log filter directive: {directive}");
                    filter
                }
            })
    }
}

/// Install the global subscriber.
///
/// With async logging the returned guard must be kept alive for as long as
/// logs should be flushed.
///
/// ```no_run
/// use brrtserializer::telemetry::{init_logging, LogConfig};
///
/// let _guard = init_logging(&LogConfig::pretty("debug"))?;
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.async_logging {
        let (writer, guard) = tracing_appender::non_blocking(std::io::stderr());
        (BoxMakeWriter::new(writer), Some(guard))
    } else {
        (BoxMakeWriter::new(std::io::stderr), None)
    };

    let layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_thread_ids(true)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(layer)
        .try_init()
        .context("Failed to initialize logging")?;
    Ok(guard)
}
