//! Structured logging setup
//!
//! Library code only emits `tracing` events. Binaries call [`init_logging`]
//! once at startup to install a subscriber: JSON for production, pretty
//! output for development, optionally written through a non-blocking
//! `tracing-appender` worker.

use anyhow::{Context, Result};
use std::env;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Log format: JSON for production, pretty-print for development
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

impl LogFormat {
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "pretty" => LogFormat::Pretty,
            _ => LogFormat::Json,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Log level: trace/debug/info/warn/error
    pub log_level: String,
    pub format: LogFormat,
    /// Write through a background worker instead of blocking on stdout
    pub async_logging: bool,
    /// Extra filter directives (comma-separated, e.g. `brrtweb::router=debug`)
    pub target_filter: Option<String>,
    /// Include file:line location
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self::default_prod()
    }
}

impl LogConfig {
    /// Parse configuration from `BRRTWEB_LOG_*` environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Parse configuration from an arbitrary key lookup
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let flag = |key: &str, default: bool| {
            lookup(key)
                .and_then(|s| s.parse().ok())
                .unwrap_or(default)
        };
        Self {
            log_level: lookup("BRRTWEB_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            format: LogFormat::parse(
                &lookup("BRRTWEB_LOG_FORMAT").unwrap_or_else(|| "json".to_string()),
            ),
            async_logging: flag("BRRTWEB_LOG_ASYNC", true),
            target_filter: lookup("BRRTWEB_LOG_TARGET_FILTER"),
            include_location: flag("BRRTWEB_LOG_INCLUDE_LOCATION", false),
        }
    }

    /// Development defaults: debug level, pretty, synchronous, with locations
    #[must_use]
    pub fn default_dev() -> Self {
        Self {
            log_level: "debug".to_string(),
            format: LogFormat::Pretty,
            async_logging: false,
            target_filter: None,
            include_location: true,
        }
    }

    /// Production defaults: info level, JSON, asynchronous
    #[must_use]
    pub fn default_prod() -> Self {
        Self {
            log_level: "info".to_string(),
            format: LogFormat::Json,
            async_logging: true,
            target_filter: None,
            include_location: false,
        }
    }

    fn level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    /// Build the filter: `RUST_LOG` if set, else the configured level, plus target directives
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        let mut env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.level().as_str()));

        // may_minihttp logs every client disconnect; keep warn+ only
        if let Ok(directive) = "may_minihttp=warn".parse() {
            env_filter = env_filter.add_directive(directive);
        }

        if let Some(target_filter) = &self.target_filter {
            for filter in target_filter.split(',').map(str::trim) {
                if filter.is_empty() {
                    continue;
                }
                match filter.parse() {
                    Ok(directive) => env_filter = env_filter.add_directive(directive),
                    Err(_) => eprintln!("Warning: Invalid log filter directive: {filter}"),
                }
            }
        }
        env_filter
    }
}

/// Install the global subscriber
///
/// Returns the appender guard when logging asynchronously; keep it alive
/// for the life of the process so buffered lines are flushed on exit.
///
/// # Errors
///
/// Fails if a global subscriber is already installed.
///
/// ```no_run
/// use brrtweb::logging::{init_logging, LogConfig};
///
/// let _guard = init_logging(&LogConfig::from_env()).expect("logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Option<WorkerGuard>> {
    let (writer, guard) = if config.async_logging {
        let (non_blocking, guard) = tracing_appender::non_blocking(std::io::stdout());
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(non_blocking),
            Some(guard),
        )
    } else {
        (
            tracing_subscriber::fmt::writer::BoxMakeWriter::new(std::io::stdout),
            None,
        )
    };

    let fmt_layer = match config.format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_current_span(true)
            .with_target(true)
            .with_thread_ids(true)
            .with_span_list(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(false)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_writer(writer)
            .boxed(),
    };

    tracing_subscriber::registry()
        .with(config.env_filter())
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize logging")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_log_format_parse() {
        assert_eq!(LogFormat::parse("pretty"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("PRETTY"), LogFormat::Pretty);
        assert_eq!(LogFormat::parse("json"), LogFormat::Json);
        assert_eq!(LogFormat::parse("anything"), LogFormat::Json);
    }

    #[test]
    fn test_from_lookup_defaults() {
        let config = LogConfig::from_lookup(|_| None);
        assert_eq!(config, LogConfig::default_prod());
    }

    #[test]
    fn test_from_lookup_overrides() {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("BRRTWEB_LOG_LEVEL", "debug"),
            ("BRRTWEB_LOG_FORMAT", "pretty"),
            ("BRRTWEB_LOG_ASYNC", "false"),
            ("BRRTWEB_LOG_TARGET_FILTER", "brrtweb::router=trace"),
            ("BRRTWEB_LOG_INCLUDE_LOCATION", "not-a-bool"),
        ]);
        let config = LogConfig::from_lookup(|k| vars.get(k).map(|v| (*v).to_string()));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(!config.async_logging);
        assert_eq!(config.target_filter.as_deref(), Some("brrtweb::router=trace"));
        assert!(!config.include_location);
        assert_eq!(config.level(), Level::DEBUG);
    }

    #[test]
    fn test_unknown_level_falls_back_to_info() {
        let mut config = LogConfig::default_dev();
        config.log_level = "loud".into();
        assert_eq!(config.level(), Level::INFO);
    }
}
