//! Logging and tracing setup for the tether binary
//!
//! Installs a `tracing` subscriber with:
//! - A console layer on stderr, pretty or JSON per configuration
//! - An optional daily-rotated JSON file layer
//! - `RUST_LOG` taking precedence over the configured filter

use std::path::PathBuf;
use tether_core::{LogFormat, ObservabilitySettings};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// File name prefix for rotated log files
const LOG_FILE_PREFIX: &str = "tether.log";

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,

    /// Default filter when `RUST_LOG` is unset
    pub filter: String,

    /// Directory for rotated JSON logs; console only when `None`
    pub log_dir: Option<PathBuf>,

    /// Whether to include file/line information in console logs
    pub include_location: bool,

    /// Whether to log span open/close events
    pub enable_spans: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::from(&ObservabilitySettings::default())
    }
}

impl From<&ObservabilitySettings> for LoggingConfig {
    fn from(settings: &ObservabilitySettings) -> Self {
        Self {
            format: settings.log_format,
            filter: settings.log_filter.clone(),
            log_dir: settings.log_dir.clone(),
            include_location: cfg!(debug_assertions),
            enable_spans: false,
        }
    }
}

/// Keeps the file writer flushing until dropped
#[derive(Default)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

fn build_filter(default_filter: &str) -> anyhow::Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => Ok(EnvFilter::try_new(default_filter)?),
    }
}

/// Install the global subscriber.
///
/// Fails if a subscriber is already installed or the filter does not parse.
pub fn init(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    // NEW fires once per span; ENTER would repeat on every async re-poll.
    let span_events = if config.enable_spans {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_layer = match config.format {
        LogFormat::Pretty => fmt::layer()
            .with_target(true)
            .with_file(config.include_location)
            .with_line_number(config.include_location)
            .with_span_events(span_events.clone())
            .with_ansi(true)
            .with_writer(std::io::stderr)
            .pretty()
            .with_filter(build_filter(&config.filter)?)
            .boxed(),
        LogFormat::Json => fmt::layer()
            .with_target(true)
            .with_span_events(span_events.clone())
            .with_ansi(false)
            .with_writer(std::io::stderr)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_filter(build_filter(&config.filter)?)
            .boxed(),
    };
    layers.push(console_layer);

    let mut guard = LoggingGuard::default();
    if let Some(log_dir) = &config.log_dir {
        std::fs::create_dir_all(log_dir)?;
        let file_appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
        let (non_blocking, file_guard) = tracing_appender::non_blocking(file_appender);
        guard._file = Some(file_guard);

        let json_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_span_events(span_events)
            .with_ansi(false)
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_writer(non_blocking)
            .with_filter(build_filter(&config.filter)?)
            .boxed();
        layers.push(json_layer);
    }

    tracing_subscriber::registry().with(layers).try_init()?;

    tracing::debug!(
        format = ?config.format,
        log_dir = ?config.log_dir,
        "logging initialized"
    );
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_config_follows_observability_settings() {
        let settings = ObservabilitySettings {
            log_format: LogFormat::Json,
            log_filter: "warn,tether_connection=debug".to_string(),
            log_dir: Some(PathBuf::from("/var/log/tether")),
            ..ObservabilitySettings::default()
        };

        let config = LoggingConfig::from(&settings);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.filter, "warn,tether_connection=debug");
        assert_eq!(config.log_dir, Some(PathBuf::from("/var/log/tether")));
        assert!(!config.enable_spans);
    }

    #[test]
    fn test_default_is_console_only() {
        let config = LoggingConfig::default();
        assert_eq!(config.format, LogFormat::Pretty);
        assert!(config.log_dir.is_none());
    }
}
