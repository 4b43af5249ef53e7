//! Tracing subscriber setup.
//!
//! Logs go to stderr and, when a log directory is configured, to a daily
//! rolling file written by a non-blocking background worker. `RUST_LOG`
//! overrides the configured level.

use std::path::Path;

use thiserror::Error;
use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::LoggingSettings;

/// File name prefix of rolling log files.
pub const LOG_FILE_PREFIX: &str = "tourcache.log";

/// Errors that can occur while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("Invalid log level '{0}': must be one of error, warn, info, debug, trace")]
    InvalidLevel(String),

    #[error("Failed to create log directory {path}: {message}")]
    Directory { path: String, message: String },

    #[error("Logging already initialized: {0}")]
    AlreadyInitialized(String),
}

/// Parses a level name case-insensitively.
pub fn parse_level(level: &str) -> Result<Level, LoggingError> {
    match level.trim().to_lowercase().as_str() {
        "error" => Ok(Level::ERROR),
        "warn" => Ok(Level::WARN),
        "info" => Ok(Level::INFO),
        "debug" => Ok(Level::DEBUG),
        "trace" => Ok(Level::TRACE),
        _ => Err(LoggingError::InvalidLevel(level.to_string())),
    }
}

/// Installs the global tracing subscriber.
///
/// Returns the file writer's guard when file logging is enabled; keep it
/// alive for the lifetime of the program or buffered lines are lost.
pub fn init_logging(settings: &LoggingSettings) -> Result<Option<WorkerGuard>, LoggingError> {
    let level = parse_level(&settings.level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    // Local offset lookup can fail on multi-threaded Unix processes
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    let timer = OffsetTime::new(offset, Rfc3339);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_timer(timer.clone())
        .with_target(false);

    let (file_layer, guard) = match settings.directory.as_deref() {
        Some(dir) => {
            let (writer, guard) = file_writer(dir)?;
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))?;

    Ok(guard)
}

fn file_writer(
    dir: &Path,
) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard), LoggingError> {
    std::fs::create_dir_all(dir).map_err(|e| LoggingError::Directory {
        path: dir.display().to_string(),
        message: e.to_string(),
    })?;
    let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("info").unwrap(), Level::INFO);
        assert_eq!(parse_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_level(" warn ").unwrap(), Level::WARN);
        assert!(matches!(
            parse_level("verbose"),
            Err(LoggingError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_invalid_level_rejected_before_init() {
        let settings = LoggingSettings {
            level: "loud".to_string(),
            directory: None,
        };
        assert!(matches!(
            init_logging(&settings),
            Err(LoggingError::InvalidLevel(_))
        ));
    }

    #[test]
    fn test_stderr_only_logging_returns_no_guard() {
        let settings = LoggingSettings {
            level: "warn".to_string(),
            directory: None,
        };
        // Only this test installs a subscriber in this binary
        let guard: Option<WorkerGuard> = init_logging(&settings).unwrap();
        assert!(guard.is_none());
        assert!(matches!(
            init_logging(&settings),
            Err(LoggingError::AlreadyInitialized(_))
        ));
    }

    #[test]
    fn test_file_writer_creates_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");
        let (_writer, _guard) = file_writer(&log_dir).unwrap();
        assert!(log_dir.is_dir());
    }
}
