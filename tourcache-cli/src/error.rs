//! CLI error type.

use console::style;
use thiserror::Error;
use tourcache::cache::{CacheError, ResolveError};
use tourcache::config::ConfigError;
use tourcache::coord::CoordError;
use tourcache::logging::LoggingError;
use tourcache::provider::HttpError;
use tourcache::store::StoreError;

/// Errors surfaced to the user by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigError),

    #[error(transparent)]
    Location(#[from] CoordError),

    #[error(transparent)]
    Logging(#[from] LoggingError),

    #[error("Failed to create HTTP client: {0}")]
    Http(#[from] HttpError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Failed to write {path}: {message}")]
    Output { path: String, message: String },

    #[error("{failed} of {total} downloads failed")]
    PartialDownload { failed: usize, total: usize },
}

impl CliError {
    /// Short title for the error banner.
    pub fn caption(&self) -> &'static str {
        match self {
            CliError::Config(_) | CliError::ConfigFile(_) => "Configuration problem",
            CliError::Location(_) => "Invalid location",
            CliError::Logging(_) => "Logging setup failed",
            CliError::Http(_) => "HTTP client setup failed",
            CliError::Store(e) => e.caption(),
            CliError::Cache(e) => e.caption(),
            CliError::Resolve(e) => e.caption(),
            CliError::Output { .. } => "Write failed",
            CliError::PartialDownload { .. } => "Some downloads failed",
        }
    }

    /// Detail text shown under the caption.
    pub fn message(&self) -> String {
        match self {
            CliError::Store(e) => e.message(),
            CliError::Cache(e) => e.message(),
            CliError::Resolve(e) => e.message(),
            other => other.to_string(),
        }
    }

    /// Prints the error to stderr and exits with a non-zero status.
    pub fn exit(&self) -> ! {
        eprintln!(
            "{} {}",
            style(format!("{}:", self.caption())).red().bold(),
            self.message()
        );
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tourcache::provider::FetchError;

    #[test]
    fn test_cache_errors_keep_library_wording() {
        let err = CliError::from(CacheError::RefetchAfterClear(FetchError::Network(
            "timed out".to_string(),
        )));
        assert_eq!(err.caption(), "Collection cleared");
        assert!(err.message().contains("timed out"));
    }

    #[test]
    fn test_partial_download_message() {
        let err = CliError::PartialDownload {
            failed: 2,
            total: 5,
        };
        assert_eq!(err.message(), "2 of 5 downloads failed");
    }
}
