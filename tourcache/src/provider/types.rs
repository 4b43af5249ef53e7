//! Locator fetcher trait and error types.

use std::future::Future;
use std::sync::Arc;

use thiserror::Error;

use crate::coord::LocationKey;

/// Errors that can occur while listing locators for a location.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Transport-level failure: no usable response was received.
    #[error("Network error: {0}")]
    Network(String),

    /// The response body did not match the expected schema.
    #[error("Unexpected response: {0}")]
    Decode(String),

    /// The service answered with a well-formed error response.
    #[error("{message} (code {code})")]
    Remote { code: i64, message: String },
}

impl FetchError {
    /// Short title suitable for an alert or error banner.
    pub fn caption(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "Connection problem",
            FetchError::Decode(_) => "Unexpected response",
            FetchError::Remote { .. } => "Photo search failed",
        }
    }

    /// Detail text shown under the caption.
    pub fn message(&self) -> String {
        match self {
            FetchError::Network(reason) => {
                format!("Could not reach the photo service: {}", reason)
            }
            FetchError::Decode(reason) => {
                format!("The photo service sent a response that could not be read: {}", reason)
            }
            FetchError::Remote { code, message } => format!("{} (code {})", message, code),
        }
    }

    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchError::Network(_))
    }
}

/// Lists remote resource locators for a location.
///
/// Implementations issue exactly one outbound request per call and never
/// retry; retry policy belongs to the caller. The returned order is the
/// service's order and is preserved by everything downstream.
pub trait LocatorFetcher: Send + Sync {
    /// Fetches one page of locators for the given location.
    fn fetch_locators(
        &self,
        location: &LocationKey,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send;

    /// Human-readable name of the backing service.
    fn name(&self) -> &str;
}

impl<F: LocatorFetcher + ?Sized> LocatorFetcher for Arc<F> {
    fn fetch_locators(
        &self,
        location: &LocationKey,
    ) -> impl Future<Output = Result<Vec<String>, FetchError>> + Send {
        (**self).fetch_locators(location)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
