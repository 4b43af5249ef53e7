//! HTTP client abstraction for testability

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// User agent sent with every request.
const USER_AGENT: &str = concat!("tourcache/", env!("CARGO_PKG_VERSION"));

/// Errors from a single HTTP GET.
#[derive(Debug, Clone, Error)]
pub enum HttpError {
    /// No response was received (connection failure, timeout, TLS error).
    #[error("Request to {url} failed: {reason}")]
    Transport { url: String, reason: String },

    /// The server answered with a non-success status.
    ///
    /// The body is kept because some services describe the failure in it.
    #[error("HTTP {status} from {url}")]
    Status {
        status: u16,
        url: String,
        body: Bytes,
    },
}

/// Trait for async HTTP client operations.
///
/// This abstraction allows for dependency injection and easier testing
/// by enabling mock HTTP clients in tests.
pub trait AsyncHttpClient: Send + Sync {
    /// Performs an HTTP GET request and returns the response body.
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, HttpError>> + Send;
}

impl<C: AsyncHttpClient + ?Sized> AsyncHttpClient for Arc<C> {
    fn get(&self, url: &str) -> impl Future<Output = Result<Bytes, HttpError>> + Send {
        (**self).get(url)
    }
}

/// Real HTTP client implementation using reqwest.
#[derive(Clone)]
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Creates a new ReqwestClient with default configuration.
    pub fn new() -> Result<Self, HttpError> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    /// Creates a new ReqwestClient with custom timeout.
    pub fn with_timeout(timeout_secs: u64) -> Result<Self, HttpError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HttpError::Transport {
                url: String::new(),
                reason: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

impl AsyncHttpClient for ReqwestClient {
    async fn get(&self, url: &str) -> Result<Bytes, HttpError> {
        let response =
            self.client
                .get(url)
                .send()
                .await
                .map_err(|e| HttpError::Transport {
                    url: url.to_string(),
                    reason: e.to_string(),
                })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| HttpError::Transport {
            url: url.to_string(),
            reason: format!("Failed to read response: {}", e),
        })?;

        if !status.is_success() {
            return Err(HttpError::Status {
                status: status.as_u16(),
                url: url.to_string(),
                body,
            });
        }

        Ok(body)
    }
}
