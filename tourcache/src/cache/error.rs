//! Resource cache error types.

use thiserror::Error;

use crate::cache::EntryId;
use crate::provider::FetchError;
use crate::store::StoreError;

/// Errors from listing or refreshing the entries of a location.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// The remote locator fetch failed; nothing was persisted.
    #[error("Failed to fetch locators: {0}")]
    Fetch(#[source] FetchError),

    /// Existing entries were deleted, then the refetch failed.
    ///
    /// The location now has no entries until the caller retries.
    #[error("Collection cleared; refetch failed, try again: {0}")]
    RefetchAfterClear(#[source] FetchError),

    /// The store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl CacheError {
    /// Short title suitable for an alert or error banner.
    pub fn caption(&self) -> &'static str {
        match self {
            CacheError::Fetch(e) => e.caption(),
            CacheError::RefetchAfterClear(_) => "Collection cleared",
            CacheError::Store(e) => e.caption(),
        }
    }

    /// Detail text shown under the caption.
    pub fn message(&self) -> String {
        match self {
            CacheError::Fetch(e) => e.message(),
            CacheError::RefetchAfterClear(e) => {
                format!("Refetch failed, try again. {}", e.message())
            }
            CacheError::Store(e) => e.message(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CacheError::Fetch(e) | CacheError::RefetchAfterClear(e) => e.is_retryable(),
            CacheError::Store(_) => false,
        }
    }
}

/// Errors from resolving the payload of one entry.
#[derive(Debug, Clone, Error)]
pub enum ResolveError {
    /// No entry with this id exists (never created, or deleted).
    #[error("Entry {0} not found")]
    NotFound(EntryId),

    /// The download failed at the transport level or with an error status.
    #[error("Download failed: {0}")]
    Network(String),

    /// The response could not be turned into a payload.
    #[error("Invalid payload: {0}")]
    Decode(String),

    /// The store failed while reading or persisting the entry.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ResolveError {
    /// Short title suitable for an alert or error banner.
    pub fn caption(&self) -> &'static str {
        match self {
            ResolveError::NotFound(_) => "Photo not found",
            ResolveError::Network(_) => "Download failed",
            ResolveError::Decode(_) => "Invalid image data",
            ResolveError::Store(e) => e.caption(),
        }
    }

    /// Detail text shown under the caption.
    pub fn message(&self) -> String {
        match self {
            ResolveError::NotFound(id) => format!("Entry {} no longer exists.", id),
            ResolveError::Network(reason) => format!("Could not download the photo: {}", reason),
            ResolveError::Decode(reason) => format!("The photo data could not be used: {}", reason),
            ResolveError::Store(e) => e.message(),
        }
    }

    /// Whether retrying the same call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::Network(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refetch_after_clear_message() {
        let err = CacheError::RefetchAfterClear(FetchError::Network("timed out".to_string()));
        assert_eq!(err.caption(), "Collection cleared");
        assert!(err.to_string().contains("Collection cleared; refetch failed, try again"));
        assert!(err.message().contains("timed out"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_fetch_error_caption_passes_through() {
        let err = CacheError::Fetch(FetchError::Remote {
            code: 100,
            message: "Invalid API Key".to_string(),
        });
        assert_eq!(err.caption(), "Photo search failed");
        assert_eq!(err.message(), "Invalid API Key (code 100)");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_store_error_conversion() {
        let err: CacheError = StoreError::Unavailable("closed".to_string()).into();
        assert!(matches!(err, CacheError::Store(_)));

        let err: ResolveError = StoreError::InvalidEntry("x".to_string()).into();
        assert!(matches!(err, ResolveError::Store(_)));
    }

    #[test]
    fn test_resolve_error_presentation() {
        let err = ResolveError::NotFound(EntryId(3));
        assert_eq!(err.to_string(), "Entry 3 not found");
        assert_eq!(err.caption(), "Photo not found");
        assert!(!err.is_retryable());

        assert!(ResolveError::Network("reset".to_string()).is_retryable());
        assert!(!ResolveError::Decode("empty".to_string()).is_retryable());
    }
}
