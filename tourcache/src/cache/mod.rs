//! Lazy fetch-and-cache of remote resources.
//!
//! The [`ResourceCache`] lists the entries for a location (placeholders
//! created from one page of remote locators) and resolves each entry's
//! payload on demand, persisting it so it is never downloaded again.
//!
//! # Example
//!
//! ```ignore
//! use tourcache::cache::ResourceCache;
//! use tourcache::coord::LocationKey;
//! use tourcache::provider::{FlickrLocatorFetcher, ReqwestClient};
//! use tourcache::store::JsonFileStore;
//!
//! let http = ReqwestClient::new()?;
//! let fetcher = FlickrLocatorFetcher::new(http.clone(), api_key);
//! let cache = ResourceCache::new(JsonFileStore::open(dir)?, fetcher, http);
//!
//! let location = LocationKey::new(51.5, -0.12)?;
//! for entry in cache.entries_for(&location).await? {
//!     let bytes = cache.resolve(entry.id).await?;
//! }
//! ```

mod coalesce;
mod entry;
mod error;
mod resource;

pub use coalesce::{CoalesceResult, Coalescer, InFlight};
pub use entry::{CacheEntry, EntryId, EntryState, NewEntry};
pub use error::{CacheError, ResolveError};
pub use resource::{CacheConfig, ResourceCache, DEFAULT_MAX_CONCURRENT_DOWNLOADS};

use std::fmt;

/// Counters describing cache activity since creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Remote locator fetches issued.
    pub remote_fetches: u64,
    /// Payload downloads issued.
    pub downloads: u64,
    /// Resolve calls answered from the store.
    pub payload_hits: u64,
    /// Callers that waited on another caller's in-flight operation.
    pub coalesced_waits: u64,
    /// Locator fetches currently in flight.
    pub in_flight_fetches: usize,
    /// Payload downloads currently in flight.
    pub in_flight_downloads: usize,
}

impl fmt::Display for CacheStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} fetches, {} downloads, {} hits, {} coalesced",
            self.remote_fetches, self.downloads, self.payload_hits, self.coalesced_waits
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_stats_default() {
        let stats = CacheStats::default();
        assert_eq!(stats.remote_fetches, 0);
        assert_eq!(stats.in_flight_downloads, 0);
    }

    #[test]
    fn test_cache_stats_display() {
        let stats = CacheStats {
            remote_fetches: 2,
            downloads: 10,
            payload_hits: 4,
            coalesced_waits: 1,
            ..Default::default()
        };
        assert_eq!(
            stats.to_string(),
            "2 fetches, 10 downloads, 4 hits, 1 coalesced"
        );
    }
}
