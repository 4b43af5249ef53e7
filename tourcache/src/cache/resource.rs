//! On-demand resource cache.
//!
//! [`ResourceCache`] sits between an [`EntryStore`] and the network. It lists
//! the entries of a location (fetching and persisting placeholders on a miss)
//! and resolves entry payloads lazily, downloading each at most once.
//!
//! # Architecture
//!
//! ```text
//! entries_for(k) ──► store.query(k) ──► non-empty ──► return
//!                         │ empty
//!                         ▼
//!                  fetches.register(k) ──► Coalesced ──► wait for leader
//!                         │ NewRequest
//!                         ▼
//!                  fetcher.fetch_locators(k) ──► store.insert_batch(k, ..)
//!
//! resolve(id) ──► store.get(id) ──► payload present ──► return
//!                        │ pending
//!                        ▼
//!                 downloads.register(id) ──► Coalesced ──► wait for leader
//!                        │ NewRequest
//!                        ▼
//!                 http.get(locator) ──► store.update_payload(id, ..)
//! ```
//!
//! Errors from the store, the fetcher and the transport are always returned
//! to the caller. Nothing is retried internally.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info, warn};

use super::coalesce::{CoalesceResult, Coalescer};
use super::{CacheEntry, CacheError, CacheStats, EntryId, NewEntry, ResolveError};
use crate::coord::LocationKey;
use crate::provider::{AsyncHttpClient, HttpError, LocatorFetcher};
use crate::store::EntryStore;

/// Default number of payload downloads run at once by [`ResourceCache::resolve_all`].
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 8;

/// Resource cache configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Upper bound on concurrent downloads for bulk resolution.
    pub max_concurrent_downloads: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
        }
    }
}

impl CacheConfig {
    pub fn with_max_concurrent_downloads(mut self, max: usize) -> Self {
        self.max_concurrent_downloads = max.max(1);
        self
    }
}

/// What the fetch leader does with entries already in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchMode {
    /// Return them and skip the remote fetch.
    IfMissing,
    /// Delete them, then fetch.
    Always,
}

type FetchResult = Result<Vec<CacheEntry>, CacheError>;
type ResolveResult = Result<Bytes, ResolveError>;

#[derive(Default)]
struct Counters {
    remote_fetches: AtomicU64,
    downloads: AtomicU64,
    payload_hits: AtomicU64,
    coalesced_waits: AtomicU64,
}

/// Lazily fetching, coalescing cache of remote resources per location.
///
/// The store, the locator fetcher and the HTTP client used for payload
/// downloads are injected; the cache holds no global state.
pub struct ResourceCache<S, F, H>
where
    S: EntryStore,
    F: LocatorFetcher,
    H: AsyncHttpClient,
{
    store: S,
    fetcher: F,
    http_client: H,
    config: CacheConfig,
    fetches: Coalescer<LocationKey, FetchResult>,
    downloads: Coalescer<EntryId, ResolveResult>,
    counters: Counters,
}

impl<S, F, H> ResourceCache<S, F, H>
where
    S: EntryStore,
    F: LocatorFetcher,
    H: AsyncHttpClient,
{
    /// Creates a cache with default configuration.
    pub fn new(store: S, fetcher: F, http_client: H) -> Self {
        Self::with_config(store, fetcher, http_client, CacheConfig::default())
    }

    pub fn with_config(store: S, fetcher: F, http_client: H, config: CacheConfig) -> Self {
        Self {
            store,
            fetcher,
            http_client,
            config,
            fetches: Coalescer::new(),
            downloads: Coalescer::new(),
            counters: Counters::default(),
        }
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Returns the entries of a location, fetching placeholders on a miss.
    ///
    /// Persisted entries are authoritative: if any exist they are returned
    /// in insertion order and no remote fetch happens, even when some are
    /// still pending. An empty result means the service had nothing for
    /// this location; nothing is persisted in that case.
    pub async fn entries_for(&self, location: &LocationKey) -> Result<Vec<CacheEntry>, CacheError> {
        let existing = self.store.query(location)?;
        if !existing.is_empty() {
            debug!(location = %location, count = existing.len(), "Entries served from store");
            return Ok(existing);
        }

        self.fetch_coalesced(location, FetchMode::IfMissing).await
    }

    /// Deletes all entries of a location, then fetches a fresh page.
    ///
    /// The clear runs only once this call leads the location's fetch, so the
    /// returned entries are always a batch inserted after it. Destructive: if
    /// the fetch fails the location is left with no entries and
    /// [`CacheError::RefetchAfterClear`] is returned.
    pub async fn clear_and_refetch(
        &self,
        location: &LocationKey,
    ) -> Result<Vec<CacheEntry>, CacheError> {
        self.fetch_coalesced(location, FetchMode::Always)
            .await
            .map_err(|e| match e {
                CacheError::Fetch(fetch) => CacheError::RefetchAfterClear(fetch),
                other => other,
            })
    }

    /// Returns the payload of an entry, downloading it on first use.
    ///
    /// Concurrent calls for the same pending entry share one download. A
    /// failed download leaves the entry pending so the next call retries.
    pub async fn resolve(&self, id: EntryId) -> Result<Bytes, ResolveError> {
        let entry = self.store.get(id)?.ok_or(ResolveError::NotFound(id))?;
        if let Some(payload) = entry.payload {
            self.counters.payload_hits.fetch_add(1, Ordering::Relaxed);
            debug!(entry_id = %id, "Payload cache hit");
            return Ok(payload);
        }

        loop {
            match self.downloads.register(id) {
                CoalesceResult::NewRequest(flight) => {
                    let result = self.download_and_persist(id).await;
                    flight.complete(result.clone());
                    return result;
                }
                CoalesceResult::Coalesced(mut rx) => {
                    self.counters.coalesced_waits.fetch_add(1, Ordering::Relaxed);
                    debug!(entry_id = %id, "Download coalesced - waiting for in-flight request");
                    match rx.recv().await {
                        Ok(result) => return result,
                        // Leader went away before finishing; take over
                        Err(_) => continue,
                    }
                }
            }
        }
    }

    /// Deletes one entry. Deleting an unknown id is a no-op.
    pub async fn delete_entry(&self, id: EntryId) -> Result<(), CacheError> {
        let existed = self.store.delete_entry(id)?;
        debug!(entry_id = %id, existed, "Entry deleted");
        Ok(())
    }

    /// Looks up a single entry without touching the network.
    pub fn entry(&self, id: EntryId) -> Result<Option<CacheEntry>, CacheError> {
        Ok(self.store.get(id)?)
    }

    /// Resolves the given entries with bounded concurrency.
    ///
    /// Results are yielded in the order of `ids`.
    pub fn resolve_stream(
        &self,
        ids: Vec<EntryId>,
    ) -> impl Stream<Item = (EntryId, Result<Bytes, ResolveError>)> + '_ {
        stream::iter(ids)
            .map(move |id| async move { (id, self.resolve(id).await) })
            .buffered(self.config.max_concurrent_downloads.max(1))
    }

    /// Lists the entries of a location and resolves all of them.
    pub async fn resolve_all(
        &self,
        location: &LocationKey,
    ) -> Result<Vec<(EntryId, Result<Bytes, ResolveError>)>, CacheError> {
        let ids = self
            .entries_for(location)
            .await?
            .into_iter()
            .map(|entry| entry.id)
            .collect();
        Ok(self.resolve_stream(ids).collect().await)
    }

    /// Snapshot of the cache counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            remote_fetches: self.counters.remote_fetches.load(Ordering::Relaxed),
            downloads: self.counters.downloads.load(Ordering::Relaxed),
            payload_hits: self.counters.payload_hits.load(Ordering::Relaxed),
            coalesced_waits: self.counters.coalesced_waits.load(Ordering::Relaxed),
            in_flight_fetches: self.fetches.in_flight_count(),
            in_flight_downloads: self.downloads.in_flight_count(),
        }
    }

    async fn fetch_coalesced(&self, location: &LocationKey, mode: FetchMode) -> FetchResult {
        loop {
            match self.fetches.register(*location) {
                CoalesceResult::NewRequest(flight) => {
                    let result = self.fetch_and_persist(location, mode).await;
                    flight.complete(result.clone());
                    return result;
                }
                CoalesceResult::Coalesced(mut rx) => {
                    self.counters.coalesced_waits.fetch_add(1, Ordering::Relaxed);
                    debug!(location = %location, "Fetch coalesced - waiting for in-flight request");
                    match (mode, rx.recv().await) {
                        (FetchMode::IfMissing, Ok(result)) => return result,
                        // A refresh must return a batch inserted after its own clear
                        _ => continue,
                    }
                }
            }
        }
    }

    async fn fetch_and_persist(&self, location: &LocationKey, mode: FetchMode) -> FetchResult {
        match mode {
            FetchMode::IfMissing => {
                // A previous leader may have persisted a batch since our first query
                let existing = self.store.query(location)?;
                if !existing.is_empty() {
                    return Ok(existing);
                }
            }
            FetchMode::Always => {
                let removed = self.store.delete_all(location)?;
                info!(location = %location, removed, "Cleared entries for refetch");
            }
        }

        let start = Instant::now();
        self.counters.remote_fetches.fetch_add(1, Ordering::Relaxed);

        let locators = match self.fetcher.fetch_locators(location).await {
            Ok(locators) => locators,
            Err(e) => {
                warn!(
                    location = %location,
                    provider = self.fetcher.name(),
                    error = %e,
                    "Locator fetch failed"
                );
                return Err(CacheError::Fetch(e));
            }
        };

        if locators.is_empty() {
            info!(location = %location, "No resources found for location");
            return Ok(Vec::new());
        }

        let batch = locators.into_iter().map(NewEntry::new).collect();
        let entries = self.store.insert_batch(location, batch)?;

        info!(
            location = %location,
            count = entries.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Placeholders persisted"
        );
        Ok(entries)
    }

    async fn download_and_persist(&self, id: EntryId) -> ResolveResult {
        // Re-read under leadership: an earlier leader may have finished
        let entry = self.store.get(id)?.ok_or(ResolveError::NotFound(id))?;
        if let Some(payload) = entry.payload {
            self.counters.payload_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(payload);
        }

        let start = Instant::now();
        self.counters.downloads.fetch_add(1, Ordering::Relaxed);

        let payload = match self.http_client.get(&entry.locator).await {
            Ok(body) if body.is_empty() => {
                Err(ResolveError::Decode("empty response body".to_string()))
            }
            Ok(body) => Ok(body),
            Err(HttpError::Status { status, .. }) => {
                Err(ResolveError::Network(format!("HTTP {}", status)))
            }
            Err(HttpError::Transport { reason, .. }) => Err(ResolveError::Network(reason)),
        };
        let payload = match payload {
            Ok(payload) => payload,
            Err(e) => {
                warn!(entry_id = %id, locator = %entry.locator, error = %e, "Download failed");
                return Err(e);
            }
        };

        if !self.store.update_payload(id, payload.clone())? {
            // Deletion wins over an in-flight download
            debug!(entry_id = %id, "Entry deleted during download; payload not persisted");
        }

        info!(
            entry_id = %id,
            bytes = payload.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Payload resolved"
        );
        Ok(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{FetchError, MockAsyncHttpClient};
    use crate::store::MemoryStore;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::time::Duration;

    /// Fetcher returning a fixed answer and counting calls.
    struct StubFetcher {
        answer: Mutex<Result<Vec<String>, FetchError>>,
        calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl StubFetcher {
        fn returning(locators: &[&str]) -> Self {
            Self {
                answer: Mutex::new(Ok(locators.iter().map(|s| s.to_string()).collect())),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn failing(error: FetchError) -> Self {
            Self {
                answer: Mutex::new(Err(error)),
                calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn set_answer(&self, answer: Result<Vec<String>, FetchError>) {
            *self.answer.lock() = answer;
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LocatorFetcher for StubFetcher {
        async fn fetch_locators(&self, _location: &LocationKey) -> Result<Vec<String>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.answer.lock().clone()
        }

        fn name(&self) -> &str {
            "stub"
        }
    }

    type TestCache = ResourceCache<Arc<MemoryStore>, StubFetcher, MockAsyncHttpClient>;

    fn london() -> LocationKey {
        LocationKey::new(51.5, -0.12).unwrap()
    }

    fn cache_with(fetcher: StubFetcher, http: MockAsyncHttpClient) -> (TestCache, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (ResourceCache::new(Arc::clone(&store), fetcher, http), store)
    }

    #[tokio::test]
    async fn test_entries_for_fetches_once() {
        let (cache, store) = cache_with(
            StubFetcher::returning(&["a.jpg", "b.jpg"]),
            MockAsyncHttpClient::new(),
        );

        let first = cache.entries_for(&london()).await.unwrap();
        let second = cache.entries_for(&london()).await.unwrap();

        assert_eq!(first.len(), 2);
        assert_eq!(first, second);
        assert_eq!(cache.fetcher.calls(), 1);
        assert_eq!(store.len(), 2);
        assert_eq!(cache.stats().remote_fetches, 1);
    }

    #[tokio::test]
    async fn test_pending_entries_do_not_trigger_refetch() {
        let (cache, _) = cache_with(StubFetcher::returning(&["a.jpg"]), MockAsyncHttpClient::new());
        cache.entries_for(&london()).await.unwrap();
        cache.fetcher.set_answer(Ok(vec!["z.jpg".to_string()]));

        let entries = cache.entries_for(&london()).await.unwrap();
        assert_eq!(entries[0].locator, "a.jpg");
        assert_eq!(cache.fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_entries_for_share_one_fetch() {
        let mut fetcher = StubFetcher::returning(&["a.jpg"]);
        fetcher.delay = Some(Duration::from_millis(20));
        let (cache, store) = cache_with(fetcher, MockAsyncHttpClient::new());

        let location = london();
        let (a, b) = tokio::join!(cache.entries_for(&location), cache.entries_for(&location));

        assert_eq!(a.unwrap(), b.unwrap());
        assert_eq!(cache.fetcher.calls(), 1);
        assert_eq!(store.len(), 1);
        assert_eq!(cache.stats().coalesced_waits, 1);
        assert_eq!(cache.stats().in_flight_fetches, 0);
    }

    #[tokio::test]
    async fn test_fetch_failure_persists_nothing_and_can_retry() {
        let (cache, store) = cache_with(
            StubFetcher::failing(FetchError::Network("offline".to_string())),
            MockAsyncHttpClient::new(),
        );

        let result = cache.entries_for(&london()).await;
        assert!(matches!(result, Err(CacheError::Fetch(FetchError::Network(_)))));
        assert!(store.is_empty());

        cache.fetcher.set_answer(Ok(vec!["a.jpg".to_string()]));
        assert_eq!(cache.entries_for(&london()).await.unwrap().len(), 1);
        assert_eq!(cache.fetcher.calls(), 2);
    }

    #[tokio::test]
    async fn test_clear_and_refetch_replaces_entries() {
        let (cache, _) = cache_with(StubFetcher::returning(&["a.jpg"]), MockAsyncHttpClient::new());
        let old = cache.entries_for(&london()).await.unwrap();

        cache
            .fetcher
            .set_answer(Ok(vec!["x.jpg".to_string(), "y.jpg".to_string()]));
        let fresh = cache.clear_and_refetch(&london()).await.unwrap();

        assert_eq!(fresh.len(), 2);
        assert!(fresh.iter().all(|e| e.id != old[0].id));
        assert_eq!(cache.entries_for(&london()).await.unwrap(), fresh);
    }

    #[tokio::test]
    async fn test_clear_and_refetch_waits_for_in_flight_fetch() {
        let mut fetcher = StubFetcher::returning(&["a.jpg", "b.jpg"]);
        fetcher.delay = Some(Duration::from_millis(20));
        let (cache, store) = cache_with(fetcher, MockAsyncHttpClient::new());
        let location = london();

        let (listed, refreshed) = tokio::join!(cache.entries_for(&location), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cache.clear_and_refetch(&location).await
        });

        let listed = listed.unwrap();
        let refreshed = refreshed.unwrap();
        assert_eq!(cache.fetcher.calls(), 2);
        assert!(refreshed.iter().all(|e| listed.iter().all(|l| l.id != e.id)));
        assert_eq!(store.query(&location).unwrap(), refreshed);
    }

    #[tokio::test]
    async fn test_resolve_hit_counts() {
        let http = MockAsyncHttpClient::new();
        http.respond_ok("a.jpg", vec![1, 2, 3]);
        let (cache, _) = cache_with(StubFetcher::returning(&["a.jpg"]), http);
        let id = cache.entries_for(&london()).await.unwrap()[0].id;

        cache.resolve(id).await.unwrap();
        cache.resolve(id).await.unwrap();

        let stats = cache.stats();
        assert_eq!(stats.downloads, 1);
        assert_eq!(stats.payload_hits, 1);
    }

    #[tokio::test]
    async fn test_empty_body_is_decode_error() {
        let http = MockAsyncHttpClient::new();
        http.respond_ok("a.jpg", Vec::<u8>::new());
        let (cache, _) = cache_with(StubFetcher::returning(&["a.jpg"]), http);
        let id = cache.entries_for(&london()).await.unwrap()[0].id;

        assert!(matches!(cache.resolve(id).await, Err(ResolveError::Decode(_))));
        assert!(!cache.entry(id).unwrap().unwrap().is_resolved());
    }

    #[tokio::test]
    async fn test_error_status_is_network_error() {
        let http = MockAsyncHttpClient::new();
        http.respond(
            "a.jpg",
            Err(HttpError::Status {
                status: 404,
                url: "a.jpg".to_string(),
                body: Bytes::new(),
            }),
        );
        let (cache, _) = cache_with(StubFetcher::returning(&["a.jpg"]), http);
        let id = cache.entries_for(&london()).await.unwrap()[0].id;

        let result = cache.resolve(id).await;
        assert!(matches!(result, Err(ResolveError::Network(ref m)) if m == "HTTP 404"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_entry() {
        let (cache, _) = cache_with(StubFetcher::returning(&[]), MockAsyncHttpClient::new());
        assert!(matches!(
            cache.resolve(EntryId(5)).await,
            Err(ResolveError::NotFound(EntryId(5)))
        ));
    }

    #[tokio::test]
    async fn test_delete_during_download_wins() {
        let http = MockAsyncHttpClient::new().with_delay(Duration::from_millis(20));
        http.respond_ok("a.jpg", vec![9, 9]);
        let (cache, store) = cache_with(StubFetcher::returning(&["a.jpg"]), http);
        let id = cache.entries_for(&london()).await.unwrap()[0].id;

        let (resolved, deleted) = tokio::join!(cache.resolve(id), async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            cache.delete_entry(id).await
        });

        assert_eq!(resolved.unwrap(), Bytes::from_static(&[9, 9]));
        assert!(deleted.is_ok());
        assert!(store.get(id).unwrap().is_none());
        assert!(matches!(
            cache.resolve(id).await,
            Err(ResolveError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_all_preserves_order() {
        let http = MockAsyncHttpClient::new();
        http.respond_ok("a.jpg", vec![1]);
        http.respond_ok("c.jpg", vec![3]);
        let (cache, _) = cache_with(StubFetcher::returning(&["a.jpg", "b.jpg", "c.jpg"]), http);

        let results = cache.resolve_all(&london()).await.unwrap();
        let ids: Vec<_> = cache
            .entries_for(&london())
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.id)
            .collect();

        assert_eq!(results.iter().map(|(id, _)| *id).collect::<Vec<_>>(), ids);
        assert_eq!(results[0].1.as_ref().unwrap(), &Bytes::from_static(&[1]));
        assert!(matches!(results[1].1, Err(ResolveError::Network(_))));
        assert_eq!(results[2].1.as_ref().unwrap(), &Bytes::from_static(&[3]));
    }

    #[tokio::test]
    async fn test_dropped_resolve_does_not_block_followers() {
        let http = MockAsyncHttpClient::new().with_delay(Duration::from_millis(50));
        http.respond_ok("a.jpg", vec![7]);
        let (cache, _) = cache_with(StubFetcher::returning(&["a.jpg"]), http);
        let id = cache.entries_for(&london()).await.unwrap()[0].id;

        // Leader gives up before the download finishes
        let abandoned =
            tokio::time::timeout(Duration::from_millis(5), cache.resolve(id)).await;
        assert!(abandoned.is_err());
        assert_eq!(cache.stats().in_flight_downloads, 0);

        assert_eq!(cache.resolve(id).await.unwrap(), Bytes::from_static(&[7]));
    }
}
