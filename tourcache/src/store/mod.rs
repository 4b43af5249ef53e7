//! Persistent entry stores.
//!
//! The [`EntryStore`] trait is the persistence seam of the resource cache.
//! Operations are synchronous and expected to be fast; every implementation
//! serializes its writes internally (single-writer discipline) while reads
//! may come from any task.
//!
//! Two implementations are provided:
//!
//! - [`MemoryStore`]: process-local, used by tests and short-lived tools
//! - [`JsonFileStore`]: a directory with a JSON index and one file per payload
//!
//! # Atomic batches
//!
//! `insert_batch` persists all placeholders of a fetched page or none of
//! them. Callers never observe a partial batch for a location.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use thiserror::Error;

use crate::cache::{CacheEntry, EntryId, NewEntry};
use crate::coord::LocationKey;

/// Errors from the persistent store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Underlying file system failure.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: Arc<io::Error>,
    },

    /// Stored data could not be encoded or decoded.
    #[error("Corrupt store data: {0}")]
    Serialization(String),

    /// An entry violates a store invariant (e.g. empty locator).
    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    /// The store cannot serve requests.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Wraps an I/O error with the path it occurred on.
    pub fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        StoreError::Io {
            path: path.as_ref().to_path_buf(),
            source: Arc::new(source),
        }
    }

    /// Short title suitable for an alert or error banner.
    pub fn caption(&self) -> &'static str {
        "Storage error"
    }

    /// Detail text shown under the caption.
    pub fn message(&self) -> String {
        self.to_string()
    }
}

/// Persistence operations used by the resource cache.
pub trait EntryStore: Send + Sync {
    /// Returns all entries for a location in insertion order.
    fn query(&self, location: &LocationKey) -> Result<Vec<CacheEntry>, StoreError>;

    /// Looks up a single entry.
    fn get(&self, id: EntryId) -> Result<Option<CacheEntry>, StoreError>;

    /// Persists a batch of placeholders for a location atomically.
    ///
    /// Ids are assigned in batch order. On error nothing is persisted.
    fn insert_batch(
        &self,
        location: &LocationKey,
        entries: Vec<NewEntry>,
    ) -> Result<Vec<CacheEntry>, StoreError>;

    /// Stores the payload of a pending entry.
    ///
    /// Returns `false` if the entry no longer exists. A payload that is
    /// already present is never replaced.
    fn update_payload(&self, id: EntryId, payload: Bytes) -> Result<bool, StoreError>;

    /// Deletes one entry. Returns `false` if it did not exist.
    fn delete_entry(&self, id: EntryId) -> Result<bool, StoreError>;

    /// Deletes every entry for a location, returning how many were removed.
    fn delete_all(&self, location: &LocationKey) -> Result<usize, StoreError>;
}

impl<S: EntryStore + ?Sized> EntryStore for Arc<S> {
    fn query(&self, location: &LocationKey) -> Result<Vec<CacheEntry>, StoreError> {
        (**self).query(location)
    }

    fn get(&self, id: EntryId) -> Result<Option<CacheEntry>, StoreError> {
        (**self).get(id)
    }

    fn insert_batch(
        &self,
        location: &LocationKey,
        entries: Vec<NewEntry>,
    ) -> Result<Vec<CacheEntry>, StoreError> {
        (**self).insert_batch(location, entries)
    }

    fn update_payload(&self, id: EntryId, payload: Bytes) -> Result<bool, StoreError> {
        (**self).update_payload(id, payload)
    }

    fn delete_entry(&self, id: EntryId) -> Result<bool, StoreError> {
        (**self).delete_entry(id)
    }

    fn delete_all(&self, location: &LocationKey) -> Result<usize, StoreError> {
        (**self).delete_all(location)
    }
}

/// Rejects batches that would break the non-empty locator invariant.
fn validate_batch(entries: &[NewEntry]) -> Result<(), StoreError> {
    match entries.iter().position(|e| e.locator.trim().is_empty()) {
        Some(index) => Err(StoreError::InvalidEntry(format!(
            "entry {} of {} has an empty locator",
            index + 1,
            entries.len()
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_batch() {
        assert!(validate_batch(&[]).is_ok());
        assert!(validate_batch(&[NewEntry::new("a.jpg"), NewEntry::new("b.jpg")]).is_ok());

        let err = validate_batch(&[NewEntry::new("a.jpg"), NewEntry::new("  ")]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidEntry(_)));
        assert!(err.to_string().contains("entry 2 of 2"));
    }

    #[test]
    fn test_io_error_display_includes_path() {
        let err = StoreError::io(
            "/tmp/store/index.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/tmp/store/index.json"));
        assert!(err.to_string().contains("denied"));
        assert_eq!(err.caption(), "Storage error");
    }
}
