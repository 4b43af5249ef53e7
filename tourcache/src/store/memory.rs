//! In-process entry store.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use parking_lot::Mutex;

use super::{validate_batch, EntryStore, StoreError};
use crate::cache::{CacheEntry, EntryId, NewEntry};
use crate::coord::LocationKey;

#[derive(Default)]
struct Inner {
    next_id: u64,
    entries: BTreeMap<EntryId, CacheEntry>,
    /// Entry ids per location in insertion order.
    by_location: HashMap<LocationKey, Vec<EntryId>>,
}

/// Entry store kept entirely in memory.
///
/// All state lives behind one mutex, so every operation (and in particular
/// every batch insert) is atomic with respect to other callers.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all locations.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EntryStore for MemoryStore {
    fn query(&self, location: &LocationKey) -> Result<Vec<CacheEntry>, StoreError> {
        let inner = self.inner.lock();
        let entries = inner
            .by_location
            .get(location)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| inner.entries.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(entries)
    }

    fn get(&self, id: EntryId) -> Result<Option<CacheEntry>, StoreError> {
        Ok(self.inner.lock().entries.get(&id).cloned())
    }

    fn insert_batch(
        &self,
        location: &LocationKey,
        entries: Vec<NewEntry>,
    ) -> Result<Vec<CacheEntry>, StoreError> {
        validate_batch(&entries)?;

        let mut inner = self.inner.lock();
        let mut created = Vec::with_capacity(entries.len());
        for new_entry in entries {
            inner.next_id += 1;
            created.push(CacheEntry {
                id: EntryId(inner.next_id),
                location: *location,
                locator: new_entry.locator,
                payload: None,
            });
        }

        let ids = inner.by_location.entry(*location).or_default();
        ids.extend(created.iter().map(|e| e.id));
        for entry in &created {
            inner.entries.insert(entry.id, entry.clone());
        }

        Ok(created)
    }

    fn update_payload(&self, id: EntryId, payload: Bytes) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        match inner.entries.get_mut(&id) {
            Some(entry) => {
                if entry.payload.is_none() {
                    entry.payload = Some(payload);
                }
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn delete_entry(&self, id: EntryId) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock();
        let Some(entry) = inner.entries.remove(&id) else {
            return Ok(false);
        };

        if let Some(ids) = inner.by_location.get_mut(&entry.location) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                inner.by_location.remove(&entry.location);
            }
        }
        Ok(true)
    }

    fn delete_all(&self, location: &LocationKey) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock();
        let ids = inner.by_location.remove(location).unwrap_or_default();
        for id in &ids {
            inner.entries.remove(id);
        }
        Ok(ids.len())
    }
}
