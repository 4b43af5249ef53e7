//! File-backed entry store.
//!
//! Layout of the store directory:
//!
//! ```text
//! <root>/
//! ├── index.json        entries, locators and the id counter
//! └── payloads/
//!     ├── 1.bin         resolved payload of entry 1
//!     └── ...
//! ```
//!
//! Every mutation writes a complete new index to `index.json.tmp`, syncs it
//! and renames it over `index.json`. A failure at any point leaves the
//! previous index in place, which is what makes batch inserts atomic on disk.
//! Payload files are written the same way before the index marks an entry
//! resolved. A resolved entry whose payload file has gone missing reads as
//! pending.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{validate_batch, EntryStore, StoreError};
use crate::cache::{CacheEntry, EntryId, NewEntry};
use crate::coord::LocationKey;

const INDEX_FILE: &str = "index.json";
const INDEX_TMP_FILE: &str = "index.json.tmp";
const PAYLOAD_DIR: &str = "payloads";
const INDEX_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreIndex {
    version: u32,
    next_id: u64,
    entries: Vec<IndexRecord>,
}

impl Default for StoreIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            next_id: 0,
            entries: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexRecord {
    id: EntryId,
    latitude: f64,
    longitude: f64,
    locator: String,
    #[serde(default)]
    resolved: bool,
}

impl IndexRecord {
    fn location(&self) -> Result<LocationKey, StoreError> {
        LocationKey::new(self.latitude, self.longitude).map_err(|e| {
            StoreError::Serialization(format!("entry {} has a bad location: {}", self.id, e))
        })
    }

    fn is_at(&self, location: &LocationKey) -> bool {
        self.location().map(|l| l == *location).unwrap_or(false)
    }
}

/// Entry store persisted to a directory.
///
/// The index is kept in memory behind a mutex and mirrored to disk on every
/// mutation; payload bytes are read from disk on demand.
pub struct JsonFileStore {
    root: PathBuf,
    index: Mutex<StoreIndex>,
}

impl JsonFileStore {
    /// Opens the store at `root`, creating the directory if needed.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        let payload_dir = root.join(PAYLOAD_DIR);
        fs::create_dir_all(&payload_dir).map_err(|e| StoreError::io(&payload_dir, e))?;

        let index_path = root.join(INDEX_FILE);
        let index = match fs::read(&index_path) {
            Ok(data) => {
                let index: StoreIndex = serde_json::from_slice(&data).map_err(|e| {
                    StoreError::Serialization(format!("{}: {}", index_path.display(), e))
                })?;
                if index.version != INDEX_VERSION {
                    return Err(StoreError::Unavailable(format!(
                        "unsupported index version {} (expected {})",
                        index.version, INDEX_VERSION
                    )));
                }
                index
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => StoreIndex::default(),
            Err(e) => return Err(StoreError::io(&index_path, e)),
        };

        debug!(
            root = %root.display(),
            entries = index.entries.len(),
            "Opened file store"
        );

        Ok(Self {
            root,
            index: Mutex::new(index),
        })
    }

    /// Directory holding the store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn payload_path(&self, id: EntryId) -> PathBuf {
        self.root.join(PAYLOAD_DIR).join(format!("{}.bin", id))
    }

    /// Replaces `index.json` with `index` via write-then-rename.
    fn write_index(&self, index: &StoreIndex) -> Result<(), StoreError> {
        let data =
            serde_json::to_vec_pretty(index).map_err(|e| StoreError::Serialization(e.to_string()))?;
        let tmp_path = self.root.join(INDEX_TMP_FILE);
        let index_path = self.root.join(INDEX_FILE);

        write_atomic(&tmp_path, &index_path, &data)
    }

    fn write_payload(&self, id: EntryId, payload: &[u8]) -> Result<(), StoreError> {
        let path = self.payload_path(id);
        let tmp_path = path.with_extension("bin.tmp");
        write_atomic(&tmp_path, &path, payload)
    }

    fn remove_payload(&self, id: EntryId) {
        let path = self.payload_path(id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove payload file"),
        }
    }

    /// Reads a resolved entry's payload. A missing file reads as pending so
    /// the next resolve downloads it again.
    fn read_payload(&self, id: EntryId) -> Result<Option<Bytes>, StoreError> {
        let path = self.payload_path(id);
        match fs::read(&path) {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!(entry_id = %id, path = %path.display(), "Payload file missing; entry reads as pending");
                Ok(None)
            }
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn to_entry(&self, record: &IndexRecord) -> Result<CacheEntry, StoreError> {
        let payload = if record.resolved {
            self.read_payload(record.id)?
        } else {
            None
        };

        Ok(CacheEntry {
            id: record.id,
            location: record.location()?,
            locator: record.locator.clone(),
            payload,
        })
    }
}

/// Writes `data` to `tmp_path`, syncs it, renames it over `path` and syncs
/// the parent directory so the rename itself is durable.
fn write_atomic(tmp_path: &Path, path: &Path, data: &[u8]) -> Result<(), StoreError> {
    {
        let mut file = File::create(tmp_path).map_err(|e| StoreError::io(tmp_path, e))?;
        file.write_all(data).map_err(|e| StoreError::io(tmp_path, e))?;
        file.sync_all().map_err(|e| StoreError::io(tmp_path, e))?;
    }
    fs::rename(tmp_path, path).map_err(|e| StoreError::io(path, e))?;

    if let Some(parent) = path.parent() {
        // Directories cannot be opened for sync on every platform
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

impl EntryStore for JsonFileStore {
    fn query(&self, location: &LocationKey) -> Result<Vec<CacheEntry>, StoreError> {
        // Payload reads happen outside the index lock
        let records: Vec<IndexRecord> = self
            .index
            .lock()
            .entries
            .iter()
            .filter(|record| record.is_at(location))
            .cloned()
            .collect();
        records.iter().map(|record| self.to_entry(record)).collect()
    }

    fn get(&self, id: EntryId) -> Result<Option<CacheEntry>, StoreError> {
        let record = self
            .index
            .lock()
            .entries
            .iter()
            .find(|record| record.id == id)
            .cloned();
        record.map(|record| self.to_entry(&record)).transpose()
    }

    fn insert_batch(
        &self,
        location: &LocationKey,
        entries: Vec<NewEntry>,
    ) -> Result<Vec<CacheEntry>, StoreError> {
        validate_batch(&entries)?;

        let mut guard = self.index.lock();
        let mut next = guard.clone();
        let mut created = Vec::with_capacity(entries.len());
        for new_entry in entries {
            next.next_id += 1;
            let id = EntryId(next.next_id);
            next.entries.push(IndexRecord {
                id,
                latitude: location.latitude(),
                longitude: location.longitude(),
                locator: new_entry.locator.clone(),
                resolved: false,
            });
            created.push(CacheEntry {
                id,
                location: *location,
                locator: new_entry.locator,
                payload: None,
            });
        }

        self.write_index(&next)?;
        *guard = next;
        Ok(created)
    }

    fn update_payload(&self, id: EntryId, payload: Bytes) -> Result<bool, StoreError> {
        let mut guard = self.index.lock();
        let Some(position) = guard.entries.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        if guard.entries[position].resolved && self.payload_path(id).exists() {
            return Ok(true);
        }

        self.write_payload(id, &payload)?;

        let mut next = guard.clone();
        next.entries[position].resolved = true;
        self.write_index(&next)?;
        *guard = next;
        Ok(true)
    }

    fn delete_entry(&self, id: EntryId) -> Result<bool, StoreError> {
        let mut guard = self.index.lock();
        let Some(position) = guard.entries.iter().position(|r| r.id == id) else {
            return Ok(false);
        };

        let mut next = guard.clone();
        next.entries.remove(position);
        self.write_index(&next)?;
        *guard = next;

        self.remove_payload(id);
        Ok(true)
    }

    fn delete_all(&self, location: &LocationKey) -> Result<usize, StoreError> {
        let mut guard = self.index.lock();
        let (removed, kept): (Vec<IndexRecord>, Vec<IndexRecord>) = guard
            .entries
            .iter()
            .cloned()
            .partition(|record| record.is_at(location));
        if removed.is_empty() {
            return Ok(0);
        }

        let next = StoreIndex {
            entries: kept,
            ..guard.clone()
        };
        self.write_index(&next)?;
        *guard = next;

        for record in &removed {
            self.remove_payload(record.id);
        }
        Ok(removed.len())
    }
}
