//! Cache entry model.

use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::coord::LocationKey;

/// Store-assigned identity of a cache entry.
///
/// Stable for the entry's lifetime and never reused by the store that
/// issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub u64);

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Resolution state of an entry, derived from its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Payload not downloaded yet.
    Pending,
    /// Payload downloaded and persisted.
    Resolved,
}

impl fmt::Display for EntryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryState::Pending => write!(f, "pending"),
            EntryState::Resolved => write!(f, "resolved"),
        }
    }
}

/// One remote resource, pending or resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub id: EntryId,
    pub location: LocationKey,
    pub locator: String,
    pub payload: Option<Bytes>,
}

impl CacheEntry {
    /// `Pending` until a payload has been stored, `Resolved` afterwards.
    pub fn state(&self) -> EntryState {
        if self.payload.is_some() {
            EntryState::Resolved
        } else {
            EntryState::Pending
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.state() == EntryState::Resolved
    }
}

/// A placeholder that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEntry {
    pub locator: String,
}

impl NewEntry {
    pub fn new(locator: impl Into<String>) -> Self {
        Self {
            locator: locator.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(payload: Option<Bytes>) -> CacheEntry {
        CacheEntry {
            id: EntryId(7),
            location: LocationKey::new(51.5, -0.12).unwrap(),
            locator: "https://example.com/a.jpg".to_string(),
            payload,
        }
    }

    #[test]
    fn test_state_derived_from_payload() {
        assert_eq!(entry(None).state(), EntryState::Pending);
        assert_eq!(
            entry(Some(Bytes::from_static(&[0xFF, 0xD8]))).state(),
            EntryState::Resolved
        );
    }

    #[test]
    fn test_empty_payload_still_counts_as_resolved() {
        assert!(entry(Some(Bytes::new())).is_resolved());
    }

    #[test]
    fn test_display() {
        assert_eq!(EntryId(42).to_string(), "42");
        assert_eq!(EntryState::Pending.to_string(), "pending");
        assert_eq!(EntryState::Resolved.to_string(), "resolved");
    }
}
