//! Request coalescing for in-flight operations.
//!
//! When several callers ask for the same key at once, only the first one
//! (the leader) does the work. Everyone else subscribes to the leader's
//! result and receives a clone of it.
//!
//! ```text
//! register(k) ──► Vacant   ──► NewRequest(InFlight) ──► work ──► complete(v)
//!             └─► Occupied ──► Coalesced(Receiver)  ──► recv() ─► v
//! ```
//!
//! The registry entry is removed when the leader completes, whatever the
//! outcome, or when the leader's [`InFlight`] guard is dropped without
//! completing (the leader's caller went away). In the latter case followers
//! see a closed channel and should register again.

use std::hash::Hash;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::sync::broadcast;

/// Outcome of registering interest in a key.
pub enum CoalesceResult<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// No operation was in flight; the caller must perform it.
    NewRequest(InFlight<'a, K, V>),
    /// Another caller is already performing the operation.
    Coalesced(broadcast::Receiver<V>),
}

/// Registry of in-flight operations keyed by `K`.
pub struct Coalescer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    in_flight: DashMap<K, broadcast::Sender<V>>,
}

impl<K, V> Coalescer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            in_flight: DashMap::new(),
        }
    }

    /// Registers interest in `key`.
    ///
    /// Check-and-insert happens under the map's shard lock, so exactly one
    /// concurrent caller becomes the leader.
    pub fn register(&self, key: K) -> CoalesceResult<'_, K, V> {
        match self.in_flight.entry(key.clone()) {
            Entry::Occupied(occupied) => CoalesceResult::Coalesced(occupied.get().subscribe()),
            Entry::Vacant(vacant) => {
                let (sender, _) = broadcast::channel(1);
                vacant.insert(sender.clone());
                CoalesceResult::NewRequest(InFlight {
                    coalescer: self,
                    key: Some(key),
                    sender,
                })
            }
        }
    }

    /// Number of operations currently in flight.
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_in_flight(&self, key: &K) -> bool {
        self.in_flight.contains_key(key)
    }
}

impl<K, V> Default for Coalescer<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Leader's handle on an in-flight operation.
pub struct InFlight<'a, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    coalescer: &'a Coalescer<K, V>,
    key: Option<K>,
    sender: broadcast::Sender<V>,
}

impl<K, V> InFlight<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Publishes the result to all waiting followers and clears the entry.
    ///
    /// Returns the number of followers that received it.
    pub fn complete(mut self, value: V) -> usize {
        if let Some(key) = self.key.take() {
            // Remove first: callers arriving after this point start fresh
            self.coalescer.in_flight.remove(&key);
        }
        self.sender.send(value).unwrap_or(0)
    }
}

impl<K, V> Drop for InFlight<'_, K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            self.coalescer.in_flight.remove(&key);
        }
    }
}
