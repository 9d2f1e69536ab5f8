//! Authoritative handle table

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::proxy::WeakObservation;
use crate::{NativeHandle, TrackerError};

/// Concurrent map from native handle to the weak observation watching its
/// proxy.
///
/// The table is the only shared mutable structure in the tracker. Insert and
/// remove are the critical sections and each is a single sharded-map
/// operation, so registration-heavy workloads never block behind the drain
/// loop. Invariants: a handle appears at most once, and an entry is removed
/// exactly once, either by `unregister` or at the moment the handle enters a
/// destroy batch.
#[derive(Debug, Default)]
pub struct HandleTable {
    entries: DashMap<NativeHandle, WeakObservation>,
}

impl HandleTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Insert an observation keyed by its handle.
    ///
    /// Fails without touching the table if the handle is already tracked.
    pub fn insert(&self, observation: WeakObservation) -> Result<(), TrackerError> {
        match self.entries.entry(observation.handle()) {
            Entry::Occupied(_) => Err(TrackerError::DuplicateRegistration(observation.handle())),
            Entry::Vacant(slot) => {
                slot.insert(observation);
                Ok(())
            }
        }
    }

    /// Remove the entry for `handle`, returning its observation
    pub fn remove(&self, handle: NativeHandle) -> Option<WeakObservation> {
        self.entries.remove(&handle).map(|(_, observation)| observation)
    }

    /// Check whether `handle` is currently tracked
    pub fn contains(&self, handle: NativeHandle) -> bool {
        self.entries.contains_key(&handle)
    }

    /// Handles whose observed proxy is already gone.
    ///
    /// Used by the shutdown sweep to pick up proxies that died without their
    /// notification having been processed yet.
    pub fn collectible(&self) -> Vec<NativeHandle> {
        self.entries
            .iter()
            .filter(|entry| entry.value().is_collectible())
            .map(|entry| *entry.key())
            .collect()
    }

    /// Number of tracked handles
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
