//! In-memory cache of hydrated snapshots.

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::base::types::Snapshot;

/// Maps snapshot ids to hydrated snapshots.
///
/// There is no size or TTL bound; entries flagged `deleted` are reclaimed by
/// [`SnapshotCache::sweep`] when the host signals memory pressure.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    entries: RwLock<HashMap<String, Snapshot>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for the snapshot's id.
    pub fn insert(&self, snapshot: Snapshot) {
        self.entries.write().insert(snapshot.id.clone(), snapshot);
    }

    pub fn get(&self, id: &str) -> Option<Snapshot> {
        self.entries.read().get(id).cloned()
    }

    /// Flags an entry as consumed. Returns `false` if the id is not cached.
    pub fn mark_deleted(&self, id: &str) -> bool {
        match self.entries.write().get_mut(id) {
            Some(entry) => {
                entry.deleted = true;
                true
            }
            None => false,
        }
    }

    /// Removes every entry flagged as deleted and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write();
        let before = entries.len();

        entries.retain(|_, snapshot| !snapshot.deleted);

        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
