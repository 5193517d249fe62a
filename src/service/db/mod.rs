pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Res, Snapshot, SnapshotFilter};

// Traits.

/// Generic durable store trait that snapshot backends must implement.
///
/// Every operation is atomic per record: an insert that has not completed is
/// invisible to readers, and a take removes a record for exactly one caller.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Inserts a snapshot keyed by its id.
    ///
    /// Inserting an id that already exists is an error.
    async fn insert_snapshot(&self, snapshot: &Snapshot) -> Res<Snapshot>;

    /// Finds a snapshot by its id.
    async fn find_snapshot(&self, id: &str) -> Res<Option<Snapshot>>;

    /// Finds the most recent snapshot (by `created_at`) matching the filter.
    async fn find_latest_snapshot(&self, filter: &SnapshotFilter) -> Res<Option<Snapshot>>;

    /// Deletes a snapshot by id, returning the removed row.
    ///
    /// Returns `None` when no row was removed, which includes the case where a
    /// concurrent caller removed it first.
    async fn take_snapshot(&self, id: &str) -> Res<Option<Snapshot>>;

    /// Deletes a snapshot by id, reporting whether a row was removed.
    async fn delete_snapshot(&self, id: &str) -> Res<bool> {
        Ok(self.take_snapshot(id).await?.is_some())
    }

    /// Counts the snapshots matching the filter.
    async fn count_snapshots(&self, filter: &SnapshotFilter) -> Res<u64>;
}

// Structs.

/// Database client for snipe-bot.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}
