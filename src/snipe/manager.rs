//! Capture, consume-once retrieval, and cache ownership for snapshots.

use std::{ops::Deref, sync::Arc};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::{
    base::{
        config::Config,
        error::{SnipeError, SnipeResult},
        types::{Res, Snapshot, SnapshotFilter},
    },
    interaction::event::DeletedMessage,
    service::{db::DbClient, settings::SettingsClient},
    snipe::{cache::SnapshotCache, filter::IgnoredWords},
};

/// Primary owner of snapshot state.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct SnipeManager {
    inner: Arc<SnipeManagerInner>,
}

impl Deref for SnipeManager {
    type Target = SnipeManagerInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

pub struct SnipeManagerInner {
    db: DbClient,
    settings: SettingsClient,
    cache: SnapshotCache,
    ignored_words: IgnoredWords,
    consume_retry_limit: u32,
    /// Serializes the lookup-then-delete of every consume.
    consume_lock: Mutex<()>,
}

impl SnipeManager {
    pub fn new(config: &Config, db: DbClient, settings: SettingsClient) -> Res<Self> {
        let inner = SnipeManagerInner {
            db,
            settings,
            cache: SnapshotCache::new(),
            ignored_words: IgnoredWords::new(&config.ignored_words)?,
            consume_retry_limit: config.consume_retry_limit.max(1),
            consume_lock: Mutex::new(()),
        };

        Ok(Self { inner: Arc::new(inner) })
    }
}

impl SnipeManagerInner {
    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Stores a snapshot and returns it as the store now holds it.
    #[instrument(skip_all, fields(id = %snapshot.id))]
    pub async fn capture(&self, snapshot: Snapshot) -> SnipeResult<Snapshot> {
        let inserted = self.db.insert_snapshot(&snapshot).await.map_err(|reason| SnipeError::StoreWrite {
            id: snapshot.id.clone(),
            reason,
        })?;

        // Re-read so the result reflects whatever the store normalized on write.
        let stored = self.db.find_snapshot(&snapshot.id).await.map_err(SnipeError::Store)?.unwrap_or(inserted);

        self.cache.insert(stored.clone());

        debug!("Captured snapshot `{}` in `{}`.", stored.id, stored.channel_id);

        Ok(stored)
    }

    /// Captures a deleted message if it is worth keeping and its author allows it.
    ///
    /// Returns `Ok(None)` for messages that are filtered out, and
    /// [`SnipeError::SettingsDenied`] when the author disabled capture.
    #[instrument(skip_all, fields(id = %message.id))]
    pub async fn capture_message(&self, message: &DeletedMessage) -> SnipeResult<Option<Snapshot>> {
        if !message.has_payload() || !message.from_guild_member() {
            return Ok(None);
        }

        if self.ignored_words.is_ignored(&message.content) {
            debug!("Skipping message `{}` matching an ignored pattern.", message.id);
            return Ok(None);
        }

        let settings = self.settings.get_settings(&message.author_id).await.map_err(SnipeError::Store)?;

        if !settings.allow_capture {
            return Err(SnipeError::SettingsDenied { user_id: message.author_id.clone() });
        }

        self.capture(message.to_snapshot()).await.map(Some)
    }

    /// Returns the most recent snapshot in scope and removes it from the store.
    ///
    /// A given record is returned to at most one caller. A caller that loses
    /// the race for a record moves on to the next-most-recent one.
    #[instrument(skip(self))]
    pub async fn consume_latest(&self, filter: &SnapshotFilter) -> SnipeResult<Snapshot> {
        let _guard = self.consume_lock.lock().await;

        for attempt in 1..=self.consume_retry_limit {
            let Some(latest) = self.db.find_latest_snapshot(filter).await.map_err(SnipeError::Store)? else {
                return Err(SnipeError::NotFound);
            };

            let id = latest.id.clone();
            self.cache.insert(latest.clone());

            // Delete by the id captured above, never by filter, so a newer record is left alone.
            let taken = self.db.take_snapshot(&id).await.map_err(SnipeError::Store)?;
            self.cache.mark_deleted(&id);

            if taken.is_some() {
                info!("Consumed snapshot `{}`.", id);

                return Ok(Snapshot { deleted: true, ..latest });
            }

            warn!("Snapshot `{}` was consumed concurrently (attempt {}).", id, attempt);
        }

        Err(SnipeError::NotFound)
    }

    /// Serves a consume request for a channel on behalf of `requester_id`.
    ///
    /// The requester's settings are checked first, so a record is never
    /// consumed for a requester who disabled capture.
    #[instrument(skip(self))]
    pub async fn snipe(&self, channel_id: &str, requester_id: &str) -> SnipeResult<Snapshot> {
        let settings = self.settings.get_settings(requester_id).await.map_err(SnipeError::Store)?;

        if !settings.allow_capture {
            return Err(SnipeError::SettingsDenied { user_id: requester_id.to_string() });
        }

        self.consume_latest(&SnapshotFilter::channel(channel_id)).await
    }

    /// Cache-first lookup by id. Never deletes.
    #[instrument(skip(self))]
    pub async fn resolve_by_id(&self, id: &str) -> SnipeResult<Option<Snapshot>> {
        if let Some(cached) = self.cache.get(id)
            && !cached.deleted
        {
            return Ok(Some(cached));
        }

        let found = self.db.find_snapshot(id).await.map_err(SnipeError::Store)?;

        if let Some(snapshot) = &found {
            self.cache.insert(snapshot.clone());
        }

        Ok(found)
    }

    /// Number of stored snapshots in scope.
    #[instrument(skip(self))]
    pub async fn count(&self, filter: &SnapshotFilter) -> SnipeResult<u64> {
        self.db.count_snapshots(filter).await.map_err(SnipeError::Store)
    }

    /// Evicts consumed entries from the cache. Never touches the store.
    pub fn sweep(&self) -> usize {
        self.cache.sweep()
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::{
        base::{config::ConfigInner, types::UserSettings},
        service::db::surreal::SurrealDbClient,
    };

    async fn manager_with(inner: ConfigInner) -> SnipeManager {
        let surreal = SurrealDbClient::memory().await.unwrap();
        let config = Config { inner: Arc::new(inner) };

        SnipeManager::new(&config, surreal.clone().into(), SettingsClient::surreal(surreal)).unwrap()
    }

    async fn manager() -> SnipeManager {
        manager_with(ConfigInner::default()).await
    }

    fn snapshot(id: &str, channel_id: &str, secs: i64) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            author_id: "U1".to_string(),
            channel_id: channel_id.to_string(),
            content: format!("content {id}"),
            attachment_count: 0,
            replied_to_user_id: None,
            edited: false,
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            deleted: false,
        }
    }

    fn deleted_message(id: &str, author_id: &str, content: &str) -> DeletedMessage {
        DeletedMessage {
            id: id.to_string(),
            author_id: author_id.to_string(),
            channel_id: "C1".to_string(),
            guild_id: Some("G1".to_string()),
            author_bot: false,
            author_system: false,
            content: content.to_string(),
            attachment_count: 0,
            replied_to_user_id: None,
            edited: false,
            created_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        }
    }

    #[tokio::test]
    async fn capture_then_resolve_is_not_deleted() {
        let manager = manager().await;

        let stored = manager.capture(snapshot("1", "C1", 0)).await.unwrap();
        assert_eq!(stored, snapshot("1", "C1", 0));

        let resolved = manager.resolve_by_id("1").await.unwrap().unwrap();
        assert_eq!(resolved, stored);
        assert!(!resolved.deleted);

        let found = manager.db.find_snapshot("1").await.unwrap().unwrap();
        assert!(!found.deleted);
    }

    #[tokio::test]
    async fn duplicate_capture_is_a_store_write_error() {
        let manager = manager().await;

        manager.capture(snapshot("1", "C1", 0)).await.unwrap();
        let err = manager.capture(snapshot("1", "C1", 0)).await.unwrap_err();

        assert!(matches!(err, SnipeError::StoreWrite { id, .. } if id == "1"));
    }

    #[tokio::test]
    async fn consumes_in_descending_order_then_not_found() {
        let manager = manager().await;

        manager.capture(snapshot("a", "C1", 10)).await.unwrap();
        manager.capture(snapshot("b", "C1", 20)).await.unwrap();
        manager.capture(snapshot("c", "C1", 30)).await.unwrap();
        manager.capture(snapshot("x", "C2", 40)).await.unwrap();

        let filter = SnapshotFilter::channel("C1");
        let mut ids = Vec::new();

        for _ in 0..3 {
            let consumed = manager.consume_latest(&filter).await.unwrap();
            assert!(consumed.deleted);
            ids.push(consumed.id);
        }

        assert_eq!(ids, vec!["c", "b", "a"]);
        assert!(matches!(manager.consume_latest(&filter).await, Err(SnipeError::NotFound)));

        // Other scopes are untouched.
        assert_eq!(manager.count(&SnapshotFilter::channel("C2")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_consumers_never_share_a_record() {
        let manager = manager().await;
        manager.capture(snapshot("only", "C1", 0)).await.unwrap();

        let filter = SnapshotFilter::channel("C1");
        let (a, b) = tokio::join!(manager.consume_latest(&filter), manager.consume_latest(&filter));

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        let not_found = [&a, &b].iter().filter(|r| matches!(r, Err(SnipeError::NotFound))).count();

        assert_eq!(successes, 1);
        assert_eq!(not_found, 1);
    }

    #[tokio::test]
    async fn concurrent_consumers_across_tasks() {
        let manager = manager().await;

        for i in 0..5 {
            manager.capture(snapshot(&format!("m{i}"), "C1", i)).await.unwrap();
        }

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            handles.push(tokio::spawn(async move { manager.consume_latest(&SnapshotFilter::channel("C1")).await }));
        }

        let mut ids = Vec::new();
        let mut misses = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(snapshot) => ids.push(snapshot.id),
                Err(SnipeError::NotFound) => misses += 1,
                Err(err) => panic!("unexpected error: {err}"),
            }
        }

        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
        assert_eq!(misses, 3);
    }

    #[tokio::test]
    async fn consume_leaves_a_sweepable_cache_entry() {
        let manager = manager().await;
        manager.capture(snapshot("1", "C1", 0)).await.unwrap();
        manager.capture(snapshot("2", "C1", 1)).await.unwrap();

        manager.consume_latest(&SnapshotFilter::channel("C1")).await.unwrap();

        assert!(manager.cache().get("2").unwrap().deleted);
        assert!(manager.resolve_by_id("2").await.unwrap().is_none());

        assert_eq!(manager.sweep(), 1);
        assert!(manager.cache().get("2").is_none());
        assert!(manager.cache().get("1").is_some());

        // Sweeping never touches the store.
        assert!(manager.db.find_snapshot("1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn resolve_falls_through_to_the_store() {
        let manager = manager().await;
        manager.db.insert_snapshot(&snapshot("1", "C1", 0)).await.unwrap();

        assert!(manager.cache().get("1").is_none());
        assert_eq!(manager.resolve_by_id("1").await.unwrap().map(|s| s.id), Some("1".to_string()));
        assert!(manager.cache().get("1").is_some());
        assert!(manager.resolve_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn capture_message_filters_uninteresting_messages() {
        let manager = manager().await;

        let empty = deleted_message("1", "U1", "");
        assert!(manager.capture_message(&empty).await.unwrap().is_none());

        let mut bot = deleted_message("2", "U1", "beep");
        bot.author_bot = true;
        assert!(manager.capture_message(&bot).await.unwrap().is_none());

        let mut direct = deleted_message("3", "U1", "psst");
        direct.guild_id = None;
        assert!(manager.capture_message(&direct).await.unwrap().is_none());

        let ignored = deleted_message("4", "U1", "playerlist");
        assert!(manager.capture_message(&ignored).await.unwrap().is_none());

        let mut edited = deleted_message("5", "U1", "");
        edited.edited = true;
        assert!(manager.capture_message(&edited).await.unwrap().is_some());

        assert_eq!(manager.count(&SnapshotFilter::default()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn capture_message_uses_configured_patterns() {
        let manager = manager_with(ConfigInner {
            ignored_words: vec!["!*".to_string()],
            ..Default::default()
        })
        .await;

        assert!(manager.capture_message(&deleted_message("1", "U1", "!roll")).await.unwrap().is_none());
        assert!(manager.capture_message(&deleted_message("2", "U1", "playerlist")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn capture_message_respects_author_settings() {
        let manager = manager().await;
        manager
            .settings
            .update_settings(&UserSettings {
                user_id: "U9".to_string(),
                allow_capture: false,
            })
            .await
            .unwrap();

        let err = manager.capture_message(&deleted_message("1", "U9", "secret")).await.unwrap_err();
        assert!(matches!(err, SnipeError::SettingsDenied { user_id } if user_id == "U9"));

        let filter = SnapshotFilter::channel("C1").author("U9");
        assert!(manager.db.find_latest_snapshot(&filter).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn snipe_checks_the_requester_before_consuming() {
        let manager = manager().await;
        manager.capture(snapshot("1", "C1", 0)).await.unwrap();
        manager
            .settings
            .update_settings(&UserSettings {
                user_id: "U9".to_string(),
                allow_capture: false,
            })
            .await
            .unwrap();

        assert!(matches!(manager.snipe("C1", "U9").await, Err(SnipeError::SettingsDenied { .. })));
        assert_eq!(manager.count(&SnapshotFilter::channel("C1")).await.unwrap(), 1);

        assert_eq!(manager.snipe("C1", "U2").await.unwrap().id, "1");
        assert!(matches!(manager.snipe("C1", "U2").await, Err(SnipeError::NotFound)));
    }
}
