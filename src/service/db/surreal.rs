//! SurrealDB implementation for snipe-bot data storage.

use async_trait::async_trait;
use chrono::DateTime;
use serde::{Deserialize, Serialize};
use surrealdb::{
    RecordId, Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{Res, Snapshot, SnapshotFilter},
    },
    service::db::{DbClient, GenericDbClient},
};

const SNIPE_TABLE: &str = "snipe";

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Connects to the configured SurrealDB endpoint.
    pub async fn surreal(config: &Config) -> Res<Self> {
        Ok(SurrealDbClient::connect(config).await?.into())
    }

    /// Creates a client over a fresh in-memory SurrealDB instance.
    pub async fn surreal_memory() -> Res<Self> {
        Ok(SurrealDbClient::memory().await?.into())
    }
}

impl From<SurrealDbClient> for DbClient {
    fn from(client: SurrealDbClient) -> Self {
        Self::new(std::sync::Arc::new(client))
    }
}

// Records.

/// A snapshot row in the `snipe` table.
///
/// `created_at` is stored as epoch milliseconds so that ordering is numeric.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SnipeRecord {
    #[serde(default, skip_serializing)]
    id: Option<RecordId>,
    message_id: String,
    author_id: String,
    channel_id: String,
    content: String,
    attachment_count: u32,
    replied_to_user_id: Option<String>,
    edited: bool,
    created_at: i64,
}

impl From<&Snapshot> for SnipeRecord {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            id: None,
            message_id: snapshot.id.clone(),
            author_id: snapshot.author_id.clone(),
            channel_id: snapshot.channel_id.clone(),
            content: snapshot.content.clone(),
            attachment_count: snapshot.attachment_count,
            replied_to_user_id: snapshot.replied_to_user_id.clone(),
            edited: snapshot.edited,
            created_at: snapshot.created_at.timestamp_millis(),
        }
    }
}

impl TryFrom<SnipeRecord> for Snapshot {
    type Error = anyhow::Error;

    fn try_from(record: SnipeRecord) -> Res<Self> {
        let created_at = DateTime::from_timestamp_millis(record.created_at).ok_or_else(|| anyhow::anyhow!("Invalid timestamp `{}` on snapshot `{}`.", record.created_at, record.message_id))?;

        Ok(Snapshot {
            id: record.message_id,
            author_id: record.author_id,
            channel_id: record.channel_id,
            content: record.content,
            attachment_count: record.attachment_count,
            replied_to_user_id: record.replied_to_user_id,
            edited: record.edited,
            created_at,
            deleted: false,
        })
    }
}

// Client.

/// SurrealDB-backed store for snapshots and user settings.
#[derive(Clone)]
pub struct SurrealDbClient {
    pub(crate) db: Surreal<Any>,
}

impl SurrealDbClient {
    /// Connects to the configured endpoint, signs in, and defines the schema.
    ///
    /// An endpoint of `memory` selects the in-process engine, which needs no credentials.
    #[instrument(skip_all)]
    pub async fn connect(config: &Config) -> Res<Self> {
        let in_memory = config.db_endpoint == "memory" || config.db_endpoint.starts_with("mem://");
        let endpoint = if config.db_endpoint == "memory" { "mem://".to_string() } else { config.db_endpoint.clone() };

        let db = any::connect(endpoint).await?;

        if !in_memory {
            db.signin(Root {
                username: &config.db_username,
                password: &config.db_password,
            })
            .await?;
        }

        db.use_ns(&config.db_namespace).use_db(&config.db_database).await?;

        let client = Self { db };
        client.define_schema().await?;

        info!("Database initialized successfully.");

        Ok(client)
    }

    /// Creates a client over a fresh in-memory instance with default settings.
    pub async fn memory() -> Res<Self> {
        Self::connect(&Config::default()).await
    }

    async fn define_schema(&self) -> Res<()> {
        // Snapshots of deleted messages.
        self.db
            .query(
                "DEFINE TABLE IF NOT EXISTS snipe SCHEMAFULL;
                DEFINE FIELD IF NOT EXISTS message_id ON snipe TYPE string;
                DEFINE FIELD IF NOT EXISTS author_id ON snipe TYPE string;
                DEFINE FIELD IF NOT EXISTS channel_id ON snipe TYPE string;
                DEFINE FIELD IF NOT EXISTS content ON snipe TYPE string;
                DEFINE FIELD IF NOT EXISTS attachment_count ON snipe TYPE int;
                DEFINE FIELD IF NOT EXISTS replied_to_user_id ON snipe TYPE option<string>;
                DEFINE FIELD IF NOT EXISTS edited ON snipe TYPE bool;
                DEFINE FIELD IF NOT EXISTS created_at ON snipe TYPE int;
                DEFINE INDEX IF NOT EXISTS snipe_channel_created ON snipe FIELDS channel_id, created_at;",
            )
            .await?
            .check()?;

        // Per-user preferences.
        self.db
            .query(
                "DEFINE TABLE IF NOT EXISTS user_settings SCHEMAFULL;
                DEFINE FIELD IF NOT EXISTS user_id ON user_settings TYPE string;
                DEFINE FIELD IF NOT EXISTS allow_capture ON user_settings TYPE bool;",
            )
            .await?
            .check()?;

        Ok(())
    }
}

/// Builds the `WHERE` clause for a filter, binding names match the filter fields.
fn where_clause(filter: &SnapshotFilter) -> String {
    let mut conditions = Vec::new();

    if filter.channel_id.is_some() {
        conditions.push("channel_id = $channel_id");
    }

    if filter.author_id.is_some() {
        conditions.push("author_id = $author_id");
    }

    if conditions.is_empty() { String::new() } else { format!("WHERE {}", conditions.join(" AND ")) }
}

impl SurrealDbClient {
    async fn filtered_query(&self, sql: String, filter: &SnapshotFilter) -> Res<surrealdb::Response> {
        let mut query = self.db.query(sql);

        if let Some(channel_id) = &filter.channel_id {
            query = query.bind(("channel_id", channel_id.clone()));
        }

        if let Some(author_id) = &filter.author_id {
            query = query.bind(("author_id", author_id.clone()));
        }

        Ok(query.await?)
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip(self, snapshot), fields(id = %snapshot.id))]
    async fn insert_snapshot(&self, snapshot: &Snapshot) -> Res<Snapshot> {
        let record = SnipeRecord::from(snapshot);

        let created: Option<SnipeRecord> = self.db.create((SNIPE_TABLE, snapshot.id.clone())).content(record).await?;
        let created = created.ok_or_else(|| anyhow::anyhow!("Snapshot `{}` was not created.", snapshot.id))?;

        created.try_into()
    }

    #[instrument(skip(self))]
    async fn find_snapshot(&self, id: &str) -> Res<Option<Snapshot>> {
        let record: Option<SnipeRecord> = self.db.select((SNIPE_TABLE, id.to_owned())).await?;

        record.map(Snapshot::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_latest_snapshot(&self, filter: &SnapshotFilter) -> Res<Option<Snapshot>> {
        let sql = format!("SELECT * FROM snipe {} ORDER BY created_at DESC, message_id DESC LIMIT 1", where_clause(filter));

        let mut response = self.filtered_query(sql, filter).await?;
        let records: Vec<SnipeRecord> = response.take(0)?;

        records.into_iter().next().map(Snapshot::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn take_snapshot(&self, id: &str) -> Res<Option<Snapshot>> {
        let record: Option<SnipeRecord> = self.db.delete((SNIPE_TABLE, id.to_owned())).await?;

        record.map(Snapshot::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn count_snapshots(&self, filter: &SnapshotFilter) -> Res<u64> {
        let sql = format!("SELECT count() FROM snipe {} GROUP ALL", where_clause(filter));

        let mut response = self.filtered_query(sql, filter).await?;
        let count: Option<u64> = response.take((0, "count"))?;

        Ok(count.unwrap_or(0))
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;

    fn snapshot(id: &str, channel_id: &str, author_id: &str, secs: i64) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            author_id: author_id.to_string(),
            channel_id: channel_id.to_string(),
            content: format!("message {id}"),
            attachment_count: 0,
            replied_to_user_id: None,
            edited: false,
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
            deleted: false,
        }
    }

    #[test]
    fn where_clause_covers_filter_fields() {
        assert_eq!(where_clause(&SnapshotFilter::default()), "");
        assert_eq!(where_clause(&SnapshotFilter::channel("C1")), "WHERE channel_id = $channel_id");
        assert_eq!(where_clause(&SnapshotFilter::channel("C1").author("U1")), "WHERE channel_id = $channel_id AND author_id = $author_id");
    }

    #[tokio::test]
    async fn insert_then_find_by_id() {
        let db = SurrealDbClient::memory().await.unwrap();
        let mut original = snapshot("1001", "C1", "U1", 0);
        original.replied_to_user_id = Some("U2".to_string());
        original.attachment_count = 2;

        db.insert_snapshot(&original).await.unwrap();
        let found = db.find_snapshot("1001").await.unwrap().unwrap();

        assert_eq!(found, original);
        assert!(db.find_snapshot("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_insert_is_an_error() {
        let db = SurrealDbClient::memory().await.unwrap();
        let original = snapshot("1001", "C1", "U1", 0);

        db.insert_snapshot(&original).await.unwrap();

        assert!(db.insert_snapshot(&original).await.is_err());
    }

    #[tokio::test]
    async fn latest_respects_filter_and_order() {
        let db = SurrealDbClient::memory().await.unwrap();

        db.insert_snapshot(&snapshot("1", "C1", "U1", 10)).await.unwrap();
        db.insert_snapshot(&snapshot("2", "C1", "U2", 30)).await.unwrap();
        db.insert_snapshot(&snapshot("3", "C2", "U1", 50)).await.unwrap();
        db.insert_snapshot(&snapshot("4", "C1", "U1", 20)).await.unwrap();

        let latest = db.find_latest_snapshot(&SnapshotFilter::channel("C1")).await.unwrap().unwrap();
        assert_eq!(latest.id, "2");

        let latest = db.find_latest_snapshot(&SnapshotFilter::channel("C1").author("U1")).await.unwrap().unwrap();
        assert_eq!(latest.id, "4");

        let latest = db.find_latest_snapshot(&SnapshotFilter::default()).await.unwrap().unwrap();
        assert_eq!(latest.id, "3");

        assert!(db.find_latest_snapshot(&SnapshotFilter::channel("C9")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_removes_exactly_once() {
        let db = SurrealDbClient::memory().await.unwrap();
        db.insert_snapshot(&snapshot("1", "C1", "U1", 0)).await.unwrap();

        let taken = db.take_snapshot("1").await.unwrap();
        assert_eq!(taken.map(|s| s.id), Some("1".to_string()));

        assert!(db.take_snapshot("1").await.unwrap().is_none());
        assert!(!db.delete_snapshot("1").await.unwrap());
        assert!(db.find_snapshot("1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn counts_by_filter() {
        let db = SurrealDbClient::memory().await.unwrap();

        assert_eq!(db.count_snapshots(&SnapshotFilter::channel("C1")).await.unwrap(), 0);

        db.insert_snapshot(&snapshot("1", "C1", "U1", 0)).await.unwrap();
        db.insert_snapshot(&snapshot("2", "C1", "U2", 1)).await.unwrap();
        db.insert_snapshot(&snapshot("3", "C2", "U1", 2)).await.unwrap();

        assert_eq!(db.count_snapshots(&SnapshotFilter::channel("C1")).await.unwrap(), 2);
        assert_eq!(db.count_snapshots(&SnapshotFilter::channel("C1").author("U1")).await.unwrap(), 1);
        assert_eq!(db.count_snapshots(&SnapshotFilter::default()).await.unwrap(), 3);
    }
}
