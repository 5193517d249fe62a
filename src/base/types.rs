use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// A captured, point-in-time record of a removed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Identical to the originating message's identifier.
    pub id: String,
    pub author_id: String,
    pub channel_id: String,
    pub content: String,
    pub attachment_count: u32,
    pub replied_to_user_id: Option<String>,
    /// Set if the original was modified before removal.
    pub edited: bool,
    /// Original creation time of the message, not capture time.
    pub created_at: DateTime<Utc>,
    /// True once consumed. Never persisted.
    #[serde(skip)]
    pub deleted: bool,
}

/// Scope used to query "latest" snapshots.
///
/// An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotFilter {
    pub channel_id: Option<String>,
    pub author_id: Option<String>,
}

impl SnapshotFilter {
    /// Filter on a single channel.
    pub fn channel(channel_id: impl Into<String>) -> Self {
        Self {
            channel_id: Some(channel_id.into()),
            author_id: None,
        }
    }

    /// Narrow the filter to a single author.
    pub fn author(mut self, author_id: impl Into<String>) -> Self {
        self.author_id = Some(author_id.into());
        self
    }
}

/// Per-user preferences consulted by the snapshot manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSettings {
    pub user_id: String,
    /// Whether this user's deleted messages may be captured, and whether they may retrieve captures.
    pub allow_capture: bool,
}

impl UserSettings {
    /// Settings for a user that has never changed anything.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            allow_capture: true,
        }
    }
}

/// The outcome of a consume request, handed to the response surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SnipeReply {
    Snapshot { requested_by: String, snapshot: Snapshot },
    NothingFound { requested_by: String, channel_id: String },
    Disabled { requested_by: String },
    Failed { requested_by: String, message: String },
}
