//! SurrealDB implementation of the settings provider.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use surrealdb::RecordId;
use tracing::{debug, instrument};

use crate::{
    base::types::{Res, UserSettings, Void},
    service::{
        db::surreal::SurrealDbClient,
        settings::{GenericSettingsClient, SettingsClient},
    },
};

const SETTINGS_TABLE: &str = "user_settings";

impl SettingsClient {
    /// Creates a settings client that shares the given SurrealDB connection.
    pub fn surreal(client: SurrealDbClient) -> Self {
        Self::new(Arc::new(client))
    }
}

/// A settings row in the `user_settings` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SettingsRecord {
    #[serde(default, skip_serializing)]
    id: Option<RecordId>,
    user_id: String,
    allow_capture: bool,
}

impl From<&UserSettings> for SettingsRecord {
    fn from(settings: &UserSettings) -> Self {
        Self {
            id: None,
            user_id: settings.user_id.clone(),
            allow_capture: settings.allow_capture,
        }
    }
}

impl From<SettingsRecord> for UserSettings {
    fn from(record: SettingsRecord) -> Self {
        Self {
            user_id: record.user_id,
            allow_capture: record.allow_capture,
        }
    }
}

#[async_trait]
impl GenericSettingsClient for SurrealDbClient {
    #[instrument(skip(self))]
    async fn get_settings(&self, user_id: &str) -> Res<UserSettings> {
        let record: Option<SettingsRecord> = self.db.select((SETTINGS_TABLE, user_id.to_owned())).await?;

        if let Some(record) = record {
            return Ok(record.into());
        }

        debug!("Settings for `{}` not found, creating defaults.", user_id);

        let defaults = UserSettings::new(user_id);
        let created: Result<Option<SettingsRecord>, surrealdb::Error> = self.db.create((SETTINGS_TABLE, user_id.to_owned())).content(SettingsRecord::from(&defaults)).await;

        match created {
            Ok(Some(record)) => Ok(record.into()),
            // A concurrent reader created the row first.
            _ => {
                let record: Option<SettingsRecord> = self.db.select((SETTINGS_TABLE, user_id.to_owned())).await?;
                Ok(record.map(Into::into).unwrap_or(defaults))
            }
        }
    }

    #[instrument(skip(self))]
    async fn update_settings(&self, settings: &UserSettings) -> Void {
        let _: Option<SettingsRecord> = self.db.upsert((SETTINGS_TABLE, settings.user_id.clone())).content(SettingsRecord::from(settings)).await?;

        Ok(())
    }
}
