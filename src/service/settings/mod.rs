//! Per-user settings consulted before capturing or serving snapshots.

pub mod surreal;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{Res, UserSettings, Void};

// Traits.

/// Generic settings provider trait.
///
/// Unknown users get the default settings, which allow capture.
#[async_trait]
pub trait GenericSettingsClient: Send + Sync + 'static {
    /// Gets the settings for a user; or, creates the default settings if none exist.
    async fn get_settings(&self, user_id: &str) -> Res<UserSettings>;

    /// Replaces the settings for a user.
    async fn update_settings(&self, settings: &UserSettings) -> Void;
}

// Structs.

/// Settings client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct SettingsClient {
    inner: Arc<dyn GenericSettingsClient>,
}

impl Deref for SettingsClient {
    type Target = dyn GenericSettingsClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl SettingsClient {
    pub fn new(inner: Arc<dyn GenericSettingsClient>) -> Self {
        Self { inner }
    }
}
