//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default database endpoint; `memory` selects the in-process engine.
fn default_db_endpoint() -> String {
    "memory".to_string()
}

/// Default database username.
fn default_db_username() -> String {
    "root".to_string()
}

/// Default database password.
fn default_db_password() -> String {
    "root".to_string()
}

/// Default database namespace.
fn default_db_namespace() -> String {
    "snipe".to_string()
}

/// Default database name.
fn default_db_database() -> String {
    "bot".to_string()
}

/// Default wildcard patterns of message content that is never captured.
fn default_ignored_words() -> Vec<String> {
    vec!["playerlist".to_string()]
}

/// Default interval between cache sweeps, in seconds.
fn default_cache_sweep_interval_secs() -> u64 {
    300
}

/// Default number of attempts a consume makes when it loses a race.
fn default_consume_retry_limit() -> u32 {
    3
}

/// Configuration for the snipe-bot application.
#[derive(Debug, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            inner: Arc::new(ConfigInner::default()),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Database endpoint URL, or `memory` (`DB_ENDPOINT`).
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username (`DB_USERNAME`).
    #[serde(default = "default_db_username")]
    pub db_username: String,
    /// Database password (`DB_PASSWORD`).
    #[serde(default = "default_db_password")]
    pub db_password: String,
    /// Database namespace (`DB_NAMESPACE`).
    #[serde(default = "default_db_namespace")]
    pub db_namespace: String,
    /// Database name (`DB_DATABASE`).
    #[serde(default = "default_db_database")]
    pub db_database: String,
    /// Wildcard patterns (`*`, `?`) matched against the whole message content (`IGNORED_WORDS`, comma-separated).
    #[serde(default = "default_ignored_words")]
    pub ignored_words: Vec<String>,
    /// Seconds between cache sweeps triggered by the runtime timer (`CACHE_SWEEP_INTERVAL_SECS`).
    #[serde(default = "default_cache_sweep_interval_secs")]
    pub cache_sweep_interval_secs: u64,
    /// Attempts a consume makes against the next-most-recent record after losing a race (`CONSUME_RETRY_LIMIT`).
    #[serde(default = "default_consume_retry_limit")]
    pub consume_retry_limit: u32,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            db_endpoint: default_db_endpoint(),
            db_username: default_db_username(),
            db_password: default_db_password(),
            db_namespace: default_db_namespace(),
            db_database: default_db_database(),
            ignored_words: default_ignored_words(),
            cache_sweep_interval_secs: default_cache_sweep_interval_secs(),
            consume_retry_limit: default_consume_retry_limit(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(
            config::Environment::default()
                .prefix("SNIPE_BOT")
                .try_parsing(true)
                .list_separator(",")
                .with_list_parse_key("ignored_words"),
        );

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    fn validate(&self) -> Res<()> {
        if self.cache_sweep_interval_secs == 0 {
            return Err(anyhow::anyhow!("Cache sweep interval must be greater than 0 seconds."));
        }

        if self.consume_retry_limit < 1 || self.consume_retry_limit > 16 {
            return Err(anyhow::anyhow!("Consume retry limit must be between 1 and 16."));
        }

        Ok(())
    }
}
