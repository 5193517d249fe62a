//! Runtime services and shared state for the snipe-bot.

use std::time::Duration;

use tokio::time::{Instant, interval_at};
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        types::{Res, Void},
    },
    interaction::{event::PlatformEvent, router::EventRouter},
    service::{
        chat::ChatClient,
        db::{DbClient, surreal::SurrealDbClient},
        events::EventSource,
        settings::SettingsClient,
    },
    snipe::{feature::SnipeFeature, manager::SnipeManager},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the service clients, the snapshot manager, and the router.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The durable snapshot store.
    pub db: DbClient,
    /// The per-user settings provider.
    pub settings: SettingsClient,
    /// The reply surface.
    pub chat: ChatClient,
    /// The platform event source.
    pub events: EventSource,
    /// The snapshot manager.
    pub snipes: SnipeManager,
    /// The router built from every feature.
    pub router: EventRouter,
}

impl Runtime {
    /// Create a new runtime instance backed by the configured database, stdin, and stdout.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the database; snapshots and settings share one connection.
        let surreal = SurrealDbClient::connect(&config).await?;
        let db = DbClient::from(surreal.clone());
        let settings = SettingsClient::surreal(surreal);

        Self::with_services(config, db, settings, ChatClient::stdout(), EventSource::stdin())
    }

    /// Create a runtime from already-constructed services and register every feature.
    pub fn with_services(config: Config, db: DbClient, settings: SettingsClient, chat: ChatClient, events: EventSource) -> Res<Self> {
        let snipes = SnipeManager::new(&config, db.clone(), settings.clone())?;

        let router = EventRouter::builder().with_feature(&SnipeFeature::new(snipes.clone(), chat.clone())).build();

        info!("Registered {} interaction handler(s).", router.len());

        Ok(Self {
            config,
            db,
            settings,
            chat,
            events,
            snipes,
            router,
        })
    }

    /// Pumps events into the router until the source is exhausted or Ctrl-C is received.
    ///
    /// A periodic timer injects the cache sweep signal alongside the source's own.
    pub async fn start(&self) -> Void {
        let period = Duration::from_secs(self.config.cache_sweep_interval_secs);
        let mut sweep = interval_at(Instant::now() + period, period);

        let shutdown = tokio::signal::ctrl_c();
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                event = self.events.next_event() => match event {
                    Ok(Some(event)) => {
                        // Handlers run detached; the loop never waits on them.
                        let _ = self.router.dispatch(event);
                    }
                    Ok(None) => {
                        info!("Event source exhausted, shutting down.");
                        break;
                    }
                    Err(err) => warn!("Skipping event: {:#}", err),
                },
                _ = sweep.tick() => {
                    let _ = self.router.dispatch(PlatformEvent::CacheSweep);
                }
                result = &mut shutdown => {
                    result?;
                    info!("Received Ctrl-C, shutting down.");
                    break;
                }
            }
        }

        Ok(())
    }
}
