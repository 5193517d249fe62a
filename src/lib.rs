//! Library root for `snipe-bot`.
//!
//! Snipe-bot keeps short-lived snapshots of deleted chat messages:
//! - Captures deleted messages into a durable store, honoring user preferences
//! - Hands the latest snapshot in a channel to exactly one requester, then removes it
//! - Routes every platform event to the handlers registered for it
//!
//! The bot uses SurrealDB for storage. The architecture is built around
//! extensible traits that allow for different implementations of each service.

pub mod base;
pub mod interaction;
pub mod prelude;
pub mod runtime;
pub mod service;
pub mod snipe;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Sets up necessary services and starts the snipe-bot runtime:
/// - Creates the runtime context with database, settings, and chat clients
/// - Registers every feature with the event router
/// - Starts the main event loop for processing events
pub async fn start(config: Config) -> Void {
    info!("Starting snipe-bot ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
