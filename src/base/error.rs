//! Error taxonomy for the snapshot store and the event router.

use thiserror::Error;

/// Errors surfaced by the snapshot manager and the router.
///
/// None of these are fatal: the worst case is that one capture, consume or
/// dispatch is lost.
#[derive(Debug, Error)]
pub enum SnipeError {
    /// The durable store rejected an insert (including a duplicate id).
    #[error("failed to write snapshot `{id}`: {reason:#}")]
    StoreWrite { id: String, reason: anyhow::Error },

    /// No record matched the request.
    #[error("no snapshot found")]
    NotFound,

    /// The user disabled capture or retrieval.
    #[error("capture is disabled for user `{user_id}`")]
    SettingsDenied { user_id: String },

    /// A dispatched handler failed. Reported, never propagated.
    #[error("handler `{handler}` failed: {reason}")]
    HandlerInvocation { handler: String, reason: String },

    /// A read or delete against the durable store failed.
    #[error("store error: {0:#}")]
    Store(anyhow::Error),
}

pub type SnipeResult<T> = Result<T, SnipeError>;
