pub use crate::base::{
    config::Config,
    error::{SnipeError, SnipeResult},
    types::{Err, Res, Snapshot, SnapshotFilter, SnipeReply, UserSettings, Void},
};
pub use anyhow::anyhow;
pub use tracing::{debug, error, info, instrument, warn};
