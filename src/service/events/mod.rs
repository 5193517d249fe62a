pub mod json_lines;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{base::types::Res, interaction::event::PlatformEvent};

// Traits.

/// Generic platform event source.
///
/// Events are delivered serially, one call at a time.
#[async_trait]
pub trait GenericEventSource: Send + Sync + 'static {
    /// Waits for the next event.
    ///
    /// Returns `Ok(None)` once the source is exhausted. An `Err` concerns a
    /// single malformed event; the source stays usable afterwards.
    async fn next_event(&self) -> Res<Option<PlatformEvent>>;
}

// Structs.

/// Event source for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct EventSource {
    inner: Arc<dyn GenericEventSource>,
}

impl Deref for EventSource {
    type Target = dyn GenericEventSource;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl EventSource {
    pub fn new(inner: Arc<dyn GenericEventSource>) -> Self {
        Self { inner }
    }
}
