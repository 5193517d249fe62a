//! Reads platform events as newline-delimited JSON.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin},
    sync::Mutex,
};

use crate::{
    base::types::Res,
    interaction::event::PlatformEvent,
    service::events::{EventSource, GenericEventSource},
};

impl EventSource {
    /// Creates an event source that reads events from stdin.
    pub fn stdin() -> Self {
        Self::new(Arc::new(JsonLinesEventSource::new(BufReader::new(tokio::io::stdin()))))
    }
}

/// Event source over any buffered reader, one JSON event per line.
///
/// Blank lines are skipped.
pub struct JsonLinesEventSource<R = BufReader<Stdin>> {
    lines: Mutex<Lines<R>>,
}

impl<R> JsonLinesEventSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    pub fn new(reader: R) -> Self {
        Self { lines: Mutex::new(reader.lines()) }
    }
}

#[async_trait]
impl<R> GenericEventSource for JsonLinesEventSource<R>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    async fn next_event(&self) -> Res<Option<PlatformEvent>> {
        let mut lines = self.lines.lock().await;

        while let Some(line) = lines.next_line().await? {
            let line = line.trim();

            if line.is_empty() {
                continue;
            }

            let event = serde_json::from_str(line).map_err(|e| anyhow::anyhow!("Malformed event `{}`: {}", line, e))?;
            return Ok(Some(event));
        }

        Ok(None)
    }
}
