//! Writes replies as newline-delimited JSON.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::{
    io::{AsyncWrite, AsyncWriteExt, Stdout},
    sync::Mutex,
};
use tracing::instrument;

use crate::{
    base::types::{SnipeReply, Void},
    interaction::event::Interaction,
    service::chat::{ChatClient, GenericChatClient},
};

impl ChatClient {
    /// Creates a chat client that prints replies to stdout.
    pub fn stdout() -> Self {
        Self::new(Arc::new(JsonLinesChatClient::new(tokio::io::stdout())))
    }
}

/// One reply line.
#[derive(Serialize)]
struct ReplyLine<'a> {
    interaction_id: &'a str,
    channel_id: Option<&'a str>,
    reply: &'a SnipeReply,
}

/// Chat client that serializes each reply onto its own line of a writer.
pub struct JsonLinesChatClient<W = Stdout> {
    writer: Mutex<W>,
}

impl<W> JsonLinesChatClient<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(writer: W) -> Self {
        Self { writer: Mutex::new(writer) }
    }
}

#[async_trait]
impl<W> GenericChatClient for JsonLinesChatClient<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    #[instrument(skip_all, fields(interaction = %interaction.id))]
    async fn reply(&self, interaction: &Interaction, reply: &SnipeReply) -> Void {
        let line = ReplyLine {
            interaction_id: &interaction.id,
            channel_id: interaction.channel_id.as_deref(),
            reply,
        };

        let mut bytes = serde_json::to_vec(&line)?;
        bytes.push(b'\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await?;

        Ok(())
    }
}
