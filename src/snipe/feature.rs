//! Wires the snapshot manager into the router.

use std::sync::Arc;

use tracing::Instrument;

use crate::{
    interaction::{
        event::{DeletedMessage, Interaction},
        router::{Feature, InteractionEventType, Registration, RouterBuilder},
    },
    prelude::*,
    service::chat::ChatClient,
    snipe::manager::SnipeManager,
};

/// Custom id of the button that asks for the latest snapshot in a channel.
pub const SNIPE_BUTTON_ID: &str = "snipe-message";

/// The snipe feature: captures deleted messages and serves them back on request.
#[derive(Clone)]
pub struct SnipeFeature {
    manager: SnipeManager,
    chat: ChatClient,
}

impl SnipeFeature {
    pub fn new(manager: SnipeManager, chat: ChatClient) -> Self {
        Self { manager, chat }
    }
}

impl Feature for SnipeFeature {
    fn register(&self, router: &mut RouterBuilder) {
        let feature = self.clone();
        router.register(
            Registration::new("snipe-button", InteractionEventType::Button, SNIPE_BUTTON_ID, move |interaction| {
                let feature = feature.clone();
                async move { feature.handle_snipe_request(interaction).in_current_span().await }
            })
            .cached(true),
        );

        let feature = self.clone();
        router.on_message_delete("snipe-capture", move |message| {
            let feature = feature.clone();
            async move { feature.handle_message_delete(message).in_current_span().await }
        });

        let feature = self.clone();
        router.on_cache_sweep("snipe-sweep", move |_| {
            let feature = feature.clone();
            async move {
                let evicted = feature.manager.sweep();
                info!("Swept {} consumed snapshot(s) from the cache.", evicted);
                Ok(())
            }
        });
    }
}

impl SnipeFeature {
    /// Captures a deleted message; a user who disabled capture is not an error.
    #[instrument(skip_all, fields(id = %message.id))]
    async fn handle_message_delete(&self, message: Arc<DeletedMessage>) -> Void {
        match self.manager.capture_message(&message).await {
            Ok(Some(snapshot)) => debug!("Captured `{}`.", snapshot.id),
            Ok(None) => debug!("Message `{}` is not captured.", message.id),
            Err(SnipeError::SettingsDenied { user_id }) => debug!("Capture disabled by `{}`.", user_id),
            Err(err) => return Err(err.into()),
        }

        Ok(())
    }

    /// Consumes the latest snapshot in the interaction's channel and replies with it.
    #[instrument(skip_all, fields(interaction = %interaction.id))]
    async fn handle_snipe_request(&self, interaction: Arc<Interaction>) -> Void {
        let Some(channel_id) = interaction.channel_id.clone() else {
            warn!("Ignoring snipe request without a channel.");
            return Ok(());
        };

        let requested_by = interaction.user_id.clone();

        let (reply, failure) = match self.manager.snipe(&channel_id, &requested_by).await {
            Ok(snapshot) => (SnipeReply::Snapshot { requested_by, snapshot }, None),
            Err(SnipeError::NotFound) => (SnipeReply::NothingFound { requested_by, channel_id }, None),
            Err(SnipeError::SettingsDenied { .. }) => (SnipeReply::Disabled { requested_by }, None),
            Err(err) => (
                SnipeReply::Failed {
                    requested_by,
                    message: err.to_string(),
                },
                Some(err),
            ),
        };

        self.chat.reply(&interaction, &reply).await?;

        match failure {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }
}
