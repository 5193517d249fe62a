//! Platform events delivered to the router.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::base::types::Snapshot;

/// One event from the platform event source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlatformEvent {
    /// A message was deleted.
    MessageDelete(DeletedMessage),
    /// A user interacted with a component, command, or modal.
    Interaction(Interaction),
    /// The host asks caches to reclaim memory.
    CacheSweep,
}

/// A deleted message as reported by the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedMessage {
    pub id: String,
    pub author_id: String,
    pub channel_id: String,
    /// Absent for direct messages.
    #[serde(default)]
    pub guild_id: Option<String>,
    #[serde(default)]
    pub author_bot: bool,
    #[serde(default)]
    pub author_system: bool,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachment_count: u32,
    /// Author of the message this one replied to, if any.
    #[serde(default)]
    pub replied_to_user_id: Option<String>,
    #[serde(default)]
    pub edited: bool,
    pub created_at: DateTime<Utc>,
}

impl DeletedMessage {
    /// Whether there is anything worth keeping: text, attachments or an edit.
    pub fn has_payload(&self) -> bool {
        !self.content.is_empty() || self.attachment_count > 0 || self.edited
    }

    /// Whether the message came from a guild member rather than a bot, the system, or a direct message.
    pub fn from_guild_member(&self) -> bool {
        self.guild_id.is_some() && !self.author_bot && !self.author_system
    }

    pub fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            id: self.id.clone(),
            author_id: self.author_id.clone(),
            channel_id: self.channel_id.clone(),
            content: self.content.clone(),
            attachment_count: self.attachment_count,
            replied_to_user_id: self.replied_to_user_id.clone(),
            edited: self.edited,
            created_at: self.created_at,
            deleted: false,
        }
    }
}

/// The raw kind of an interaction, as the platform names it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InteractionKind {
    ContextMenu,
    SelectMenu,
    Button,
    AutoComplete,
    ModalSubmit,
    ChatInput,
    Ping,
}

/// How much of the interaction's source context the platform has already resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceContext {
    /// Guild and member data are materialized.
    Cached,
    /// Only raw guild data is known.
    Partial,
    /// Not from a guild.
    #[default]
    None,
}

/// A user interaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    pub id: String,
    pub kind: InteractionKind,
    pub user_id: String,
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Component custom id, for component and modal interactions.
    #[serde(default)]
    pub custom_id: Option<String>,
    /// Command name, for autocomplete and context menu interactions.
    #[serde(default)]
    pub command_name: Option<String>,
    #[serde(default)]
    pub context: SourceContext,
}

impl Interaction {
    /// The identifier registrations match against.
    pub fn match_key(&self) -> Option<&str> {
        match self.kind {
            InteractionKind::AutoComplete | InteractionKind::ContextMenu => self.command_name.as_deref(),
            _ => self.custom_id.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_events() {
        let event: PlatformEvent = serde_json::from_str(
            r#"{"type":"message_delete","id":"1","author_id":"U1","channel_id":"C1","guild_id":"G1","content":"hi","created_at":"2024-01-01T00:00:00Z"}"#,
        )
        .unwrap();

        let PlatformEvent::MessageDelete(message) = event else {
            panic!("expected a delete event");
        };
        assert!(message.has_payload());
        assert!(message.from_guild_member());
        assert_eq!(message.attachment_count, 0);

        let event: PlatformEvent = serde_json::from_str(r#"{"type":"interaction","id":"I1","kind":"button","user_id":"U1","custom_id":"snipe-message","context":"cached"}"#).unwrap();
        let PlatformEvent::Interaction(interaction) = event else {
            panic!("expected an interaction");
        };
        assert_eq!(interaction.match_key(), Some("snipe-message"));
        assert_eq!(interaction.context, SourceContext::Cached);

        let event: PlatformEvent = serde_json::from_str(r#"{"type":"cache_sweep"}"#).unwrap();
        assert_eq!(event, PlatformEvent::CacheSweep);
    }

    #[test]
    fn empty_unedited_message_has_no_payload() {
        let message = DeletedMessage {
            id: "1".to_string(),
            author_id: "U1".to_string(),
            channel_id: "C1".to_string(),
            guild_id: None,
            author_bot: false,
            author_system: false,
            content: String::new(),
            attachment_count: 0,
            replied_to_user_id: None,
            edited: false,
            created_at: Utc::now(),
        };

        assert!(!message.has_payload());
        assert!(!message.from_guild_member());
        assert!(DeletedMessage { edited: true, ..message.clone() }.has_payload());
        assert!(DeletedMessage { attachment_count: 1, ..message }.has_payload());
    }

    #[test]
    fn autocomplete_matches_on_command_name() {
        let interaction = Interaction {
            id: "I1".to_string(),
            kind: InteractionKind::AutoComplete,
            user_id: "U1".to_string(),
            channel_id: None,
            custom_id: Some("ignored".to_string()),
            command_name: Some("snipes".to_string()),
            context: SourceContext::None,
        };

        assert_eq!(interaction.match_key(), Some("snipes"));
    }
}
