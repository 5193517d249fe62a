pub mod json_lines;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::{
    base::types::{SnipeReply, Void},
    interaction::event::Interaction,
};

// Traits.

/// Generic "chat" trait that response surfaces must implement.
///
/// The core only hands over data and an outcome kind; rendering it for users
/// is up to the implementation.
#[async_trait]
pub trait GenericChatClient: Send + Sync + 'static {
    /// Reply to an interaction with the outcome of a request.
    async fn reply(&self, interaction: &Interaction, reply: &SnipeReply) -> Void;
}

// Structs.

/// Chat client for the application.
///
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct ChatClient {
    inner: Arc<dyn GenericChatClient>,
}

impl Deref for ChatClient {
    type Target = dyn GenericChatClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl ChatClient {
    pub fn new(inner: Arc<dyn GenericChatClient>) -> Self {
        Self { inner }
    }
}
