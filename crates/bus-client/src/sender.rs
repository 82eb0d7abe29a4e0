//! Sender handle bound to one entity path.

use crate::address::EntityPath;
use crate::connection::ConnectionContext;
use crate::error::BusError;
use crate::message::{Message, MessageId};
use std::sync::Arc;
use tracing::instrument;

#[cfg(test)]
#[path = "sender_tests.rs"]
mod tests;

/// Sends messages to one queue or topic.
///
/// A sender is a view over the client's shared [`ConnectionContext`]; it owns
/// no connection state and defers connection use until the first send.
pub struct Sender {
    context: Arc<ConnectionContext>,
    entity_path: EntityPath,
}

impl Sender {
    pub(crate) fn new(context: Arc<ConnectionContext>, entity_path: EntityPath) -> Self {
        Self {
            context,
            entity_path,
        }
    }

    /// The entity this sender is bound to
    pub fn entity_path(&self) -> &EntityPath {
        &self.entity_path
    }

    /// Send a single message
    #[instrument(skip(self, message), fields(entity = %self.entity_path))]
    pub async fn send(&self, message: Message) -> Result<MessageId, BusError> {
        let connection = self.context.ensure_connected().await?;
        let mut ids = connection.send(&self.entity_path, vec![message]).await?;
        ids.pop().ok_or_else(|| BusError::Service {
            message: "transport accepted the send but returned no message id".to_string(),
        })
    }

    /// Send several messages in one call
    pub async fn send_batch(&self, messages: Vec<Message>) -> Result<Vec<MessageId>, BusError> {
        if messages.is_empty() {
            return Ok(Vec::new());
        }
        let connection = self.context.ensure_connected().await?;
        connection.send(&self.entity_path, messages).await
    }
}
