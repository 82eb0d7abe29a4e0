//! Receiver handle bound to one entity path and receive mode.

use crate::address::{EntityPath, ReceiveMode, SubQueue};
use crate::connection::ConnectionContext;
use crate::error::BusError;
use crate::message::{LockToken, ReceivedMessage};
use crate::transport::Disposition;
use chrono::Duration;
use std::sync::Arc;
use tracing::instrument;

#[cfg(test)]
#[path = "receiver_tests.rs"]
mod tests;

/// Options recognized by [`crate::BusClient::create_receiver`]
#[derive(Debug, Clone, Default)]
pub struct ReceiverOptions {
    /// Settlement behavior; peek-lock when unspecified
    pub receive_mode: Option<ReceiveMode>,
    /// Address the entity's dead-letter or transfer dead-letter sub-queue
    pub sub_queue: Option<SubQueue>,
}

/// Receives messages from one queue, subscription, or sub-queue.
///
/// A receiver is a view over the client's shared [`ConnectionContext`]; its
/// entity path already carries the sub-queue suffix, and no connection is
/// opened until the first receive.
pub struct Receiver {
    context: Arc<ConnectionContext>,
    entity_path: EntityPath,
    receive_mode: ReceiveMode,
}

impl Receiver {
    pub(crate) fn new(
        context: Arc<ConnectionContext>,
        entity_path: EntityPath,
        receive_mode: ReceiveMode,
    ) -> Self {
        Self {
            context,
            entity_path,
            receive_mode,
        }
    }

    /// The fully resolved entity path, sub-queue suffix included
    pub fn entity_path(&self) -> &EntityPath {
        &self.entity_path
    }

    /// The settlement behavior of this receiver
    pub fn receive_mode(&self) -> ReceiveMode {
        self.receive_mode
    }

    /// Receive a single message, waiting up to `timeout`
    #[instrument(skip(self), fields(entity = %self.entity_path))]
    pub async fn receive(&self, timeout: Duration) -> Result<Option<ReceivedMessage>, BusError> {
        Ok(self.receive_batch(1, timeout).await?.pop())
    }

    /// Receive up to `max_messages`, waiting up to `timeout`
    pub async fn receive_batch(
        &self,
        max_messages: u32,
        timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        let connection = self.context.ensure_connected().await?;
        connection
            .receive(&self.entity_path, self.receive_mode, max_messages, timeout)
            .await
    }

    /// Mark a peek-locked message as successfully processed
    pub async fn complete(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        self.settle(message, Disposition::Complete).await
    }

    /// Release a peek-locked message back to the entity
    pub async fn abandon(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        self.settle(message, Disposition::Abandon).await
    }

    /// Move a peek-locked message to the entity's dead-letter sub-queue
    pub async fn dead_letter(
        &self,
        message: &ReceivedMessage,
        reason: Option<String>,
    ) -> Result<(), BusError> {
        self.settle(message, Disposition::DeadLetter { reason }).await
    }

    async fn settle(
        &self,
        message: &ReceivedMessage,
        disposition: Disposition,
    ) -> Result<(), BusError> {
        let token = settlement_token(self.receive_mode, message)?;
        let connection = self.context.ensure_connected().await?;
        connection
            .settle(&self.entity_path, &token, disposition)
            .await
    }
}

/// Extract the lock token required for settlement.
///
/// Delete-on-receive deliveries carry no lock; settling them is an
/// invalid-argument error rather than a network call.
pub(crate) fn settlement_token(
    receive_mode: ReceiveMode,
    message: &ReceivedMessage,
) -> Result<LockToken, BusError> {
    if receive_mode == ReceiveMode::ReceiveAndDelete {
        return Err(BusError::invalid_argument(
            "receive_mode",
            ReceiveMode::ReceiveAndDelete.to_string(),
            format!("`{}` for settlement", ReceiveMode::PeekLock),
        ));
    }
    message
        .lock_token
        .clone()
        .ok_or_else(|| BusError::LockLost {
            token: message.message_id.to_string(),
        })
}
