//! Session receiver: asynchronous acceptance and the locked-session surface.
//!
//! Unlike a plain receiver, a [`SessionReceiver`] only exists after the
//! session-acquisition handshake has completed against the shared
//! connection. Acquisition can suspend (waiting for a session to become
//! available), is raced against an optional cancellation token and the
//! client's retry timeout, and on failure produces no handle at all.

use crate::address::{EntityPath, ReceiveMode};
use crate::connection::ConnectionContext;
use crate::error::BusError;
use crate::message::{ReceivedMessage, SessionId, Timestamp};
use crate::receiver::settlement_token;
use crate::transport::{BusConnection, Disposition};
use chrono::{Duration, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration as StdDuration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{instrument, warn};

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;

/// Floor for the auto-renewal interval
const MIN_RENEW_INTERVAL: StdDuration = StdDuration::from_millis(10);

/// Options recognized by [`crate::BusClient::accept_session`].
///
/// Sessions cannot be combined with sub-queues, so there is no sub-queue
/// option on this surface.
#[derive(Debug, Clone, Default)]
pub struct SessionReceiverOptions {
    /// Settlement behavior; peek-lock when unspecified
    pub receive_mode: Option<ReceiveMode>,
    /// The session to lock; omission means "next available"
    pub session_id: Option<SessionId>,
    /// How long the acquired session lock is kept alive in the background;
    /// `None` disables auto-renewal
    pub max_auto_renew_lock_duration: Option<StdDuration>,
    /// Cancels a pending acquisition
    pub cancel: Option<CancellationToken>,
}

/// Receives messages from one locked session.
pub struct SessionReceiver {
    context: Arc<ConnectionContext>,
    entity_path: EntityPath,
    receive_mode: ReceiveMode,
    session_id: SessionId,
    locked_until: Arc<RwLock<Timestamp>>,
    renew_task: StdMutex<Option<JoinHandle<()>>>,
    closed: AtomicBool,
}

impl SessionReceiver {
    /// Perform the acquisition handshake and build the handle.
    ///
    /// The handshake is raced against the cancellation token (if any) and
    /// `timeout`; the first to complete wins and the other outcome is
    /// discarded. On any failure no handle is produced.
    #[instrument(skip(context, options), fields(entity = %entity_path))]
    pub(crate) async fn accept(
        context: Arc<ConnectionContext>,
        entity_path: EntityPath,
        receive_mode: ReceiveMode,
        options: SessionReceiverOptions,
        timeout: Duration,
    ) -> Result<Self, BusError> {
        let connection = context.ensure_connected().await?;

        let wait = timeout.to_std().unwrap_or_default();
        let acquire = tokio::time::timeout(
            wait,
            connection.accept_session(&entity_path, options.session_id.clone()),
        );

        let grant = match &options.cancel {
            Some(token) => {
                tokio::select! {
                    _ = token.cancelled() => Err(BusError::SessionAcquisitionCancelled),
                    outcome = acquire => match outcome {
                        Ok(result) => result,
                        Err(_) => Err(BusError::Timeout { duration: timeout }),
                    },
                }
            }
            None => match acquire.await {
                Ok(result) => result,
                Err(_) => Err(BusError::Timeout { duration: timeout }),
            },
        }?;

        let locked_until = Arc::new(RwLock::new(grant.locked_until.clone()));
        let renew_task = options.max_auto_renew_lock_duration.map(|budget| {
            tokio::spawn(renew_session_lock_loop(
                Arc::clone(&connection),
                entity_path.clone(),
                grant.session_id.clone(),
                Arc::clone(&locked_until),
                budget,
            ))
        });

        Ok(Self {
            context,
            entity_path,
            receive_mode,
            session_id: grant.session_id,
            locked_until,
            renew_task: StdMutex::new(renew_task),
            closed: AtomicBool::new(false),
        })
    }

    /// The session this receiver holds the lock for
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The entity this receiver is bound to
    pub fn entity_path(&self) -> &EntityPath {
        &self.entity_path
    }

    /// The settlement behavior of this receiver
    pub fn receive_mode(&self) -> ReceiveMode {
        self.receive_mode
    }

    /// When the held session lock expires
    pub async fn locked_until(&self) -> Timestamp {
        self.locked_until.read().await.clone()
    }

    /// Receive a single message from the session, waiting up to `timeout`
    pub async fn receive(&self, timeout: Duration) -> Result<Option<ReceivedMessage>, BusError> {
        Ok(self.receive_batch(1, timeout).await?.pop())
    }

    /// Receive up to `max_messages` from the session, waiting up to `timeout`
    pub async fn receive_batch(
        &self,
        max_messages: u32,
        timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        self.ensure_usable()?;
        let connection = self.context.ensure_connected().await?;
        connection
            .receive_from_session(
                &self.entity_path,
                &self.session_id,
                self.receive_mode,
                max_messages,
                timeout,
            )
            .await
    }

    /// Mark a peek-locked message as successfully processed
    pub async fn complete(&self, message: &ReceivedMessage) -> Result<(), BusError> {
        self.settle(message, Disposition::Complete).await
    }

    /// Release a peek-locked message back to the session
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

    /// Extend the held session lock, returning the new expiry
    pub async fn renew_lock(&self) -> Result<Timestamp, BusError> {
        self.ensure_usable()?;
        let connection = self.context.ensure_connected().await?;
        let until = connection
            .renew_session_lock(&self.entity_path, &self.session_id)
            .await?;
        *self.locked_until.write().await = until.clone();
        Ok(until)
    }

    /// Release the session lock and stop background renewal.
    ///
    /// Idempotent; once closed every other operation on this handle fails
    /// with a closed-resource error.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub async fn close(&self) -> Result<(), BusError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.abort_renew_task();

        // A closed context has already torn the lock down with the connection
        if self.context.is_closed().await {
            return Ok(());
        }
        let connection = self.context.ensure_connected().await?;
        connection
            .release_session(&self.entity_path, &self.session_id)
            .await
    }

    fn ensure_usable(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::ClientClosed);
        }
        Ok(())
    }

    fn abort_renew_task(&self) {
        if let Ok(mut guard) = self.renew_task.lock() {
            if let Some(task) = guard.take() {
                task.abort();
            }
        }
    }

    async fn settle(
        &self,
        message: &ReceivedMessage,
        disposition: Disposition,
    ) -> Result<(), BusError> {
        self.ensure_usable()?;
        let token = settlement_token(self.receive_mode, message)?;
        let connection = self.context.ensure_connected().await?;
        connection
            .settle(&self.entity_path, &token, disposition)
            .await
    }
}

impl Drop for SessionReceiver {
    fn drop(&mut self) {
        self.abort_renew_task();
    }
}

/// Keep the session lock alive until the budget is exhausted, the task is
/// aborted, or a renewal fails.
async fn renew_session_lock_loop(
    connection: Arc<dyn BusConnection>,
    entity_path: EntityPath,
    session_id: SessionId,
    locked_until: Arc<RwLock<Timestamp>>,
    budget: StdDuration,
) {
    let deadline = Instant::now() + budget;
    loop {
        // Renew at half the remaining lock interval
        let wait = {
            let until = locked_until.read().await.as_datetime();
            let remaining = (until - Utc::now()).to_std().unwrap_or_default();
            (remaining / 2).max(MIN_RENEW_INTERVAL)
        };
        if Instant::now() + wait >= deadline {
            break;
        }
        tokio::time::sleep(wait).await;

        match connection
            .renew_session_lock(&entity_path, &session_id)
            .await
        {
            Ok(until) => {
                *locked_until.write().await = until;
            }
            Err(err) => {
                warn!(session_id = %session_id, error = %err, "session lock auto-renewal failed");
                break;
            }
        }
    }
}
