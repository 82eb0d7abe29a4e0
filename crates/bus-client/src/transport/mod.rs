//! Transport and credential collaborator traits.
//!
//! The connection, frame-level protocol, credential refresh, and retry
//! execution all live outside this crate. This module defines the seams the
//! client core consumes: [`Transport`] establishes a physical connection,
//! [`BusConnection`] is the operation surface of an open connection, and
//! [`TokenCredential`] issues tokens on the transport's behalf.
//!
//! [`memory`] provides a complete in-memory transport for unit tests and
//! local development.

use crate::address::{EntityPath, ReceiveMode};
use crate::config::ConnectionConfig;
use crate::error::BusError;
use crate::message::{LockToken, Message, MessageId, ReceivedMessage, SessionId, Timestamp};
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;

pub mod memory;

pub use memory::InMemoryTransport;

/// Token issued by a credential
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Timestamp,
}

/// Opaque token-issuing collaborator invoked by the transport
#[async_trait]
pub trait TokenCredential: Send + Sync {
    /// Get a token for the given scopes
    async fn token(&self, scopes: &[&str]) -> Result<AccessToken, BusError>;
}

/// How a locked message is settled
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// Remove the message from the entity
    Complete,
    /// Release the lock and make the message available again
    Abandon,
    /// Move the message to the entity's dead-letter sub-queue
    DeadLetter { reason: Option<String> },
}

/// Result of a successful session acceptance
#[derive(Debug, Clone)]
pub struct SessionGrant {
    pub session_id: SessionId,
    pub locked_until: Timestamp,
}

/// Establishes physical connections on behalf of a connection context
#[async_trait]
pub trait Transport: Send + Sync {
    /// Open a connection to the configured host.
    ///
    /// Called at most once at a time per context; the context guarantees
    /// concurrent first uses converge on a single attempt.
    async fn connect(
        &self,
        config: &ConnectionConfig,
        credential: Option<Arc<dyn TokenCredential>>,
    ) -> Result<Arc<dyn BusConnection>, BusError>;
}

/// Operation surface of one open physical connection.
///
/// All senders and receivers derived from one client share a single
/// implementation of this trait through their connection context.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Send messages to an entity
    async fn send(
        &self,
        entity: &EntityPath,
        messages: Vec<Message>,
    ) -> Result<Vec<MessageId>, BusError>;

    /// Receive up to `max_messages` from an entity
    async fn receive(
        &self,
        entity: &EntityPath,
        mode: ReceiveMode,
        max_messages: u32,
        timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError>;

    /// Settle a peek-locked message
    async fn settle(
        &self,
        entity: &EntityPath,
        lock_token: &LockToken,
        disposition: Disposition,
    ) -> Result<(), BusError>;

    /// Acquire a session lock on an entity.
    ///
    /// With `session_id` present the named session is locked; otherwise the
    /// service assigns the next available session. May suspend until a
    /// session becomes available.
    async fn accept_session(
        &self,
        entity: &EntityPath,
        session_id: Option<SessionId>,
    ) -> Result<SessionGrant, BusError>;

    /// Receive up to `max_messages` belonging to a locked session
    async fn receive_from_session(
        &self,
        entity: &EntityPath,
        session_id: &SessionId,
        mode: ReceiveMode,
        max_messages: u32,
        timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError>;

    /// Extend a held session lock, returning the new expiry
    async fn renew_session_lock(
        &self,
        entity: &EntityPath,
        session_id: &SessionId,
    ) -> Result<Timestamp, BusError>;

    /// Release a held session lock
    async fn release_session(
        &self,
        entity: &EntityPath,
        session_id: &SessionId,
    ) -> Result<(), BusError>;

    /// Tear down the physical connection
    async fn close(&self) -> Result<(), BusError>;
}
