//! In-memory transport implementation for testing and development.
//!
//! This module provides a fully functional in-memory transport that:
//! - Stores per-entity FIFO queues, keyed by resolved entity path (so
//!   dead-letter sub-queues are ordinary entities at `base + suffix`)
//! - Implements peek-lock settlement with lock tokens
//! - Tracks session locks with expiry and next-available selection
//! - Counts connect attempts and supports connect failure injection
//!
//! This transport is intended for:
//! - Unit testing of bus-client consumers
//! - Development and prototyping
//! - Reference semantics for production transports

use crate::address::{EntityPath, ReceiveMode, DEAD_LETTER_SUFFIX};
use crate::config::ConnectionConfig;
use crate::error::BusError;
use crate::message::{LockToken, Message, MessageId, ReceivedMessage, SessionId, Timestamp};
use crate::transport::{BusConnection, Disposition, SessionGrant, TokenCredential, Transport};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::{Duration, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;
use tokio::sync::{Notify, RwLock};
use tokio::time::Instant;

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Application property recording why a message was dead-lettered
const DEAD_LETTER_REASON_PROPERTY: &str = "DeadLetterReason";

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Broker state shared by every connection opened from one transport
#[derive(Default)]
struct BusState {
    entities: RwLock<HashMap<String, EntityState>>,
    /// Pinged on every enqueue and session release; wakes blocked receives
    /// and pending next-available session acquisitions
    arrivals: Notify,
}

/// State of a single entity (queue, subscription, or sub-queue)
#[derive(Default)]
struct EntityState {
    /// Messages available for delivery, FIFO
    ready: VecDeque<StoredMessage>,
    /// Peek-locked messages awaiting settlement
    in_flight: HashMap<LockToken, StoredMessage>,
    /// Session locks held by receivers, with expiry
    locked_sessions: HashMap<SessionId, Timestamp>,
}

impl EntityState {
    fn session_locked(&self, id: &SessionId) -> bool {
        self.locked_sessions
            .get(id)
            .map(|until| *until > Timestamp::now())
            .unwrap_or(false)
    }

    /// Hand a stored message to a receiver under the given mode
    fn deliver(&mut self, mut stored: StoredMessage, mode: ReceiveMode) -> ReceivedMessage {
        stored.delivery_count += 1;
        let lock_token = match mode {
            ReceiveMode::PeekLock => {
                let token = LockToken::new();
                self.in_flight.insert(token.clone(), stored.clone());
                Some(token)
            }
            ReceiveMode::ReceiveAndDelete => None,
        };
        ReceivedMessage {
            message_id: stored.message_id,
            body: stored.body,
            application_properties: stored.application_properties,
            session_id: stored.session_id,
            correlation_id: stored.correlation_id,
            lock_token,
            delivery_count: stored.delivery_count,
            enqueued_at: stored.enqueued_at,
        }
    }
}

/// A message held by the broker
#[derive(Clone)]
struct StoredMessage {
    message_id: MessageId,
    body: Bytes,
    application_properties: HashMap<String, String>,
    session_id: Option<SessionId>,
    correlation_id: Option<String>,
    delivery_count: u32,
    enqueued_at: Timestamp,
}

impl StoredMessage {
    fn from_message(message: Message, message_id: MessageId) -> Self {
        Self {
            message_id,
            body: message.body,
            application_properties: message.application_properties,
            session_id: message.session_id,
            correlation_id: message.correlation_id,
            delivery_count: 0,
            enqueued_at: Timestamp::now(),
        }
    }
}

// ============================================================================
// InMemoryTransport
// ============================================================================

/// In-memory transport implementation
pub struct InMemoryTransport {
    bus: Arc<BusState>,
    connects: AtomicUsize,
    fail_next: AtomicUsize,
    session_wait: StdDuration,
    session_lock_duration: Duration,
}

impl InMemoryTransport {
    /// Create a new in-memory transport with default timings
    pub fn new() -> Self {
        Self {
            bus: Arc::new(BusState::default()),
            connects: AtomicUsize::new(0),
            fail_next: AtomicUsize::new(0),
            session_wait: StdDuration::from_secs(5),
            session_lock_duration: Duration::minutes(1),
        }
    }

    /// Set how long a next-available session acquisition waits before
    /// reporting that no session is available
    pub fn with_session_wait(mut self, wait: StdDuration) -> Self {
        self.session_wait = wait;
        self
    }

    /// Set the duration of granted session locks
    pub fn with_session_lock_duration(mut self, duration: Duration) -> Self {
        self.session_lock_duration = duration;
        self
    }

    /// Number of connect attempts made through this transport, failed
    /// attempts included
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Make the next connect attempt fail with a connection error
    pub fn fail_next_connect(&self) {
        self.fail_next.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn connect(
        &self,
        config: &ConnectionConfig,
        _credential: Option<Arc<dyn TokenCredential>>,
    ) -> Result<Arc<dyn BusConnection>, BusError> {
        self.connects.fetch_add(1, Ordering::SeqCst);

        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(BusError::Connection {
                message: format!("injected connect failure for host `{}`", config.host),
            });
        }

        Ok(Arc::new(InMemoryConnection {
            bus: Arc::clone(&self.bus),
            session_wait: self.session_wait,
            session_lock_duration: self.session_lock_duration,
            closed: AtomicBool::new(false),
        }))
    }
}

// ============================================================================
// InMemoryConnection
// ============================================================================

/// One open connection against the shared broker state
struct InMemoryConnection {
    bus: Arc<BusState>,
    session_wait: StdDuration,
    session_lock_duration: Duration,
    closed: AtomicBool,
}

impl InMemoryConnection {
    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Connection {
                message: "connection is closed".to_string(),
            });
        }
        Ok(())
    }

    fn lock_expiry(&self) -> Timestamp {
        Timestamp::from_datetime(Utc::now() + self.session_lock_duration)
    }

    /// Take up to `max` ready messages, optionally restricted to a session
    async fn pop_ready(
        &self,
        entity: &EntityPath,
        session: Option<&SessionId>,
        mode: ReceiveMode,
        max: u32,
    ) -> Vec<ReceivedMessage> {
        let mut entities = self.bus.entities.write().await;
        let state = entities.entry(entity.as_str().to_string()).or_default();
        let mut out = Vec::new();
        match session {
            None => {
                while out.len() < max as usize {
                    match state.ready.pop_front() {
                        Some(stored) => out.push(state.deliver(stored, mode)),
                        None => break,
                    }
                }
            }
            Some(sid) => {
                let mut index = 0;
                while index < state.ready.len() && out.len() < max as usize {
                    if state.ready[index].session_id.as_ref() == Some(sid) {
                        if let Some(stored) = state.ready.remove(index) {
                            out.push(state.deliver(stored, mode));
                        }
                    } else {
                        index += 1;
                    }
                }
            }
        }
        out
    }

    /// Receive with a bounded wait for arrivals
    async fn receive_inner(
        &self,
        entity: &EntityPath,
        session: Option<&SessionId>,
        mode: ReceiveMode,
        max_messages: u32,
        timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        self.ensure_open()?;
        if max_messages == 0 {
            return Ok(Vec::new());
        }

        let deadline = Instant::now() + timeout.to_std().unwrap_or_default();
        loop {
            // Register for arrival wakeups before inspecting the queue, so an
            // enqueue between the check and the wait is not lost.
            let notified = self.bus.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let batch = self.pop_ready(entity, session, mode, max_messages).await;
            if !batch.is_empty() {
                return Ok(batch);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(Vec::new());
            }
            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }

    async fn lock_named_session(
        &self,
        entity: &EntityPath,
        session_id: SessionId,
    ) -> Result<SessionGrant, BusError> {
        let mut entities = self.bus.entities.write().await;
        let state = entities.entry(entity.as_str().to_string()).or_default();
        if state.session_locked(&session_id) {
            return Err(BusError::SessionLocked {
                session_id: session_id.to_string(),
            });
        }
        let locked_until = self.lock_expiry();
        state
            .locked_sessions
            .insert(session_id.clone(), locked_until.clone());
        Ok(SessionGrant {
            session_id,
            locked_until,
        })
    }

    async fn lock_next_session(&self, entity: &EntityPath) -> Result<SessionGrant, BusError> {
        let deadline = Instant::now() + self.session_wait;
        loop {
            let notified = self.bus.arrivals.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut entities = self.bus.entities.write().await;
                let state = entities.entry(entity.as_str().to_string()).or_default();
                let next = state
                    .ready
                    .iter()
                    .filter_map(|m| m.session_id.clone())
                    .find(|sid| !state.session_locked(sid));
                if let Some(session_id) = next {
                    let locked_until = self.lock_expiry();
                    state
                        .locked_sessions
                        .insert(session_id.clone(), locked_until.clone());
                    return Ok(SessionGrant {
                        session_id,
                        locked_until,
                    });
                }
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(BusError::NoSessionAvailable {
                    entity_path: entity.to_string(),
                });
            }
            let _ = tokio::time::timeout(deadline - now, notified).await;
        }
    }
}

#[async_trait]
impl BusConnection for InMemoryConnection {
    async fn send(
        &self,
        entity: &EntityPath,
        messages: Vec<Message>,
    ) -> Result<Vec<MessageId>, BusError> {
        self.ensure_open()?;
        let mut ids = Vec::with_capacity(messages.len());
        {
            let mut entities = self.bus.entities.write().await;
            let state = entities.entry(entity.as_str().to_string()).or_default();
            for message in messages {
                let id = MessageId::new();
                state
                    .ready
                    .push_back(StoredMessage::from_message(message, id.clone()));
                ids.push(id);
            }
        }
        self.bus.arrivals.notify_waiters();
        Ok(ids)
    }

    async fn receive(
        &self,
        entity: &EntityPath,
        mode: ReceiveMode,
        max_messages: u32,
        timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        self.receive_inner(entity, None, mode, max_messages, timeout)
            .await
    }

    async fn settle(
        &self,
        entity: &EntityPath,
        lock_token: &LockToken,
        disposition: Disposition,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        let mut entities = self.bus.entities.write().await;
        let Some(state) = entities.get_mut(entity.as_str()) else {
            return Err(BusError::LockLost {
                token: lock_token.to_string(),
            });
        };
        let Some(mut stored) = state.in_flight.remove(lock_token) else {
            return Err(BusError::LockLost {
                token: lock_token.to_string(),
            });
        };

        match disposition {
            Disposition::Complete => {}
            Disposition::Abandon => {
                state.ready.push_back(stored);
                drop(entities);
                self.bus.arrivals.notify_waiters();
            }
            Disposition::DeadLetter { reason } => {
                if let Some(reason) = reason {
                    stored
                        .application_properties
                        .insert(DEAD_LETTER_REASON_PROPERTY.to_string(), reason);
                }
                let dead_letter_path = format!("{}{}", entity.as_str(), DEAD_LETTER_SUFFIX);
                entities
                    .entry(dead_letter_path)
                    .or_default()
                    .ready
                    .push_back(stored);
                drop(entities);
                self.bus.arrivals.notify_waiters();
            }
        }
        Ok(())
    }

    async fn accept_session(
        &self,
        entity: &EntityPath,
        session_id: Option<SessionId>,
    ) -> Result<SessionGrant, BusError> {
        self.ensure_open()?;
        match session_id {
            Some(id) => self.lock_named_session(entity, id).await,
            None => self.lock_next_session(entity).await,
        }
    }

    async fn receive_from_session(
        &self,
        entity: &EntityPath,
        session_id: &SessionId,
        mode: ReceiveMode,
        max_messages: u32,
        timeout: Duration,
    ) -> Result<Vec<ReceivedMessage>, BusError> {
        self.receive_inner(entity, Some(session_id), mode, max_messages, timeout)
            .await
    }

    async fn renew_session_lock(
        &self,
        entity: &EntityPath,
        session_id: &SessionId,
    ) -> Result<Timestamp, BusError> {
        self.ensure_open()?;
        let mut entities = self.bus.entities.write().await;
        let Some(state) = entities.get_mut(entity.as_str()) else {
            return Err(BusError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        };
        if !state.session_locked(session_id) {
            return Err(BusError::SessionNotFound {
                session_id: session_id.to_string(),
            });
        }
        let locked_until = self.lock_expiry();
        state
            .locked_sessions
            .insert(session_id.clone(), locked_until.clone());
        Ok(locked_until)
    }

    async fn release_session(
        &self,
        entity: &EntityPath,
        session_id: &SessionId,
    ) -> Result<(), BusError> {
        self.ensure_open()?;
        {
            let mut entities = self.bus.entities.write().await;
            if let Some(state) = entities.get_mut(entity.as_str()) {
                state.locked_sessions.remove(session_id);
            }
        }
        // A released session may satisfy a pending next-available acquisition
        self.bus.arrivals.notify_waiters();
        Ok(())
    }

    async fn close(&self) -> Result<(), BusError> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}
