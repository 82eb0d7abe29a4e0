//! The client facade: construction, handle factories, and shutdown.

use crate::address::{self, EntityDescriptor};
use crate::config::{ConnectionConfig, RetryOptions};
use crate::connection::ConnectionContext;
use crate::error::BusError;
use crate::receiver::{Receiver, ReceiverOptions};
use crate::sender::Sender;
use crate::session::{SessionReceiver, SessionReceiverOptions};
use crate::transport::{TokenCredential, Transport};
use std::sync::Arc;

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

/// Options recognized at client construction
#[derive(Debug, Clone, Default)]
pub struct BusClientOptions {
    /// Retry behavior; the timeout must be strictly positive
    pub retry_options: RetryOptions,
}

/// Entry point for all bus operations.
///
/// A client owns exactly one [`ConnectionContext`] and is the sole creator
/// of senders, receivers, and session receivers; all of them share that
/// context. Construction never touches the network — the connection is
/// established lazily on first use of any handle.
///
/// # Example
///
/// ```no_run
/// use bus_client::{BusClient, BusClientOptions, InMemoryTransport, Message};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), bus_client::BusError> {
/// let transport = Arc::new(InMemoryTransport::new());
/// let client = BusClient::with_connection_string(
///     "Endpoint=sb://my-bus.example.net/;SharedAccessKeyName=key;SharedAccessKey=secret",
///     transport,
///     BusClientOptions::default(),
/// )?;
///
/// let sender = client.create_sender("orders")?;
/// sender.send(Message::new("hello")).await?;
/// client.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct BusClient {
    context: Arc<ConnectionContext>,
    options: BusClientOptions,
}

impl BusClient {
    /// Create a client from a connection string.
    ///
    /// An `EntityPath` embedded in the string constrains every entity
    /// address later requested on this client. Options are validated
    /// eagerly; an invalid retry timeout fails here, before any context is
    /// created.
    pub fn with_connection_string(
        connection_string: &str,
        transport: Arc<dyn Transport>,
        options: BusClientOptions,
    ) -> Result<Self, BusError> {
        options.retry_options.validate()?;
        let config = ConnectionConfig::from_connection_string(connection_string)?;
        Ok(Self {
            context: Arc::new(ConnectionContext::new(config, transport, None)),
            options,
        })
    }

    /// Create a client for a namespace with a token credential.
    ///
    /// The credential is an opaque collaborator handed to the transport; it
    /// is never invoked by the client itself.
    pub fn with_credential(
        fully_qualified_namespace: impl Into<String>,
        credential: Arc<dyn TokenCredential>,
        transport: Arc<dyn Transport>,
        options: BusClientOptions,
    ) -> Result<Self, BusError> {
        options.retry_options.validate()?;
        let config = ConnectionConfig::for_namespace(fully_qualified_namespace);
        Ok(Self {
            context: Arc::new(ConnectionContext::new(config, transport, Some(credential))),
            options,
        })
    }

    /// The namespace host this client is connected to
    pub fn fully_qualified_namespace(&self) -> &str {
        &self.context.config().host
    }

    /// The retry options this client was constructed with
    pub fn retry_options(&self) -> &RetryOptions {
        &self.options.retry_options
    }

    /// Create a sender for a queue or topic.
    ///
    /// No network side effect; the entity path is validated against the
    /// connection configuration before the handle is constructed.
    pub fn create_sender(
        &self,
        queue_or_topic: impl Into<EntityDescriptor>,
    ) -> Result<Sender, BusError> {
        let resolved = address::resolve(&queue_or_topic.into(), None, None, self.context.config())?;
        Ok(Sender::new(Arc::clone(&self.context), resolved.entity_path))
    }

    /// Create a receiver for a queue or a topic subscription.
    ///
    /// Accepts either a queue name or a `(topic, subscription)` pair. All
    /// validation — receive mode, sub-queue, entity constraint — happens
    /// here, synchronously, before the handle exists.
    pub fn create_receiver(
        &self,
        entity: impl Into<EntityDescriptor>,
        options: ReceiverOptions,
    ) -> Result<Receiver, BusError> {
        let resolved = address::resolve(
            &entity.into(),
            options.receive_mode,
            options.sub_queue,
            self.context.config(),
        )?;
        Ok(Receiver::new(
            Arc::clone(&self.context),
            resolved.entity_path,
            resolved.receive_mode,
        ))
    }

    /// Acquire a session lock and create a receiver for that session.
    ///
    /// The same entity shapes as [`Self::create_receiver`] apply. This is
    /// the one construction path that can suspend on network and service
    /// state; it supports cancellation through
    /// [`SessionReceiverOptions::cancel`] and is bounded by the client's
    /// retry timeout. On failure no handle is produced.
    pub async fn accept_session(
        &self,
        entity: impl Into<EntityDescriptor>,
        options: SessionReceiverOptions,
    ) -> Result<SessionReceiver, BusError> {
        let resolved = address::resolve(
            &entity.into(),
            options.receive_mode,
            None,
            self.context.config(),
        )?;
        SessionReceiver::accept(
            Arc::clone(&self.context),
            resolved.entity_path,
            resolved.receive_mode,
            options,
            self.options.retry_options.timeout,
        )
        .await
    }

    /// Close the shared connection; terminal and idempotent.
    ///
    /// Returns once the connection is fully released. Every handle created
    /// from this client fails with a closed-resource error afterwards.
    pub async fn close(&self) -> Result<(), BusError> {
        self.context.close().await
    }
}
