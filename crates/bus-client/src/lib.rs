//! # Bus Client
//!
//! Client-side access layer for a managed message-bus service. Lets a process
//! exchange messages with named queues, topics, and topic subscriptions over a
//! shared, lazily-established connection, with correct addressing of
//! sub-resources (dead-letter queues, sessions) and settlement semantics
//! (peek-lock vs. receive-and-delete).
//!
//! This library provides:
//! - A client facade that multiplexes many senders/receivers over one
//!   physical connection
//! - Canonical entity addressing for queues, topic subscriptions, and
//!   sub-queues
//! - Lock-based and delete-on-receive settlement
//! - A cancellable session-acquisition handshake for session-enabled entities
//! - Capability traits for the transport and credential collaborators, plus
//!   an in-memory transport for tests and local development
//!
//! ## Module Organization
//!
//! - [`error`] - Error types for all client operations
//! - [`config`] - Connection configuration and connection-string parsing
//! - [`address`] - Entity addressing and receive-mode/sub-queue resolution
//! - [`message`] - Message envelope and identifier types
//! - [`transport`] - Transport and credential collaborator traits
//! - [`connection`] - Shared lazily-connected context
//! - [`client`] - The client facade and handle factories

// Module declarations
pub mod address;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod message;
pub mod receiver;
pub mod sender;
pub mod session;
pub mod transport;

// Re-export commonly used types at crate root for convenience
pub use address::{EntityDescriptor, EntityPath, ReceiveMode, ResolvedAddress, SubQueue};
pub use client::{BusClient, BusClientOptions};
pub use config::{ConnectionConfig, RetryOptions};
pub use connection::{ConnectionContext, ConnectionStatus};
pub use error::{BusError, ConfigurationError};
pub use message::{LockToken, Message, MessageId, ReceivedMessage, SessionId, Timestamp};
pub use receiver::{Receiver, ReceiverOptions};
pub use sender::Sender;
pub use session::{SessionReceiver, SessionReceiverOptions};
pub use transport::{
    AccessToken, BusConnection, Disposition, InMemoryTransport, SessionGrant, TokenCredential,
    Transport,
};
