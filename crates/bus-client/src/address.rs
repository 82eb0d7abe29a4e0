//! Entity addressing: canonical paths, receive modes, and sub-queues.
//!
//! The resolver in this module is pure and synchronous. Every call shape the
//! client facade accepts funnels through [`resolve`], which canonicalizes the
//! entity address, validates it against the connection configuration, and
//! applies the sub-queue suffix. A caller that supplies an invalid option or
//! a mismatched entity path fails here, before any connection activity.

use crate::config::ConnectionConfig;
use crate::error::BusError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "address_tests.rs"]
mod tests;

/// Path suffix addressing an entity's dead-letter sub-queue
pub const DEAD_LETTER_SUFFIX: &str = "/$DeadLetterQueue";

/// Path suffix addressing an entity's transfer dead-letter sub-queue
pub const TRANSFER_DEAD_LETTER_SUFFIX: &str = "/$Transfer/$DeadLetterQueue";

/// Canonical string address of a queue, topic subscription, or sub-queue
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityPath(String);

impl EntityPath {
    /// Create an entity path from an already-canonical string
    pub fn new(path: impl Into<String>) -> Result<Self, BusError> {
        let path = path.into();
        if path.is_empty() {
            return Err(BusError::invalid_argument(
                "entity",
                path,
                "a non-empty entity path",
            ));
        }
        Ok(Self(path))
    }

    /// Get the path as a string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Append a sub-queue suffix to this path
    pub fn with_sub_queue(&self, sub_queue: SubQueue) -> EntityPath {
        EntityPath(format!("{}{}", self.0, sub_queue.suffix()))
    }
}

impl fmt::Display for EntityPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityPath {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// The two addressing shapes accepted by the client facade.
///
/// Disambiguation between "queue name" and "topic plus subscription" happens
/// in this one type rather than at each call site: the facade's factory
/// methods take `impl Into<EntityDescriptor>`, so both
/// `client.create_receiver("orders", ..)` and
/// `client.create_receiver(("orders", "archivers"), ..)` resolve through the
/// same path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityDescriptor {
    /// A queue (or, for senders, a topic) addressed by name
    Queue(String),
    /// A subscription on a topic
    Subscription {
        topic: String,
        subscription: String,
    },
}

impl EntityDescriptor {
    /// Canonicalize into the base entity path, before any sub-queue suffix.
    ///
    /// A topic/subscription pair always resolves to
    /// `{topic}/Subscriptions/{subscription}`, case-sensitive, no trimming.
    pub fn base_path(&self) -> Result<EntityPath, BusError> {
        match self {
            Self::Queue(name) => EntityPath::new(name.clone()),
            Self::Subscription {
                topic,
                subscription,
            } => {
                if topic.is_empty() {
                    return Err(BusError::invalid_argument(
                        "topic",
                        topic.clone(),
                        "a non-empty topic name",
                    ));
                }
                if subscription.is_empty() {
                    return Err(BusError::invalid_argument(
                        "subscription",
                        subscription.clone(),
                        "a non-empty subscription name",
                    ));
                }
                EntityPath::new(format!("{}/Subscriptions/{}", topic, subscription))
            }
        }
    }
}

impl From<&str> for EntityDescriptor {
    fn from(name: &str) -> Self {
        Self::Queue(name.to_string())
    }
}

impl From<String> for EntityDescriptor {
    fn from(name: String) -> Self {
        Self::Queue(name)
    }
}

impl From<(&str, &str)> for EntityDescriptor {
    fn from((topic, subscription): (&str, &str)) -> Self {
        Self::Subscription {
            topic: topic.to_string(),
            subscription: subscription.to_string(),
        }
    }
}

impl From<(String, String)> for EntityDescriptor {
    fn from((topic, subscription): (String, String)) -> Self {
        Self::Subscription {
            topic,
            subscription,
        }
    }
}

/// How received messages are settled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReceiveMode {
    /// Messages are leased to the receiver and must be explicitly settled
    #[default]
    PeekLock,
    /// Messages are removed from the entity as soon as they are delivered
    ReceiveAndDelete,
}

impl fmt::Display for ReceiveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PeekLock => write!(f, "peekLock"),
            Self::ReceiveAndDelete => write!(f, "receiveAndDelete"),
        }
    }
}

impl FromStr for ReceiveMode {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "peekLock" => Ok(Self::PeekLock),
            "receiveAndDelete" => Ok(Self::ReceiveAndDelete),
            other => Err(BusError::invalid_argument(
                "receive_mode",
                other,
                r#"`peekLock` or `receiveAndDelete`"#,
            )),
        }
    }
}

/// Service-managed secondary queue associated with a primary entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubQueue {
    /// Holds messages that could not be processed
    DeadLetter,
    /// Holds messages that failed to be forwarded to their destination
    TransferDeadLetter,
}

impl SubQueue {
    /// The literal path suffix for this sub-queue
    pub fn suffix(&self) -> &'static str {
        match self {
            Self::DeadLetter => DEAD_LETTER_SUFFIX,
            Self::TransferDeadLetter => TRANSFER_DEAD_LETTER_SUFFIX,
        }
    }
}

impl fmt::Display for SubQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeadLetter => write!(f, "deadLetter"),
            Self::TransferDeadLetter => write!(f, "transferDeadLetter"),
        }
    }
}

impl FromStr for SubQueue {
    type Err = BusError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deadLetter" => Ok(Self::DeadLetter),
            "transferDeadLetter" => Ok(Self::TransferDeadLetter),
            other => Err(BusError::invalid_argument(
                "sub_queue",
                other,
                r#"`deadLetter` or `transferDeadLetter`"#,
            )),
        }
    }
}

/// Output of address resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedAddress {
    /// Full entity path, sub-queue suffix included
    pub entity_path: EntityPath,
    /// Effective receive mode after defaulting
    pub receive_mode: ReceiveMode,
}

/// Resolve caller arguments into a canonical address.
///
/// The entity constraint embedded in the connection configuration is checked
/// against the base path, before the sub-queue suffix is applied, so a caller
/// never receives a handle it cannot use.
pub fn resolve(
    entity: &EntityDescriptor,
    receive_mode: Option<ReceiveMode>,
    sub_queue: Option<SubQueue>,
    config: &ConnectionConfig,
) -> Result<ResolvedAddress, BusError> {
    let base = entity.base_path()?;

    if let Some(bound) = &config.entity_path {
        if bound != &base {
            return Err(BusError::EntityMismatch {
                requested: base.to_string(),
                configured: bound.to_string(),
            });
        }
    }

    let receive_mode = receive_mode.unwrap_or_default();
    let entity_path = match sub_queue {
        Some(sq) => base.with_sub_queue(sq),
        None => base,
    };

    Ok(ResolvedAddress {
        entity_path,
        receive_mode,
    })
}
