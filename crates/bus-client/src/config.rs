//! Connection configuration and connection-string parsing.

use crate::address::EntityPath;
use crate::error::ConfigurationError;
use chrono::Duration;
use serde::{Deserialize, Serialize};
use url::Url;

/// Configuration shared by every handle created from one client.
///
/// `entity_path`, when present, originates from a connection string and
/// constrains every entity address later requested on the same client.
/// Immutable after client construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Fully qualified namespace host, e.g. `my-bus.example.net`
    pub host: String,
    /// Entity path the client is bound to, if any
    pub entity_path: Option<EntityPath>,
}

impl ConnectionConfig {
    /// Create configuration for a namespace host with no entity constraint
    pub fn for_namespace(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            entity_path: None,
        }
    }

    /// Parse configuration from a connection string.
    ///
    /// The string is a `;`-separated list of `Key=Value` pairs. `Endpoint`
    /// is required and must be an `sb://` URL; `EntityPath` is optional.
    /// Other keys (shared access key material and the like) belong to the
    /// credential collaborator and are ignored here.
    pub fn from_connection_string(value: &str) -> Result<Self, ConfigurationError> {
        let mut host = None;
        let mut entity_path = None;

        for pair in value.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let Some((key, val)) = pair.split_once('=') else {
                return Err(ConfigurationError::InvalidConnectionString {
                    message: format!("expected `Key=Value`, got `{}`", pair),
                });
            };

            match key.trim() {
                "Endpoint" => {
                    let raw = val.trim();
                    let url = Url::parse(raw).map_err(|err| {
                        ConfigurationError::InvalidConnectionString {
                            message: format!("invalid endpoint `{}`: {}", raw, err),
                        }
                    })?;
                    if url.scheme() != "sb" {
                        return Err(ConfigurationError::InvalidConnectionString {
                            message: format!("unsupported endpoint scheme `{}`", url.scheme()),
                        });
                    }
                    let h = url.host_str().ok_or_else(|| {
                        ConfigurationError::InvalidConnectionString {
                            message: format!("endpoint `{}` has no host", raw),
                        }
                    })?;
                    host = Some(h.to_string());
                }
                "EntityPath" => {
                    let raw = val.trim();
                    let path = EntityPath::new(raw).map_err(|_| {
                        ConfigurationError::InvalidConnectionString {
                            message: "EntityPath must not be empty".to_string(),
                        }
                    })?;
                    entity_path = Some(path);
                }
                _ => {}
            }
        }

        let host = host.ok_or_else(|| ConfigurationError::Missing {
            key: "Endpoint".to_string(),
        })?;

        Ok(Self { host, entity_path })
    }
}

/// Retry behavior handed to the external retry-policy executor.
///
/// Only the timeout is interpreted by this crate; it bounds the
/// session-acquisition handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOptions {
    /// Upper bound for a single logical operation
    pub timeout: Duration,
}

impl Default for RetryOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::seconds(60),
        }
    }
}

impl RetryOptions {
    /// Validate eagerly at client construction; a non-positive timeout never
    /// reaches first use.
    pub(crate) fn validate(&self) -> Result<(), ConfigurationError> {
        if self.timeout <= Duration::zero() {
            return Err(ConfigurationError::InvalidRetryTimeout {
                value_ms: self.timeout.num_milliseconds(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
