//! Error types for bus client operations.

use chrono::Duration;
use thiserror::Error;

/// Comprehensive error type for all bus client operations
#[derive(Debug, Error)]
pub enum BusError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),

    #[error("Invalid argument `{argument}`: got `{value}`, expected {accepted}")]
    InvalidArgument {
        argument: String,
        value: String,
        accepted: String,
    },

    #[error("Entity path mismatch: client is bound to `{configured}` but `{requested}` was requested")]
    EntityMismatch {
        requested: String,
        configured: String,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Session acquisition was cancelled")]
    SessionAcquisitionCancelled,

    #[error("No session available on `{entity_path}`")]
    NoSessionAvailable { entity_path: String },

    #[error("Session `{session_id}` is locked by another receiver")]
    SessionLocked { session_id: String },

    #[error("Session `{session_id}` not found or lock expired")]
    SessionNotFound { session_id: String },

    #[error("Message lock `{token}` not found or expired")]
    LockLost { token: String },

    #[error("The client has been closed")]
    ClientClosed,

    #[error("Service error: {message}")]
    Service { message: String },
}

impl BusError {
    /// Check if error is transient and should be retried
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Configuration(_) => false,
            Self::InvalidArgument { .. } => false,
            Self::EntityMismatch { .. } => false,
            Self::Connection { .. } => true,
            Self::Timeout { .. } => true,
            Self::SessionAcquisitionCancelled => false,
            Self::NoSessionAvailable { .. } => true,
            Self::SessionLocked { .. } => true,
            Self::SessionNotFound { .. } => false,
            Self::LockLost { .. } => false,
            Self::ClientClosed => false,
            Self::Service { .. } => true, // Service-level rejections are usually transient
        }
    }

    /// Check if error should be retried
    pub fn should_retry(&self) -> bool {
        self.is_transient()
    }

    /// Get suggested retry delay
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Connection { .. } => Some(Duration::seconds(5)),
            Self::SessionLocked { .. } => Some(Duration::seconds(5)),
            Self::Timeout { .. } => Some(Duration::seconds(1)),
            Self::NoSessionAvailable { .. } => Some(Duration::seconds(1)),
            _ => None,
        }
    }

    /// Build an invalid-argument error naming the offending value and the accepted set
    pub(crate) fn invalid_argument(
        argument: impl Into<String>,
        value: impl Into<String>,
        accepted: impl Into<String>,
    ) -> Self {
        Self::InvalidArgument {
            argument: argument.into(),
            value: value.into(),
            accepted: accepted.into(),
        }
    }
}

/// Configuration errors raised at client construction time
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid retry timeout: {value_ms}ms (must be a positive duration)")]
    InvalidRetryTimeout { value_ms: i64 },

    #[error("Invalid connection string: {message}")]
    InvalidConnectionString { message: String },

    #[error("Missing required configuration: {key}")]
    Missing { key: String },
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
