//! Error types for credential caching
//!
//! - [`BackendError`]: a secret-store job failed
//! - [`CodecError`]: a bundle could not be encoded or decoded
//! - [`ConfigError`]: configuration could not be loaded
//! - [`ManagerError`]: the manager could not be constructed
//!
//! Backend and codec errors never escape the manager's public operations;
//! they are logged where they occur and reported on the event bus.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by a [`SecretBackend`](crate::backend::SecretBackend) job
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// No secret stored under the key
    #[error("No entry for '{key}'")]
    NotFound {
        /// `service/key` that was looked up
        key: String,
    },

    /// The store refused access (locked keychain, user denied prompt)
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// No usable secure store on this platform
    #[error("Secret store unavailable: {0}")]
    Unavailable(String),

    /// The job did not complete in time
    #[error("Operation timed out after {duration:?}")]
    Timeout {
        /// Limit that was exceeded
        duration: Duration,
    },

    /// Any other backend failure
    #[error("Backend failure: {0}")]
    Other(String),
}

impl BackendError {
    /// Stable error code for logs and events
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AccessDenied(_) => "ACCESS_DENIED",
            Self::Unavailable(_) => "UNAVAILABLE",
            Self::Timeout { .. } => "TIMEOUT",
            Self::Other(_) => "OTHER",
        }
    }
}

/// Bundle encoding/decoding failure
#[derive(Debug, Error)]
pub enum CodecError {
    /// Payload is not valid JSON, or a value could not be serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload parsed but is not a key/value object
    #[error("Payload is not a key/value object")]
    NotAnObject,
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// An environment variable holds an unparsable value
    #[error("Invalid value for {var}: {reason}")]
    InvalidEnv {
        /// Variable name
        var: &'static str,
        /// Parser message
        reason: String,
    },
}

/// Credential manager construction errors
#[derive(Debug, Error)]
pub enum ManagerError {
    /// `build()` was called outside a Tokio runtime and no handle was given
    #[error("No Tokio runtime available to dispatch secret-store jobs")]
    NoRuntime,

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Result alias for manager construction
pub type ManagerResult<T> = Result<T, ManagerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_error_codes_are_stable() {
        let err = BackendError::NotFound {
            key: "email/user".to_string(),
        };
        assert_eq!(err.code(), "NOT_FOUND");
        assert!(err.to_string().contains("email/user"));
        assert_eq!(
            BackendError::Timeout {
                duration: Duration::from_secs(1)
            }
            .code(),
            "TIMEOUT"
        );
    }
}
