//! Secret-store backends
//!
//! The manager talks to the platform secret store only through
//! [`SecretBackend`]. Every call is dispatched as its own task, so an
//! implementation may block its task (or hop to `spawn_blocking`) without
//! stalling callers of the manager.

mod memory;
#[cfg(feature = "keyring")]
mod keyring;

pub use memory::MemorySecretBackend;
#[cfg(feature = "keyring")]
pub use self::keyring::KeyringBackend;

use crate::core::{BackendError, StorageKey};
use async_trait::async_trait;

/// Kind of secret-store job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Fetch a stored secret
    Read,
    /// Store or replace a secret
    Write,
    /// Remove a secret
    Delete,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Delete => "delete",
        })
    }
}

/// Per-job options handed to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendOptions {
    /// Allow storing secrets in an unencrypted fallback when no secure store
    /// is reachable
    pub allow_insecure_fallback: bool,
}

impl BackendOptions {
    /// Platform default: the fallback is allowed on Unix-like systems other
    /// than Apple ones, where a Secret Service daemon may be missing.
    pub fn platform_default() -> Self {
        Self {
            allow_insecure_fallback: cfg!(all(unix, not(target_vendor = "apple"))),
        }
    }
}

impl Default for BackendOptions {
    fn default() -> Self {
        Self::platform_default()
    }
}

/// Asynchronous key/value secret store
#[async_trait]
pub trait SecretBackend: Send + Sync {
    /// Read the stored text for `key`
    async fn read(&self, key: &StorageKey, options: BackendOptions)
    -> Result<String, BackendError>;

    /// Store `payload` under `key`, replacing any previous value
    async fn write(
        &self,
        key: &StorageKey,
        payload: &str,
        options: BackendOptions,
    ) -> Result<(), BackendError>;

    /// Remove the value stored under `key`
    async fn delete(&self, key: &StorageKey, options: BackendOptions)
    -> Result<(), BackendError>;

    /// Backend name for logs
    fn backend_name(&self) -> &'static str;
}
