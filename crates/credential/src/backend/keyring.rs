//! OS keyring backend (macOS Keychain, Windows Credential Manager,
//! Secret Service)

use super::{BackendOptions, Operation, SecretBackend};
use crate::core::{BackendError, StorageKey};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// [`SecretBackend`] over the platform keyring.
///
/// Keyring calls are blocking and run on Tokio's blocking pool. When the
/// platform store cannot be reached and the job allows an insecure fallback,
/// the call is retried against the configured fallback backend.
#[derive(Clone, Default)]
pub struct KeyringBackend {
    fallback: Option<Arc<dyn SecretBackend>>,
}

impl KeyringBackend {
    /// Keyring backend without fallback
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `fallback` when the platform keyring is unavailable
    pub fn with_fallback(mut self, fallback: Arc<dyn SecretBackend>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    async fn run<T, F>(key: &StorageKey, job: F) -> Result<T, BackendError>
    where
        T: Send + 'static,
        F: FnOnce(&keyring::Entry) -> keyring::Result<T> + Send + 'static,
    {
        let owned = key.clone();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(owned.service(), owned.key())
                .map_err(|e| map_error(&owned, e))?;
            job(&entry).map_err(|e| map_error(&owned, e))
        })
        .await
        .map_err(|e| BackendError::Other(format!("keyring task failed: {e}")))?
    }

    fn fallback_for(
        &self,
        operation: Operation,
        key: &StorageKey,
        error: &BackendError,
        options: BackendOptions,
    ) -> Option<&Arc<dyn SecretBackend>> {
        if !matches!(error, BackendError::Unavailable(_)) {
            return None;
        }
        if !options.allow_insecure_fallback {
            debug!(key = %key, %operation, "Keyring unavailable, insecure fallback not allowed");
            return None;
        }
        let fallback = self.fallback.as_ref()?;
        warn!(
            key = %key,
            %operation,
            fallback = fallback.backend_name(),
            "Keyring unavailable, using insecure fallback store"
        );
        Some(fallback)
    }
}

fn map_error(key: &StorageKey, error: keyring::Error) -> BackendError {
    match error {
        keyring::Error::NoEntry => BackendError::NotFound {
            key: key.to_string(),
        },
        keyring::Error::NoStorageAccess(e) => BackendError::Unavailable(e.to_string()),
        keyring::Error::PlatformFailure(e) => BackendError::Unavailable(e.to_string()),
        other => BackendError::Other(other.to_string()),
    }
}

#[async_trait]
impl SecretBackend for KeyringBackend {
    async fn read(
        &self,
        key: &StorageKey,
        options: BackendOptions,
    ) -> Result<String, BackendError> {
        match Self::run(key, keyring::Entry::get_password).await {
            Err(e) => match self.fallback_for(Operation::Read, key, &e, options) {
                Some(fallback) => fallback.read(key, options).await,
                None => Err(e),
            },
            ok => ok,
        }
    }

    async fn write(
        &self,
        key: &StorageKey,
        payload: &str,
        options: BackendOptions,
    ) -> Result<(), BackendError> {
        let text = payload.to_string();
        match Self::run(key, move |entry| entry.set_password(&text)).await {
            Err(e) => match self.fallback_for(Operation::Write, key, &e, options) {
                Some(fallback) => fallback.write(key, payload, options).await,
                None => Err(e),
            },
            ok => ok,
        }
    }

    async fn delete(
        &self,
        key: &StorageKey,
        options: BackendOptions,
    ) -> Result<(), BackendError> {
        match Self::run(key, keyring::Entry::delete_credential).await {
            Err(e) => match self.fallback_for(Operation::Delete, key, &e, options) {
                Some(fallback) => fallback.delete(key, options).await,
                None => Err(e),
            },
            ok => ok,
        }
    }

    fn backend_name(&self) -> &'static str {
        "keyring"
    }
}
