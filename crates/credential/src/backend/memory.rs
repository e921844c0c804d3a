//! In-memory secret backend for development and tests
//!
//! Besides storing secrets in a map, it can inject failures per operation
//! (optionally per key), delay reads, and report how often each operation
//! was called and which payloads were written.

use super::{BackendOptions, Operation, SecretBackend};
use crate::core::{BackendError, StorageKey};
use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

#[derive(Debug, Clone)]
struct InjectedFailure {
    operation: Operation,
    key: Option<StorageKey>,
    error: BackendError,
}

/// In-memory [`SecretBackend`]
#[derive(Debug, Default)]
pub struct MemorySecretBackend {
    entries: RwLock<HashMap<StorageKey, String>>,
    failures: RwLock<Vec<InjectedFailure>>,
    read_latency: Option<Duration>,
    reads: AtomicU64,
    writes: AtomicU64,
    deletes: AtomicU64,
    written: Mutex<Vec<(StorageKey, String)>>,
    last_options: Mutex<Option<BackendOptions>>,
}

impl MemorySecretBackend {
    /// Create an empty backend
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every read by `latency`.
    ///
    /// The stored value is captured when the read starts, so a write landing
    /// during the delay is not observed by that read.
    pub fn with_read_latency(mut self, latency: Duration) -> Self {
        self.read_latency = Some(latency);
        self
    }

    /// Seed a stored secret without going through a write job
    pub fn insert(&self, key: StorageKey, payload: impl Into<String>) {
        self.entries.write().insert(key, payload.into());
    }

    /// Currently stored text for `key`
    pub fn get(&self, key: &StorageKey) -> Option<String> {
        self.entries.read().get(key).cloned()
    }

    /// Number of stored secrets
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Make every `operation` fail with `error`
    pub fn fail(&self, operation: Operation, error: BackendError) {
        self.failures.write().push(InjectedFailure {
            operation,
            key: None,
            error,
        });
    }

    /// Make `operation` fail with `error` for `key` only
    pub fn fail_key(&self, operation: Operation, key: StorageKey, error: BackendError) {
        self.failures.write().push(InjectedFailure {
            operation,
            key: Some(key),
            error,
        });
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// How many times `operation` was invoked
    pub fn calls(&self, operation: Operation) -> u64 {
        self.counter(operation).load(Ordering::SeqCst)
    }

    /// Every successful write, in order of arrival
    pub fn written(&self) -> Vec<(StorageKey, String)> {
        self.written.lock().clone()
    }

    /// Options passed with the most recent call
    pub fn last_options(&self) -> Option<BackendOptions> {
        *self.last_options.lock()
    }

    fn counter(&self, operation: Operation) -> &AtomicU64 {
        match operation {
            Operation::Read => &self.reads,
            Operation::Write => &self.writes,
            Operation::Delete => &self.deletes,
        }
    }

    fn enter(
        &self,
        operation: Operation,
        key: &StorageKey,
        options: BackendOptions,
    ) -> Result<(), BackendError> {
        self.counter(operation).fetch_add(1, Ordering::SeqCst);
        *self.last_options.lock() = Some(options);

        let failures = self.failures.read();
        match failures.iter().find(|failure| {
            failure.operation == operation && failure.key.as_ref().is_none_or(|k| k == key)
        }) {
            Some(failure) => Err(failure.error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl SecretBackend for MemorySecretBackend {
    async fn read(
        &self,
        key: &StorageKey,
        options: BackendOptions,
    ) -> Result<String, BackendError> {
        let outcome = self.enter(Operation::Read, key, options).and_then(|()| {
            self.get(key).ok_or_else(|| BackendError::NotFound {
                key: key.to_string(),
            })
        });

        if let Some(latency) = self.read_latency {
            tokio::time::sleep(latency).await;
        }

        outcome
    }

    async fn write(
        &self,
        key: &StorageKey,
        payload: &str,
        options: BackendOptions,
    ) -> Result<(), BackendError> {
        self.enter(Operation::Write, key, options)?;
        self.entries.write().insert(key.clone(), payload.to_string());
        self.written.lock().push((key.clone(), payload.to_string()));
        Ok(())
    }

    async fn delete(
        &self,
        key: &StorageKey,
        options: BackendOptions,
    ) -> Result<(), BackendError> {
        self.enter(Operation::Delete, key, options)?;
        self.entries
            .write()
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| BackendError::NotFound {
                key: key.to_string(),
            })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
