//! Credentials Manager - cache in front of an asynchronous secret store
//!
//! Public operations never wait on the backend: they mutate the cache and
//! dispatch jobs. Job results come back over a completion queue drained by a
//! single driver task, which applies them to the cache and emits events.

use crate::backend::{Operation, SecretBackend};
use crate::codec::{Codec, JsonCodec};
use crate::core::{
    BackendError, Bundle, CredentialValue, ManagerError, ManagerResult, StorageKey,
};
use crate::manager::config::ManagerConfig;
use crate::manager::events::{EventBus, EventSubscriber, ManagerEvent};
use crate::manager::jobs::{CycleProgress, JobId, JobTracker};
use crate::manager::registry::ServiceRegistry;
use crate::manager::store::CredentialStore;
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tracing::{debug, info, trace, warn};

/// Credential cache coordinating reads, writes and deletes against a
/// [`SecretBackend`]
///
/// Cloning is cheap; clones share the cache and the event bus.
///
/// # Examples
///
/// ```no_run
/// use keyward_credential::prelude::*;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = CredentialsManager::builder()
///     .backend(Arc::new(MemorySecretBackend::new()))
///     .build()?;
///
/// let mut events = manager.subscribe();
/// manager.add_service("email", ["user", "pass"]);
/// events.ready("email").await;
///
/// manager.set_secret("email", "pass", "secret123");
/// assert_eq!(
///     manager.credentials("email", "pass"),
///     Some(CredentialValue::from("secret123"))
/// );
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct CredentialsManager {
    inner: Arc<Inner>,
}

struct Inner {
    backend: Arc<dyn SecretBackend>,
    codec: Arc<dyn Codec>,
    config: ManagerConfig,
    runtime: Handle,
    state: Mutex<State>,
    events: EventBus,
    completions: mpsc::UnboundedSender<JobOutcome>,
}

#[derive(Default)]
struct State {
    store: CredentialStore,
    registry: ServiceRegistry,
    jobs: JobTracker,
}

/// Everything a read completion needs to be applied or discarded
struct ReadTicket {
    job: JobId,
    key: StorageKey,
    generation: u64,
    revision: u64,
}

enum JobOutcome {
    Read {
        ticket: ReadTicket,
        result: Result<String, BackendError>,
    },
    Write {
        key: StorageKey,
        result: Result<(), BackendError>,
    },
    Delete {
        key: StorageKey,
        result: Result<(), BackendError>,
    },
}

impl CredentialsManager {
    /// Create builder for constructing manager instance
    pub fn builder() -> CredentialsManagerBuilder<NoBackend> {
        CredentialsManagerBuilder::new()
    }

    /// Register `service` with its credential keys and load them.
    ///
    /// Replaces any key set registered earlier and always starts a new load
    /// cycle, even if nothing changed. A
    /// [`ManagerEvent::ServiceReady`] follows once every read of the cycle
    /// has completed; with no keys it is emitted before this call returns.
    ///
    /// A cycle still in flight for `service` is superseded: its reads are
    /// cancelled and it will not emit a ready event of its own.
    ///
    /// Returns the generation of the new load cycle.
    pub fn add_service<I, K>(&self, service: impl Into<String>, keys: I) -> u64
    where
        I: IntoIterator<Item = K>,
        K: Into<String>,
    {
        let service = service.into();
        let mut state = self.inner.state.lock();
        if state.registry.contains(&service) {
            debug!(service = %service, "Replacing registered credential keys");
        }
        let keys: Vec<String> = state
            .registry
            .register(&service, keys.into_iter().map(Into::into))
            .iter()
            .cloned()
            .collect();
        self.inner.load_credentials(&mut state, &service, &keys)
    }

    /// Cached credentials for `key` within `service`.
    ///
    /// Served from memory only; `None` until the value has been loaded or
    /// set.
    pub fn credentials(&self, service: &str, key: &str) -> Option<CredentialValue> {
        self.credentials_by_key(&StorageKey::new(service, key))
    }

    /// Cached credentials for `key`
    pub fn credentials_by_key(&self, key: &StorageKey) -> Option<CredentialValue> {
        self.inner.state.lock().store.get(key).cloned()
    }

    /// Keys of `service` that currently hold cached credentials
    pub fn keys(&self, service: &str) -> BTreeSet<String> {
        self.inner.state.lock().store.keys_for(service)
    }

    /// Registered services, in registration order
    pub fn services(&self) -> Vec<String> {
        self.inner
            .state
            .lock()
            .registry
            .services()
            .map(str::to_string)
            .collect()
    }

    /// Check if `service` still has reads in flight
    pub fn is_loading(&self, service: &str) -> bool {
        self.inner.state.lock().jobs.is_loading(service)
    }

    /// Set or clear the credentials stored under `key`.
    ///
    /// - `None`, an empty string or an empty bundle deletes the credentials;
    ///   nothing happens if none are cached.
    /// - A value equal to the cached one is ignored.
    /// - Anything else replaces the cached value immediately and is written
    ///   to the backend in the background: text as-is, bundles through the
    ///   codec.
    ///
    /// Backend failures are logged and reported as
    /// [`ManagerEvent::JobFinished`]; the cache is not rolled back.
    pub fn set_credentials(
        &self,
        key: &StorageKey,
        value: Option<CredentialValue>,
        prefer_opaque: bool,
    ) {
        let mut state = self.inner.state.lock();

        match value.filter(|value| !value.is_empty()) {
            None => {
                if state.store.remove(key).is_none() {
                    trace!(key = %key, "No cached credentials, nothing to delete");
                    return;
                }
                info!(key = %key, "Deleting credentials");
                self.inner.dispatch_delete(key.clone());
            }
            Some(value) => {
                if state.store.get(key) == Some(&value) {
                    trace!(key = %key, "Credentials unchanged, skipping write");
                    return;
                }
                let payload = self.inner.payload_for(key, &value, prefer_opaque);
                info!(key = %key, kind = value.kind(), "Writing credentials");
                state.store.update(key.clone(), value);
                self.inner.dispatch_write(key.clone(), payload);
            }
        }
    }

    /// Store a structured credential (always encoded through the codec)
    pub fn set_bundle(&self, service: &str, key: &str, bundle: Bundle) {
        self.set_credentials(
            &StorageKey::new(service, key),
            Some(CredentialValue::Bundle(bundle)),
            false,
        );
    }

    /// Store a plain-text secret (always written as text)
    pub fn set_secret(&self, service: &str, key: &str, secret: impl Into<String>) {
        self.set_credentials(
            &StorageKey::new(service, key),
            Some(CredentialValue::Opaque(secret.into())),
            true,
        );
    }

    /// Delete the credentials stored under `key` within `service`
    pub fn remove_credentials(&self, service: &str, key: &str) {
        self.set_credentials(&StorageKey::new(service, key), None, false);
    }

    /// Subscribe to ready and job events emitted from now on
    pub fn subscribe(&self) -> EventSubscriber {
        let subscriber = self.inner.events.subscribe();
        debug!(
            subscribers = self.inner.events.subscriber_count(),
            "New event subscriber"
        );
        subscriber
    }

    /// Active configuration
    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }
}

impl Inner {
    fn load_credentials(&self, state: &mut State, service: &str, keys: &[String]) -> u64 {
        let (generation, superseded) = state.jobs.begin_cycle(service);
        if !superseded.is_empty() {
            info!(
                service,
                generation,
                cancelled = superseded.len(),
                "Superseding in-flight credential load"
            );
            superseded.iter().for_each(AbortHandle::abort);
        }

        debug!(service, generation, ?keys, "Loading credentials");

        for key in keys {
            let key = StorageKey::new(service, key.as_str());
            let ticket = ReadTicket {
                job: state.jobs.next_job_id(),
                revision: state.store.revision(&key),
                key,
                generation,
            };
            let job = ticket.job;
            trace!(key = %ticket.key, %job, "Launching read job");
            let handle = self.dispatch_read(ticket);
            state.jobs.track(service, generation, job, handle);
        }

        if !state.jobs.is_loading(service) {
            // Nothing to read, the cycle is drained already
            info!(service, generation, "Service ready");
            self.events.emit(ManagerEvent::ServiceReady {
                service: service.to_string(),
                generation,
            });
        }

        generation
    }

    fn dispatch_read(&self, ticket: ReadTicket) -> AbortHandle {
        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        let options = self.config.backend_options();
        let limit = self.config.read_timeout;

        self.runtime
            .spawn(async move {
                let result = with_timeout(limit, backend.read(&ticket.key, options)).await;
                let _ = completions.send(JobOutcome::Read { ticket, result });
            })
            .abort_handle()
    }

    fn dispatch_write(&self, key: StorageKey, payload: String) {
        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        let options = self.config.backend_options();

        self.runtime.spawn(async move {
            let result = backend.write(&key, &payload, options).await;
            let _ = completions.send(JobOutcome::Write { key, result });
        });
    }

    fn dispatch_delete(&self, key: StorageKey) {
        let backend = Arc::clone(&self.backend);
        let completions = self.completions.clone();
        let options = self.config.backend_options();

        self.runtime.spawn(async move {
            let result = backend.delete(&key, options).await;
            let _ = completions.send(JobOutcome::Delete { key, result });
        });
    }

    fn payload_for(&self, key: &StorageKey, value: &CredentialValue, prefer_opaque: bool) -> String {
        match value {
            CredentialValue::Opaque(text) => {
                if !prefer_opaque {
                    trace!(key = %key, "Writing opaque credentials as text");
                }
                text.clone()
            }
            CredentialValue::Bundle(bundle) => match self.codec.encode(bundle) {
                Ok(payload) => {
                    debug!(key = %key, fields = bundle.len(), "Encoded credentials for writing");
                    payload
                }
                Err(e) => {
                    // Degraded: the write still goes out, with nothing in it
                    warn!(key = %key, error = %e, "Cannot encode credentials for writing");
                    String::new()
                }
            },
        }
    }

    fn decode(&self, key: &StorageKey, payload: String) -> CredentialValue {
        match self.codec.decode(&payload) {
            Ok(bundle) if !bundle.is_empty() => CredentialValue::Bundle(bundle),
            Ok(_) => {
                trace!(key = %key, "Stored bundle is empty, keeping raw text");
                CredentialValue::Opaque(payload)
            }
            Err(e) => {
                trace!(key = %key, reason = %e, "Stored value is not a bundle, keeping raw text");
                CredentialValue::Opaque(payload)
            }
        }
    }

    fn finish(&self, outcome: JobOutcome) {
        match outcome {
            JobOutcome::Read { ticket, result } => self.finish_read(ticket, result),
            JobOutcome::Write { key, result } => self.finish_mutation(Operation::Write, key, result),
            JobOutcome::Delete { key, result } => {
                self.finish_mutation(Operation::Delete, key, result);
            }
        }
    }

    fn finish_read(&self, ticket: ReadTicket, result: Result<String, BackendError>) {
        let ReadTicket {
            job,
            key,
            generation,
            revision,
        } = ticket;
        let service = key.service().to_string();

        let progress = {
            let mut state = self.state.lock();
            let progress = state.jobs.finish(&service, generation, job);
            if progress == CycleProgress::Stale {
                debug!(
                    key = %key,
                    %job,
                    generation,
                    current = ?state.jobs.generation(&service),
                    "Ignoring read from superseded load"
                );
                return;
            }

            match &result {
                Ok(payload) => {
                    debug!(key = %key, backend = self.backend.backend_name(), "Read job finished without errors");
                    let value = self.decode(&key, payload.clone());
                    if state.store.fill(key.clone(), value, revision) {
                        trace!(key = %key, cached = state.store.len(), "Cached loaded credentials");
                    } else {
                        debug!(key = %key, "Credentials changed while reading, keeping newer value");
                    }
                }
                Err(e) => {
                    warn!(key = %key, code = e.code(), error = %e, "Read job finished with error");
                }
            }
            progress
        };

        self.events.emit(ManagerEvent::JobFinished {
            operation: Operation::Read,
            key,
            error: result.err(),
        });

        if progress == CycleProgress::Drained {
            info!(service = %service, generation, "Service ready");
            self.events.emit(ManagerEvent::ServiceReady {
                service,
                generation,
            });
        }
    }

    fn finish_mutation(&self, operation: Operation, key: StorageKey, result: Result<(), BackendError>) {
        match &result {
            Ok(()) => info!(key = %key, %operation, "Job finished without error"),
            Err(e) => warn!(
                key = %key,
                %operation,
                code = e.code(),
                error = %e,
                "Job finished with error, cache left as is"
            ),
        }
        self.events.emit(ManagerEvent::JobFinished {
            operation,
            key,
            error: result.err(),
        });
    }
}

async fn with_timeout<F>(limit: Option<Duration>, read: F) -> Result<String, BackendError>
where
    F: std::future::Future<Output = Result<String, BackendError>>,
{
    match limit {
        Some(duration) => tokio::time::timeout(duration, read)
            .await
            .unwrap_or(Err(BackendError::Timeout { duration })),
        None => read.await,
    }
}

/// Applies job outcomes one at a time until every manager handle and job is
/// gone
async fn drive_completions(inner: Weak<Inner>, mut completions: mpsc::UnboundedReceiver<JobOutcome>) {
    while let Some(outcome) = completions.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        inner.finish(outcome);
    }
    trace!("Completion driver stopped");
}

/// Builder state before a backend is set
#[doc(hidden)]
pub struct NoBackend;

/// Builder for [`CredentialsManager`]
///
/// The backend is required and enforced at compile time; the codec defaults
/// to [`JsonCodec`].
///
/// # Examples
///
/// ```no_run
/// use keyward_credential::prelude::*;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let manager = CredentialsManager::builder()
///     .backend(Arc::new(MemorySecretBackend::new()))
///     .read_timeout(Duration::from_secs(10))
///     .allow_insecure_fallback(false)
///     .build()?;
/// # Ok(())
/// # }
/// ```
pub struct CredentialsManagerBuilder<B> {
    backend: B,
    codec: Option<Arc<dyn Codec>>,
    config: ManagerConfig,
    runtime: Option<Handle>,
}

impl CredentialsManagerBuilder<NoBackend> {
    /// Create new builder instance
    pub fn new() -> Self {
        Self {
            backend: NoBackend,
            codec: None,
            config: ManagerConfig::default(),
            runtime: None,
        }
    }

    /// Set secret backend (required)
    pub fn backend(
        self,
        backend: Arc<dyn SecretBackend>,
    ) -> CredentialsManagerBuilder<Arc<dyn SecretBackend>> {
        CredentialsManagerBuilder {
            backend,
            codec: self.codec,
            config: self.config,
            runtime: self.runtime,
        }
    }
}

impl Default for CredentialsManagerBuilder<NoBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> CredentialsManagerBuilder<B> {
    /// Replace the bundle codec
    pub fn codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// Replace the whole configuration
    pub fn config(mut self, config: ManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Fail reads that take longer than `timeout`
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = Some(timeout);
        self
    }

    /// Override the platform default for the insecure fallback store
    pub fn allow_insecure_fallback(mut self, allow: bool) -> Self {
        self.config.allow_insecure_fallback = allow;
        self
    }

    /// Runtime that runs backend jobs (default: the current one)
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }
}

impl CredentialsManagerBuilder<Arc<dyn SecretBackend>> {
    /// Build the manager and start its completion driver
    ///
    /// # Errors
    ///
    /// [`ManagerError::NoRuntime`] when called outside a Tokio runtime
    /// without [`runtime`](Self::runtime).
    pub fn build(self) -> ManagerResult<CredentialsManager> {
        let runtime = match self.runtime {
            Some(handle) => handle,
            None => Handle::try_current().map_err(|_| ManagerError::NoRuntime)?,
        };
        let (completions, queue) = mpsc::unbounded_channel();

        info!(
            backend = self.backend.backend_name(),
            allow_insecure_fallback = self.config.allow_insecure_fallback,
            read_timeout = ?self.config.read_timeout,
            "Credentials manager starting"
        );

        let inner = Arc::new(Inner {
            backend: self.backend,
            codec: self.codec.unwrap_or_else(|| Arc::new(JsonCodec)),
            events: EventBus::new(self.config.event_capacity),
            config: self.config,
            runtime: runtime.clone(),
            state: Mutex::new(State::default()),
            completions,
        });
        runtime.spawn(drive_completions(Arc::downgrade(&inner), queue));

        Ok(CredentialsManager { inner })
    }
}
