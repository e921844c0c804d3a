//! Integration tests for updating and deleting credentials
//!
//! These tests verify that updates land in the cache immediately, reach the
//! backend exactly once, and that backend failures never roll the cache back.

use keyward_credential::CodecError;
use keyward_credential::prelude::*;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;

/// Helper to create a manager over a shared in-memory backend
fn create_test_manager(backend: &Arc<MemorySecretBackend>) -> CredentialsManager {
    CredentialsManager::builder()
        .backend(backend.clone())
        .build()
        .unwrap()
}

/// Helper to build a bundle from JSON object literal
fn bundle(value: serde_json::Value) -> Bundle {
    serde_json::from_value(value).unwrap()
}

#[tokio::test]
async fn test_set_secret_writes_once() {
    let _guard = keyward_log::init_test();

    // GIVEN: A manager with nothing cached
    let backend = Arc::new(MemorySecretBackend::new());
    let manager = create_test_manager(&backend);
    let mut events = manager.subscribe();
    let pass = StorageKey::new("email", "pass");

    // WHEN: A secret is set
    manager.set_secret("email", "pass", "secret123");

    // THEN: The cache is updated before the write finishes
    assert_eq!(
        manager.credentials("email", "pass"),
        Some(CredentialValue::from("secret123"))
    );

    // AND: The backend receives the raw text exactly once
    assert_eq!(events.job_finished(Operation::Write, &pass).await, Some(None));
    assert_eq!(backend.written(), vec![(pass, "secret123".to_string())]);
}

#[tokio::test]
async fn test_setting_same_value_is_a_noop() {
    let _guard = keyward_log::init_test();

    // GIVEN: A secret that is already cached and written
    let backend = Arc::new(MemorySecretBackend::new());
    let manager = create_test_manager(&backend);
    let mut events = manager.subscribe();
    let pass = StorageKey::new("email", "pass");
    manager.set_secret("email", "pass", "secret123");
    events.job_finished(Operation::Write, &pass).await;

    // WHEN: The same value is set again, followed by an unrelated write
    manager.set_secret("email", "pass", "secret123");
    let other = StorageKey::new("email", "user");
    manager.set_secret("email", "user", "alice");
    events.job_finished(Operation::Write, &other).await;

    // THEN: Only the unrelated write reached the backend
    assert_eq!(backend.calls(Operation::Write), 2);
    assert_eq!(
        backend.written(),
        vec![
            (pass, "secret123".to_string()),
            (other, "alice".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_clearing_absent_credentials_is_a_noop() {
    let _guard = keyward_log::init_test();

    // GIVEN: A manager with nothing cached
    let backend = Arc::new(MemorySecretBackend::new());
    let manager = create_test_manager(&backend);

    // WHEN: Credentials are cleared through every spelling of "nothing"
    let key = StorageKey::new("email", "pass");
    manager.remove_credentials("email", "pass");
    manager.set_credentials(&key, None, false);
    manager.set_credentials(&key, Some(CredentialValue::from("")), true);
    manager.set_credentials(&key, Some(CredentialValue::Bundle(Bundle::new())), false);
    tokio::task::yield_now().await;

    // THEN: No job was dispatched
    assert_eq!(backend.calls(Operation::Delete), 0);
    assert_eq!(backend.calls(Operation::Write), 0);
    assert_eq!(manager.credentials_by_key(&key), None);
}

#[tokio::test]
async fn test_empty_value_deletes_cached_credentials() {
    let _guard = keyward_log::init_test();

    // GIVEN: A secret that was written
    let backend = Arc::new(MemorySecretBackend::new());
    let manager = create_test_manager(&backend);
    let mut events = manager.subscribe();
    let pass = StorageKey::new("email", "pass");
    manager.set_secret("email", "pass", "secret123");
    events.job_finished(Operation::Write, &pass).await;

    // WHEN: An empty secret is set
    manager.set_secret("email", "pass", "");

    // THEN: The entry is gone from the cache and then from the backend
    assert_eq!(manager.credentials("email", "pass"), None);
    assert!(manager.keys("email").is_empty());
    assert_eq!(events.job_finished(Operation::Delete, &pass).await, Some(None));
    assert_eq!(backend.get(&pass), None);
}

#[tokio::test]
async fn test_bundle_round_trips_through_backend() {
    let _guard = keyward_log::init_test();

    // GIVEN: A bundle written through one manager
    let backend = Arc::new(MemorySecretBackend::new());
    let writer = create_test_manager(&backend);
    let mut events = writer.subscribe();
    let key = StorageKey::new("email", "account");
    let account = bundle(json!({ "user": "alice", "port": 993, "tls": true }));
    writer.set_bundle("email", "account", account.clone());
    events.job_finished(Operation::Write, &key).await;

    // WHEN: A fresh manager loads the same key
    let reader = create_test_manager(&backend);
    let mut events = reader.subscribe();
    reader.add_service("email", ["account"]);
    events.ready("email").await;

    // THEN: The bundle comes back unchanged
    assert_eq!(
        reader.credentials("email", "account"),
        Some(CredentialValue::Bundle(account))
    );
}

#[tokio::test]
async fn test_opaque_text_is_written_raw_even_without_preference() {
    let _guard = keyward_log::init_test();

    // GIVEN: Text that happens to look like JSON
    let backend = Arc::new(MemorySecretBackend::new());
    let manager = create_test_manager(&backend);
    let mut events = manager.subscribe();
    let key = StorageKey::new("svc", "token");

    // WHEN: It is set without preferring opaque storage
    manager.set_credentials(&key, Some(CredentialValue::from(r#"{"a":1}"#)), false);

    // THEN: The backend still receives it verbatim
    events.job_finished(Operation::Write, &key).await;
    assert_eq!(backend.get(&key).as_deref(), Some(r#"{"a":1}"#));
}

#[tokio::test]
async fn test_failed_write_keeps_cached_value() {
    let _guard = keyward_log::init_test();

    // GIVEN: A backend that refuses writes
    let backend = Arc::new(MemorySecretBackend::new());
    backend.fail(Operation::Write, BackendError::AccessDenied("keychain locked".into()));
    let manager = create_test_manager(&backend);
    let mut events = manager.subscribe();
    let key = StorageKey::new("email", "pass");

    // WHEN: A secret is set
    manager.set_secret("email", "pass", "secret123");

    // THEN: The failure is reported and the cache keeps the new value
    let error = events.job_finished(Operation::Write, &key).await.unwrap();
    assert_eq!(error, Some(BackendError::AccessDenied("keychain locked".into())));
    assert_eq!(
        manager.credentials("email", "pass"),
        Some(CredentialValue::from("secret123"))
    );
    assert!(backend.is_empty());
}

#[tokio::test]
async fn test_failed_delete_is_reported() {
    let _guard = keyward_log::init_test();

    // GIVEN: A cached secret that the backend never stored
    let backend = Arc::new(MemorySecretBackend::new());
    backend.fail(Operation::Write, BackendError::Other("disk full".into()));
    let manager = create_test_manager(&backend);
    let mut events = manager.subscribe();
    let key = StorageKey::new("email", "pass");
    manager.set_secret("email", "pass", "secret123");
    events.job_finished(Operation::Write, &key).await;

    // WHEN: It is removed
    manager.remove_credentials("email", "pass");

    // THEN: The cache is cleared and the backend's NotFound is reported
    assert_eq!(manager.credentials("email", "pass"), None);
    let error = events.job_finished(Operation::Delete, &key).await.unwrap();
    assert!(matches!(error, Some(BackendError::NotFound { .. })));
}

#[tokio::test]
async fn test_backend_options_follow_config() {
    let _guard = keyward_log::init_test();

    // GIVEN: A manager that forbids the insecure fallback
    let backend = Arc::new(MemorySecretBackend::new());
    let manager = CredentialsManager::builder()
        .backend(backend.clone())
        .allow_insecure_fallback(false)
        .build()
        .unwrap();
    let mut events = manager.subscribe();
    let key = StorageKey::new("email", "pass");

    // WHEN: A write is dispatched
    manager.set_secret("email", "pass", "secret123");
    events.job_finished(Operation::Write, &key).await;

    // THEN: The backend saw the configured options
    assert_eq!(
        backend.last_options(),
        Some(BackendOptions {
            allow_insecure_fallback: false
        })
    );
    assert!(!manager.config().allow_insecure_fallback);
}

/// Codec whose encoder always fails
struct RejectingCodec;

impl Codec for RejectingCodec {
    fn encode(&self, _bundle: &Bundle) -> Result<String, CodecError> {
        Err(CodecError::NotAnObject)
    }

    fn decode(&self, payload: &str) -> Result<Bundle, CodecError> {
        JsonCodec.decode(payload)
    }
}

#[tokio::test]
async fn test_encode_failure_still_writes_and_keeps_cache() {
    let _guard = keyward_log::init_test();

    // GIVEN: A manager whose codec cannot encode bundles
    let backend = Arc::new(MemorySecretBackend::new());
    let manager = CredentialsManager::builder()
        .backend(backend.clone())
        .codec(Arc::new(RejectingCodec))
        .build()
        .unwrap();
    let mut events = manager.subscribe();
    let key = StorageKey::new("email", "account");
    let account = bundle(json!({ "user": "alice" }));

    // WHEN: A bundle is set
    manager.set_bundle("email", "account", account.clone());

    // THEN: One write goes out with an empty payload
    assert_eq!(events.job_finished(Operation::Write, &key).await, Some(None));
    assert_eq!(backend.calls(Operation::Write), 1);
    assert_eq!(backend.written(), vec![(key, String::new())]);

    // AND: The cache keeps the bundle
    assert_eq!(
        manager.credentials("email", "account"),
        Some(CredentialValue::Bundle(account))
    );
}
