//! Keyward Credential - credential cache in front of a platform secret store
//!
//! Applications register the credential keys each service needs, read them
//! back from memory, and update them without waiting on the secret store.
//!
//! # Features
//!
//! - **Non-blocking** - reads, writes and deletes run as background jobs
//! - **Readiness events** - one `ServiceReady` per load cycle, failed reads included
//! - **Write wins** - a read started before a local update never clobbers it
//! - **Structured values** - bundles round-trip through a pluggable [`Codec`]
//! - **Pluggable storage** - [`MemorySecretBackend`] for tests, `KeyringBackend`
//!   (feature `keyring`) for the OS keychain
#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Secret-store backends
pub mod backend;
/// Bundle serialization
pub mod codec;
/// Core types and errors
pub mod core;
/// Credentials manager and its bookkeeping
pub mod manager;

// ── Root re-exports ─────────────────────────────────────────────────────────

pub use crate::backend::{BackendOptions, MemorySecretBackend, Operation, SecretBackend};
pub use crate::codec::{Codec, JsonCodec};
pub use crate::core::{
    BackendError, Bundle, CodecError, ConfigError, CredentialValue, ManagerError, ManagerResult,
    StorageKey,
};
pub use crate::manager::{
    CredentialsManager, CredentialsManagerBuilder, EventSubscriber, ManagerConfig, ManagerEvent,
};

#[cfg(feature = "keyring")]
pub use crate::backend::KeyringBackend;

/// Commonly used types and traits
pub mod prelude {
    pub use crate::backend::{BackendOptions, MemorySecretBackend, Operation, SecretBackend};
    pub use crate::codec::{Codec, JsonCodec};
    pub use crate::core::{
        BackendError, Bundle, CredentialValue, ManagerError, ManagerResult, StorageKey,
    };
    pub use crate::manager::{
        CredentialsManager, EventSubscriber, ManagerConfig, ManagerEvent,
    };

    #[cfg(feature = "keyring")]
    pub use crate::backend::KeyringBackend;
}
