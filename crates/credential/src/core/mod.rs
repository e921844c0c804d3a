//! Core types for credential caching

mod error;
mod key;
mod value;

pub use error::{BackendError, CodecError, ConfigError, ManagerError, ManagerResult};
pub use key::StorageKey;
pub use value::{Bundle, CredentialValue};
