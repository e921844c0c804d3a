//! Compound credential identifier

use serde::{Deserialize, Serialize};
use std::fmt;

/// Names one credential slot: a `key` inside a `service` namespace.
///
/// Equality, ordering and hashing are structural over both fields, so
/// `("a", "bc")` and `("ab", "c")` are distinct keys.
///
/// # Examples
///
/// ```
/// use keyward_credential::StorageKey;
///
/// let key = StorageKey::new("email", "pass");
/// assert_eq!(key.service(), "email");
/// assert_eq!(key.key(), "pass");
/// assert_eq!(key.to_string(), "email/pass");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StorageKey {
    service: String,
    key: String,
}

impl StorageKey {
    /// Creates a key for `key` within `service`
    pub fn new(service: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            key: key.into(),
        }
    }

    /// Service namespace
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Key within the service
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.service, self.key)
    }
}
