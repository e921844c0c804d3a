//! Credential payload variants

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Structured credential: named fields making up one secret
/// (e.g. `{"username": .., "token": ..}`).
pub type Bundle = BTreeMap<String, serde_json::Value>;

/// Value held for one [`StorageKey`](crate::StorageKey).
///
/// Absence is expressed as `Option::None` at the API boundary; the cache
/// never stores an empty value.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CredentialValue {
    /// A single secret stored as plain text
    Opaque(String),
    /// A structured credential encoded through the codec
    Bundle(Bundle),
}

impl CredentialValue {
    /// `true` for an empty string or an empty bundle
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Opaque(text) => text.is_empty(),
            Self::Bundle(bundle) => bundle.is_empty(),
        }
    }

    /// The plain-text secret, if this is an opaque value
    pub fn as_opaque(&self) -> Option<&str> {
        match self {
            Self::Opaque(text) => Some(text),
            Self::Bundle(_) => None,
        }
    }

    /// The structured fields, if this is a bundle
    pub fn as_bundle(&self) -> Option<&Bundle> {
        match self {
            Self::Opaque(_) => None,
            Self::Bundle(bundle) => Some(bundle),
        }
    }

    /// Short variant name for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Opaque(_) => "opaque",
            Self::Bundle(_) => "bundle",
        }
    }
}

// Secrets never reach logs; only the shape does.
impl fmt::Debug for CredentialValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Opaque(text) => f
                .debug_tuple("Opaque")
                .field(&format_args!("[REDACTED; {} bytes]", text.len()))
                .finish(),
            Self::Bundle(bundle) => f
                .debug_tuple("Bundle")
                .field(&bundle.keys().collect::<Vec<_>>())
                .finish(),
        }
    }
}

impl From<String> for CredentialValue {
    fn from(text: String) -> Self {
        Self::Opaque(text)
    }
}

impl From<&str> for CredentialValue {
    fn from(text: &str) -> Self {
        Self::Opaque(text.to_string())
    }
}

impl From<Bundle> for CredentialValue {
    fn from(bundle: Bundle) -> Self {
        Self::Bundle(bundle)
    }
}
