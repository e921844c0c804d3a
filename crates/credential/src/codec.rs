//! Bundle codec
//!
//! Secret stores hold text. A [`Bundle`] is turned into text with
//! [`Codec::encode`] before a write, and every successful read is run through
//! [`Codec::decode`]: a decode that fails or yields no fields means the stored
//! secret is a plain string. There is no type tag next to the payload.

use crate::core::{Bundle, CodecError};

/// Encodes bundles to stored text and back
pub trait Codec: Send + Sync {
    /// Serialize a bundle for storage
    fn encode(&self, bundle: &Bundle) -> Result<String, CodecError>;

    /// Parse stored text as a bundle
    fn decode(&self, payload: &str) -> Result<Bundle, CodecError>;
}

/// JSON object codec (`{"field": value, ..}`)
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, bundle: &Bundle) -> Result<String, CodecError> {
        Ok(serde_json::to_string(bundle)?)
    }

    fn decode(&self, payload: &str) -> Result<Bundle, CodecError> {
        match serde_json::from_str::<serde_json::Value>(payload)? {
            serde_json::Value::Object(map) => Ok(map.into_iter().collect()),
            _ => Err(CodecError::NotAnObject),
        }
    }
}
