//! JSON envelopes - a payload's kind paired with its serialized bytes.
//!
//! Payloads are serialized once, when the envelope is built. Sending the same
//! envelope to several destinations (or retrying it at the transport level)
//! never re-serializes.
//!
//! The byte form is compact JSON with `null` object members dropped, so an
//! `Option::None` field is absent on the wire and reads back as `None`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::message::{Message, MessageKind};

/// Content type attached to every envelope.
pub const CONTENT_TYPE: &str = "application/json";

/// Error type for envelope encoding and decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EnvelopeError {
    /// The payload could not be serialized to JSON.
    #[error("envelope serialization failed for {kind}: {reason}")]
    Serialize { kind: String, reason: String },
    /// The byte form is not valid JSON for the requested type.
    #[error("envelope deserialization failed: {0}")]
    Deserialize(String),
}

/// A message ready to hand to a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    kind: MessageKind,
    body: Vec<u8>,
    message_id: Option<String>,
    correlation_id: Option<String>,
    properties: Vec<(String, String)>,
}

impl Envelope {
    /// Serialize a typed message into an envelope tagged with its kind.
    pub fn encode<M: Message>(message: &M) -> Result<Self, EnvelopeError> {
        let body = to_json_bytes(message).map_err(|e| EnvelopeError::Serialize {
            kind: M::KIND.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_bytes(M::kind(), body))
    }

    /// Wrap bytes that are already serialized.
    ///
    /// The body is not validated here; a malformed body only fails when a
    /// consumer decodes it. This is what replay and pass-through paths need.
    pub fn from_bytes(kind: impl Into<MessageKind>, body: Vec<u8>) -> Self {
        Self {
            kind: kind.into(),
            body,
            message_id: None,
            correlation_id: None,
            properties: Vec::new(),
        }
    }

    /// Set the broker message id (used for duplicate detection by some brokers).
    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add an application property carried alongside the body.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    pub fn kind(&self) -> &MessageKind {
        &self.kind
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Get the body as a string (if valid UTF-8).
    pub fn body_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }

    pub fn content_type(&self) -> &'static str {
        CONTENT_TYPE
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn properties(&self) -> &[(String, String)] {
        &self.properties
    }

    /// Look up an application property by key.
    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Decode the body, treating an empty or `null` body as no value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<Option<T>, EnvelopeError> {
        from_json_bytes(Some(self.body.as_slice()))
    }

    pub fn into_body(self) -> Vec<u8> {
        self.body
    }
}

/// Serialize a value to compact JSON, dropping `null` object members.
pub fn to_json_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, serde_json::Error> {
    let mut tree = serde_json::to_value(value)?;
    strip_nulls(&mut tree);
    serde_json::to_vec(&tree)
}

/// Deserialize JSON bytes.
///
/// Absent input, an empty slice and a literal `null` all decode to `Ok(None)`.
pub fn from_json_bytes<T: DeserializeOwned>(
    bytes: Option<&[u8]>,
) -> Result<Option<T>, EnvelopeError> {
    let bytes = match bytes {
        Some(b) if !b.iter().all(u8::is_ascii_whitespace) => b,
        _ => return Ok(None),
    };

    serde_json::from_slice::<Option<T>>(bytes)
        .map_err(|e| EnvelopeError::Deserialize(e.to_string()))
}

// Array elements are kept as-is (positions are meaningful); only object
// members are dropped.
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        Value::Array(items) => items.iter_mut().for_each(strip_nulls),
        _ => {}
    }
}
