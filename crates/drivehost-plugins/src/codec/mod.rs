//! Envelope codec for records crossing the process boundary.
//!
//! Host records are converted to schema-less [`Envelope`] maps through their
//! `serde` implementations. Envelope keys are kept sorted, so equal records
//! always produce identical wire bytes. List and link replies use
//! independently serialised byte payloads instead, via [`encode_payload`] and
//! [`decode_payload`].

use std::any::type_name;
use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// Errors raised while converting records to and from envelopes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    /// The record holds a value the envelope cannot represent.
    #[error("failed to encode {type_name}: {message}")]
    Encode {
        /// Rust type being encoded.
        type_name: &'static str,
        /// Serialiser message.
        message: String,
    },

    /// The record serialised to something other than a map of fields.
    #[error("{type_name} encodes as {found}, not as a record")]
    NotARecord {
        /// Rust type being encoded.
        type_name: &'static str,
        /// JSON kind produced instead.
        found: &'static str,
    },

    /// The envelope or payload does not have the requested shape.
    #[error("failed to decode {type_name}: {message}")]
    Decode {
        /// Rust type being decoded.
        type_name: &'static str,
        /// Deserialiser message.
        message: String,
    },
}

/// A schema-less record: field names mapped to JSON values, sorted by key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Envelope(BTreeMap<String, Value>);

impl Envelope {
    /// Creates an empty envelope.
    #[must_use]
    pub const fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Returns the value stored under `field`.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// Stores `value` under `field`, returning the previous value.
    pub fn insert(&mut self, field: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(field.into(), value)
    }

    /// Number of fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the envelope has no fields.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over fields in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Converts the envelope into a JSON object value.
    #[must_use]
    pub fn into_value(self) -> Value {
        Value::Object(self.0.into_iter().collect::<Map<String, Value>>())
    }

    /// Canonical wire bytes of the envelope.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Encode`] if serialisation fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CodecError> {
        serde_json::to_vec(&self.0).map_err(|error| CodecError::Encode {
            type_name: type_name::<Self>(),
            message: error.to_string(),
        })
    }
}

impl From<Map<String, Value>> for Envelope {
    fn from(map: Map<String, Value>) -> Self {
        Self(map.into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for Envelope {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Encodes a record into an envelope.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when a value cannot be represented (for
/// example an integer wider than 64 bits or a map with non-string keys) and
/// [`CodecError::NotARecord`] when the value does not serialise to a map.
pub fn encode<T: Serialize + ?Sized>(record: &T) -> Result<Envelope, CodecError> {
    let value = serde_json::to_value(record).map_err(|error| CodecError::Encode {
        type_name: type_name::<T>(),
        message: error.to_string(),
    })?;
    match value {
        Value::Object(map) => Ok(Envelope::from(map)),
        other => Err(CodecError::NotARecord {
            type_name: type_name::<T>(),
            found: kind_of(&other),
        }),
    }
}

/// Decodes an envelope into a record of type `T`.
///
/// # Errors
///
/// Returns [`CodecError::Decode`] on missing required fields or a shape
/// mismatch.
pub fn decode<T: DeserializeOwned>(envelope: &Envelope) -> Result<T, CodecError> {
    serde_json::from_value(envelope.clone().into_value()).map_err(|error| CodecError::Decode {
        type_name: type_name::<T>(),
        message: error.to_string(),
    })
}

/// Serialises any value (typically a sequence of records) into bytes.
///
/// # Errors
///
/// Returns [`CodecError::Encode`] when the value cannot be represented.
pub fn encode_payload<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(value).map_err(|error| CodecError::Encode {
        type_name: type_name::<T>(),
        message: error.to_string(),
    })
}

/// Parses bytes produced by [`encode_payload`].
///
/// # Errors
///
/// Returns [`CodecError::Decode`] when the bytes do not parse as `T`.
pub fn decode_payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    serde_json::from_slice(bytes).map_err(|error| CodecError::Decode {
        type_name: type_name::<T>(),
        message: error.to_string(),
    })
}

const fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
