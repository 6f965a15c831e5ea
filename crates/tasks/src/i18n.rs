//! Localizable message descriptors.
//!
//! Rendering happens elsewhere; this crate only builds descriptors and
//! decides which one to show. On the wire a descriptor is either a literal
//! string or `[id]` / `[id, {values}]`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

/// A message that is either final text or a localization id with values.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalizedMessage {
    Literal(String),
    Descriptor {
        id: String,
        values: Map<String, Value>,
    },
}

impl LocalizedMessage {
    /// Descriptor without values.
    pub fn id(id: impl Into<String>) -> Self {
        Self::Descriptor {
            id: id.into(),
            values: Map::new(),
        }
    }

    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Adds a value; no-op on literals.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        if let Self::Descriptor { values, .. } = &mut self {
            values.insert(key.to_string(), value.into());
        }
        self
    }

    /// Localization id, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Literal(_) => None,
            Self::Descriptor { id, .. } => Some(id),
        }
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Literal(_) => None,
            Self::Descriptor { values, .. } => values.get(key),
        }
    }
}

impl From<&str> for LocalizedMessage {
    fn from(text: &str) -> Self {
        Self::literal(text)
    }
}

impl From<String> for LocalizedMessage {
    fn from(text: String) -> Self {
        Self::Literal(text)
    }
}

/// Plain-text fallback: the literal, or the id followed by its values.
impl fmt::Display for LocalizedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.write_str(text),
            Self::Descriptor { id, values } if values.is_empty() => f.write_str(id),
            Self::Descriptor { id, values } => write!(f, "{id} {}", Value::Object(values.clone())),
        }
    }
}

impl Serialize for LocalizedMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Literal(text) => serializer.serialize_str(text),
            Self::Descriptor { id, values } if values.is_empty() => (id,).serialize(serializer),
            Self::Descriptor { id, values } => (id, values).serialize(serializer),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMessage {
    Literal(String),
    Bare((String,)),
    WithValues((String, Map<String, Value>)),
}

impl<'de> Deserialize<'de> for LocalizedMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match RawMessage::deserialize(deserializer)? {
            RawMessage::Literal(text) => Self::Literal(text),
            RawMessage::Bare((id,)) => Self::id(id),
            RawMessage::WithValues((id, values)) => Self::Descriptor { id, values },
        })
    }
}
