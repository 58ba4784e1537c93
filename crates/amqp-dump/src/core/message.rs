//! The unit of transfer moved through the pipeline.

use bytes::Bytes;
use std::collections::HashMap;

/// A named property value carried alongside a message body.
///
/// Broker headers arrive either as UTF-8 text or as raw byte sequences;
/// both shapes survive the trip through the pipeline unchanged unless the
/// optional header decode pass rewrites them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyValue {
    Text(String),
    Bytes(Vec<u8>),
}

impl PropertyValue {
    /// Borrow the textual form of this value, if it has one.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s) => Some(s),
            PropertyValue::Bytes(_) => None,
        }
    }

    /// Borrow the raw bytes of this value, if it is a byte sequence.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            PropertyValue::Bytes(b) => Some(b),
            PropertyValue::Text(_) => None,
        }
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::Text(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::Text(value.to_string())
    }
}

impl From<Vec<u8>> for PropertyValue {
    fn from(value: Vec<u8>) -> Self {
        PropertyValue::Bytes(value)
    }
}

/// A single message in flight: an opaque body plus named properties.
///
/// Items are moved by value through every stage boundary: the source
/// creates one per input record, the transform stage may rewrite properties
/// in place, and the destination writer consumes it. No stage retains an
/// item after handing it downstream.
#[derive(Debug, Clone, Default)]
pub struct MessageItem {
    /// Named properties; keys are case-sensitive and unique.
    pub properties: HashMap<String, PropertyValue>,

    /// Opaque payload, not inspected by the pipeline core.
    pub body: Bytes,
}

impl MessageItem {
    /// Create an item with the given body and no properties.
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            properties: HashMap::new(),
            body: body.into(),
        }
    }

    /// Add a property, replacing any existing value under the same name.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}
