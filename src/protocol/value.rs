//! The tagged value model
//!
//! A [`Value`] is one node of a message block's field tree. Four variants are
//! representable on the wire; the two error-state variants signal "absent" or
//! "malformed" in place of real data, so a failed lookup or a bad span
//! produces an inspectable value instead of aborting the caller's traversal.

use std::collections::BTreeMap;

use bytes::Bytes;

use super::{TAG_BYTES, TAG_LIST, TAG_MAP, TAG_TEXT};

/// A typed value inside a message block
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    /// UTF-8 text, wire tag 1
    Text(String),
    /// Raw bytes, wire tag 2
    Bytes(Bytes),
    /// Ordered sequence of values, wire tag 3
    List(Vec<Value>),
    /// Key-ordered mapping of values, wire tag 4
    Map(BTreeMap<String, Value>),
    /// Error state: lookup missed or the span was empty
    NotFound,
    /// Error state: the span could not be decoded
    Malformed {
        /// What went wrong with the span
        reason: &'static str,
    },
}

impl Value {
    /// Build a text value
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text(text.into())
    }

    /// Build a byte value
    pub fn bytes(bytes: impl Into<Bytes>) -> Self {
        Self::Bytes(bytes.into())
    }

    /// Wire tag for this variant, if it has one
    #[must_use]
    pub const fn tag(&self) -> Option<u8> {
        match self {
            Self::Text(_) => Some(TAG_TEXT),
            Self::Bytes(_) => Some(TAG_BYTES),
            Self::List(_) => Some(TAG_LIST),
            Self::Map(_) => Some(TAG_MAP),
            Self::NotFound | Self::Malformed { .. } => None,
        }
    }

    /// Whether this value carries an error state instead of data
    #[must_use]
    pub const fn is_err(&self) -> bool {
        matches!(self, Self::NotFound | Self::Malformed { .. })
    }

    /// Whether this value is a list or a map
    #[must_use]
    pub const fn is_composite(&self) -> bool {
        matches!(self, Self::List(_) | Self::Map(_))
    }

    /// Borrow text content, if this is a text value
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Borrow byte content, if this is a byte value
    #[must_use]
    pub fn as_bytes(&self) -> Option<&Bytes> {
        match self {
            Self::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    /// Borrow list items, if this is a list value
    #[must_use]
    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Self::List(items) => Some(items),
            _ => None,
        }
    }

    /// Borrow map entries, if this is a map value
    #[must_use]
    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Value {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for Value {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tags_match_wire_assignment() {
        assert_eq!(Value::text("x").tag(), Some(1));
        assert_eq!(Value::bytes(vec![0u8]).tag(), Some(2));
        assert_eq!(Value::List(vec![]).tag(), Some(3));
        assert_eq!(Value::Map(BTreeMap::new()).tag(), Some(4));
        assert_eq!(Value::NotFound.tag(), None);
    }

    #[test]
    fn test_error_states() {
        assert!(Value::NotFound.is_err());
        assert!(Value::Malformed { reason: "x" }.is_err());
        assert!(!Value::text("ok").is_err());
    }

    #[test]
    fn test_accessors() {
        let v = Value::text("hello");
        assert_eq!(v.as_text(), Some("hello"));
        assert_eq!(v.as_bytes(), None);

        let v = Value::List(vec![Value::text("a")]);
        assert_eq!(v.as_list().map(<[Value]>::len), Some(1));
    }
}
