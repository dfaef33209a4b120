//! Map view over a message block
//!
//! A [`MsgMap`] is the in-memory authoring and inspection form of a message
//! block: an ordered mapping of field name to [`Value`] that always carries
//! the block identifier under the reserved `"MsgId"` key. It is the only
//! path by which structured list/map values enter a serialized block.

use std::collections::BTreeMap;
use std::ops::{Deref, DerefMut};

use bytes::Bytes;
use tracing::debug;

use super::{Error, ID_HEX_LEN, MSG_ID_KEY, MessageBlock, Result, Value};
use crate::ident;

/// Ordered field-name-to-value form of a message block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MsgMap(BTreeMap<String, Value>);

impl MsgMap {
    /// Create a map holding only a freshly generated identifier
    #[must_use]
    pub fn new() -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(MSG_ID_KEY.to_owned(), Value::Text(ident::block_id()));
        Self(entries)
    }

    /// Build a map view from a serialized block
    ///
    /// Empty input yields a map containing only a fresh identifier. Anything
    /// else is parsed and validated as a [`MessageBlock`], and every
    /// top-level field is decoded through the value codec.
    pub fn from_block(raw: &[u8]) -> Result<Self> {
        if raw.is_empty() {
            return Ok(Self::new());
        }

        let block = MessageBlock::from_bytes(raw.to_vec())?;
        block.validate()?;

        let mut entries = BTreeMap::new();
        for (key, value) in block.raw_fields()? {
            let key = String::from_utf8(key.to_vec()).map_err(|_| Error::Malformed {
                reason: "field key is not valid UTF-8",
            })?;
            entries.insert(key, value);
        }
        entries.insert(MSG_ID_KEY.to_owned(), Value::text(block.id()));
        Ok(Self(entries))
    }

    /// Serialize the map to a message block's wire form
    ///
    /// Every non-reserved entry is first screened by the cycle guard, then
    /// encoded at its arena cursor; the identifier comes from the `"MsgId"`
    /// entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingOrBadId`] when the identifier entry is absent
    /// or is not 64 hex characters of text, [`Error::SelfReferential`] when
    /// the guard trips, or [`Error::Malformed`] when a value cannot be
    /// encoded. No bytes are produced on error.
    pub fn to_block(&self) -> Result<Bytes> {
        let id = match self.0.get(MSG_ID_KEY) {
            Some(Value::Text(id)) if id.len() == ID_HEX_LEN && hex::decode(id).is_ok() => id,
            _ => return Err(Error::MissingOrBadId),
        };

        let mut fields = Vec::with_capacity(self.0.len().saturating_sub(1));
        for (key, value) in self.0.iter().filter(|(k, _)| *k != MSG_ID_KEY) {
            check_cycles(value, &mut Vec::new(), &self.0)?;
            fields.push((Bytes::copy_from_slice(key.as_bytes()), value.clone()));
        }

        debug!(id = %id, fields = fields.len(), "serializing map view");
        MessageBlock::assemble(id, &fields)?.to_bytes()
    }

    /// The identifier entry, if present and textual
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        self.0.get(MSG_ID_KEY).and_then(Value::as_text)
    }

    /// Insert a field, converting the value on the way in
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }
}

impl Deref for MsgMap {
    type Target = BTreeMap<String, Value>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl DerefMut for MsgMap {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.0
    }
}

impl From<BTreeMap<String, Value>> for MsgMap {
    fn from(entries: BTreeMap<String, Value>) -> Self {
        Self(entries)
    }
}

/// Reject value trees that contain themselves before any bytes are written.
///
/// Walks composites depth-first carrying the ancestor chain; a node that is
/// structurally equal to an ancestor, or a map equal to the top-level
/// mapping, fails with [`Error::SelfReferential`]. Equality is deep and
/// structural, so this is conservative: a tree of exclusively owned values
/// cannot alias an ancestor, but blocks authored through equal snapshots of
/// the surrounding structure are still refused, matching the wire format's
/// inability to express shared substructure.
fn check_cycles<'a>(
    value: &'a Value,
    chain: &mut Vec<&'a Value>,
    root: &BTreeMap<String, Value>,
) -> Result<()> {
    if let Value::Map(entries) = value {
        if entries == root {
            return Err(Error::SelfReferential);
        }
    }
    if !value.is_composite() {
        return Ok(());
    }
    if chain.iter().any(|ancestor| *ancestor == value) {
        return Err(Error::SelfReferential);
    }

    chain.push(value);
    match value {
        Value::List(items) => {
            for item in items {
                check_cycles(item, chain, root)?;
            }
        }
        Value::Map(entries) => {
            for (key, entry) in entries {
                if key == MSG_ID_KEY {
                    continue;
                }
                check_cycles(entry, chain, root)?;
            }
        }
        _ => unreachable!("only composites are pushed onto the chain"),
    }
    chain.pop();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_fresh_id() {
        let mm = MsgMap::from_block(&[]).unwrap();
        assert_eq!(mm.len(), 1);

        let id = mm.id().unwrap();
        assert_eq!(id.len(), 64);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_empty_map_serializes_to_bare_header() {
        let mm = MsgMap::new();
        let block = mm.to_block().unwrap();
        assert_eq!(block.len(), 48);
        // declared payload length is zero
        assert_eq!(&block[40..48], &0u64.to_be_bytes());
    }

    #[test]
    fn test_roundtrip_with_structured_fields() {
        let mut mm = MsgMap::new();
        mm.set("name", "alice");
        mm.set("raw", vec![0xde_u8, 0xad]);
        mm.set(
            "items",
            Value::List(vec![Value::text("a"), Value::bytes(vec![0x01, 0x02])]),
        );
        let mut nested = BTreeMap::new();
        nested.insert("inner".to_owned(), Value::text("deep"));
        mm.set("tree", Value::Map(nested));

        let bytes = mm.to_block().unwrap();
        let parsed = MsgMap::from_block(&bytes).unwrap();
        assert_eq!(parsed, mm);
    }

    #[test]
    fn test_missing_id_is_rejected() {
        let mut mm = MsgMap::new();
        mm.remove(MSG_ID_KEY);
        assert!(matches!(mm.to_block(), Err(Error::MissingOrBadId)));
    }

    #[test]
    fn test_short_id_is_rejected() {
        let mut mm = MsgMap::new();
        mm.set(MSG_ID_KEY, "abc123");
        assert!(matches!(mm.to_block(), Err(Error::MissingOrBadId)));
    }

    #[test]
    fn test_non_hex_id_is_rejected() {
        let mut mm = MsgMap::new();
        mm.set(MSG_ID_KEY, "z".repeat(64));
        assert!(matches!(mm.to_block(), Err(Error::MissingOrBadId)));
    }

    #[test]
    fn test_error_state_field_aborts_serialization() {
        let mut mm = MsgMap::new();
        mm.set("broken", Value::NotFound);
        assert!(matches!(mm.to_block(), Err(Error::Malformed { .. })));
    }

    #[test]
    fn test_guard_trips_on_map_equal_to_root() {
        // Exclusive ownership makes a true reference cycle unrepresentable,
        // so the guard is exercised directly with the one shape that can
        // trip it: a child map structurally equal to the root mapping.
        let mut root = BTreeMap::new();
        root.insert("a".to_owned(), Value::text("x"));

        let child = Value::Map(root.clone());
        assert!(matches!(
            check_cycles(&child, &mut Vec::new(), &root),
            Err(Error::SelfReferential)
        ));
    }

    #[test]
    fn test_guard_trips_on_child_equal_to_ancestor() {
        let ancestor = Value::List(vec![Value::text("loop")]);
        let child = ancestor.clone();
        let root = BTreeMap::new();

        let mut chain = vec![&ancestor];
        assert!(matches!(
            check_cycles(&child, &mut chain, &root),
            Err(Error::SelfReferential)
        ));
    }

    #[test]
    fn test_equal_sibling_subtrees_are_allowed() {
        // Known deep-equality artifact: only ancestors are compared, so two
        // equal, independently constructed subtrees at sibling positions
        // must encode fine.
        let mut mm = MsgMap::new();
        let twin = Value::List(vec![Value::text("same")]);
        mm.set("left", twin.clone());
        mm.set("right", twin);

        let bytes = mm.to_block().unwrap();
        let parsed = MsgMap::from_block(&bytes).unwrap();
        assert_eq!(parsed.get("left"), parsed.get("right"));
    }
}
