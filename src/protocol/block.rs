//! Message block container
//!
//! A [`MessageBlock`] owns the two wire buffers of one message: the header
//! (identifier, declared lengths, and the fixed-width field index) and the
//! flat payload arena. Every public read or mutation re-validates the header
//! before trusting any stored offset.
//!
//! Mutations never patch buffers partially: each one assembles replacement
//! buffers first and swaps them in wholesale, so a failed operation leaves
//! the block exactly as it was.

use bytes::Bytes;
use tracing::{debug, trace};

use super::codec::{decode, encode, read_u64, write_u64};
use super::{
    Error, FIXED_HEADER_SIZE, ID_HEX_LEN, ID_SIZE, INDEX_ENTRY_SIZE, Result, Value,
};
use crate::ident;

/// One parsed header index entry
#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    key_start: u64,
    key_end: u64,
    val_start: u64,
    val_end: u64,
}

/// A self-describing binary message block
///
/// # Wire Format
///
/// ```text
/// offset 0..32   : raw id (32 bytes)
/// offset 32..40  : header length H (big-endian u64)
/// offset 40..48  : payload length P (big-endian u64)
/// offset 48..H   : (H-48)/32 index entries, 32 bytes each:
///                  [keyStart(8) keyEnd(8) valStart(8) valEnd(8)]
/// offset H..H+P  : payload bytes (key bytes + tagged value bytes per entry)
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageBlock {
    /// Identifier as 64 lowercase hex characters
    id: String,
    /// Fixed prefix plus the field index
    header: Bytes,
    /// Flat arena of key bytes and encoded value bytes
    payload: Bytes,
}

impl MessageBlock {
    /// Create an empty block with a fresh random identifier
    #[must_use]
    pub fn new() -> Self {
        let id = ident::block_id();
        let id_bytes = hex::decode(&id).expect("generated id is valid hex");

        let mut header = Vec::with_capacity(FIXED_HEADER_SIZE);
        header.extend_from_slice(&id_bytes);
        header.extend_from_slice(&(FIXED_HEADER_SIZE as u64).to_be_bytes());
        header.extend_from_slice(&0u64.to_be_bytes());

        Self {
            id,
            header: Bytes::from(header),
            payload: Bytes::new(),
        }
    }

    /// Parse a block from its serialized form
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidLength`] if the buffer is shorter than the
    /// fixed header or its declared lengths exceed the buffer.
    pub fn from_bytes(raw: impl Into<Bytes>) -> Result<Self> {
        let raw = raw.into();
        if raw.len() < FIXED_HEADER_SIZE {
            return Err(Error::InvalidLength {
                needed: FIXED_HEADER_SIZE,
                got: raw.len(),
            });
        }

        let header_len = read_u64(&raw, ID_SIZE);
        if header_len < FIXED_HEADER_SIZE as u64 || header_len > raw.len() as u64 {
            return Err(Error::InvalidLength {
                needed: header_len as usize,
                got: raw.len(),
            });
        }
        let payload_len = read_u64(&raw, ID_SIZE + 8);
        if payload_len > raw.len() as u64 - header_len {
            return Err(Error::InvalidLength {
                needed: (header_len + payload_len) as usize,
                got: raw.len(),
            });
        }

        Ok(Self {
            id: hex::encode(&raw[..ID_SIZE]),
            header: raw.slice(..header_len as usize),
            payload: raw.slice(header_len as usize..(header_len + payload_len) as usize),
        })
    }

    /// Parse a block from its hex transport form
    pub fn from_hex(text: &str) -> Result<Self> {
        Self::from_bytes(hex::decode(text.trim())?)
    }

    /// Identifier as 64 lowercase hex characters
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Number of top-level fields
    #[must_use]
    pub fn len(&self) -> usize {
        self.header.len().saturating_sub(FIXED_HEADER_SIZE) / INDEX_ENTRY_SIZE
    }

    /// Whether the block carries no fields
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Re-check every structural invariant of the header and payload
    ///
    /// Called by every public read and mutation before any stored offset is
    /// trusted.
    ///
    /// # Errors
    ///
    /// Returns the specific invariant that failed: [`Error::BadIdLength`],
    /// [`Error::IdMismatch`], [`Error::BadHeaderLength`],
    /// [`Error::BadPayloadLength`], [`Error::UnalignedHeader`],
    /// [`Error::BadKeyIndex`], or [`Error::BadValIndex`].
    pub fn validate(&self) -> Result<()> {
        if self.id.len() != ID_HEX_LEN {
            return Err(Error::BadIdLength {
                got: self.id.len(),
            });
        }
        if self.header.len() < FIXED_HEADER_SIZE {
            return Err(Error::BadHeaderLength {
                declared: FIXED_HEADER_SIZE as u64,
                actual: self.header.len(),
            });
        }
        if hex::encode(&self.header[..ID_SIZE]) != self.id {
            return Err(Error::IdMismatch);
        }

        let header_len = read_u64(&self.header, ID_SIZE);
        if header_len != self.header.len() as u64 {
            return Err(Error::BadHeaderLength {
                declared: header_len,
                actual: self.header.len(),
            });
        }
        let payload_len = read_u64(&self.header, ID_SIZE + 8);
        if payload_len != self.payload.len() as u64 {
            return Err(Error::BadPayloadLength {
                declared: payload_len,
                actual: self.payload.len(),
            });
        }

        let index_len = header_len - FIXED_HEADER_SIZE as u64;
        if index_len % INDEX_ENTRY_SIZE as u64 != 0 {
            return Err(Error::UnalignedHeader { size: index_len });
        }
        for i in 0..self.len() {
            let entry = self.entry(i);
            if entry.key_end < entry.key_start {
                return Err(Error::BadKeyIndex { entry: i as u64 });
            }
            if entry.val_end < entry.val_start {
                return Err(Error::BadValIndex { entry: i as u64 });
            }
        }
        Ok(())
    }

    /// Look up a top-level field
    ///
    /// Failures are reported in-band: a miss yields [`Value::NotFound`] and a
    /// block that fails validation yields [`Value::Malformed`], so lookups
    /// never abort the caller.
    #[must_use]
    pub fn get(&self, key: &str) -> Value {
        if self.validate().is_err() {
            return Value::Malformed {
                reason: "block failed validation",
            };
        }
        match self.find(key.as_bytes()) {
            Some((_, entry)) => decode(&self.payload, entry.val_start, entry.val_end),
            None => Value::NotFound,
        }
    }

    /// Set a top-level field to a text or byte value
    ///
    /// An existing value that shrinks is overwritten in place inside the
    /// payload arena; one that grows forces the arena to be re-assembled so
    /// that every stored offset stays accurate. Structured list/map values
    /// only enter a block through [`MsgMap`](super::MsgMap).
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedType`] for list, map, or error-state
    /// values, or a validation error if the block is structurally broken.
    /// The block is unchanged on error.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        if !matches!(value, Value::Text(_) | Value::Bytes(_)) {
            return Err(Error::UnsupportedType);
        }
        self.validate()?;

        let encoded = encode(&value, 0)?;
        let Some((slot, entry)) = self.find(key.as_bytes()) else {
            return self.append(key, &encoded);
        };

        let old_len = entry.val_end - entry.val_start;
        // the in-place path needs the old span to really sit inside the
        // arena; a block with an out-of-range span goes through re-assembly,
        // which surfaces the broken entry as a decode error
        let fits = encoded.len() as u64 <= old_len && entry.val_end <= self.payload.len() as u64;
        if fits {
            trace!(key, new_len = encoded.len(), old_len, "overwriting field in place");
            self.overwrite(slot, entry, &encoded);
            Ok(())
        } else {
            trace!(key, new_len = encoded.len(), old_len, "field grew, re-assembling arena");
            let mut fields = self.raw_fields()?;
            fields[slot].1 = value;
            self.reassemble(&fields)
        }
    }

    /// Delete a top-level field
    ///
    /// Removing an absent key is an Ok no-op that leaves the block bytes
    /// untouched. Removing a present key re-assembles the arena so the
    /// offsets of the surviving fields stay accurate.
    pub fn remove(&mut self, key: &str) -> Result<()> {
        self.validate()?;
        let Some((slot, _)) = self.find(key.as_bytes()) else {
            return Ok(());
        };
        debug!(key, "removing field");
        let mut fields = self.raw_fields()?;
        fields.remove(slot);
        self.reassemble(&fields)
    }

    /// Serialize to the wire form: `header ++ payload`
    pub fn to_bytes(&self) -> Result<Bytes> {
        self.validate()?;
        let mut out = Vec::with_capacity(self.header.len() + self.payload.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(&self.payload);
        Ok(Bytes::from(out))
    }

    /// Serialize to the lowercase hex transport form
    pub fn to_hex(&self) -> Result<String> {
        Ok(hex::encode(self.to_bytes()?))
    }

    /// Decoded top-level field keys, in index order
    ///
    /// # Errors
    ///
    /// Returns [`Error::Malformed`] if any key span falls outside the payload
    /// or is not valid UTF-8, besides the usual validation errors.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.validate()?;
        (0..self.len())
            .map(|i| {
                let bytes = self.key_bytes(self.entry(i))?;
                String::from_utf8(bytes.to_vec()).map_err(|_| Error::Malformed {
                    reason: "field key is not valid UTF-8",
                })
            })
            .collect()
    }

    /// Decode every top-level field as `(key bytes, value)`, in index order.
    pub(crate) fn raw_fields(&self) -> Result<Vec<(Bytes, Value)>> {
        (0..self.len())
            .map(|i| {
                let entry = self.entry(i);
                let key = self.key_bytes(entry)?;
                Ok((key, decode(&self.payload, entry.val_start, entry.val_end)))
            })
            .collect()
    }

    /// Assemble a block from an identifier and already-authored fields.
    ///
    /// Fields land in the payload arena in the given order, key bytes first,
    /// value bytes at the cursor just past them.
    pub(crate) fn assemble(id: &str, fields: &[(Bytes, Value)]) -> Result<Self> {
        if id.len() != ID_HEX_LEN {
            return Err(Error::BadIdLength { got: id.len() });
        }
        let id_bytes = hex::decode(id)?;

        let mut header = Vec::with_capacity(FIXED_HEADER_SIZE + INDEX_ENTRY_SIZE * fields.len());
        header.extend_from_slice(&id_bytes);
        header.extend_from_slice(&[0u8; 16]);

        let mut payload = Vec::new();
        let mut cursor = 0u64;
        for (key, value) in fields {
            let key_start = cursor;
            let key_end = key_start + key.len() as u64;
            let val_start = key_end;
            let val_bytes = encode(value, val_start)?;
            let val_end = val_start + val_bytes.len() as u64;
            cursor = val_end;

            for offset in [key_start, key_end, val_start, val_end] {
                header.extend_from_slice(&offset.to_be_bytes());
            }
            payload.extend_from_slice(key);
            payload.extend_from_slice(&val_bytes);
        }

        let header_len = header.len() as u64;
        write_u64(&mut header, ID_SIZE, header_len);
        write_u64(&mut header, ID_SIZE + 8, payload.len() as u64);

        Ok(Self {
            id: id.to_owned(),
            header: Bytes::from(header),
            payload: Bytes::from(payload),
        })
    }

    fn entry(&self, slot: usize) -> IndexEntry {
        let fp = FIXED_HEADER_SIZE + INDEX_ENTRY_SIZE * slot;
        IndexEntry {
            key_start: read_u64(&self.header, fp),
            key_end: read_u64(&self.header, fp + 8),
            val_start: read_u64(&self.header, fp + 16),
            val_end: read_u64(&self.header, fp + 24),
        }
    }

    fn key_bytes(&self, entry: IndexEntry) -> Result<Bytes> {
        if entry.key_end > self.payload.len() as u64 {
            return Err(Error::Malformed {
                reason: "key span outside payload",
            });
        }
        Ok(self
            .payload
            .slice(entry.key_start as usize..entry.key_end as usize))
    }

    /// Linear scan of the index for a field whose key bytes match.
    fn find(&self, key: &[u8]) -> Option<(usize, IndexEntry)> {
        (0..self.len()).map(|i| (i, self.entry(i))).find(|(_, e)| {
            e.key_end <= self.payload.len() as u64
                && &self.payload[e.key_start as usize..e.key_end as usize] == key
        })
    }

    /// Replace a value whose encoding fits inside its old span.
    ///
    /// Payload length is unchanged; only the matched entry's `valEnd`
    /// shrinks, leaving any stale tail bytes unindexed inside the arena.
    fn overwrite(&mut self, slot: usize, entry: IndexEntry, encoded: &[u8]) {
        let val_start = entry.val_start as usize;
        let mut payload = self.payload.to_vec();
        payload[val_start..val_start + encoded.len()].copy_from_slice(encoded);

        let mut header = self.header.to_vec();
        let fp = FIXED_HEADER_SIZE + INDEX_ENTRY_SIZE * slot;
        write_u64(&mut header, fp + 24, entry.val_start + encoded.len() as u64);

        self.payload = Bytes::from(payload);
        self.header = Bytes::from(header);
    }

    /// Append a brand-new field at the end of the arena.
    fn append(&mut self, key: &str, encoded: &[u8]) -> Result<()> {
        let old_payload_len = self.payload.len() as u64;
        let key_start = old_payload_len;
        let key_end = key_start + key.len() as u64;
        let val_end = key_end + encoded.len() as u64;
        trace!(key, val_end, "appending new field");

        let mut payload = self.payload.to_vec();
        payload.extend_from_slice(key.as_bytes());
        payload.extend_from_slice(encoded);

        let mut header = self.header.to_vec();
        for offset in [key_start, key_end, key_end, val_end] {
            header.extend_from_slice(&offset.to_be_bytes());
        }
        let header_len = header.len() as u64;
        write_u64(&mut header, ID_SIZE, header_len);
        write_u64(&mut header, ID_SIZE + 8, val_end);

        self.payload = Bytes::from(payload);
        self.header = Bytes::from(header);
        Ok(())
    }

    /// Rebuild header and payload from decoded fields after a structural
    /// mutation, so every index entry and nested offset table is recomputed.
    fn reassemble(&mut self, fields: &[(Bytes, Value)]) -> Result<()> {
        let rebuilt = Self::assemble(&self.id, fields)?;
        self.header = rebuilt.header;
        self.payload = rebuilt.payload;
        Ok(())
    }
}

impl Default for MessageBlock {
    fn default() -> Self {
        Self::new()
    }
}
