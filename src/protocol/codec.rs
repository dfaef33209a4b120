//! Value codec (encode/decode)
//!
//! Encoded values live in one flat payload arena. A composite value does not
//! physically nest its children; it stores an index table of absolute offset
//! spans into the arena, and the child bytes follow the table. Decoding
//! therefore always resolves offsets against the single top-level payload
//! buffer, and encoding must know the absolute position its output will
//! occupy before any child index can be written.

use bytes::Bytes;

use super::{
    Error, INDEX_ENTRY_SIZE, LIST_ENTRY_SIZE, MSG_ID_KEY, Result, TAG_BYTES, TAG_LIST, TAG_MAP,
    TAG_TEXT, Value,
};

/// Tag byte plus the 8-byte big-endian child count
const COMPOSITE_PREFIX: usize = 9;

/// Nesting depth past which decoding gives up
///
/// The index tables store absolute offsets, so a crafted buffer can chain
/// spans indefinitely without ever repeating one. The visited-span check
/// catches exact offset cycles; this cap bounds the rest.
const MAX_DECODE_DEPTH: usize = 128;

pub(crate) fn read_u64(bytes: &[u8], at: usize) -> u64 {
    u64::from_be_bytes(bytes[at..at + 8].try_into().unwrap())
}

pub(crate) fn write_u64(bytes: &mut [u8], at: usize, value: u64) {
    bytes[at..at + 8].copy_from_slice(&value.to_be_bytes());
}

/// Decode the value stored at `payload[start..end]`
///
/// `start` and `end` are absolute offsets into the top-level payload arena.
/// Failures are reported in-band: a bad span yields [`Value::Malformed`] and
/// an empty one yields [`Value::NotFound`], so one broken entry never aborts
/// the caller's traversal of its siblings.
#[must_use]
pub fn decode(payload: &Bytes, start: u64, end: u64) -> Value {
    decode_guarded(payload, start, end, &mut Vec::new())
}

/// Recursive decode carrying the chain of composite spans currently being
/// decoded, so an index entry that points back into an ancestor's span is
/// rejected instead of recursing forever.
fn decode_guarded(payload: &Bytes, start: u64, end: u64, chain: &mut Vec<(u64, u64)>) -> Value {
    if start > end || end > payload.len() as u64 {
        return Value::Malformed {
            reason: "value span outside payload",
        };
    }
    if chain.contains(&(start, end)) {
        return Value::Malformed {
            reason: "self-referential value span",
        };
    }
    if chain.len() >= MAX_DECODE_DEPTH {
        return Value::Malformed {
            reason: "value nesting exceeds depth limit",
        };
    }
    let span = payload.slice(start as usize..end as usize);
    if span.is_empty() {
        return Value::NotFound;
    }

    match span[0] {
        TAG_TEXT => match std::str::from_utf8(&span[1..]) {
            Ok(text) => Value::Text(text.to_owned()),
            Err(_) => Value::Malformed {
                reason: "text value is not valid UTF-8",
            },
        },
        TAG_BYTES => Value::Bytes(span.slice(1..)),
        TAG_LIST => {
            chain.push((start, end));
            let value = decode_list(payload, &span, chain);
            chain.pop();
            value
        }
        TAG_MAP => {
            chain.push((start, end));
            let value = decode_map(payload, &span, chain);
            chain.pop();
            value
        }
        _ => Value::Malformed {
            reason: "unrecognized value tag",
        },
    }
}

fn decode_list(payload: &Bytes, span: &Bytes, chain: &mut Vec<(u64, u64)>) -> Value {
    if span.len() < COMPOSITE_PREFIX {
        return Value::Malformed {
            reason: "list span too short for item count",
        };
    }
    let count = read_u64(span, 1);
    let table_end = (count as usize)
        .checked_mul(LIST_ENTRY_SIZE)
        .and_then(|table| table.checked_add(COMPOSITE_PREFIX));
    match table_end {
        Some(end) if end <= span.len() => {}
        _ => {
            return Value::Malformed {
                reason: "list index overruns span",
            };
        }
    }

    let mut items = Vec::with_capacity(count as usize);
    for i in 0..count as usize {
        let fp = COMPOSITE_PREFIX + LIST_ENTRY_SIZE * i;
        let item_start = read_u64(span, fp);
        let item_end = read_u64(span, fp + 8);
        items.push(decode_guarded(payload, item_start, item_end, chain));
    }
    Value::List(items)
}

fn decode_map(payload: &Bytes, span: &Bytes, chain: &mut Vec<(u64, u64)>) -> Value {
    if span.len() < COMPOSITE_PREFIX {
        return Value::Malformed {
            reason: "map span too short for entry count",
        };
    }
    let count = read_u64(span, 1);
    let table_end = (count as usize)
        .checked_mul(INDEX_ENTRY_SIZE)
        .and_then(|table| table.checked_add(COMPOSITE_PREFIX));
    match table_end {
        Some(end) if end <= span.len() => {}
        _ => {
            return Value::Malformed {
                reason: "map index overruns span",
            };
        }
    }

    let mut entries = std::collections::BTreeMap::new();
    for i in 0..count as usize {
        let fp = COMPOSITE_PREFIX + INDEX_ENTRY_SIZE * i;
        let key_start = read_u64(span, fp);
        let key_end = read_u64(span, fp + 8);
        let val_start = read_u64(span, fp + 16);
        let val_end = read_u64(span, fp + 24);
        if key_start > key_end || key_end > payload.len() as u64 {
            return Value::Malformed {
                reason: "map key span outside payload",
            };
        }
        let Ok(key) = std::str::from_utf8(&payload[key_start as usize..key_end as usize]) else {
            return Value::Malformed {
                reason: "map key is not valid UTF-8",
            };
        };
        entries.insert(key.to_owned(), decode_guarded(payload, val_start, val_end, chain));
    }
    Value::Map(entries)
}

/// Encode a value for placement at absolute arena offset `cursor`
///
/// The returned bytes are position-dependent for composite values: their
/// index tables store absolute offsets computed from `cursor`, so the caller
/// must splice them into the payload arena at exactly that offset.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if the value (or any descendant) carries an
/// error state instead of data.
pub fn encode(value: &Value, cursor: u64) -> Result<Vec<u8>> {
    match value {
        Value::Text(text) => {
            let mut out = Vec::with_capacity(1 + text.len());
            out.push(TAG_TEXT);
            out.extend_from_slice(text.as_bytes());
            Ok(out)
        }
        Value::Bytes(bytes) => {
            let mut out = Vec::with_capacity(1 + bytes.len());
            out.push(TAG_BYTES);
            out.extend_from_slice(bytes);
            Ok(out)
        }
        Value::List(items) => encode_list(items, cursor),
        Value::Map(entries) => encode_map(entries, cursor),
        Value::NotFound | Value::Malformed { .. } => Err(Error::Malformed {
            reason: "error-state value cannot be encoded",
        }),
    }
}

fn encode_list(items: &[Value], cursor: u64) -> Result<Vec<u8>> {
    let mut out = vec![0u8; COMPOSITE_PREFIX + LIST_ENTRY_SIZE * items.len()];
    out[0] = TAG_LIST;
    write_u64(&mut out, 1, items.len() as u64);

    // children start after the tag, count, and the reserved index table
    let mut cursor = cursor + out.len() as u64;
    for (i, item) in items.iter().enumerate() {
        let item_start = cursor;
        let item_bytes = encode(item, item_start)?;
        let item_end = item_start + item_bytes.len() as u64;
        cursor = item_end;

        let fp = COMPOSITE_PREFIX + LIST_ENTRY_SIZE * i;
        write_u64(&mut out, fp, item_start);
        write_u64(&mut out, fp + 8, item_end);
        out.extend_from_slice(&item_bytes);
    }
    Ok(out)
}

fn encode_map(entries: &std::collections::BTreeMap<String, Value>, cursor: u64) -> Result<Vec<u8>> {
    let count = entries.keys().filter(|k| *k != MSG_ID_KEY).count();
    let mut out = vec![0u8; COMPOSITE_PREFIX + INDEX_ENTRY_SIZE * count];
    out[0] = TAG_MAP;
    write_u64(&mut out, 1, count as u64);

    let mut cursor = cursor + out.len() as u64;
    for (i, (key, val)) in entries
        .iter()
        .filter(|(k, _)| *k != MSG_ID_KEY)
        .enumerate()
    {
        let key_start = cursor;
        let key_end = key_start + key.len() as u64;
        let val_start = key_end;
        let val_bytes = encode(val, val_start)?;
        let val_end = val_start + val_bytes.len() as u64;
        cursor = val_end;

        let fp = COMPOSITE_PREFIX + INDEX_ENTRY_SIZE * i;
        write_u64(&mut out, fp, key_start);
        write_u64(&mut out, fp + 8, key_end);
        write_u64(&mut out, fp + 16, val_start);
        write_u64(&mut out, fp + 24, val_end);
        out.extend_from_slice(key.as_bytes());
        out.extend_from_slice(&val_bytes);
    }
    Ok(out)
}
