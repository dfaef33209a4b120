//! Self-describing binary message blocks
//!
//! A message block is one contiguous byte buffer carrying a 32-byte
//! identifier, a fixed-width structural index, and a tree of typed values
//! (text, bytes, lists, key-ordered maps) laid out in a single flat payload
//! arena addressed by absolute offsets.
//!
//! # Quick Start
//!
//! ```rust
//! use msgblock::{MessageBlock, MsgMap, Value};
//!
//! // Build a block field by field
//! let mut block = MessageBlock::new();
//! block.set("greeting", "hi")?;
//! assert_eq!(block.get("greeting"), Value::text("hi"));
//!
//! // Round-trip through the wire form
//! let bytes = block.to_bytes()?;
//! let parsed = MessageBlock::from_bytes(bytes)?;
//! assert_eq!(parsed.id(), block.id());
//!
//! // Structured values go through the map view
//! let mut map = MsgMap::new();
//! map.set("items", Value::List(vec![Value::text("a"), Value::text("b")]));
//! let wire = map.to_block()?;
//! let restored = MsgMap::from_block(&wire)?;
//! assert_eq!(restored.get("items"), map.get("items"));
//! # Ok::<(), msgblock::Error>(())
//! ```
//!
//! # Format
//!
//! - **Flat arena encoding** - nested values are never physically nested;
//!   every value lives in one payload buffer, located by absolute offsets
//! - **Self-describing** - one leading tag byte per value, fixed-width
//!   big-endian index entries
//! - **Validated access** - every read and mutation re-checks the header
//!   invariants before trusting a stored offset
//! - **Hex transport** - lossless lowercase-hex text form for copy-paste
//!   and file persistence

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod ident;
pub mod protocol;
pub mod store;

pub use protocol::{
    Error, FIXED_HEADER_SIZE, ID_SIZE, INDEX_ENTRY_SIZE, MSG_ID_KEY, MessageBlock, MsgMap, Result,
    Value,
};
