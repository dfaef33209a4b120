//! Message block core implementation
//!
//! This module provides the wire format, the value model, and the codec for
//! self-describing message blocks.

mod block;
mod codec;
mod error;
mod map;
mod value;

pub use block::MessageBlock;
pub use codec::{decode, encode};
pub use error::{Error, Result};
pub use map::MsgMap;
pub use value::Value;

/// Raw identifier size in bytes
pub const ID_SIZE: usize = 32;

/// Identifier size in hex characters
pub const ID_HEX_LEN: usize = 2 * ID_SIZE;

/// Fixed header prefix: id (32) + header length (8) + payload length (8)
pub const FIXED_HEADER_SIZE: usize = 48;

/// Size of one header index entry: four big-endian u64 offsets
pub const INDEX_ENTRY_SIZE: usize = 32;

/// Size of one list item index pair inside an encoded list value
pub const LIST_ENTRY_SIZE: usize = 16;

/// Wire tag for text values
pub const TAG_TEXT: u8 = 1;

/// Wire tag for raw byte values
pub const TAG_BYTES: u8 = 2;

/// Wire tag for list values
pub const TAG_LIST: u8 = 3;

/// Wire tag for map values
pub const TAG_MAP: u8 = 4;

/// Reserved map key carrying the block identifier; never encoded as an entry
pub const MSG_ID_KEY: &str = "MsgId";
