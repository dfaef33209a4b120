//! Message block error types

use thiserror::Error;

/// Message block errors
#[derive(Error, Debug)]
pub enum Error {
    /// Buffer shorter than the fixed header, or declared lengths exceed it
    #[error("invalid block length: need {needed} bytes, got {got}")]
    InvalidLength {
        /// Needed size
        needed: usize,
        /// Actual size
        got: usize,
    },

    /// Identifier is not 64 lowercase hex characters
    #[error("invalid identifier length: expected 64 hex chars, got {got}")]
    BadIdLength {
        /// Found length
        got: usize,
    },

    /// Header id bytes do not match the block identifier
    #[error("header identifier does not match block identifier")]
    IdMismatch,

    /// Declared header length disagrees with the actual header buffer
    #[error("bad header length: declared {declared}, actual {actual}")]
    BadHeaderLength {
        /// Declared length
        declared: u64,
        /// Actual buffer length
        actual: usize,
    },

    /// Declared payload length disagrees with the actual payload buffer
    #[error("bad payload length: declared {declared}, actual {actual}")]
    BadPayloadLength {
        /// Declared length
        declared: u64,
        /// Actual buffer length
        actual: usize,
    },

    /// Header index region is not a whole number of 32-byte entries
    #[error("header index region of {size} bytes is not 32-byte aligned")]
    UnalignedHeader {
        /// Index region size
        size: u64,
    },

    /// A header entry has a key span with end before start
    #[error("header entry {entry} has an inverted key span")]
    BadKeyIndex {
        /// Entry position in the index
        entry: u64,
    },

    /// A header entry has a value span with end before start
    #[error("header entry {entry} has an inverted value span")]
    BadValIndex {
        /// Entry position in the index
        entry: u64,
    },

    /// A value span could not be encoded or decoded
    #[error("malformed value: {reason}")]
    Malformed {
        /// What went wrong with the span
        reason: &'static str,
    },

    /// Only text and byte values may be set as top-level fields directly
    #[error("unsupported value type for this operation")]
    UnsupportedType,

    /// Lookup miss for a top-level key
    #[error("key not found: {key}")]
    NotFound {
        /// The missing key
        key: String,
    },

    /// A value tree contains itself as a descendant
    #[error("self-referential value structure")]
    SelfReferential,

    /// Map view lacks a valid 64-hex-char identifier field
    #[error("missing or malformed MsgId field")]
    MissingOrBadId,

    /// Invalid hex text
    #[error("invalid hex: {0}")]
    InvalidHex(#[from] hex::FromHexError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;
