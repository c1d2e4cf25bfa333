//! The closed error set shared by [`crate::decoder`] and [`crate::encoder`].

use thiserror::Error;

/// Everything that can go wrong decoding or encoding a CBOR data item.
///
/// Decode errors carry the byte offset where the problem was detected;
/// encode errors carry the value-tree path instead, since there is no
/// byte stream yet to point into.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("input is not valid hex: {reason}")]
    InvalidHex { reason: String },

    #[error("read of {len} byte(s) at offset {offset} exceeds input of {input_len} byte(s)")]
    OutOfBounds {
        offset: usize,
        len: usize,
        input_len: usize,
    },

    #[error("truncated item at offset {offset}: {reason}")]
    Truncated { offset: usize, reason: String },

    #[error("reserved additional info {additional_info} at offset {offset}")]
    ReservedAdditionalInfo { offset: usize, additional_info: u8 },

    #[error("break code (0xff) outside an indefinite-length container at offset {offset}")]
    BreakMisuse { offset: usize },

    #[error("indefinite or mismatched-type chunk inside indefinite string at offset {offset}")]
    NestedIndefinite { offset: usize },

    #[error("invalid utf-8 at byte offset {offset}: {reason}")]
    InvalidUtf8 { offset: usize, reason: String },

    #[error("non-canonical encoding at offset {offset}: {reason}")]
    NonCanonical { offset: usize, reason: String },

    #[error("duplicate map key at offset {offset}")]
    DuplicateMapKey { offset: usize },

    #[error("tag {tag} semantics violated at offset {offset}: {reason}")]
    TagSemantics {
        offset: usize,
        tag: u64,
        reason: String,
    },

    #[error("tag 258 set elements are not pairwise distinct (offset {offset})")]
    SetUniqueness { offset: usize },

    #[error("bignum payload of {len} byte(s) at offset {offset} exceeds max_bignum_bytes ({max})")]
    BignumTooLarge {
        offset: usize,
        len: usize,
        max: usize,
    },

    #[error("nesting depth exceeded max_depth ({max}) at offset {offset}")]
    DepthExceeded { offset: usize, max: usize },

    #[error("tag nesting depth exceeded max_tag_depth ({max}) at offset {offset}")]
    TagDepthExceeded { offset: usize, max: usize },

    #[error("{what} of {found} exceeded its limit of {limit} at offset {offset}")]
    SizeExceeded {
        offset: usize,
        what: &'static str,
        limit: usize,
        found: usize,
    },

    #[error("parse exceeded max_parse_time of {limit_ms}ms (elapsed {elapsed_ms}ms)")]
    Timeout { limit_ms: u64, elapsed_ms: u64 },

    #[error("cannot encode value at path '{path}': {reason}")]
    UnsupportedValue { path: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
