//! A bidirectional codec for the Concise Binary Object Representation wire
//! format (RFC 8949), with first-class support for the Cardano dialect
//! (Plutus constructor tags, CIP-style validation presets) and an auxiliary
//! source-map feature that links every decoded value back to the exact
//! byte range that produced it.
//!
//! The public surface mirrors the four function shapes a codec like this
//! needs:
//!
//! - [`decode`] / [`decode_with_source_map`] / [`decode_sequence`] for the
//!   byte-stream-to-tree direction.
//! - [`encode`] / [`encode_sequence`] for the reverse.
//!
//! Both directions are driven by [`Options`] (validation/canonical-form
//! switches) and, for decoding, [`Limits`] (resource ceilings). Three
//! presets cover the common cases: [`Options::strict`], [`Options::cardano`],
//! and [`Options::permissive`].
//!
//! This crate has no I/O, no threads, and no global state: every call owns
//! its input (borrowed) and produces an owned result. See
//! [`options::DuplicateKeyObserver`] for the one place a caller can inject
//! a side channel (non-fatal duplicate-map-key warnings).

pub mod decoder;
pub mod encoder;
pub mod error;
pub mod options;
pub mod primitives;
pub mod sourcemap;
pub mod tags;
pub mod value;

pub use num_bigint;

pub use error::{Error, Result};
pub use options::{DupMapKeyPolicy, DuplicateKeyObserver, Limits, Options};
pub use sourcemap::{SourceMap, SourceMapEntry};
pub use value::{
    ArrayValue, ByteString, MapValue, NInt, PlutusConstr, Simple, TagValue, TextString, UInt,
    Value,
};

/// Decodes a hex string into bytes. RFC 8949 doesn't define a hex
/// encoding itself; this is the `InvalidHex` collaborator spec.md §6
/// names as external to the core, wired through the `hex` crate rather
/// than a hand-rolled table (same crate the teacher uses for its own
/// `Bytes` newtype).
pub fn hex_decode(input: &str) -> Result<Vec<u8>> {
    hex::decode(input).map_err(|e| Error::InvalidHex {
        reason: e.to_string(),
    })
}

/// Encodes bytes as a lowercase hex string.
pub fn hex_encode(input: &[u8]) -> String {
    hex::encode(input)
}

/// Decodes a single top-level CBOR data item from `input`, returning the
/// value and the number of bytes consumed. Trailing bytes are not an
/// error; use [`decode_sequence`] when the whole buffer must parse as a
/// sequence.
#[tracing::instrument(level = "debug", skip(input, options, limits), fields(input_len = input.len()))]
pub fn decode(input: &[u8], options: &Options, limits: &Limits) -> Result<(Value, usize)> {
    let result = decoder::parse(input, options, limits);
    if let Err(err) = &result {
        tracing::debug!(error = %err, "decode failed");
    }
    result
}

/// Like [`decode`], but also returns the byte-range [`SourceMap`] built as
/// a side effect of the decode (spec.md §4.5).
#[tracing::instrument(level = "debug", skip(input, options, limits), fields(input_len = input.len()))]
pub fn decode_with_source_map(
    input: &[u8],
    options: &Options,
    limits: &Limits,
) -> Result<(Value, usize, SourceMap)> {
    decoder::parse_with_source_map(input, options, limits)
}

/// Decodes `input` as a concatenated sequence of top-level data items
/// (RFC 8742 CBOR Sequences), consuming every byte.
#[tracing::instrument(level = "debug", skip(input, options, limits), fields(input_len = input.len()))]
pub fn decode_sequence(input: &[u8], options: &Options, limits: &Limits) -> Result<Vec<Value>> {
    decoder::parse_sequence(input, options, limits)
}

/// Encodes a single [`Value`] as bytes plus its hex rendering. `limits`
/// bounds nesting depth and output size the same way it bounds decoding
/// (spec.md §4.3).
#[tracing::instrument(level = "debug", skip(value, options, limits))]
pub fn encode(value: &Value, options: &Options, limits: &Limits) -> Result<(Vec<u8>, String)> {
    let bytes = encoder::encode(value, options, limits)?;
    let hex = hex_encode(&bytes);
    Ok((bytes, hex))
}

/// Encodes a slice of top-level values back-to-back (RFC 8742 CBOR
/// Sequence) plus the hex rendering of the concatenated bytes.
#[tracing::instrument(level = "debug", skip(values, options, limits), fields(count = values.len()))]
pub fn encode_sequence(values: &[Value], options: &Options, limits: &Limits) -> Result<(Vec<u8>, String)> {
    let bytes = encoder::encode_sequence(values, options, limits)?;
    let hex = hex_encode(&bytes);
    Ok((bytes, hex))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trips() {
        let bytes = hex_decode("83010203").unwrap();
        assert_eq!(hex_encode(&bytes), "83010203");
    }

    #[test]
    fn invalid_hex_is_rejected() {
        assert!(hex_decode("not-hex").is_err());
    }

    #[test]
    fn top_level_decode_then_encode_round_trips() {
        let bytes = hex_decode("83010203").unwrap();
        let (value, consumed) = decode(&bytes, &Options::permissive(), &Limits::default()).unwrap();
        assert_eq!(consumed, bytes.len());
        let (re_encoded, _) = encode(&value, &Options::permissive(), &Limits::default()).unwrap();
        assert_eq!(re_encoded, bytes);
    }
}
