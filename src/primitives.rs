//! Byte-level building blocks: big-endian integer I/O, byte ordering,
//! strict UTF-8 validation, canonical-length checks, and IEEE-754 half/
//! single/double float conversion.
//!
//! Everything here is pure and allocation-free except where the return
//! type itself needs to own bytes (`write_uint`, `write_biguint`).

use crate::error::Error;
use num_bigint::BigUint;

/// Initial byte of a data item: `(major_type, additional_info)`.
pub fn extract_header(byte: u8) -> (u8, u8) {
    (byte >> 5, byte & 0x1f)
}

/// Reads an `n`-byte (`n` ∈ {1,2,4,8}) big-endian unsigned integer from
/// `buf` starting at `off`.
pub fn read_uint(buf: &[u8], off: usize, n: usize) -> Result<u64, Error> {
    let bytes = read_slice(buf, off, n)?;
    let mut acc = 0u64;
    for b in bytes {
        acc = (acc << 8) | (*b as u64);
    }
    Ok(acc)
}

/// Reads an `n`-byte big-endian unsigned integer of arbitrary width, used
/// for bignum tag payloads (tags 2/3) where `n` is not restricted to a
/// power-of-two width.
pub fn read_biguint(buf: &[u8], off: usize, n: usize) -> Result<BigUint, Error> {
    let bytes = read_slice(buf, off, n)?;
    Ok(BigUint::from_bytes_be(bytes))
}

fn read_slice(buf: &[u8], off: usize, n: usize) -> Result<&[u8], Error> {
    let end = off.checked_add(n).ok_or(Error::OutOfBounds {
        offset: off,
        len: n,
        input_len: buf.len(),
    })?;
    if end > buf.len() {
        return Err(Error::OutOfBounds {
            offset: off,
            len: n,
            input_len: buf.len(),
        });
    }
    Ok(&buf[off..end])
}

/// Encodes `val` as an `n`-byte (`n` ∈ {1,2,4,8}) big-endian unsigned
/// integer.
pub fn write_uint(val: u64, n: usize) -> Vec<u8> {
    let full = val.to_be_bytes();
    full[full.len() - n..].to_vec()
}

/// Encodes `val` as a minimal-length big-endian byte string (at least one
/// byte, no leading zero padding beyond that), used for bignum tag
/// payloads.
pub fn write_biguint(val: &BigUint) -> Vec<u8> {
    let bytes = val.to_bytes_be();
    if bytes.is_empty() {
        vec![0]
    } else {
        bytes
    }
}

/// Byte lexicographic comparison used for the canonical CBOR key
/// ordering: shorter length first, then lexicographic.
pub fn compare_bytes(a: &[u8], b: &[u8]) -> std::cmp::Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// The minimum argument width (in the `{direct,1,2,4,8}` sense) that
/// fits `value`. `direct` means the value was carried in `additional_info`
/// itself (0..=23).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgWidth {
    Direct,
    One,
    Two,
    Four,
    Eight,
}

impl ArgWidth {
    pub fn byte_len(self) -> usize {
        match self {
            ArgWidth::Direct => 0,
            ArgWidth::One => 1,
            ArgWidth::Two => 2,
            ArgWidth::Four => 4,
            ArgWidth::Eight => 8,
        }
    }
}

/// Narrowest width that can carry `value` losslessly.
pub fn narrowest_width(value: u64) -> ArgWidth {
    if value <= 23 {
        ArgWidth::Direct
    } else if value <= u8::MAX as u64 {
        ArgWidth::One
    } else if value <= u16::MAX as u64 {
        ArgWidth::Two
    } else if value <= u32::MAX as u64 {
        ArgWidth::Four
    } else {
        ArgWidth::Eight
    }
}

/// Validates that `additional_info` is the minimum-width encoding of
/// `value` (spec.md §4.1 `validate_canonical_integer`). `offset` is the
/// position of the initial byte, used only for error reporting.
pub fn validate_canonical_integer(
    value: u64,
    additional_info: u8,
    offset: usize,
) -> Result<(), Error> {
    let actual = match additional_info {
        0..=23 => ArgWidth::Direct,
        24 => ArgWidth::One,
        25 => ArgWidth::Two,
        26 => ArgWidth::Four,
        27 => ArgWidth::Eight,
        _ => {
            return Err(Error::ReservedAdditionalInfo {
                offset,
                additional_info,
            })
        }
    };

    let minimal = narrowest_width(value);
    if actual != minimal {
        return Err(Error::NonCanonical {
            offset,
            reason: format!(
                "value {value} encoded with width {actual:?}, minimum is {minimal:?}"
            ),
        });
    }

    Ok(())
}

/// Strict UTF-8 validator per spec.md §4.1. Rejects overlong encodings,
/// surrogate code points, out-of-range code points, truncated sequences,
/// and malformed continuation bytes. `base_offset` is added to every
/// reported byte offset so callers can report positions relative to the
/// whole input rather than the start of this string.
pub fn validate_utf8_strict(bytes: &[u8], base_offset: usize) -> Result<(), Error> {
    let mut i = 0usize;
    let len = bytes.len();

    while i < len {
        let b0 = bytes[i];

        let (seq_len, min_cp, mut cp): (usize, u32, u32) = if b0 < 0x80 {
            (1, 0, b0 as u32)
        } else if b0 == 0xC0 || b0 == 0xC1 {
            return Err(invalid_utf8(base_offset + i, "overlong 2-byte start byte"));
        } else if (0xC2..=0xDF).contains(&b0) {
            (2, 0x80, (b0 & 0x1F) as u32)
        } else if (0xE0..=0xEF).contains(&b0) {
            (3, 0x800, (b0 & 0x0F) as u32)
        } else if (0xF0..=0xF4).contains(&b0) {
            (4, 0x1_0000, (b0 & 0x07) as u32)
        } else {
            return Err(invalid_utf8(base_offset + i, "invalid start byte"));
        };

        if i + seq_len > len {
            return Err(invalid_utf8(base_offset + i, "truncated sequence"));
        }

        for cont in &bytes[i + 1..i + seq_len] {
            if cont & 0xC0 != 0x80 {
                return Err(invalid_utf8(
                    base_offset + i,
                    "continuation byte does not start with 0b10",
                ));
            }
            cp = (cp << 6) | (*cont & 0x3F) as u32;
        }

        if cp < min_cp {
            return Err(invalid_utf8(base_offset + i, "overlong encoding"));
        }
        if (0xD800..=0xDFFF).contains(&cp) {
            return Err(invalid_utf8(base_offset + i, "surrogate code point"));
        }
        if cp > 0x10_FFFF {
            return Err(invalid_utf8(base_offset + i, "code point above U+10FFFF"));
        }

        i += seq_len;
    }

    Ok(())
}

fn invalid_utf8(offset: usize, reason: &str) -> Error {
    Error::InvalidUtf8 {
        offset,
        reason: reason.to_string(),
    }
}

/// Converts an IEEE-754 half-precision bit pattern to `f64`.
pub fn f16_bits_to_f64(bits: u16) -> f64 {
    half::f16::from_bits(bits).to_f64()
}

/// Converts an IEEE-754 single-precision bit pattern to `f64`.
pub fn f32_bits_to_f64(bits: u32) -> f64 {
    f32::from_bits(bits) as f64
}

/// Returns the half-precision bit pattern for `v` if the conversion is
/// exact (round-trips back to the same `f64`, NaN always considered
/// exact so any NaN can be emitted in the narrowest width).
pub fn f64_to_f16_bits_exact(v: f64) -> Option<u16> {
    if v.is_nan() {
        return Some(half::f16::NAN.to_bits());
    }
    let h = half::f16::from_f64(v);
    if h.to_f64() == v {
        Some(h.to_bits())
    } else {
        None
    }
}

/// Returns the single-precision bit pattern for `v` if the conversion is
/// exact.
pub fn f64_to_f32_bits_exact(v: f64) -> Option<u32> {
    if v.is_nan() {
        return Some(f32::NAN.to_bits());
    }
    let f = v as f32;
    if f as f64 == v {
        Some(f.to_bits())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_splits_major_and_additional() {
        assert_eq!(extract_header(0b000_11000), (0, 24));
        assert_eq!(extract_header(0xff), (7, 31));
    }

    #[test]
    fn uint_round_trips_each_width() {
        for (n, val) in [(1usize, 0x12u64), (2, 0x1234), (4, 0x1234_5678), (8, u64::MAX)] {
            let bytes = write_uint(val, n);
            assert_eq!(read_uint(&bytes, 0, n).unwrap(), val);
        }
    }

    #[test]
    fn compare_bytes_orders_by_length_then_lex() {
        assert_eq!(compare_bytes(b"aa", b"b"), std::cmp::Ordering::Greater);
        assert_eq!(compare_bytes(b"a", b"b"), std::cmp::Ordering::Less);
        assert_eq!(compare_bytes(b"ab", b"ab"), std::cmp::Ordering::Equal);
    }

    #[test]
    fn canonical_integer_rejects_wider_than_needed() {
        // value 10 should be direct (additional_info == value), not width 1.
        assert!(validate_canonical_integer(10, 24, 0).is_err());
        assert!(validate_canonical_integer(10, 10, 0).is_ok());
        assert!(validate_canonical_integer(256, 25, 0).is_ok());
        assert!(validate_canonical_integer(256, 26, 0).is_err());
    }

    #[test]
    fn utf8_rejects_overlong_and_surrogates() {
        assert!(validate_utf8_strict(&[0xC0, 0x80], 0).is_err());
        assert!(validate_utf8_strict(&[0xED, 0xA0, 0x80], 0).is_err());
        assert!(validate_utf8_strict(&[0xF4, 0x90, 0x80, 0x80], 0).is_err());
        assert!(validate_utf8_strict("IETF".as_bytes(), 0).is_ok());
    }

    #[test]
    fn utf8_rejects_truncated_sequence() {
        assert!(validate_utf8_strict(&[0xE2, 0x82], 0).is_err());
    }

    #[test]
    fn half_float_round_trip() {
        let bits = f64_to_f16_bits_exact(1.5).unwrap();
        assert_eq!(f16_bits_to_f64(bits), 1.5);
        assert!(f64_to_f16_bits_exact(0.1).is_none());
    }
}
