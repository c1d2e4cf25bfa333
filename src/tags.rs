//! The tag engine (spec.md §4.4): validates tag semantics for the RFC
//! 8949 standard tags this crate cares about and for the Cardano/Plutus
//! dialect, and performs the bignum (tags 2/3) and Plutus constructor
//! (tags 102, 121–127, 1280–1400) structural conversions.
//!
//! Grounded in `pallas_primitives::plutus_data`'s `PlutusData`/`BigInt`
//! decode impls (`txpipe-pallas`): the constructor-index arithmetic
//! (`tag - 121`, `(tag - 1280) + 7`, tag 102's `[uint, array]` shape) and
//! the tag-2/tag-3 byte-string-to-integer conversion mirror that code's
//! `minicbor` `Decode` impls, reimplemented here against this crate's own
//! `Value` tree instead of delegating to `minicbor`.

use crate::error::Error;
use crate::options::Limits;
use crate::value::{structural_eq, ArrayValue, NInt, PlutusConstr, UInt, Value};
use num_bigint::{BigInt, BigUint};

pub const TAG_DATETIME: u64 = 0;
pub const TAG_EPOCH: u64 = 1;
pub const TAG_BIGNUM_POS: u64 = 2;
pub const TAG_BIGNUM_NEG: u64 = 3;
pub const TAG_DECIMAL_FRACTION: u64 = 4;
pub const TAG_BIGFLOAT: u64 = 5;
pub const TAG_URI: u64 = 32;
pub const TAG_BASE64URL: u64 = 33;
pub const TAG_BASE64: u64 = 34;
pub const TAG_REGEX: u64 = 35;
pub const TAG_MIME: u64 = 36;
pub const TAG_SET: u64 = 258;
pub const TAG_PLUTUS_COMPACT: u64 = 102;

fn is_plutus_compact_short(tag: u64) -> bool {
    (121..=127).contains(&tag)
}

fn is_plutus_compact_long(tag: u64) -> bool {
    (1280..=1400).contains(&tag)
}

pub fn is_plutus_tag(tag: u64) -> bool {
    tag == TAG_PLUTUS_COMPACT || is_plutus_compact_short(tag) || is_plutus_compact_long(tag)
}

/// Converts a bignum tag's byte-string content into the replacement
/// `Value` the whole tagged item collapses into, per spec.md §3.2: a tag
/// 2 item becomes `Unsigned(n)`, a tag 3 item becomes `Negative(-1-n)`.
/// Returns `Ok(None)` for any tag number that isn't 2 or 3.
pub fn apply_bignum(
    tag: u64,
    content: &Value,
    offset: usize,
    limits: &Limits,
) -> Result<Option<Value>, Error> {
    if tag != TAG_BIGNUM_POS && tag != TAG_BIGNUM_NEG {
        return Ok(None);
    }

    let bytes = match content {
        Value::Bytes(b) => &b.value,
        _ => {
            return Err(Error::TagSemantics {
                offset,
                tag,
                reason: "bignum tag content must be a byte string".to_string(),
            })
        }
    };

    if bytes.len() > limits.max_bignum_bytes {
        return Err(Error::BignumTooLarge {
            offset,
            len: bytes.len(),
            max: limits.max_bignum_bytes,
        });
    }

    let n = BigUint::from_bytes_be(bytes);
    if tag == TAG_BIGNUM_POS {
        Ok(Some(Value::Unsigned(shrink_uint(n))))
    } else {
        let neg = -BigInt::from(1u8) - BigInt::from(n);
        Ok(Some(Value::Negative(shrink_nint(neg))))
    }
}

fn shrink_uint(n: BigUint) -> UInt {
    match u64::try_from(&n) {
        Ok(v) => UInt::U64(v),
        Err(_) => UInt::Big(n),
    }
}

fn shrink_nint(n: BigInt) -> NInt {
    match i128::try_from(&n) {
        Ok(v) => NInt::I128(v),
        Err(_) => NInt::Big(n),
    }
}

/// Validates the content-type constraints for the RFC 8949 standard tags
/// spec.md §4.4 enumerates (0, 1, 4, 5, 32–36, 258). Only called when
/// `validate_tag_semantics` (or, for 258, `validate_set_uniqueness`) is
/// enabled; absent that, a tag with unrecognized or loosely-typed content
/// is passed through unchanged rather than rejected.
pub fn validate_tag_semantics(tag: u64, content: &Value, offset: usize) -> Result<(), Error> {
    match tag {
        TAG_DATETIME => match content {
            Value::Text(t) if is_rfc3339(&t.value) => Ok(()),
            _ => Err(semantics_err(tag, offset, "content must be an RFC 3339 text string")),
        },
        TAG_EPOCH => match content {
            Value::Unsigned(_) | Value::Negative(_) | Value::Float(_) => Ok(()),
            _ => Err(semantics_err(tag, offset, "content must be an integer or float")),
        },
        TAG_DECIMAL_FRACTION | TAG_BIGFLOAT => match content {
            Value::Array(a) if a.items.len() == 2 => {
                let both_ints = a
                    .items
                    .iter()
                    .all(|v| matches!(v, Value::Unsigned(_) | Value::Negative(_)));
                if both_ints {
                    Ok(())
                } else {
                    Err(semantics_err(
                        tag,
                        offset,
                        "[exponent, mantissa] elements must both be integers",
                    ))
                }
            }
            _ => Err(semantics_err(tag, offset, "content must be a 2-element array")),
        },
        TAG_URI => match content {
            Value::Text(t) if has_uri_scheme(&t.value) => Ok(()),
            _ => Err(semantics_err(tag, offset, "content must be a URI text string")),
        },
        TAG_BASE64URL | TAG_BASE64 | TAG_REGEX | TAG_MIME => match content {
            Value::Text(_) => Ok(()),
            _ => Err(semantics_err(tag, offset, "content must be a text string")),
        },
        TAG_SET => match content {
            Value::Array(_) => Ok(()),
            _ => Err(semantics_err(tag, offset, "content must be an array")),
        },
        _ => Ok(()),
    }
}

/// Tag 258 (`Set`): when `validate_set_uniqueness` is enabled, its content
/// must be an array whose elements are pairwise structurally distinct.
pub fn validate_set(array: &ArrayValue, offset: usize) -> Result<(), Error> {
    for i in 0..array.items.len() {
        for j in (i + 1)..array.items.len() {
            if structural_eq(&array.items[i], &array.items[j]) {
                return Err(Error::SetUniqueness { offset });
            }
        }
    }
    Ok(())
}

/// Decodes the Plutus constructor/field shape out of a tag's content,
/// per spec.md §3.2: `tag - 121` for 121..=127, `(tag - 1280) + 7` for
/// 1280..=1400, and `content[0]` for tag 102 whose content must be
/// `[uint, array]`. `enforce` corresponds to `validate_plutus_semantics`:
/// when false, a structurally mismatched content just yields `None`
/// instead of an error.
pub fn decode_plutus(
    tag: u64,
    content: &Value,
    offset: usize,
    enforce: bool,
) -> Result<Option<PlutusConstr>, Error> {
    if !is_plutus_tag(tag) {
        return Ok(None);
    }

    if is_plutus_compact_short(tag) || is_plutus_compact_long(tag) {
        let constructor = if is_plutus_compact_short(tag) {
            (tag - 121) as u32
        } else {
            ((tag - 1280) + 7) as u32
        };

        return match content {
            Value::Array(a) => Ok(Some(PlutusConstr {
                constructor,
                fields: a.items.clone(),
            })),
            _ if enforce => Err(semantics_err(tag, offset, "content must be an array")),
            _ => Ok(None),
        };
    }

    // tag 102: content must be [uint, array]
    match content {
        Value::Array(a) if a.items.len() == 2 => {
            let constructor = match &a.items[0] {
                Value::Unsigned(UInt::U64(v)) if *v <= u32::MAX as u64 => Some(*v as u32),
                _ => None,
            };
            let fields = match &a.items[1] {
                Value::Array(inner) => Some(inner.items.clone()),
                _ => None,
            };
            match (constructor, fields) {
                (Some(constructor), Some(fields)) => Ok(Some(PlutusConstr { constructor, fields })),
                _ if enforce => Err(semantics_err(
                    tag,
                    offset,
                    "content must be [uint, array] with the uint fitting in 32 bits",
                )),
                _ => Ok(None),
            }
        }
        _ if enforce => Err(semantics_err(tag, offset, "content must be a 2-element [uint, array]")),
        _ => Ok(None),
    }
}

fn semantics_err(tag: u64, offset: usize, reason: &str) -> Error {
    Error::TagSemantics {
        offset,
        tag,
        reason: reason.to_string(),
    }
}

/// `^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d+)?(Z|[+-]\d{2}:\d{2})?$`,
/// hand-matched rather than pulled in via a regex dependency since it's
/// one fixed, simple grammar.
fn is_rfc3339(s: &str) -> bool {
    let b = s.as_bytes();

    fn digits(b: &[u8], from: usize, n: usize) -> bool {
        from + n <= b.len() && b[from..from + n].iter().all(|c| c.is_ascii_digit())
    }

    if b.len() < 19 || !digits(b, 0, 4) || b[4] != b'-' || !digits(b, 5, 2) || b[7] != b'-' {
        return false;
    }
    if !digits(b, 8, 2) || b[10] != b'T' || !digits(b, 11, 2) || b[13] != b':' {
        return false;
    }
    if !digits(b, 14, 2) || b[16] != b':' || !digits(b, 17, 2) {
        return false;
    }

    let mut i = 19;

    if i < b.len() && b[i] == b'.' {
        i += 1;
        let start = i;
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return false;
        }
    }

    if i == b.len() {
        return true;
    }

    if b[i] == b'Z' {
        return i + 1 == b.len();
    }

    if b[i] == b'+' || b[i] == b'-' {
        return b.len() == i + 6
            && digits(b, i + 1, 2)
            && b[i + 3] == b':'
            && digits(b, i + 4, 2);
    }

    false
}

/// `scheme ":"` where `scheme = ALPHA *(ALPHA / DIGIT / "+" / "-" / ".")`
/// (RFC 3986 §3.1, as referenced for tag 32).
fn has_uri_scheme(s: &str) -> bool {
    let Some(colon) = s.find(':') else {
        return false;
    };
    let scheme = &s[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}
