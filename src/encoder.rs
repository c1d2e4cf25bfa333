//! The encoder (spec.md §4.3): serializes a [`Value`] tree back to bytes.
//!
//! Grounded in the teacher's `minicbor::Encode` impls for
//! `pallas_codec::utils` newtypes (`KeyValuePairs`, `MaybeIndefArray`,
//! `Bytes`): same per-variant dispatch, same "definite unless the source
//! explicitly carried an indefinite marker" rule, reimplemented here
//! directly against this crate's own header-writing primitives instead of
//! delegating to `minicbor::Encoder`.

use crate::error::Error;
use crate::options::{Limits, Options};
use crate::primitives::{self, ArgWidth};
use crate::value::{MapValue, NInt, Simple, UInt, Value};
use num_bigint::BigInt;

const BREAK: u8 = 0xFF;

fn write_header(out: &mut Vec<u8>, major_type: u8, arg: u64) {
    match primitives::narrowest_width(arg) {
        ArgWidth::Direct => out.push((major_type << 5) | (arg as u8)),
        ArgWidth::One => {
            out.push((major_type << 5) | 24);
            out.extend(primitives::write_uint(arg, 1));
        }
        ArgWidth::Two => {
            out.push((major_type << 5) | 25);
            out.extend(primitives::write_uint(arg, 2));
        }
        ArgWidth::Four => {
            out.push((major_type << 5) | 26);
            out.extend(primitives::write_uint(arg, 4));
        }
        ArgWidth::Eight => {
            out.push((major_type << 5) | 27);
            out.extend(primitives::write_uint(arg, 8));
        }
    }
}

fn write_indefinite_header(out: &mut Vec<u8>, major_type: u8) {
    out.push((major_type << 5) | 31);
}

/// Mirrors [`crate::decoder::Decoder`]'s own recursion guard and output
/// accounting so a caller-constructed `Value` tree can't blow the stack or
/// produce unbounded output any more than a decoded one could (spec.md
/// §4.3 "Recursion guard").
struct Encoder<'o> {
    options: &'o Options,
    limits: &'o Limits,
    output_used: usize,
}

impl<'o> Encoder<'o> {
    fn check_depth(&self, path: &str, depth: usize) -> Result<(), Error> {
        if depth >= self.limits.max_depth {
            return Err(unsupported(
                path,
                &format!("nesting depth exceeded max_depth ({})", self.limits.max_depth),
            ));
        }
        Ok(())
    }

    fn charge_output(&mut self, path: &str, out: &[u8]) -> Result<(), Error> {
        self.output_used = out.len();
        if self.output_used > self.limits.max_output_size {
            return Err(unsupported(
                path,
                &format!(
                    "encoded output of {} byte(s) exceeded max_output_size ({})",
                    self.output_used, self.limits.max_output_size
                ),
            ));
        }
        Ok(())
    }

    fn encode_item(&mut self, value: &Value, out: &mut Vec<u8>, path: String, depth: usize) -> Result<(), Error> {
        match value {
            Value::Unsigned(UInt::U64(v)) => {
                write_header(out, 0, *v);
                Ok(())
            }
            Value::Unsigned(UInt::Big(n)) => {
                write_header(out, 6, 2);
                let bytes = primitives::write_biguint(n);
                write_header(out, 2, bytes.len() as u64);
                out.extend(bytes);
                Ok(())
            }
            Value::Negative(NInt::I128(v)) => {
                let magnitude = (-1i128 - v) as u64;
                write_header(out, 1, magnitude);
                Ok(())
            }
            Value::Negative(NInt::Big(v)) => {
                write_header(out, 6, 3);
                let magnitude = (-BigInt::from(1) - v)
                    .to_biguint()
                    .ok_or_else(|| unsupported(&path, "negative bignum magnitude must be non-negative"))?;
                let bytes = primitives::write_biguint(&magnitude);
                write_header(out, 2, bytes.len() as u64);
                out.extend(bytes);
                Ok(())
            }
            Value::Bytes(b) => {
                if !self.options.validate_canonical && self.options.allow_indefinite && b.indefinite {
                    let chunks = b.chunks.as_ref().ok_or_else(|| {
                        unsupported(&path, "indefinite byte string missing its chunk list")
                    })?;
                    write_indefinite_header(out, 2);
                    for chunk in chunks {
                        write_header(out, 2, chunk.len() as u64);
                        out.extend(chunk);
                    }
                    out.push(BREAK);
                } else {
                    write_header(out, 2, b.value.len() as u64);
                    out.extend(&b.value);
                }
                self.charge_output(&path, out)
            }
            Value::Text(t) => {
                if !self.options.validate_canonical && self.options.allow_indefinite && t.indefinite {
                    let chunks = t.chunks.as_ref().ok_or_else(|| {
                        unsupported(&path, "indefinite text string missing its chunk list")
                    })?;
                    write_indefinite_header(out, 3);
                    for chunk in chunks {
                        write_header(out, 3, chunk.len() as u64);
                        out.extend(chunk);
                    }
                    out.push(BREAK);
                } else {
                    let bytes = t.value.as_bytes();
                    write_header(out, 3, bytes.len() as u64);
                    out.extend(bytes);
                }
                self.charge_output(&path, out)
            }
            Value::Array(a) => {
                self.check_depth(&path, depth)?;
                if !self.options.validate_canonical && self.options.allow_indefinite && a.indefinite {
                    write_indefinite_header(out, 4);
                    for (i, item) in a.items.iter().enumerate() {
                        self.encode_item(item, out, format!("{path}[{i}]"), depth + 1)?;
                        self.charge_output(&path, out)?;
                    }
                    out.push(BREAK);
                } else {
                    write_header(out, 4, a.items.len() as u64);
                    for (i, item) in a.items.iter().enumerate() {
                        self.encode_item(item, out, format!("{path}[{i}]"), depth + 1)?;
                        self.charge_output(&path, out)?;
                    }
                }
                Ok(())
            }
            Value::Map(m) => self.encode_map(m, out, &path, depth),
            Value::Tag(t) => {
                self.check_depth(&path, depth)?;
                write_header(out, 6, t.number);
                self.encode_item(&t.content, out, format!("{path}.value"), depth + 1)
            }
            Value::Float(v) => {
                if let Some(bits) = primitives::f64_to_f16_bits_exact(*v) {
                    out.push((7 << 5) | 25);
                    out.extend(primitives::write_uint(bits as u64, 2));
                } else if let Some(bits) = primitives::f64_to_f32_bits_exact(*v) {
                    out.push((7 << 5) | 26);
                    out.extend(primitives::write_uint(bits as u64, 4));
                } else {
                    out.push((7 << 5) | 27);
                    out.extend(primitives::write_uint(v.to_bits(), 8));
                }
                Ok(())
            }
            Value::Simple(s) => encode_simple(*s, &path, out),
        }
    }

    fn encode_map(&mut self, m: &MapValue, out: &mut Vec<u8>, path: &str, depth: usize) -> Result<(), Error> {
        self.check_depth(path, depth)?;

        if (self.options.validate_canonical || self.options.reject_duplicate_keys) && m.has_duplicates() {
            return Err(unsupported(path, "duplicate map key under canonical encoding"));
        }

        if self.options.validate_canonical {
            let mut keyed: Vec<(Vec<u8>, &(Value, Value))> = m
                .entries
                .iter()
                .map(|entry| Ok((encode_canonical_key_bytes(&entry.0)?, entry)))
                .collect::<Result<_, Error>>()?;
            keyed.sort_by(|a, b| primitives::compare_bytes(&a.0, &b.0));
            write_header(out, 5, keyed.len() as u64);
            for (_, (k, v)) in keyed {
                self.encode_item(k, out, format!("{path}#key"), depth + 1)?;
                let value_path = crate::sourcemap::map_value_path(path, k, 0);
                self.encode_item(v, out, value_path, depth + 1)?;
                self.charge_output(path, out)?;
            }
            return Ok(());
        }

        if m.indefinite && self.options.allow_indefinite {
            write_indefinite_header(out, 5);
            for (k, v) in &m.all_entries {
                self.encode_item(k, out, format!("{path}#key"), depth + 1)?;
                self.encode_item(v, out, format!("{path}#value"), depth + 1)?;
                self.charge_output(path, out)?;
            }
            out.push(BREAK);
        } else {
            write_header(out, 5, m.all_entries.len() as u64);
            for (k, v) in &m.all_entries {
                self.encode_item(k, out, format!("{path}#key"), depth + 1)?;
                self.encode_item(v, out, format!("{path}#value"), depth + 1)?;
                self.charge_output(path, out)?;
            }
        }
        Ok(())
    }
}

/// Encodes a single data item under `options`/`limits`. `limits` bounds
/// the same two things it bounds on decode: nesting depth and total
/// output size (spec.md §4.3 "Recursion guard"). There is no time bound
/// here, since encoding a caller-built tree has no adversarial byte
/// stream to stall on.
pub fn encode(value: &Value, options: &Options, limits: &Limits) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut enc = Encoder {
        options,
        limits,
        output_used: 0,
    };
    enc.encode_item(value, &mut out, String::new(), 0)?;
    Ok(out)
}

/// Encodes a slice of top-level items back-to-back (RFC 8742 CBOR
/// Sequence), the encode-side counterpart of [`crate::decoder::parse_sequence`].
pub fn encode_sequence(values: &[Value], options: &Options, limits: &Limits) -> Result<Vec<u8>, Error> {
    let mut out = Vec::new();
    let mut enc = Encoder {
        options,
        limits,
        output_used: 0,
    };
    for (i, v) in values.iter().enumerate() {
        enc.encode_item(v, &mut out, format!("[{i}]"), 0)?;
    }
    Ok(out)
}

/// Canonical encoding of a map key alone, used by the decoder to check
/// key ordering (RFC 8949 §4.2.1) and by this module's own canonical map
/// encoding to sort entries. Always uses canonical form regardless of the
/// caller's `Options`, since "canonical key order" is defined in terms of
/// the key's own deterministic encoding, not the enclosing map's mode. A
/// single key is never deep enough to need the caller's own `Limits`, so
/// this uses the default ceiling rather than threading one through.
pub(crate) fn encode_canonical_key_bytes(key: &Value) -> Result<Vec<u8>, Error> {
    let mut canonical = Options::default();
    canonical.validate_canonical = true;
    let limits = Limits::default();
    let mut out = Vec::new();
    let mut enc = Encoder {
        options: &canonical,
        limits: &limits,
        output_used: 0,
    };
    enc.encode_item(key, &mut out, String::new(), 0)?;
    Ok(out)
}

fn encode_simple(simple: Simple, path: &str, out: &mut Vec<u8>) -> Result<(), Error> {
    match simple {
        Simple::False => out.push((7 << 5) | 20),
        Simple::True => out.push((7 << 5) | 21),
        Simple::Null => out.push((7 << 5) | 22),
        Simple::Undefined => out.push((7 << 5) | 23),
        Simple::Other(n) if n <= 19 => out.push((7 << 5) | n),
        Simple::Other(n) if n >= 32 => {
            out.push((7 << 5) | 24);
            out.push(n);
        }
        Simple::Other(n) => {
            return Err(unsupported(
                path,
                &format!("simple value {n} falls in the reserved 20..=31 range"),
            ))
        }
    }
    Ok(())
}

fn unsupported(path: &str, reason: &str) -> Error {
    Error::UnsupportedValue {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder;
    use crate::value::{ByteString, TextString};

    fn encode_default(value: &Value, options: &Options) -> Result<Vec<u8>, Error> {
        encode(value, options, &Limits::default())
    }

    #[test]
    fn encodes_small_uint_directly() {
        let bytes = encode_default(&Value::unsigned(10), &Options::permissive()).unwrap();
        assert_eq!(bytes, vec![0x0a]);
    }

    #[test]
    fn encodes_narrowest_width_for_large_uint() {
        let bytes = encode_default(&Value::unsigned(100), &Options::permissive()).unwrap();
        assert_eq!(bytes, hex::decode("1864").unwrap());
    }

    #[test]
    fn encodes_negative_integer() {
        let bytes = encode_default(&Value::Negative(NInt::I128(-2)), &Options::permissive()).unwrap();
        assert_eq!(bytes, vec![0x21]);
    }

    #[test]
    fn round_trips_through_decode_and_encode() {
        let original = hex::decode("83010203").unwrap();
        let (value, _) = decoder::parse(&original, &Options::permissive(), &Limits::default()).unwrap();
        let re_encoded = encode_default(&value, &Options::permissive()).unwrap();
        assert_eq!(original, re_encoded);
    }

    #[test]
    fn canonical_map_sorts_keys() {
        let map = crate::value::MapValue::from_all_entries(
            vec![
                (Value::unsigned(10), Value::text("b")),
                (Value::unsigned(2), Value::text("a")),
            ],
            false,
        );
        let bytes = encode_default(&Value::Map(map), &Options::strict()).unwrap();
        let (decoded, _) = decoder::parse(&bytes, &Options::permissive(), &Limits::default()).unwrap();
        match decoded {
            Value::Map(m) => {
                assert_eq!(m.all_entries[0].0, Value::unsigned(2));
                assert_eq!(m.all_entries[1].0, Value::unsigned(10));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn canonical_encoding_rejects_duplicate_keys_instead_of_silently_deduping() {
        let map = crate::value::MapValue::from_all_entries(
            vec![
                (Value::unsigned(1), Value::text("first")),
                (Value::unsigned(1), Value::text("second")),
            ],
            false,
        );
        let err = encode_default(&Value::Map(map), &Options::strict()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { .. }));
    }

    #[test]
    fn reject_duplicate_keys_flag_rejects_even_outside_canonical_mode() {
        let map = crate::value::MapValue::from_all_entries(
            vec![
                (Value::unsigned(1), Value::text("first")),
                (Value::unsigned(1), Value::text("second")),
            ],
            false,
        );
        let options = Options {
            reject_duplicate_keys: true,
            ..Options::permissive()
        };
        let err = encode_default(&Value::Map(map), &options).unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { .. }));
    }

    #[test]
    fn allow_indefinite_false_collapses_indefinite_forms_outside_canonical_mode() {
        let b = ByteString {
            value: vec![0x01, 0x02],
            indefinite: true,
            chunks: Some(vec![vec![0x01, 0x02]]),
        };
        let options = Options {
            allow_indefinite: false,
            ..Options::permissive()
        };
        let bytes = encode_default(&Value::Bytes(b), &options).unwrap();
        assert_eq!(bytes, hex::decode("420102").unwrap());
    }

    #[test]
    fn preserves_indefinite_byte_string_chunks_when_not_canonical() {
        let b = ByteString {
            value: vec![0x01, 0x02, 0x03, 0x04, 0x05],
            indefinite: true,
            chunks: Some(vec![vec![0x01, 0x02], vec![0x03, 0x04, 0x05]]),
        };
        let bytes = encode_default(&Value::Bytes(b), &Options::permissive()).unwrap();
        assert_eq!(bytes, hex::decode("5f42010243030405ff").unwrap());
    }

    #[test]
    fn collapses_indefinite_to_definite_under_canonical() {
        let b = ByteString {
            value: vec![0x01, 0x02],
            indefinite: true,
            chunks: Some(vec![vec![0x01, 0x02]]),
        };
        let bytes = encode_default(&Value::Bytes(b), &Options::strict()).unwrap();
        assert_eq!(bytes, hex::decode("420102").unwrap());
    }

    #[test]
    fn float_picks_narrowest_exact_width() {
        let bytes = encode_default(&Value::Float(1.5), &Options::permissive()).unwrap();
        assert_eq!(bytes[0] >> 5, 7);
        assert_eq!(bytes[0] & 0x1f, 25);
        assert_eq!(bytes.len(), 3);
    }

    #[test]
    fn reserved_simple_value_is_rejected() {
        let err = encode_default(&Value::Simple(Simple::Other(25)), &Options::permissive()).unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { .. }));
    }

    #[test]
    fn encodes_definite_array_and_text() {
        let value = Value::array(vec![Value::Text(TextString::definite("IETF".to_string()))]);
        let bytes = encode_default(&value, &Options::permissive()).unwrap();
        assert_eq!(bytes, hex::decode("816449455446").unwrap());
    }

    #[test]
    fn deeply_nested_array_trips_depth_exceeded_instead_of_recursing_unbounded() {
        let mut value = Value::array(vec![]);
        for _ in 0..10 {
            value = Value::array(vec![value]);
        }
        let limits = Limits {
            max_depth: 5,
            ..Limits::default()
        };
        let err = encode(&value, &Options::permissive(), &limits).unwrap_err();
        assert!(matches!(err, Error::UnsupportedValue { .. }));
    }
}
