//! The recursive-descent decoder (spec.md §4.2).
//!
//! Grounded in `pallas_codec::minicbor_cbor_util`-style hand-rolled
//! decoding the teacher layers on top of `minicbor::Decode` impls
//! (`pallas-codec/src/utils.rs`), generalized here into one dispatcher
//! that walks every major type itself rather than delegating per-type
//! decoding to derive macros, since this crate has no schema to derive
//! against, only the raw `Value` tree.

use std::time::Instant;

use crate::encoder;
use crate::error::Error;
use crate::options::{DupMapKeyPolicy, Limits, Options};
use crate::primitives;
use crate::sourcemap::{self, SourceMap, SourceMapBuilder};
use crate::tags;
use crate::value::{
    structural_eq, ArrayValue, ByteString, MapValue, NInt, PlutusConstr, Simple, TagValue,
    TextString, UInt, Value,
};

const BREAK: u8 = 0xFF;

/// The outcome of reading a data item's argument (the bytes following the
/// initial byte that carry its length/value), before the caller decides
/// what to do with it.
#[derive(Clone, Copy)]
enum Arg {
    Value(u64),
    /// additional_info == 31: indefinite length (major types 2–5) or
    /// break code (major type 7). The caller disambiguates by context.
    Indefinite,
}

struct Decoder<'b> {
    input: &'b [u8],
    options: Options,
    limits: Limits,
    started_at: Instant,
    output_used: usize,
    source_map: Option<SourceMapBuilder>,
}

/// Decodes a single CBOR data item from `input`, returning the value and
/// the number of bytes consumed. Trailing bytes are not an error; use
/// [`parse_sequence`] if the whole buffer must be a single sequence of
/// items and trailing garbage should fail.
pub fn parse(input: &[u8], options: &Options, limits: &Limits) -> Result<(Value, usize), Error> {
    let mut dec = Decoder::new(input, options.clone(), *limits)?;
    let (value, end) = dec.decode_item(0, 0, 0, "".to_string(), None)?;
    Ok((value, end))
}

/// Like [`parse`], but also returns the byte-range source map built as a
/// side effect of the decode (spec.md §4.5).
pub fn parse_with_source_map(
    input: &[u8],
    options: &Options,
    limits: &Limits,
) -> Result<(Value, usize, SourceMap), Error> {
    let mut dec = Decoder::new(input, options.clone(), *limits)?;
    dec.source_map = Some(SourceMapBuilder::new());
    let (value, end) = dec.decode_item(0, 0, 0, "".to_string(), None)?;
    let map = dec.source_map.take().unwrap().build();
    Ok((value, end, map))
}

/// Decodes `input` as a concatenated sequence of top-level data items
/// (RFC 8742), consuming every byte. A bare break code at the top level
/// (an unmatched `0xFF`) is an error, same as inside `parse`.
pub fn parse_sequence(input: &[u8], options: &Options, limits: &Limits) -> Result<Vec<Value>, Error> {
    let mut dec = Decoder::new(input, options.clone(), *limits)?;
    let mut items = Vec::new();
    let mut offset = 0usize;
    while offset < input.len() {
        let (value, next) = dec.decode_item(offset, 0, 0, format!("[{}]", items.len()), None)?;
        items.push(value);
        offset = next;
    }
    Ok(items)
}

impl<'b> Decoder<'b> {
    fn new(input: &'b [u8], options: Options, limits: Limits) -> Result<Self, Error> {
        if input.len() > limits.max_input_size {
            return Err(Error::SizeExceeded {
                offset: 0,
                what: "input size",
                limit: limits.max_input_size,
                found: input.len(),
            });
        }
        Ok(Self {
            input,
            options,
            limits,
            started_at: Instant::now(),
            output_used: 0,
            source_map: None,
        })
    }

    fn check_timeout(&self) -> Result<(), Error> {
        let elapsed = self.started_at.elapsed().as_millis() as u64;
        if elapsed > self.limits.max_parse_time_ms {
            return Err(Error::Timeout {
                limit_ms: self.limits.max_parse_time_ms,
                elapsed_ms: elapsed,
            });
        }
        Ok(())
    }

    fn charge_output(&mut self, offset: usize, len: usize) -> Result<(), Error> {
        self.output_used += len;
        if self.output_used > self.limits.max_output_size {
            return Err(Error::SizeExceeded {
                offset,
                what: "decoded output bytes",
                limit: self.limits.max_output_size,
                found: self.output_used,
            });
        }
        Ok(())
    }

    fn byte(&self, offset: usize) -> Result<u8, Error> {
        self.input.get(offset).copied().ok_or(Error::OutOfBounds {
            offset,
            len: 1,
            input_len: self.input.len(),
        })
    }

    /// Reads the byte that would be a break code (0xff) if the indefinite
    /// container ended here. Running out of input at this position means
    /// the container never got its break, which is `Truncated`, not the
    /// generic `OutOfBounds` a plain `self.byte` read would report.
    fn byte_or_truncated(&self, offset: usize) -> Result<u8, Error> {
        self.byte(offset).map_err(|_| Error::Truncated {
            offset,
            reason: "indefinite container lacks its break code".to_string(),
        })
    }

    /// Reads the argument following a header byte whose additional_info is
    /// `ai`, at `arg_offset` (the byte right after the header). Returns the
    /// argument value (or `Arg::Indefinite` for ai == 31) and the number of
    /// bytes the argument itself occupies (0 for direct/indefinite values).
    fn read_arg(&self, header_offset: usize, arg_offset: usize, ai: u8) -> Result<(Arg, usize), Error> {
        match ai {
            0..=23 => Ok((Arg::Value(ai as u64), 0)),
            24 => Ok((Arg::Value(primitives::read_uint(self.input, arg_offset, 1)?), 1)),
            25 => Ok((Arg::Value(primitives::read_uint(self.input, arg_offset, 2)?), 2)),
            26 => Ok((Arg::Value(primitives::read_uint(self.input, arg_offset, 4)?), 4)),
            27 => Ok((Arg::Value(primitives::read_uint(self.input, arg_offset, 8)?), 8)),
            28..=30 => Err(Error::ReservedAdditionalInfo {
                offset: header_offset,
                additional_info: ai,
            }),
            31 => Ok((Arg::Indefinite, 0)),
            _ => unreachable!("additional_info is masked to 5 bits"),
        }
    }

    fn canonical_check(&self, value: u64, ai: u8, offset: usize) -> Result<(), Error> {
        if self.options.validate_canonical {
            primitives::validate_canonical_integer(value, ai, offset)?;
        }
        Ok(())
    }

    /// Decodes one data item starting at `offset`. `depth` counts
    /// array/map nesting only; `tag_depth` counts tag nesting only.
    /// spec.md §4.2 tracks them as independent limits. `path`/`parent_path`
    /// are the source-map coordinates for this item (ignored when no
    /// source map is being built).
    fn decode_item(
        &mut self,
        offset: usize,
        depth: usize,
        tag_depth: usize,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        self.check_timeout()?;

        let header = self.byte(offset)?;
        let (mt, ai) = primitives::extract_header(header);
        let arg_offset = offset + 1;

        match mt {
            0 => self.decode_uint(offset, arg_offset, ai, path, parent_path),
            1 => self.decode_nint(offset, arg_offset, ai, path, parent_path),
            2 => self.decode_bytes(offset, arg_offset, ai, path, parent_path),
            3 => self.decode_text(offset, arg_offset, ai, path, parent_path),
            4 => self.decode_array(offset, arg_offset, ai, depth, tag_depth, path, parent_path),
            5 => self.decode_map(offset, arg_offset, ai, depth, tag_depth, path, parent_path),
            6 => self.decode_tag(offset, arg_offset, ai, depth, tag_depth, path, parent_path),
            7 => self.decode_simple_or_float(offset, arg_offset, ai, path, parent_path),
            _ => unreachable!("major type is masked to 3 bits"),
        }
    }

    fn decode_uint(
        &mut self,
        offset: usize,
        arg_offset: usize,
        ai: u8,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        let (arg, arg_len) = self.read_arg(offset, arg_offset, ai)?;
        let Arg::Value(n) = arg else {
            return Err(Error::ReservedAdditionalInfo {
                offset,
                additional_info: ai,
            });
        };
        self.canonical_check(n, ai, offset)?;
        let end = arg_offset + arg_len;
        self.leaf(path, parent_path, 0, "uint".to_string(), offset, end);
        Ok((Value::Unsigned(UInt::U64(n)), end))
    }

    fn decode_nint(
        &mut self,
        offset: usize,
        arg_offset: usize,
        ai: u8,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        let (arg, arg_len) = self.read_arg(offset, arg_offset, ai)?;
        let Arg::Value(n) = arg else {
            return Err(Error::ReservedAdditionalInfo {
                offset,
                additional_info: ai,
            });
        };
        self.canonical_check(n, ai, offset)?;
        let value = -1i128 - (n as i128);
        let end = arg_offset + arg_len;
        self.leaf(path, parent_path, 1, "nint".to_string(), offset, end);
        Ok((Value::Negative(NInt::I128(value)), end))
    }

    fn decode_bytes(
        &mut self,
        offset: usize,
        arg_offset: usize,
        ai: u8,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        let (arg, arg_len) = self.read_arg(offset, arg_offset, ai)?;
        match arg {
            Arg::Indefinite => {
                if !self.options.allow_indefinite {
                    return Err(Error::NonCanonical {
                        offset,
                        reason: "indefinite-length byte string forbidden".to_string(),
                    });
                }
                let (payload, chunks, end) = self.decode_indefinite_chunks(arg_offset, 2)?;
                self.charge_output(offset, payload.len())?;
                self.leaf(
                    path,
                    parent_path,
                    2,
                    format!("bytes({})", payload.len()),
                    offset,
                    end,
                );
                Ok((
                    Value::Bytes(ByteString {
                        value: payload,
                        indefinite: true,
                        chunks: Some(chunks),
                    }),
                    end,
                ))
            }
            Arg::Value(len) => {
                self.canonical_check(len, ai, offset)?;
                self.check_string_length(offset, len)?;
                let start_payload = arg_offset + arg_len;
                let payload = self.read_payload(start_payload, len as usize)?;
                self.charge_output(offset, payload.len())?;
                let end = start_payload + len as usize;
                self.sized_leaf(path, parent_path, 2, format!("bytes({len})"), offset, start_payload, end);
                Ok((Value::Bytes(ByteString::definite(payload)), end))
            }
        }
    }

    fn decode_text(
        &mut self,
        offset: usize,
        arg_offset: usize,
        ai: u8,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        let (arg, arg_len) = self.read_arg(offset, arg_offset, ai)?;
        match arg {
            Arg::Indefinite => {
                if !self.options.allow_indefinite {
                    return Err(Error::NonCanonical {
                        offset,
                        reason: "indefinite-length text string forbidden".to_string(),
                    });
                }
                let (payload, chunks, end) = self.decode_indefinite_chunks(arg_offset, 3)?;
                self.charge_output(offset, payload.len())?;
                let text = self.bytes_to_text(&payload, offset)?;
                self.leaf(
                    path,
                    parent_path,
                    3,
                    format!("text({})", text.chars().count()),
                    offset,
                    end,
                );
                Ok((
                    Value::Text(TextString {
                        value: text,
                        indefinite: true,
                        chunks: Some(chunks),
                    }),
                    end,
                ))
            }
            Arg::Value(len) => {
                self.canonical_check(len, ai, offset)?;
                self.check_string_length(offset, len)?;
                let start_payload = arg_offset + arg_len;
                let payload = self.read_payload(start_payload, len as usize)?;
                self.charge_output(offset, payload.len())?;
                let text = self.bytes_to_text(&payload, start_payload)?;
                let end = start_payload + len as usize;
                self.sized_leaf(
                    path,
                    parent_path,
                    3,
                    format!("text({})", text.chars().count()),
                    offset,
                    start_payload,
                    end,
                );
                Ok((Value::Text(TextString::definite(text)), end))
            }
        }
    }

    /// Shared indefinite-length chunk loop for bytes (major type 2) and
    /// text (major type 3). Each chunk must be a definite-length item of
    /// the same major type; a chunk that is itself indefinite, or of a
    /// different major type, is a `NestedIndefinite` error (RFC 8949
    /// §3.2.3). Returns the concatenated payload, the raw chunk bytes, and
    /// the offset right after the terminating break.
    fn decode_indefinite_chunks(
        &mut self,
        mut offset: usize,
        expected_mt: u8,
    ) -> Result<(Vec<u8>, Vec<Vec<u8>>, usize), Error> {
        let mut payload = Vec::new();
        let mut chunks = Vec::new();
        loop {
            self.check_timeout()?;
            let b = self.byte_or_truncated(offset)?;
            if b == BREAK {
                offset += 1;
                break;
            }
            let (mt, ai) = primitives::extract_header(b);
            if mt != expected_mt || ai == 31 {
                return Err(Error::NestedIndefinite { offset });
            }
            let (arg, arg_len) = self.read_arg(offset, offset + 1, ai)?;
            let Arg::Value(len) = arg else {
                return Err(Error::NestedIndefinite { offset });
            };
            let chunk_start = offset + 1 + arg_len;
            let chunk = self.read_payload(chunk_start, len as usize)?;
            if self.options.validate_utf8_strict && expected_mt == 3 {
                primitives::validate_utf8_strict(&chunk, chunk_start)?;
            }
            payload.extend_from_slice(&chunk);
            chunks.push(chunk);
            offset = chunk_start + len as usize;
        }
        Ok((payload, chunks, offset))
    }

    fn bytes_to_text(&self, bytes: &[u8], base_offset: usize) -> Result<String, Error> {
        if self.options.validate_utf8_strict {
            primitives::validate_utf8_strict(bytes, base_offset)?;
            Ok(String::from_utf8(bytes.to_vec()).expect("validated above"))
        } else {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }

    fn check_string_length(&self, offset: usize, len: u64) -> Result<(), Error> {
        if len as usize > self.limits.max_string_length {
            return Err(Error::SizeExceeded {
                offset,
                what: "string length",
                limit: self.limits.max_string_length,
                found: len as usize,
            });
        }
        Ok(())
    }

    fn read_payload(&self, offset: usize, len: usize) -> Result<Vec<u8>, Error> {
        let end = offset.checked_add(len).ok_or(Error::Truncated {
            offset,
            reason: "length overflows usize".to_string(),
        })?;
        if end > self.input.len() {
            return Err(Error::Truncated {
                offset,
                reason: format!("needs {len} byte(s), only {} remain", self.input.len() - offset.min(self.input.len())),
            });
        }
        Ok(self.input[offset..end].to_vec())
    }

    fn decode_array(
        &mut self,
        offset: usize,
        arg_offset: usize,
        ai: u8,
        depth: usize,
        tag_depth: usize,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        self.check_depth(offset, depth)?;
        let (arg, arg_len) = self.read_arg(offset, arg_offset, ai)?;

        let container_idx = self.reserve_container(&path, &parent_path, 4, "Array".to_string(), offset);
        let mut items = Vec::new();
        let mut children = Vec::new();
        let mut cur = arg_offset + arg_len;

        match arg {
            Arg::Indefinite => {
                if !self.options.allow_indefinite {
                    return Err(Error::NonCanonical {
                        offset,
                        reason: "indefinite-length array forbidden".to_string(),
                    });
                }
                loop {
                    self.check_timeout()?;
                    if self.byte_or_truncated(cur)? == BREAK {
                        cur += 1;
                        break;
                    }
                    self.check_array_len(offset, items.len() + 1)?;
                    let child_path = sourcemap::array_element_path(&path, items.len());
                    let (value, next) =
                        self.decode_item(cur, depth + 1, tag_depth, child_path.clone(), Some(path.clone()))?;
                    children.push(child_path);
                    items.push(value);
                    cur = next;
                }
                self.finish_container(container_idx, children, cur);
                Ok((
                    Value::Array(ArrayValue {
                        items,
                        indefinite: true,
                    }),
                    cur,
                ))
            }
            Arg::Value(len) => {
                self.canonical_check(len, ai, offset)?;
                self.check_array_len(offset, len as usize)?;
                for i in 0..len as usize {
                    let child_path = sourcemap::array_element_path(&path, i);
                    let (value, next) =
                        self.decode_item(cur, depth + 1, tag_depth, child_path.clone(), Some(path.clone()))?;
                    children.push(child_path);
                    items.push(value);
                    cur = next;
                }
                self.finish_container(container_idx, children, cur);
                Ok((
                    Value::Array(ArrayValue {
                        items,
                        indefinite: false,
                    }),
                    cur,
                ))
            }
        }
    }

    fn check_array_len(&self, offset: usize, len: usize) -> Result<(), Error> {
        if len > self.limits.max_array_length {
            return Err(Error::SizeExceeded {
                offset,
                what: "array length",
                limit: self.limits.max_array_length,
                found: len,
            });
        }
        Ok(())
    }

    fn decode_map(
        &mut self,
        offset: usize,
        arg_offset: usize,
        ai: u8,
        depth: usize,
        tag_depth: usize,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        self.check_depth(offset, depth)?;
        let (arg, arg_len) = self.read_arg(offset, arg_offset, ai)?;

        let container_idx = self.reserve_container(&path, &parent_path, 5, "Map".to_string(), offset);
        let mut all_entries: Vec<(Value, Value)> = Vec::new();
        let mut children = Vec::new();
        let mut cur = arg_offset + arg_len;

        let indefinite = match arg {
            Arg::Indefinite => {
                if !self.options.allow_indefinite {
                    return Err(Error::NonCanonical {
                        offset,
                        reason: "indefinite-length map forbidden".to_string(),
                    });
                }
                true
            }
            Arg::Value(n) => {
                self.canonical_check(n, ai, offset)?;
                false
            }
        };

        loop {
            self.check_timeout()?;
            if indefinite && self.byte_or_truncated(cur)? == BREAK {
                cur += 1;
                break;
            }
            if !indefinite {
                if let Arg::Value(n) = arg {
                    if all_entries.len() as u64 >= n {
                        break;
                    }
                }
            }
            self.check_map_size(offset, all_entries.len() + 1)?;

            let key_offset = cur;
            let (key, after_key) =
                self.decode_item(cur, depth + 1, tag_depth, format!("{path}#key"), Some(path.clone()))?;

            let dup = all_entries.iter().any(|(k, _)| structural_eq(k, &key));
            if dup {
                let reject = self.options.validate_canonical || self.options.dup_map_key == DupMapKeyPolicy::Reject;
                if reject {
                    return Err(Error::DuplicateMapKey { offset: key_offset });
                }
                if self.options.dup_map_key == DupMapKeyPolicy::Warn {
                    self.options.observer.warn(key_offset, &path);
                }
            }

            let child_path = sourcemap::map_value_path(&path, &key, all_entries.len());
            let (value, after_value) = self.decode_item(
                after_key,
                depth + 1,
                tag_depth,
                child_path.clone(),
                Some(path.clone()),
            )?;
            children.push(child_path);
            all_entries.push((key, value));
            cur = after_value;
        }

        if self.options.validate_canonical {
            self.check_canonical_key_order(offset, &all_entries)?;
        }

        self.finish_container(container_idx, children, cur);
        Ok((Value::Map(MapValue::from_all_entries(all_entries, indefinite)), cur))
    }

    fn check_map_size(&self, offset: usize, len: usize) -> Result<(), Error> {
        if len > self.limits.max_map_size {
            return Err(Error::SizeExceeded {
                offset,
                what: "map size",
                limit: self.limits.max_map_size,
                found: len,
            });
        }
        Ok(())
    }

    /// Canonical CBOR (RFC 8949 §4.2.1) requires map keys to appear sorted
    /// by their own canonical encoding (shortest-bytestring-first, then
    /// lexicographic), with no duplicates.
    fn check_canonical_key_order(&self, offset: usize, entries: &[(Value, Value)]) -> Result<(), Error> {
        let mut prev: Option<Vec<u8>> = None;
        for (key, _) in entries {
            let encoded = encoder::encode_canonical_key_bytes(key)?;
            if let Some(p) = &prev {
                if primitives::compare_bytes(p, &encoded) != std::cmp::Ordering::Less {
                    return Err(Error::NonCanonical {
                        offset,
                        reason: "map keys are not in canonical (bytewise) order".to_string(),
                    });
                }
            }
            prev = Some(encoded);
        }
        Ok(())
    }

    fn decode_tag(
        &mut self,
        offset: usize,
        arg_offset: usize,
        ai: u8,
        depth: usize,
        tag_depth: usize,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        if tag_depth >= self.limits.max_tag_depth {
            return Err(Error::TagDepthExceeded {
                offset,
                max: self.limits.max_tag_depth,
            });
        }
        let (arg, arg_len) = self.read_arg(offset, arg_offset, ai)?;
        let Arg::Value(tag) = arg else {
            return Err(Error::ReservedAdditionalInfo {
                offset,
                additional_info: ai,
            });
        };
        self.canonical_check(tag, ai, offset)?;

        let container_idx = self.reserve_container(&path, &parent_path, 6, format!("tag({tag})"), offset);
        let content_path = sourcemap::tag_content_path(&path);
        let content_offset = arg_offset + arg_len;
        let (content, end) = self.decode_item(
            content_offset,
            depth,
            tag_depth + 1,
            content_path.clone(),
            Some(path.clone()),
        )?;

        if let Some(replacement) = tags::apply_bignum(tag, &content, offset, &self.limits)? {
            self.finish_container(container_idx, Vec::new(), end);
            return Ok((replacement, end));
        }

        if self.options.validate_tag_semantics {
            tags::validate_tag_semantics(tag, &content, offset)?;
        }
        if tag == tags::TAG_SET && self.options.validate_set_uniqueness {
            match &content {
                Value::Array(a) => tags::validate_set(a, offset)?,
                _ => {
                    return Err(Error::TagSemantics {
                        offset,
                        tag,
                        reason: "set (tag 258) content must be an array".to_string(),
                    })
                }
            }
        }
        let plutus: Option<PlutusConstr> =
            tags::decode_plutus(tag, &content, offset, self.options.validate_plutus_semantics)?;

        self.finish_container(container_idx, vec![content_path], end);
        Ok((
            Value::Tag(TagValue {
                number: tag,
                content: Box::new(content),
                plutus,
            }),
            end,
        ))
    }

    fn decode_simple_or_float(
        &mut self,
        offset: usize,
        arg_offset: usize,
        ai: u8,
        path: String,
        parent_path: Option<String>,
    ) -> Result<(Value, usize), Error> {
        match ai {
            0..=19 => {
                self.leaf(path, parent_path, 7, "simple".to_string(), offset, arg_offset);
                Ok((Value::Simple(Simple::Other(ai)), arg_offset))
            }
            20..=23 => {
                let simple = match ai {
                    20 => Simple::False,
                    21 => Simple::True,
                    22 => Simple::Null,
                    _ => Simple::Undefined,
                };
                self.leaf(path, parent_path, 7, "simple".to_string(), offset, arg_offset);
                Ok((Value::Simple(simple), arg_offset))
            }
            24 => {
                let byte = primitives::read_uint(self.input, arg_offset, 1)? as u8;
                if byte <= 31 {
                    return Err(Error::ReservedAdditionalInfo {
                        offset,
                        additional_info: ai,
                    });
                }
                let end = arg_offset + 1;
                self.leaf(path, parent_path, 7, "simple".to_string(), offset, end);
                Ok((Value::Simple(Simple::Other(byte)), end))
            }
            25 => {
                let bits = primitives::read_uint(self.input, arg_offset, 2)? as u16;
                let end = arg_offset + 2;
                self.leaf(path, parent_path, 7, "float".to_string(), offset, end);
                Ok((Value::Float(primitives::f16_bits_to_f64(bits)), end))
            }
            26 => {
                let bits = primitives::read_uint(self.input, arg_offset, 4)? as u32;
                let end = arg_offset + 4;
                self.leaf(path, parent_path, 7, "float".to_string(), offset, end);
                Ok((Value::Float(primitives::f32_bits_to_f64(bits)), end))
            }
            27 => {
                let bits = primitives::read_uint(self.input, arg_offset, 8)?;
                let end = arg_offset + 8;
                self.leaf(path, parent_path, 7, "float".to_string(), offset, end);
                Ok((Value::Float(f64::from_bits(bits)), end))
            }
            28..=30 => Err(Error::ReservedAdditionalInfo {
                offset,
                additional_info: ai,
            }),
            31 => Err(Error::BreakMisuse { offset }),
            _ => unreachable!("additional_info is masked to 5 bits"),
        }
    }

    fn check_depth(&self, offset: usize, depth: usize) -> Result<(), Error> {
        if depth >= self.limits.max_depth {
            return Err(Error::DepthExceeded {
                offset,
                max: self.limits.max_depth,
            });
        }
        Ok(())
    }

    fn leaf(
        &mut self,
        path: String,
        parent: Option<String>,
        major_type: u8,
        type_tag: String,
        start: usize,
        end: usize,
    ) {
        if let Some(sm) = &mut self.source_map {
            sm.add_leaf(path, parent, major_type, type_tag, start as u32, end as u32);
        }
    }

    /// Like [`Self::leaf`], but splits a definite-length bytes/text item
    /// into header and content entries (spec.md §4.5).
    fn sized_leaf(
        &mut self,
        path: String,
        parent: Option<String>,
        major_type: u8,
        type_tag: String,
        start: usize,
        header_end: usize,
        end: usize,
    ) {
        if let Some(sm) = &mut self.source_map {
            sm.add_header_content(
                path,
                parent,
                major_type,
                type_tag,
                start as u32,
                header_end as u32,
                end as u32,
            );
        }
    }

    fn reserve_container(
        &mut self,
        path: &str,
        parent: &Option<String>,
        major_type: u8,
        type_tag: String,
        start: usize,
    ) -> Option<usize> {
        self.source_map.as_mut().map(|sm| {
            sm.reserve(path.to_string(), parent.clone(), major_type, type_tag, start as u32)
        })
    }

    fn finish_container(&mut self, idx: Option<usize>, children: Vec<String>, end: usize) {
        if let (Some(sm), Some(idx)) = (&mut self.source_map, idx) {
            sm.finish(idx, end as u32, children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{Limits, Options};

    fn parse_hex(hex_str: &str, options: &Options) -> (Value, usize) {
        let bytes = hex::decode(hex_str).unwrap();
        parse(&bytes, options, &Limits::default()).unwrap()
    }

    #[test]
    fn decodes_small_uint_directly() {
        let (v, n) = parse_hex("0a", &Options::permissive());
        assert!(matches!(v, Value::Unsigned(UInt::U64(10))));
        assert_eq!(n, 1);
    }

    #[test]
    fn decodes_one_byte_uint() {
        let (v, _) = parse_hex("1864", &Options::permissive());
        assert!(matches!(v, Value::Unsigned(UInt::U64(100))));
    }

    #[test]
    fn rejects_non_canonical_uint_under_strict() {
        let bytes = hex::decode("1864").unwrap();
        assert!(matches!(bytes[0] & 0x1f, 24));
        // 100 fits the direct form's ceiling (23) only if <= 23; 100 needs
        // one byte, so this specific encoding IS canonical. Use a genuinely
        // non-canonical one instead: 0 encoded with a one-byte argument.
        let bytes = hex::decode("1800").unwrap();
        let err = parse(&bytes, &Options::strict(), &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::NonCanonical { .. }));
    }

    #[test]
    fn decodes_definite_text_string() {
        let (v, n) = parse_hex("6449455446", &Options::permissive());
        match v {
            Value::Text(t) => assert_eq!(t.value, "IETF"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(n, 5);
    }

    #[test]
    fn decodes_definite_array() {
        let (v, _) = parse_hex("83010203", &Options::permissive());
        match v {
            Value::Array(a) => assert_eq!(a.items.len(), 3),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_plutus_compact_constructor_tag() {
        let (v, _) = parse_hex("d87980", &Options::cardano());
        match v {
            Value::Tag(t) => {
                assert_eq!(t.number, 121);
                let constr = t.plutus.expect("plutus constructor expected");
                assert_eq!(constr.constructor, 0);
                assert!(constr.fields.is_empty());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn decodes_indefinite_byte_string_chunks() {
        let (v, n) = parse_hex("5f42010243030405ff", &Options::permissive());
        match v {
            Value::Bytes(b) => {
                assert_eq!(b.value, vec![0x01, 0x02, 0x03, 0x04, 0x05]);
                assert!(b.indefinite);
                assert_eq!(b.chunks.unwrap().len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(n, 9);
    }

    #[test]
    fn rejects_indefinite_when_disallowed() {
        let bytes = hex::decode("5f42010243030405ff").unwrap();
        let err = parse(&bytes, &Options::strict(), &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::NonCanonical { .. }));
    }

    #[test]
    fn rejects_duplicate_map_keys_under_strict() {
        let bytes = hex::decode("a2616101616102").unwrap();
        let err = parse(&bytes, &Options::strict(), &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::DuplicateMapKey { .. }));
    }

    #[test]
    fn allows_duplicate_map_keys_by_default() {
        let bytes = hex::decode("a2616101616102").unwrap();
        let (v, _) = parse(&bytes, &Options::permissive(), &Limits::default()).unwrap();
        match v {
            Value::Map(m) => {
                assert_eq!(m.all_entries.len(), 2);
                assert_eq!(m.entries.len(), 1);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn converts_positive_bignum_tag() {
        let bytes = hex::decode("c249010000000000000000").unwrap();
        let (v, _) = parse(&bytes, &Options::permissive(), &Limits::default()).unwrap();
        match v {
            Value::Unsigned(UInt::Big(n)) => assert_eq!(n.to_string(), "18446744073709551616"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn source_map_covers_whole_input() {
        let bytes = hex::decode("83010203").unwrap();
        let (_, n, map) = parse_with_source_map(&bytes, &Options::permissive(), &Limits::default()).unwrap();
        assert!(map.check_coverage(n as u32));
        assert_eq!(map.entries.len(), 4);
    }

    #[test]
    fn depth_limit_is_enforced() {
        // [[[[...]]]] nested one level deeper than max_depth allows.
        let mut bytes = Vec::new();
        let depth = 4;
        for _ in 0..depth {
            bytes.push(0x81);
        }
        bytes.push(0x00);
        let mut limits = Limits::default();
        limits.max_depth = 2;
        let err = parse(&bytes, &Options::permissive(), &limits).unwrap_err();
        assert!(matches!(err, Error::DepthExceeded { .. }));
    }

    #[test]
    fn parse_sequence_reads_every_top_level_item() {
        let bytes = hex::decode("0a0b").unwrap();
        let items = parse_sequence(&bytes, &Options::permissive(), &Limits::default()).unwrap();
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn bare_break_at_top_level_errors() {
        let bytes = vec![0xff];
        let err = parse(&bytes, &Options::permissive(), &Limits::default()).unwrap_err();
        assert!(matches!(err, Error::BreakMisuse { .. }));
    }
}
