//! The decoded value tree.
//!
//! Spec note (§9): the source system leans on runtime type-dispatch over a
//! `{tag, value}`-shaped object with symbol-keyed "hidden" metadata
//! (`INDEFINITE`, `ALL_ENTRIES`). Here that collapses into one exhaustive
//! `enum Value` with the metadata as ordinary struct fields on the
//! variants that need it. No action at a distance.

use num_bigint::{BigInt, BigUint};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An unsigned integer, promoted to arbitrary precision once a bignum tag
/// (tag 2) pushes the value above `u64::MAX`. A plain major-type-0 item
/// never needs the `Big` arm on its own (its 8-byte argument tops out at
/// `u64::MAX`), but the tag engine's bignum conversion (spec.md §3.2) can
/// produce values far larger than that.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum UInt {
    U64(u64),
    Big(BigUint),
}

impl UInt {
    pub fn to_biguint(&self) -> BigUint {
        match self {
            UInt::U64(v) => BigUint::from(*v),
            UInt::Big(v) => v.clone(),
        }
    }
}

impl From<u64> for UInt {
    fn from(v: u64) -> Self {
        UInt::U64(v)
    }
}

/// A negative integer stored as its true (signed) value, per spec.md §3.2
/// (not as `-1-n`). `I128` covers every value reachable from a plain
/// major-type-1 item (as low as `-2^64`); `Big` covers the bignum tag 3
/// path, whose magnitude is unbounded (up to `max_bignum_bytes`).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum NInt {
    I128(i128),
    Big(BigInt),
}

impl NInt {
    pub fn to_bigint(&self) -> BigInt {
        match self {
            NInt::I128(v) => BigInt::from(*v),
            NInt::Big(v) => v.clone(),
        }
    }
}

/// A byte string, carrying whether it was decoded from indefinite-length
/// form and, if so, the original chunk boundaries (needed for byte-perfect
/// round-trip per spec.md §3.3/§8 property 2).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ByteString {
    pub value: Vec<u8>,
    pub indefinite: bool,
    pub chunks: Option<Vec<Vec<u8>>>,
}

impl ByteString {
    pub fn definite(value: Vec<u8>) -> Self {
        Self {
            value,
            indefinite: false,
            chunks: None,
        }
    }
}

/// A UTF-8 text string with the same indefinite/chunk metadata as
/// [`ByteString`]. Each chunk of an indefinite text string is itself a
/// complete, independently valid UTF-8 string (RFC 8949 §3.2.3).
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TextString {
    pub value: String,
    pub indefinite: bool,
    pub chunks: Option<Vec<Vec<u8>>>,
}

impl TextString {
    pub fn definite(value: String) -> Self {
        Self {
            value,
            indefinite: false,
            chunks: None,
        }
    }
}

/// An ordered sequence of decoded values, carrying whether it was
/// introduced with an indefinite-length header.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArrayValue {
    pub items: Vec<Value>,
    pub indefinite: bool,
}

/// A CBOR map.
///
/// `entries` is the application-facing, last-value-wins view (one entry
/// per distinct key, in first-occurrence order). `all_entries` is the
/// complete decoded sequence including duplicates, in original order:
/// the shadow list spec.md §3.3 requires so the encoder can reproduce a
/// non-canonical map byte-for-byte. Key *type* is preserved: an integer
/// key and a same-looking text key are different entries (spec.md §3.3,
/// §9 "Map key handling").
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MapValue {
    pub entries: Vec<(Value, Value)>,
    pub all_entries: Vec<(Value, Value)>,
    pub indefinite: bool,
}

impl MapValue {
    /// Builds the deduplicated, last-wins view from a fully decoded
    /// `all_entries` sequence. Position follows first occurrence; value
    /// follows last occurrence, matching ordinary map-assignment
    /// semantics.
    pub fn from_all_entries(all_entries: Vec<(Value, Value)>, indefinite: bool) -> Self {
        let mut entries: Vec<(Value, Value)> = Vec::with_capacity(all_entries.len());
        for (k, v) in &all_entries {
            if let Some(slot) = entries
                .iter_mut()
                .find(|(ek, _)| structural_eq(ek, k))
            {
                slot.1 = v.clone();
            } else {
                entries.push((k.clone(), v.clone()));
            }
        }
        Self {
            entries,
            all_entries,
            indefinite,
        }
    }

    pub fn get(&self, key: &Value) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| structural_eq(k, key))
            .map(|(_, v)| v)
    }

    pub fn has_duplicates(&self) -> bool {
        self.entries.len() != self.all_entries.len()
    }
}

/// The constructor-index/field-list shape Plutus `Data` uses for its
/// sum-type constructors, populated alongside the raw `Tag` when the tag
/// number matches one of the Plutus ranges (spec.md §3.2).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PlutusConstr {
    pub constructor: u32,
    pub fields: Vec<Value>,
}

/// A tagged data item. `plutus` is populated by the tag engine
/// (spec.md §4.4) when `number` falls in one of the Plutus constructor
/// ranges.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TagValue {
    pub number: u64,
    pub content: Box<Value>,
    pub plutus: Option<PlutusConstr>,
}

/// CBOR's major-type-7 "simple value" space, minus the float widths
/// (which get their own `Value::Float` variant).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Simple {
    False,
    True,
    Null,
    Undefined,
    /// The one-byte-extended form, codes 32..=255 (0..=19 and 24..=31 are
    /// reserved and never reach this variant; 20..=23 decode to the named
    /// variants above instead).
    Other(u8),
}

/// The decoded sum type every CBOR data item parses into.
///
/// Derives the ordinary representation-level `PartialEq` (useful for
/// tests and for callers who want it), but deliberately does *not* derive
/// `Eq`/`Hash`: spec.md's Non-goals list "value equality or hashing of
/// decoded structures" as out of scope, meaning this crate makes no
/// promise about *semantic* equality across representations (`Unsigned`
/// vs. the promoted bignum form of the same integer do not compare
/// equal) and never offers `Value` as a hashable key. Where the tag
/// engine needs semantic structural comparison for its own validation
/// rule (`validate_set_uniqueness`, spec.md §4.4), it uses the
/// crate-private [`structural_eq`] instead of `==`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Unsigned(UInt),
    Negative(NInt),
    Bytes(ByteString),
    Text(TextString),
    Array(ArrayValue),
    Map(MapValue),
    Tag(TagValue),
    Float(f64),
    Simple(Simple),
}

impl Value {
    pub fn unsigned(v: u64) -> Self {
        Value::Unsigned(UInt::U64(v))
    }

    pub fn text(v: impl Into<String>) -> Self {
        Value::Text(TextString::definite(v.into()))
    }

    pub fn bytes(v: impl Into<Vec<u8>>) -> Self {
        Value::Bytes(ByteString::definite(v.into()))
    }

    pub fn array(items: Vec<Value>) -> Self {
        Value::Array(ArrayValue {
            items,
            indefinite: false,
        })
    }

    /// Human-readable type label used by the source map (spec.md §4.5
    /// `type_tag`), e.g. `"Array"`, `"bytes(32)"`, `"tag(121)"`.
    pub fn type_tag(&self) -> String {
        match self {
            Value::Unsigned(_) => "uint".to_string(),
            Value::Negative(_) => "nint".to_string(),
            Value::Bytes(b) => format!("bytes({})", b.value.len()),
            Value::Text(t) => format!("text({})", t.value.len()),
            Value::Array(a) => {
                if a.indefinite {
                    "Array(indefinite)".to_string()
                } else {
                    "Array".to_string()
                }
            }
            Value::Map(m) => {
                if m.indefinite {
                    "Map(indefinite)".to_string()
                } else {
                    "Map".to_string()
                }
            }
            Value::Tag(t) => format!("tag({})", t.number),
            Value::Float(_) => "float".to_string(),
            Value::Simple(_) => "simple".to_string(),
        }
    }

    /// The RFC 8949 major type this value decodes/encodes as (spec.md
    /// §3.4 invariant: "major-type bits of the initial byte always equal
    /// the variant of the produced Value").
    pub fn major_type(&self) -> u8 {
        match self {
            Value::Unsigned(_) => 0,
            Value::Negative(_) => 1,
            Value::Bytes(_) => 2,
            Value::Text(_) => 3,
            Value::Array(_) => 4,
            Value::Map(_) => 5,
            Value::Tag(_) => 6,
            Value::Float(_) | Value::Simple(_) => 7,
        }
    }
}

/// Deep structural identity: variant tag first, then payload. Integer `1`
/// and text `"1"` must not collide; `true` and `1` must not collide
/// either, even though both could stringify the same way.
pub(crate) fn structural_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Unsigned(x), Value::Unsigned(y)) => x.to_biguint() == y.to_biguint(),
        (Value::Negative(x), Value::Negative(y)) => x.to_bigint() == y.to_bigint(),
        (Value::Bytes(x), Value::Bytes(y)) => x.value == y.value,
        (Value::Text(x), Value::Text(y)) => x.value == y.value,
        (Value::Array(x), Value::Array(y)) => {
            x.items.len() == y.items.len()
                && x.items.iter().zip(&y.items).all(|(a, b)| structural_eq(a, b))
        }
        (Value::Map(x), Value::Map(y)) => {
            x.entries.len() == y.entries.len()
                && x.entries.iter().zip(&y.entries).all(|((ka, va), (kb, vb))| {
                    structural_eq(ka, kb) && structural_eq(va, vb)
                })
        }
        (Value::Tag(x), Value::Tag(y)) => x.number == y.number && structural_eq(&x.content, &y.content),
        (Value::Float(x), Value::Float(y)) => {
            x.to_bits() == y.to_bits() || (x.is_nan() && y.is_nan())
        }
        (Value::Simple(x), Value::Simple(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn structural_eq_distinguishes_key_types() {
        let int_one = Value::unsigned(1);
        let text_one = Value::text("1");
        let bool_true = Value::Simple(Simple::True);

        assert!(!structural_eq(&int_one, &text_one));
        assert!(!structural_eq(&int_one, &bool_true));
        assert!(structural_eq(&int_one, &Value::unsigned(1)));
    }

    #[test]
    fn map_from_all_entries_dedups_last_wins_first_position() {
        let all = vec![
            (Value::unsigned(1), Value::text("a")),
            (Value::unsigned(2), Value::text("b")),
            (Value::unsigned(1), Value::text("c")),
        ];
        let map = MapValue::from_all_entries(all, false);
        assert_eq!(map.entries.len(), 2);
        assert!(map.has_duplicates());
        match &map.entries[0].1 {
            Value::Text(t) => assert_eq!(t.value, "c"),
            _ => panic!("expected text"),
        }
    }
}
