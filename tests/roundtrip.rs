//! Property-based round-trip and ordering tests (spec.md §8 "Universal
//! properties" 1, 3, 5).

use cbor_cardano::primitives::{compare_bytes, narrowest_width, ArgWidth};
use cbor_cardano::value::{ArrayValue, NInt, UInt};
use cbor_cardano::{decode, encode, Limits, Options, Value};
use proptest::prelude::*;

fn canonical_round_trip(value: &Value) -> Value {
    let (bytes, _) = encode(value, &Options::strict(), &Limits::default()).unwrap();
    let (decoded, consumed) = decode(&bytes, &Options::strict(), &Limits::default()).unwrap();
    assert_eq!(consumed, bytes.len());
    decoded
}

proptest! {
    #[test]
    fn unsigned_round_trips_under_canonical(v: u64) {
        let original = Value::unsigned(v);
        let decoded = canonical_round_trip(&original);
        prop_assert!(matches!(decoded, Value::Unsigned(UInt::U64(n)) if n == v));
    }

    #[test]
    fn negative_round_trips_under_canonical(v in i64::MIN..=-1i64) {
        let original = Value::Negative(NInt::I128(v as i128));
        let decoded = canonical_round_trip(&original);
        prop_assert!(matches!(decoded, Value::Negative(NInt::I128(n)) if n == v as i128));
    }

    #[test]
    fn bytes_round_trip_under_canonical(bytes: Vec<u8>) {
        let original = Value::bytes(bytes.clone());
        let decoded = canonical_round_trip(&original);
        match decoded {
            Value::Bytes(b) => prop_assert_eq!(b.value, bytes),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn text_round_trips_under_canonical(s in "\\PC*") {
        let original = Value::text(s.clone());
        let decoded = canonical_round_trip(&original);
        match decoded {
            Value::Text(t) => prop_assert_eq!(t.value, s),
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn array_of_uints_round_trips_under_canonical(values: Vec<u64>) {
        let original = Value::Array(ArrayValue {
            items: values.iter().map(|v| Value::unsigned(*v)).collect(),
            indefinite: false,
        });
        let decoded = canonical_round_trip(&original);
        match decoded {
            Value::Array(a) => {
                let roundtripped: Vec<u64> = a.items.iter().map(|v| match v {
                    Value::Unsigned(UInt::U64(n)) => *n,
                    other => panic!("unexpected {other:?}"),
                }).collect();
                prop_assert_eq!(roundtripped, values);
            }
            other => prop_assert!(false, "unexpected {:?}", other),
        }
    }

    #[test]
    fn compare_bytes_is_antisymmetric(a: Vec<u8>, b: Vec<u8>) {
        prop_assert_eq!(compare_bytes(&a, &b), compare_bytes(&b, &a).reverse());
    }

    #[test]
    fn compare_bytes_orders_shorter_first(a: Vec<u8>, extra: Vec<u8>) {
        // `extra` appended to `a` is never "less than" `a` under the
        // shorter-first-then-lexicographic ordering spec.md §4.1 defines,
        // since the extended vector is at least as long.
        let mut longer = a.clone();
        longer.extend(extra);
        prop_assert_ne!(compare_bytes(&longer, &a), std::cmp::Ordering::Less);
    }

    #[test]
    fn narrowest_width_is_minimal_and_round_trips_via_header(v: u64) {
        let width = narrowest_width(v);
        let max_for_width = match width {
            ArgWidth::Direct => 23u64,
            ArgWidth::One => u8::MAX as u64,
            ArgWidth::Two => u16::MAX as u64,
            ArgWidth::Four => u32::MAX as u64,
            ArgWidth::Eight => u64::MAX,
        };
        prop_assert!(v <= max_for_width);
        if let Some(narrower) = one_width_down(width) {
            let narrower_max = match narrower {
                ArgWidth::Direct => 23u64,
                ArgWidth::One => u8::MAX as u64,
                ArgWidth::Two => u16::MAX as u64,
                ArgWidth::Four => u32::MAX as u64,
                ArgWidth::Eight => u64::MAX,
            };
            prop_assert!(v > narrower_max);
        }
    }
}

fn one_width_down(width: ArgWidth) -> Option<ArgWidth> {
    match width {
        ArgWidth::Direct => None,
        ArgWidth::One => Some(ArgWidth::Direct),
        ArgWidth::Two => Some(ArgWidth::One),
        ArgWidth::Four => Some(ArgWidth::Two),
        ArgWidth::Eight => Some(ArgWidth::Four),
    }
}

proptest! {
    #[test]
    fn text_strict_utf8_validation_accepts_every_valid_rust_string(s in "\\PC*") {
        cbor_cardano::primitives::validate_utf8_strict(s.as_bytes(), 0).unwrap();
    }
}
