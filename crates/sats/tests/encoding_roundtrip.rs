use proptest::collection::vec;
use proptest::prelude::*;
use spacetimedb_sats::bsatn::{self, DecodeError};
use spacetimedb_sats::{i256, u256, AlgebraicType, AlgebraicTypeRef, Timestamp, TimeDuration};

#[track_caller]
fn assert_round_trip<T>(value: T)
where
    T: bsatn::Serialize + bsatn::Deserialize + PartialEq + std::fmt::Debug,
{
    let bytes = bsatn::to_vec(&value);
    let decoded = bsatn::from_slice::<T>(&bytes).unwrap();
    assert_eq!(decoded, value);
    // Re-encoding a decoded value must reproduce the input bytes.
    assert_eq!(bsatn::to_vec(&decoded), bytes);
}

#[test]
fn primitive_framing_is_little_endian() {
    assert_eq!(bsatn::to_vec(&0x12345678u32), [0x78, 0x56, 0x34, 0x12]);
    assert_eq!(bsatn::from_slice::<u32>(&[0x78, 0x56, 0x34, 0x12]).unwrap(), 0x12345678);

    assert_eq!(bsatn::to_vec(&"Hi"), [0x02, 0x00, 0x00, 0x00, 0x48, 0x69]);
    assert_eq!(
        bsatn::from_slice::<String>(&[0x02, 0x00, 0x00, 0x00, 0x48, 0x69]).unwrap(),
        "Hi"
    );
}

#[test]
fn option_framing_both_positions() {
    // Value position: some = tag 0 + payload, none = tag 1.
    assert_eq!(bsatn::to_vec(&None::<u8>), [0x01]);
    assert_eq!(bsatn::to_vec(&Some(5u8)), [0x00, 0x05]);

    // Type position: names inside descriptors ride as Option<String>
    // with the same 0 = present / 1 = absent numbering.
    let named = AlgebraicType::product([("x", AlgebraicType::U8)]);
    let bytes = bsatn::to_vec(&named);
    // tag Product, 1 element, name present, "x", then U8.
    assert_eq!(bytes, [2, 1, 0, 0, 0, 0, 1, 0, 0, 0, b'x', 7]);

    let anonymous = AlgebraicType::product([AlgebraicType::U8]);
    assert_eq!(bsatn::to_vec(&anonymous), [2, 1, 0, 0, 0, 1, 7]);
}

#[test]
fn product_framing_has_no_prefix_or_separators() {
    let row = (1u32, "Alice".to_string(), 30u8);
    let bytes = bsatn::to_vec(&row);
    assert_eq!(
        bytes,
        [0x01, 0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x00, 0x41, 0x6C, 0x69, 0x63, 0x65, 0x1E]
    );
    assert_eq!(bytes.len(), 14);
    assert_eq!(bsatn::from_slice::<(u32, String, u8)>(&bytes).unwrap(), row);
}

#[test]
fn special_type_payloads_encode_bare() {
    assert_eq!(
        bsatn::to_vec(&Timestamp::from_micros_since_unix_epoch(-2)),
        (-2i64).to_le_bytes()
    );
    assert_eq!(bsatn::to_vec(&TimeDuration::from_micros(7)), 7i64.to_le_bytes());
}

#[test]
fn decode_failures_are_clean() {
    // Premature end.
    assert!(matches!(bsatn::from_slice::<u64>(&[1, 2, 3]), Err(DecodeError::Eof { .. })));
    // Invalid sum tag.
    assert!(matches!(
        bsatn::from_slice::<Option<u8>>(&[9]),
        Err(DecodeError::InvalidTag { tag: 9, .. })
    ));
    // Invalid UTF-8.
    assert!(matches!(
        bsatn::from_slice::<String>(&[2, 0, 0, 0, 0xff, 0xfe]),
        Err(DecodeError::InvalidUtf8(_))
    ));
    // Trailing bytes.
    assert!(matches!(
        bsatn::from_slice::<u8>(&[1, 2]),
        Err(DecodeError::TrailingBytes { num_bytes: 1 })
    ));
    // A length prefix pointing past the end of the input.
    assert!(matches!(
        bsatn::from_slice::<String>(&[0xff, 0, 0, 0, b'a']),
        Err(DecodeError::Eof { .. })
    ));
}

#[test]
fn u256_round_trips_as_le_bytes() {
    let val = u256::from_words(0x0123456789abcdef_0011223344556677, 0x8899aabbccddeeff_7766554433221100);
    let bytes = bsatn::to_vec(&val);
    assert_eq!(bytes.len(), 32);
    assert_eq!(bytes, val.to_le_bytes());
    assert_round_trip(val);
    assert_round_trip(i256::from(-1));
}

proptest! {
    #[test]
    fn round_trips_bool(x in any::<bool>()) { assert_round_trip(x); }

    #[test]
    fn round_trips_ints(
        a in any::<i8>(), b in any::<u16>(), c in any::<i32>(),
        d in any::<u64>(), e in any::<i128>(), f in any::<u128>(),
    ) {
        assert_round_trip(a);
        assert_round_trip(b);
        assert_round_trip(c);
        assert_round_trip(d);
        assert_round_trip(e);
        assert_round_trip(f);
    }

    #[test]
    fn round_trips_floats(x in any::<f32>(), y in any::<f64>()) {
        // NaN payloads are preserved bit-for-bit but NaN != NaN,
        // so compare re-encodings instead of values.
        let bytes = bsatn::to_vec(&x);
        prop_assert_eq!(bsatn::to_vec(&bsatn::from_slice::<f32>(&bytes).unwrap()), bytes);
        let bytes = bsatn::to_vec(&y);
        prop_assert_eq!(bsatn::to_vec(&bsatn::from_slice::<f64>(&bytes).unwrap()), bytes);
    }

    #[test]
    fn round_trips_strings(s in ".*") {
        assert_round_trip(s);
    }

    #[test]
    fn round_trips_blobs(b in vec(any::<u8>(), 0..256)) {
        assert_round_trip(b);
    }

    #[test]
    fn round_trips_options(x in any::<Option<u32>>(), s in any::<Option<String>>()) {
        assert_round_trip(x);
        assert_round_trip(s);
    }

    #[test]
    fn round_trips_composites(
        rows in vec((any::<u32>(), ".*", any::<Option<i64>>()), 0..16),
    ) {
        assert_round_trip(rows);
    }

    #[test]
    fn canonical_decode_reencodes_to_input(bytes in vec(any::<u8>(), 0..64)) {
        // For every byte string, decoding either fails cleanly
        // or yields a value whose encoding is the input.
        if let Ok(blob) = bsatn::from_slice::<Vec<u8>>(&bytes) {
            prop_assert_eq!(bsatn::to_vec(&blob), bytes.clone());
        }
        if let Ok(pair) = bsatn::from_slice::<(u16, Option<u8>)>(&bytes) {
            prop_assert_eq!(bsatn::to_vec(&pair), bytes);
        }
    }

    #[test]
    fn round_trips_algebraic_types(width in 0usize..5, depth in 0usize..4) {
        // Build a nested type deterministically from the two knobs.
        let elements = (0..width)
            .map(|i| match i % 4 {
                0 => AlgebraicType::U32,
                1 => AlgebraicType::String,
                2 => AlgebraicType::option(AlgebraicType::Bool),
                _ => AlgebraicType::Ref(AlgebraicTypeRef(i as u32)),
            })
            .map(spacetimedb_sats::ProductTypeElement::from)
            .collect::<spacetimedb_sats::ProductType>();
        let mut ty = AlgebraicType::Product(elements);
        for _ in 0..depth {
            ty = AlgebraicType::array(ty);
        }
        let bytes = bsatn::to_vec(&ty);
        prop_assert_eq!(bsatn::from_slice::<AlgebraicType>(&bytes).unwrap(), ty);
    }
}
