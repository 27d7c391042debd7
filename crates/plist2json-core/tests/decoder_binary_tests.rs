use chrono::{TimeZone, Utc};
use plist2json_core::decoder::binary;
use plist2json_core::{decode, to_json, DecodeError, DecodeErrorKind, PlistValue};

/// Helper: assemble a `bplist00` document from raw object encodings.
///
/// Object references inside `objects` must already use `ref_size` bytes.
/// The offset width is chosen to fit the largest offset.
fn bplist(objects: &[Vec<u8>], top: u64, ref_size: u8) -> Vec<u8> {
    let mut out = b"bplist00".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for object in objects {
        offsets.push(out.len() as u64);
        out.extend_from_slice(object);
    }
    let table_offset = out.len() as u64;
    let offset_size: usize = if table_offset <= 0xFF { 1 } else { 2 };
    for offset in offsets {
        out.extend_from_slice(&offset.to_be_bytes()[8 - offset_size..]);
    }
    out.extend_from_slice(&[0; 6]);
    out.push(offset_size as u8);
    out.push(ref_size);
    out.extend_from_slice(&(objects.len() as u64).to_be_bytes());
    out.extend_from_slice(&top.to_be_bytes());
    out.extend_from_slice(&table_offset.to_be_bytes());
    out
}

/// Helper: a single-object document.
fn single(object: &[u8]) -> Vec<u8> {
    bplist(&[object.to_vec()], 0, 1)
}

fn fixture(name: &str) -> Vec<u8> {
    let path = format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name);
    std::fs::read(&path).unwrap_or_else(|e| panic!("fixture {path} must exist: {e}"))
}

// ============================================================================
// Fixture written by a reference binary plist writer
// ============================================================================

#[test]
fn decode_sample_fixture() {
    let value = decode(&fixture("sample.bplist")).unwrap();
    let dict = value.as_dictionary().expect("root must be a dictionary");
    assert_eq!(dict.len(), 13);
    assert_eq!(dict.get("name"), Some(&PlistValue::from("x")));
    assert_eq!(dict.get("count"), Some(&PlistValue::Integer(3)));
    assert_eq!(dict.get("enabled"), Some(&PlistValue::Boolean(true)));
    assert_eq!(dict.get("disabled"), Some(&PlistValue::Boolean(false)));
    assert_eq!(dict.get("ratio"), Some(&PlistValue::Real(0.5)));
    assert_eq!(dict.get("negative"), Some(&PlistValue::Integer(-42)));
    assert_eq!(
        dict.get("min"),
        Some(&PlistValue::Integer(i128::from(i64::MIN)))
    );
    assert_eq!(
        dict.get("max"),
        Some(&PlistValue::Integer(i128::from(i64::MAX)))
    );
    assert_eq!(
        dict.get("big"),
        Some(&PlistValue::Integer(i128::from(u64::MAX)))
    );
    assert_eq!(
        dict.get("blob"),
        Some(&PlistValue::Data(b"\x00\x01hello".to_vec()))
    );
    assert_eq!(
        dict.get("when"),
        Some(&PlistValue::Date(
            Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap()
        ))
    );
    let nested = dict.get("nested").and_then(PlistValue::as_dictionary).unwrap();
    assert_eq!(nested.get("unicode"), Some(&PlistValue::from("café ✓ 😀")));
}

#[test]
fn sample_fixture_keeps_key_order() {
    let value = decode(&fixture("sample.bplist")).unwrap();
    let keys: Vec<&str> = value.as_dictionary().unwrap().keys().collect();
    assert_eq!(
        keys,
        vec![
            "name", "tags", "count", "enabled", "disabled", "ratio", "negative", "min", "max",
            "big", "blob", "when", "nested"
        ]
    );
}

// ============================================================================
// Scalars
// ============================================================================

#[test]
fn decode_null_and_fill() {
    assert_eq!(decode(&single(&[0x00])).unwrap(), PlistValue::Null);
    assert_eq!(decode(&single(&[0x0F])).unwrap(), PlistValue::Null);
}

#[test]
fn decode_booleans() {
    assert_eq!(decode(&single(&[0x08])).unwrap(), PlistValue::Boolean(false));
    assert_eq!(decode(&single(&[0x09])).unwrap(), PlistValue::Boolean(true));
}

#[test]
fn small_integers_are_unsigned() {
    assert_eq!(decode(&single(&[0x10, 0xFF])).unwrap(), PlistValue::Integer(255));
    assert_eq!(
        decode(&single(&[0x11, 0xFF, 0xFE])).unwrap(),
        PlistValue::Integer(0xFFFE)
    );
    assert_eq!(
        decode(&single(&[0x12, 0xFF, 0xFF, 0xFF, 0xFF])).unwrap(),
        PlistValue::Integer(0xFFFF_FFFF)
    );
}

#[test]
fn eight_byte_integers_are_signed() {
    let mut object = vec![0x13];
    object.extend_from_slice(&(-1i64).to_be_bytes());
    assert_eq!(decode(&single(&object)).unwrap(), PlistValue::Integer(-1));
}

#[test]
fn sixteen_byte_integer_holds_u64_max() {
    let mut object = vec![0x14];
    object.extend_from_slice(&[0; 8]);
    object.extend_from_slice(&[0xFF; 8]);
    let value = decode(&single(&object)).unwrap();
    assert_eq!(value, PlistValue::Integer(i128::from(u64::MAX)));
    assert_eq!(to_json(&value).unwrap(), "18446744073709551615");
}

#[test]
fn oversized_integer_width_is_corrupt() {
    let err = decode(&single(&[0x15, 0, 0])).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn single_precision_real_widens_exactly() {
    let mut object = vec![0x22];
    object.extend_from_slice(&0.1f32.to_be_bytes());
    assert_eq!(
        decode(&single(&object)).unwrap(),
        PlistValue::Real(f64::from(0.1f32))
    );
}

#[test]
fn double_precision_real_keeps_bit_pattern() {
    let x = std::f64::consts::PI;
    let mut object = vec![0x23];
    object.extend_from_slice(&x.to_be_bytes());
    match decode(&single(&object)).unwrap() {
        PlistValue::Real(r) => assert_eq!(r.to_bits(), x.to_bits()),
        other => panic!("expected real, got {other:?}"),
    }
}

#[test]
fn decode_date_at_epoch() {
    let mut object = vec![0x33];
    object.extend_from_slice(&0.0f64.to_be_bytes());
    let value = decode(&single(&object)).unwrap();
    assert_eq!(
        value,
        PlistValue::Date(Utc.with_ymd_and_hms(2001, 1, 1, 0, 0, 0).unwrap())
    );
    assert_eq!(to_json(&value).unwrap(), r#""2001-01-01T00:00:00Z""#);
}

#[test]
fn decode_date_before_epoch_with_fraction() {
    let mut object = vec![0x33];
    object.extend_from_slice(&(-1.5f64).to_be_bytes());
    let value = decode(&single(&object)).unwrap();
    assert_eq!(to_json(&value).unwrap(), r#""2000-12-31T23:59:58.500Z""#);
}

#[test]
fn non_finite_date_is_corrupt() {
    let mut object = vec![0x33];
    object.extend_from_slice(&f64::NAN.to_be_bytes());
    let err = decode(&single(&object)).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn decode_data() {
    assert_eq!(
        decode(&single(&[0x43, 0xDE, 0xAD, 0x00])).unwrap(),
        PlistValue::Data(vec![0xDE, 0xAD, 0x00])
    );
}

#[test]
fn decode_ascii_string() {
    assert_eq!(
        decode(&single(&[0x52, b'h', b'i'])).unwrap(),
        PlistValue::from("hi")
    );
}

#[test]
fn decode_utf16_string_with_surrogate_pair() {
    // "é😀" = U+00E9, U+D83D U+DE00
    let object = [0x63, 0x00, 0xE9, 0xD8, 0x3D, 0xDE, 0x00];
    assert_eq!(decode(&single(&object)).unwrap(), PlistValue::from("é😀"));
}

#[test]
fn unpaired_surrogate_is_encoding_error() {
    let err = decode(&single(&[0x61, 0xD8, 0x00])).unwrap_err();
    assert_eq!(err.kind(), DecodeErrorKind::Encoding);
}

#[test]
fn non_ascii_byte_in_ascii_string_is_encoding_error() {
    let err = decode(&single(&[0x51, 0xC3])).unwrap_err();
    assert_eq!(err.kind(), DecodeErrorKind::Encoding);
}

#[test]
fn uid_decodes_as_integer() {
    assert_eq!(decode(&single(&[0x80, 0x05])).unwrap(), PlistValue::Integer(5));
    assert_eq!(
        decode(&single(&[0x81, 0x01, 0x00])).unwrap(),
        PlistValue::Integer(256)
    );
}

// ============================================================================
// Containers
// ============================================================================

#[test]
fn decode_array_with_extended_length() {
    // 20 elements: low nibble 0xF, then an int object holding the count.
    let mut array = vec![0xAF, 0x10, 20];
    array.extend(std::iter::repeat(1u8).take(20));
    let doc = bplist(&[array, vec![0x10, 7]], 0, 1);
    let value = decode(&doc).unwrap();
    let items = value.as_array().unwrap();
    assert_eq!(items.len(), 20);
    assert!(items.iter().all(|v| *v == PlistValue::Integer(7)));
}

#[test]
fn shared_references_are_copied() {
    let doc = bplist(&[vec![0xA2, 1, 1], vec![0x51, b'z']], 0, 1);
    assert_eq!(
        decode(&doc).unwrap(),
        PlistValue::Array(vec![PlistValue::from("z"), PlistValue::from("z")])
    );
}

#[test]
fn sets_decode_as_arrays() {
    let doc = bplist(&[vec![0xC1, 1], vec![0x09]], 0, 1);
    assert_eq!(
        decode(&doc).unwrap(),
        PlistValue::Array(vec![PlistValue::Boolean(true)])
    );
}

#[test]
fn decode_dictionary() {
    // { "a": 1, "b": [true, false] }
    let doc = bplist(
        &[
            vec![0xD2, 1, 2, 3, 4],
            vec![0x51, b'a'],
            vec![0x51, b'b'],
            vec![0x10, 1],
            vec![0xA2, 5, 6],
            vec![0x09],
            vec![0x08],
        ],
        0,
        1,
    );
    let value = decode(&doc).unwrap();
    assert_eq!(to_json(&value).unwrap(), r#"{"a":1,"b":[true,false]}"#);
}

#[test]
fn two_byte_object_references() {
    let doc = bplist(&[vec![0xA1, 0x00, 0x01], vec![0x10, 9]], 0, 2);
    assert_eq!(
        decode(&doc).unwrap(),
        PlistValue::Array(vec![PlistValue::Integer(9)])
    );
}

#[test]
fn non_string_key_is_rejected() {
    let doc = bplist(&[vec![0xD1, 1, 2], vec![0x10, 1], vec![0x51, b'a']], 0, 1);
    let err = decode(&doc).unwrap_err();
    assert!(
        matches!(err, DecodeError::NonStringKey { kind: "integer" }),
        "got {err:?}"
    );
}

#[test]
fn self_referencing_array_is_a_cycle() {
    let doc = bplist(&[vec![0xA1, 0]], 0, 1);
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::Cycle { object: 0 }), "got {err:?}");
}

#[test]
fn indirect_cycle_through_dictionary() {
    // [ { "k": <object 0> } ]
    let doc = bplist(&[vec![0xA1, 1], vec![0xD1, 2, 0], vec![0x51, b'k']], 0, 1);
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::Cycle { object: 0 }), "got {err:?}");
}

#[test]
fn nesting_beyond_limit_fails() {
    let depth = 600u16;
    let mut objects: Vec<Vec<u8>> = (1..depth)
        .map(|next| {
            let [hi, lo] = next.to_be_bytes();
            vec![0xA1, hi, lo]
        })
        .collect();
    objects.push(vec![0x10, 0]);
    let doc = bplist(&objects, 0, 2);
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::DepthLimit { .. }), "got {err:?}");
}

// ============================================================================
// Structural corruption
// ============================================================================

#[test]
fn signature_only_is_truncated() {
    let err = decode(b"bplist00").unwrap_err();
    assert!(
        matches!(err, DecodeError::Truncated { needed: 40, available: 8 }),
        "got {err:?}"
    );
    assert_eq!(err.kind(), DecodeErrorKind::Structure);
}

#[test]
fn partial_signature_is_truncated() {
    let err = binary::decode(b"bplist").unwrap_err();
    assert!(matches!(err, DecodeError::Truncated { .. }), "got {err:?}");
}

#[test]
fn truncated_fixture_fails() {
    let bytes = fixture("sample.bplist");
    for cut in [9, 40, bytes.len() / 2, bytes.len() - 1] {
        assert!(decode(&bytes[..cut]).is_err(), "cut at {cut} must fail");
    }
}

#[test]
fn unsupported_version_is_unrecognized() {
    let mut doc = b"bplist15".to_vec();
    doc.extend_from_slice(&[0; 40]);
    let err = decode(&doc).unwrap_err();
    assert_eq!(err.kind(), DecodeErrorKind::UnrecognizedFormat);
}

#[test]
fn missing_signature_is_unrecognized() {
    let err = binary::decode(b"<plist/>").unwrap_err();
    assert_eq!(err.kind(), DecodeErrorKind::UnrecognizedFormat);
}

#[test]
fn top_object_out_of_range() {
    let doc = bplist(&[vec![0x09]], 5, 1);
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn zero_objects_is_corrupt() {
    let doc = bplist(&[], 0, 1);
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn invalid_offset_size_is_corrupt() {
    let mut doc = single(&[0x09]);
    let len = doc.len();
    doc[len - 26] = 0;
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn offset_pointing_outside_objects_is_corrupt() {
    let mut doc = single(&[0x09]);
    // Single one-byte offset table entry right after the object.
    doc[9] = 0xF0;
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn object_reference_out_of_range() {
    let doc = bplist(&[vec![0xA1, 9]], 0, 1);
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn string_longer_than_object_area() {
    let doc = single(&[0x5F, 0x10, 80, b'a']);
    let err = decode(&doc).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn unknown_marker_is_corrupt() {
    let err = decode(&single(&[0x70])).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}

#[test]
fn invalid_length_marker_is_corrupt() {
    let err = decode(&single(&[0x4F, 0x23, 0, 0])).unwrap_err();
    assert!(matches!(err, DecodeError::Corrupt { .. }), "got {err:?}");
}
