use std::sync::Arc;

use proptest::prelude::*;

use crate::nsof::{DecodeError, EncodeError, Frame, Object, PlainArray, SmallRect, decode, decode_root, encode, encode_root};

fn round_trip(object: &Object) -> Object {
	let bytes = encode(object).expect("encodes");
	let (decoded, consumed) = decode(&bytes).expect("decodes");
	assert_eq!(consumed, bytes.len());
	decoded
}

fn count_tag(bytes: &[u8], tag: u8) -> usize {
	bytes.iter().filter(|byte| **byte == tag).count()
}

#[test]
fn encodes_paper_roll_frame_bytes() {
	let frame = Frame::from_slots([
		("viewStationery", Object::symbol("para")),
		("text", Object::string("AB")),
		(
			"viewBounds",
			Object::SmallRect(SmallRect {
				top: 0,
				left: 0,
				bottom: 10,
				right: 20,
			}),
		),
	])
	.expect("frame");

	let mut expected = vec![2, 6, 3, 7, 14];
	expected.extend_from_slice(b"viewStationery");
	expected.extend_from_slice(&[7, 4]);
	expected.extend_from_slice(b"text");
	expected.extend_from_slice(&[7, 10]);
	expected.extend_from_slice(b"viewBounds");
	expected.extend_from_slice(&[7, 4]);
	expected.extend_from_slice(b"para");
	expected.extend_from_slice(&[8, 6, 0, b'A', 0, b'B', 0, 0]);
	expected.extend_from_slice(&[11, 0, 0, 10, 20]);

	assert_eq!(encode_root(&Object::frame(frame)).expect("encodes"), expected);
}

#[test]
fn encodes_immediates_big_endian() {
	assert_eq!(encode(&Object::Integer(5)).expect("int"), [0, 0x14]);
	assert_eq!(encode(&Object::Integer(-1)).expect("int"), [0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC]);
	assert_eq!(encode(&Object::Integer(64)).expect("int"), [0, 0xFF, 0x00, 0x00, 0x01, 0x00]);
	assert_eq!(encode(&Object::True).expect("true"), [0, 0x1A]);
	assert_eq!(encode(&Object::Nil).expect("nil"), [10]);
	assert_eq!(encode(&Object::MagicPointer(5)).expect("magic"), [0, 0x17]);
	assert_eq!(encode(&Object::UnicodeCharacter(0x20AC)).expect("char"), [2, 0x20, 0xAC]);
}

#[test]
fn out_of_range_scalars_are_rejected() {
	assert_eq!(
		encode(&Object::Integer(1 << 29)),
		Err(EncodeError::ValueOutOfRange {
			kind: "integer",
			value: 1 << 29,
		})
	);
	assert!(encode(&Object::Integer(-(1 << 29))).is_ok());
	assert!(matches!(encode(&Object::MagicPointer(1 << 30)), Err(EncodeError::ValueOutOfRange { kind: "magic pointer", .. })));
}

#[test]
fn non_latin1_symbols_are_rejected() {
	let err = encode(&Object::symbol("caf\u{2615}")).expect_err("symbol should fail");
	assert!(matches!(err, EncodeError::UnencodableSymbol { .. }));
}

#[test]
fn round_trips_every_kind() {
	let samples = [
		Object::symbol("foo"),
		Object::Integer(-123_456),
		Object::string("Newton \u{2122}"),
		Object::True,
		Object::Nil,
		Object::SmallRect(SmallRect {
			top: 1,
			left: 2,
			bottom: 3,
			right: 4,
		}),
		Object::UnicodeCharacter(0x00E9),
		Object::MagicPointer(1234),
		Object::binary(Object::symbol("samples"), vec![0, 1, 2, 255]),
		Object::array(Object::symbol("names"), vec![Object::string("a"), Object::string("b")]),
		Object::plain_array(vec![Object::Integer(1), Object::Integer(2)]),
		Object::frame(Frame::from_slots([("a", Object::Integer(1)), ("b", Object::Nil)]).expect("frame")),
	];

	for sample in &samples {
		assert_eq!(&round_trip(sample), sample, "round trip of {}", sample.kind_name());
	}
}

#[test]
fn shared_child_is_encoded_once_then_referenced() {
	let child = Arc::new(PlainArray::new(vec![Object::Integer(1), Object::Integer(2)]));
	let frame = Object::frame(
		Frame::from_slots([("first", Object::PlainArray(Arc::clone(&child))), ("second", Object::PlainArray(child))]).expect("frame"),
	);

	let bytes = encode(&frame).expect("encodes");
	assert_eq!(count_tag(&bytes, 9), 1, "exactly one precedent expected: {bytes:?}");
	assert_eq!(count_tag(&bytes, 5), 1, "child array written once: {bytes:?}");

	let decoded = round_trip(&frame);
	assert_eq!(decoded, frame);
	let first = decoded.get("first").expect("first");
	let second = decoded.get("second").expect("second");
	assert!(first.same_identity(second), "decoded children share one allocation");

	let reencoded = encode(&decoded).expect("re-encodes");
	assert_eq!(reencoded, bytes);
}

#[test]
fn equal_but_distinct_children_are_both_written() {
	let frame = Object::frame(
		Frame::from_slots([
			("first", Object::plain_array(vec![Object::Integer(1)])),
			("second", Object::plain_array(vec![Object::Integer(1)])),
		])
		.expect("frame"),
	);

	let bytes = encode(&frame).expect("encodes");
	assert_eq!(count_tag(&bytes, 5), 2);
	assert_eq!(count_tag(&bytes, 9), 0);
}

#[test]
fn repeated_class_symbols_become_precedents() {
	let rows: Vec<Object> = (0..3)
		.map(|id| Object::frame(Frame::from_slots([("id", Object::Integer(id))]).expect("frame")))
		.collect();
	let list = Object::array(Object::symbol("rows"), rows);

	let bytes = encode(&list).expect("encodes");
	// `id` written once, referenced by the two later frames.
	assert_eq!(count_tag(&bytes, 9), 2);
	assert_eq!(round_trip(&list), list);
}

#[test]
fn symbol_precedent_ignores_case() {
	let array = Object::plain_array(vec![Object::symbol("Name"), Object::symbol("name")]);
	let bytes = encode(&array).expect("encodes");
	assert_eq!(bytes, [5, 2, 7, 4, b'N', b'a', b'm', b'e', 9, 1]);
}

fn leaf() -> impl Strategy<Value = Object> {
	prop_oneof![
		((-(1_i32 << 29))..(1_i32 << 29)).prop_map(Object::Integer),
		Just(Object::True),
		Just(Object::Nil),
		any::<u16>().prop_map(Object::UnicodeCharacter),
		(0_u32..(1 << 30)).prop_map(Object::MagicPointer),
		"[a-zA-Z][a-zA-Z0-9]{0,12}".prop_map(Object::symbol),
		".{0,16}".prop_map(Object::string),
		any::<[u8; 4]>().prop_map(|[top, left, bottom, right]| Object::SmallRect(SmallRect { top, left, bottom, right })),
	]
}

fn object() -> impl Strategy<Value = Object> {
	leaf().prop_recursive(4, 48, 6, |inner| {
		prop_oneof![
			proptest::collection::vec(inner.clone(), 0..6).prop_map(Object::plain_array),
			("[a-z]{1,8}", proptest::collection::vec(inner.clone(), 0..6))
				.prop_map(|(class, elements)| Object::array(Object::symbol(class), elements)),
			("[a-z]{1,8}", proptest::collection::vec(any::<u8>(), 0..32))
				.prop_map(|(class, data)| Object::binary(Object::symbol(class), data)),
			proptest::collection::btree_map("[a-z]{1,8}", inner, 0..6)
				.prop_map(|slots| Object::frame(Frame::from_slots(slots).expect("unique keys"))),
		]
	})
}

proptest! {
	#[test]
	fn decode_inverts_encode(value in object()) {
		let bytes = encode_root(&value).expect("encodes");
		let (decoded, consumed) = decode_root(&bytes).expect("decodes");
		prop_assert_eq!(consumed, bytes.len());
		prop_assert_eq!(decoded, value);
	}

	#[test]
	fn every_strict_prefix_fails_cleanly(value in object()) {
		let bytes = encode_root(&value).expect("encodes");
		for cut in 0..bytes.len() {
			match decode_root(&bytes[..cut]) {
				Err(DecodeError::Truncated { .. } | DecodeError::UnknownTag(_)) => {}
				other => prop_assert!(false, "prefix {} of {} gave {:?}", cut, bytes.len(), other),
			}
		}
	}
}
