use crate::nsof::{DecodeError, DecodeOptions, Object, SmallRect, Symbol, decode, decode_root, decode_with};

fn decode_all(bytes: &[u8]) -> Object {
	let (object, consumed) = decode(bytes).expect("decodes");
	assert_eq!(consumed, bytes.len(), "decoder should consume the whole object");
	object
}

#[test]
fn decodes_immediates() {
	assert_eq!(decode_all(&[0x00, 0x14]), Object::Integer(5));
	assert_eq!(decode_all(&[0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFC]), Object::Integer(-1));
	assert_eq!(decode_all(&[0x00, 0x1A]), Object::True);
	assert_eq!(decode_all(&[0x00, 0x02]), Object::Nil);
	assert_eq!(decode_all(&[0x00, 0xFF, 0x00, 0x00, 0x04, 0x16]), Object::UnicodeCharacter(0x41));
	assert_eq!(decode_all(&[0x00, 0x17]), Object::MagicPointer(5));
}

#[test]
fn rejects_unassigned_immediate_bits() {
	assert_eq!(decode(&[0x00, 0x0A]), Err(DecodeError::InvalidImmediate(0x0A)));
}

#[test]
fn decodes_fixed_size_kinds() {
	assert_eq!(decode_all(&[10]), Object::Nil);
	assert_eq!(decode_all(&[1, 0x41]), Object::UnicodeCharacter(0x41));
	assert_eq!(decode_all(&[2, 0x20, 0xAC]), Object::UnicodeCharacter(0x20AC));
	assert_eq!(
		decode_all(&[11, 0, 1, 10, 20]),
		Object::SmallRect(SmallRect {
			top: 0,
			left: 1,
			bottom: 10,
			right: 20,
		})
	);
}

#[test]
fn decodes_symbol_and_string() {
	assert_eq!(decode_all(&[7, 4, b'p', b'a', b'r', b'a']), Object::symbol("para"));
	assert_eq!(decode_all(&[8, 6, 0, 0x41, 0, 0x42, 0, 0]), Object::string("AB"));
	assert_eq!(decode_all(&[8, 2, 0, 0x41]), Object::string("A"), "terminator is optional");
}

#[test]
fn rejects_odd_string_length() {
	let err = decode(&[8, 3, 0, 0x41, 0]).expect_err("odd length should fail");
	assert!(matches!(err, DecodeError::InvalidLength { field: "string length", len: 3 }));
}

#[test]
fn decodes_binary_and_classed_array() {
	let binary = decode_all(&[3, 2, 7, 4, b's', b'a', b'm', b'p', 0xDE, 0xAD]);
	let inner = binary.as_binary().expect("binary");
	assert_eq!(inner.class, Object::symbol("samp"));
	assert_eq!(inner.data, [0xDE, 0xAD]);

	let array = decode_all(&[4, 1, 7, 1, b'c', 0, 4]);
	assert_eq!(array.class(), Some(&Object::symbol("c")));
	assert_eq!(array.at(0), Some(&Object::Integer(1)));
}

#[test]
fn frame_keys_precede_values() {
	let frame = decode_all(&[6, 2, 7, 1, b'a', 7, 1, b'b', 0, 4, 0, 8]);
	let frame = frame.as_frame().expect("frame");
	let keys: Vec<_> = frame.keys().map(Symbol::name).collect();
	assert_eq!(keys, ["a", "b"]);
	assert_eq!(frame.get("a"), Some(&Object::Integer(1)));
	assert_eq!(frame.get("b"), Some(&Object::Integer(2)));
}

#[test]
fn precedent_resolves_to_earlier_object() {
	let array = decode_all(&[5, 2, 7, 1, b'x', 9, 1]);
	assert_eq!(array.at(0), Some(&Object::symbol("x")));
	assert_eq!(array.at(1), Some(&Object::symbol("x")));
}

#[test]
fn frame_key_may_be_precedent_symbol() {
	let array = decode_all(&[5, 2, 7, 1, b'a', 6, 1, 9, 1, 0, 4]);
	assert_eq!(array.at(1).and_then(|frame| frame.get("a")), Some(&Object::Integer(1)));
}

#[test]
fn shared_composites_decode_to_one_allocation() {
	// [ [1], <precedent 1> ]
	let outer = decode_all(&[5, 2, 5, 1, 0, 4, 9, 1]);
	let first = outer.at(0).expect("first");
	let second = outer.at(1).expect("second");
	assert!(first.same_identity(second));
}

#[test]
fn precedent_beyond_table_is_rejected() {
	assert_eq!(decode(&[5, 1, 9, 5]), Err(DecodeError::InvalidPrecedent(5)));
	assert_eq!(decode(&[9, 0]), Err(DecodeError::InvalidPrecedent(0)));
}

#[test]
fn precedent_to_unfinished_object_is_rejected() {
	assert_eq!(decode(&[5, 1, 9, 0]), Err(DecodeError::InvalidPrecedent(0)));
}

#[test]
fn negative_precedent_is_rejected() {
	let err = decode(&[9, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).expect_err("negative index should fail");
	assert_eq!(err, DecodeError::InvalidPrecedent(u32::MAX));
}

#[test]
fn frame_duplicate_key_is_rejected() {
	let err = decode(&[6, 2, 7, 1, b'a', 7, 1, b'A', 0, 4, 0, 8]).expect_err("duplicate should fail");
	assert_eq!(err, DecodeError::DuplicateSlot { key: "A".to_owned() });
}

#[test]
fn frame_key_must_be_symbol() {
	let err = decode(&[6, 1, 0, 4, 0, 4]).expect_err("integer key should fail");
	assert_eq!(
		err,
		DecodeError::ExpectedSymbol {
			field: "frame slot key",
			found: "integer",
		}
	);
}

#[test]
fn unknown_tag_is_reported() {
	assert_eq!(decode(&[12]), Err(DecodeError::UnknownTag(12)));
	assert_eq!(decode(&[0x40]), Err(DecodeError::UnknownTag(0x40)));
}

#[test]
fn truncated_input_is_reported() {
	assert_eq!(decode(&[]), Err(DecodeError::Truncated { field: "tag", at: 0 }));
	assert_eq!(decode(&[11, 0, 0]), Err(DecodeError::Truncated { field: "small rect bottom", at: 3 }));
	assert_eq!(decode(&[5, 10, 10]), Err(DecodeError::Truncated { field: "plain array length", at: 2 }));
}

#[test]
fn root_stream_requires_version_byte() {
	assert_eq!(decode_root(&[2, 10]), Ok((Object::Nil, 2)));
	assert_eq!(decode_root(&[1, 10]), Err(DecodeError::UnsupportedVersion(1)));
	assert_eq!(decode_root(&[]), Err(DecodeError::Truncated { field: "version", at: 0 }));
}

#[test]
fn consumed_count_stops_at_object_end() {
	assert_eq!(decode(&[10, 10, 10]), Ok((Object::Nil, 1)));
}

#[test]
fn depth_limit_is_enforced() {
	let options = DecodeOptions {
		max_depth: 2,
		..DecodeOptions::default()
	};
	assert_eq!(decode_with(&[5, 1, 5, 1, 5, 1, 10], &options), Err(DecodeError::DepthExceeded { max: 2 }));
}

#[test]
fn length_limit_is_enforced() {
	let err = decode(&[8, 0xFF, 0x00, 0x10, 0x00, 0x02]).expect_err("oversized string should fail");
	assert!(matches!(err, DecodeError::TooLarge { field: "string length", .. }));
}
