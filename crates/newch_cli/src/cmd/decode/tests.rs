use newch::nsof::{Object, encode};
use newch_testkit::{add_call, paper_roll_frame, read_hex_fixture};

use super::decode_all;
use crate::cmd::error::CliError;
use crate::cmd::test_support::{fixture_arg, run_newch, run_newch_json};

#[test]
fn decode_all_reads_back_to_back_roots() {
	let objects = decode_all(&read_hex_fixture("call_root_method.hex"), false).expect("decodes");
	let (name, arguments) = add_call();
	assert_eq!(objects, [(0, Object::Symbol(name)), (6, Object::PlainArray(arguments))]);
}

#[test]
fn decode_all_bare_skips_version_byte() {
	let mut bytes = encode(&Object::Integer(7)).expect("encodes");
	bytes.extend(encode(&Object::string("x")).expect("encodes"));
	let objects = decode_all(&bytes, true).expect("decodes");
	assert_eq!(objects, [(0, Object::Integer(7)), (2, Object::string("x"))]);
}

#[test]
fn decode_all_reports_failing_offset() {
	let mut bytes = read_hex_fixture("call_root_method.hex");
	bytes.extend_from_slice(&[0x02, 0x0C]);
	let err = decode_all(&bytes, false).expect_err("tag 12 is unsupported");
	assert!(matches!(err, CliError::DecodeAt { offset: 13, .. }), "got {err}");

	assert!(matches!(decode_all(&[], false), Err(CliError::EmptyInput)));
}

#[test]
fn decode_command_prints_tree() {
	let fixture = fixture_arg("paper_roll.hex");
	let output = run_newch(&["decode", &fixture, "--hex"]);
	assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

	let stdout = String::from_utf8_lossy(&output.stdout);
	assert!(stdout.contains("objects: 1"), "{stdout}");
	assert!(stdout.contains("  viewStationery: 'para"), "{stdout}");
	assert!(stdout.contains("  viewBounds: rect {top: 0, left: 0, bottom: 10, right: 20}"), "{stdout}");
}

#[test]
fn decode_command_json_matches_frame() {
	let fixture = fixture_arg("shared_child.hex");
	let json = run_newch_json(&["decode", &fixture, "--hex", "--json"]);

	assert_eq!(json["objects"].as_array().map(Vec::len), Some(1));
	let frame = &json["objects"][0]["object"];
	assert_eq!(frame["type"], "frame");
	assert_eq!(frame["slots"][0]["value"], frame["slots"][1]["value"]);
	assert_eq!(frame["slots"][1]["value"]["elements"][1], serde_json::json!({"type": "string", "value": "two"}));
}

#[test]
fn decode_command_fails_on_truncated_input() {
	let dir = std::env::temp_dir().join(format!("newch-decode-{}", std::process::id()));
	std::fs::create_dir_all(&dir).expect("temp dir");
	let path = dir.join("truncated.nsof");
	let bytes = newch::nsof::encode_root(&paper_roll_frame()).expect("encodes");
	std::fs::write(&path, &bytes[..bytes.len() - 1]).expect("write fixture");

	let output = run_newch(&["decode", &path.to_string_lossy()]);
	assert_eq!(output.status.code(), Some(1));
	let stderr = String::from_utf8_lossy(&output.stderr);
	assert!(stderr.starts_with("error: object at offset 0:"), "{stderr}");
}
