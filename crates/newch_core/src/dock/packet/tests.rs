use std::io::{self, Cursor, Read};

use crate::dock::{CancelToken, DockCommand, DockPacket, HEADER_SIZE, PacketReader, ProtocolError};
use crate::nsof::{Object, PlainArray};

fn framed(command: &[u8; 4], payload: &[u8]) -> Vec<u8> {
	let mut out = b"newtdock".to_vec();
	out.extend_from_slice(command);
	out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
	out.extend_from_slice(payload);
	while out.len() % 4 != 0 {
		out.push(0);
	}
	out
}

#[test]
fn encodes_header_payload_and_padding() {
	let packet = DockPacket::new(DockCommand::RESULT, vec![0, 0, 0]);
	let bytes = packet.to_bytes().expect("encodes");
	assert_eq!(&bytes[..8], b"newtdock");
	assert_eq!(&bytes[8..12], b"dres");
	assert_eq!(&bytes[12..16], [0, 0, 0, 3]);
	assert_eq!(bytes.len(), HEADER_SIZE + 4, "payload padded to four bytes");
	assert_eq!(bytes[HEADER_SIZE + 3], 0);
	assert_eq!(packet.encoded_len(), bytes.len());
}

#[test]
fn decode_reports_consumed_length_including_padding() {
	let mut bytes = framed(b"kbds", &[0, 0x41, 0, 0, 0, 0x42]);
	bytes.extend_from_slice(b"next");

	let (packet, consumed) = DockPacket::decode(&bytes).expect("decodes");
	assert_eq!(packet.command, DockCommand::KEYBOARD_STRING);
	assert_eq!(packet.payload.as_ref(), [0, 0x41, 0, 0, 0, 0x42]);
	assert_eq!(consumed, HEADER_SIZE + 8);
}

#[test]
fn decode_rejects_bad_magic() {
	let mut bytes = framed(b"helo", &[]);
	bytes[0] = b'N';
	assert!(matches!(DockPacket::decode(&bytes), Err(ProtocolError::BadMagic { found }) if &found == b"Newtdock"));
}

#[test]
fn decode_rejects_truncated_input() {
	let bytes = framed(b"dres", &[0, 0, 0, 0]);
	assert!(matches!(DockPacket::decode(&bytes[..10]), Err(ProtocolError::Truncated { need: 16, have: 10 })));
	assert!(matches!(DockPacket::decode(&bytes[..18]), Err(ProtocolError::Truncated { need: 20, have: 18 })));
}

#[test]
fn decode_rejects_oversized_length() {
	let mut bytes = b"newtdockcres".to_vec();
	bytes.extend_from_slice(&u32::MAX.to_be_bytes());
	assert!(matches!(DockPacket::decode(&bytes), Err(ProtocolError::PayloadTooLarge { .. })));
}

#[test]
fn decode_rejects_nonzero_padding() {
	let mut bytes = framed(b"kbdc", &[0, 0x41]);
	bytes[HEADER_SIZE + 3] = 1;
	assert!(matches!(DockPacket::decode(&bytes), Err(ProtocolError::UnexpectedPayload { .. })));
}

#[test]
fn object_payloads_are_independent_root_streams() {
	let arguments = Object::PlainArray(std::sync::Arc::new(PlainArray::new(vec![Object::Integer(1)])));
	let packet = DockPacket::with_objects(DockCommand::CALL_ROOT_METHOD, &[Object::symbol("Add"), arguments.clone()]).expect("encodes");
	assert_eq!(packet.payload[0], 2, "first stream opens with version byte");
	assert_eq!(packet.payload[6], 2, "second stream opens with its own version byte");

	let objects = packet.decode_objects(2).expect("decodes");
	assert_eq!(objects, [Object::symbol("Add"), arguments]);
}

#[test]
fn object_payload_leftovers_are_rejected() {
	let mut payload = vec![2, 10];
	payload.push(0xAA);
	let packet = DockPacket::new(DockCommand::CALL_RESULT, payload);
	assert!(matches!(packet.decode_object(), Err(ProtocolError::TrailingBytes { declared: 3, consumed: 2 })));
	assert!(matches!(packet.decode_objects(1), Err(ProtocolError::TrailingBytes { declared: 3, consumed: 2 })));
}

#[test]
fn object_payload_decode_errors_propagate() {
	let packet = DockPacket::new(DockCommand::CALL_RESULT, vec![2, 0x40]);
	assert!(matches!(packet.decode_object(), Err(ProtocolError::Decode(_))));
}

#[test]
fn reader_yields_packets_then_clean_end() {
	let mut stream = framed(b"helo", &[]);
	stream.extend(framed(b"dres", &[0, 0, 0, 0]));
	let mut reader = PacketReader::new(Cursor::new(stream));

	assert_eq!(reader.read_packet().expect("first").map(|packet| packet.command), Some(DockCommand::HELLO));
	let second = reader.read_packet().expect("second").expect("packet");
	assert_eq!(second.payload.as_ref(), [0, 0, 0, 0]);
	assert!(reader.read_packet().expect("end").is_none());
}

#[test]
fn reader_reports_end_inside_packet() {
	let stream = framed(b"dres", &[0, 0, 0, 0]);
	let mut reader = PacketReader::new(Cursor::new(stream[..19].to_vec()));
	assert!(matches!(reader.read_packet(), Err(ProtocolError::Truncated { need: 4, have: 3 })));
}

/// Yields one byte per call, with a timeout before every other byte.
struct Stuttering {
	bytes: Vec<u8>,
	pos: usize,
	stall: bool,
}

impl Read for Stuttering {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.pos < self.bytes.len() && self.pos > 0 {
			self.stall = !self.stall;
			if self.stall {
				return Err(io::ErrorKind::TimedOut.into());
			}
		}
		if self.pos >= self.bytes.len() || buf.is_empty() {
			return Ok(0);
		}
		buf[0] = self.bytes[self.pos];
		self.pos += 1;
		Ok(1)
	}
}

#[test]
fn reader_retries_timeouts_inside_a_packet() {
	let stream = framed(b"kbdc", &[0, 0x41, 0, 0]);
	let mut reader = PacketReader::new(Stuttering {
		bytes: stream,
		pos: 0,
		stall: false,
	});
	let packet = reader.read_packet().expect("reads").expect("packet");
	assert_eq!(packet.command, DockCommand::KEYBOARD_CHAR);
}

/// Yields the magic, then times out forever.
struct StalledHeader {
	sent: bool,
}

impl Read for StalledHeader {
	fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
		if self.sent {
			return Err(io::ErrorKind::TimedOut.into());
		}
		self.sent = true;
		buf[..8].copy_from_slice(b"newtdock");
		Ok(8)
	}
}

#[test]
fn reader_gives_up_on_stalled_packet_after_cancel() {
	let cancel = CancelToken::new();
	cancel.cancel();
	let mut reader = PacketReader::new(StalledHeader { sent: false }).with_cancel(cancel);
	assert!(matches!(reader.read_packet(), Err(ProtocolError::Io(err)) if err.kind() == io::ErrorKind::TimedOut));
}

#[test]
fn reader_surfaces_timeout_between_packets() {
	struct Idle;
	impl Read for Idle {
		fn read(&mut self, _: &mut [u8]) -> io::Result<usize> {
			Err(io::ErrorKind::TimedOut.into())
		}
	}

	let mut reader = PacketReader::new(Idle);
	assert!(matches!(reader.read_packet(), Err(ProtocolError::Io(err)) if err.kind() == io::ErrorKind::TimedOut));
}
