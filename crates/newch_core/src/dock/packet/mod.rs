use std::io::{ErrorKind, Read};

use bytes::{BufMut, Bytes, BytesMut};

use crate::dock::{CancelToken, DockCommand, ProtocolError, Result};
use crate::nsof::{Object, decode_root, encode_root};

/// Magic prefix of every Dock packet.
pub const MAGIC: [u8; 8] = *b"newtdock";
/// Magic, command and length.
pub const HEADER_SIZE: usize = 16;
/// Largest payload accepted in either direction.
pub const MAX_PAYLOAD_SIZE: usize = 16 << 20;

/// One framed Dock packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockPacket {
	/// Command code.
	pub command: DockCommand,
	/// Payload without padding.
	pub payload: Bytes,
}

impl DockPacket {
	/// Packet with a raw payload.
	pub fn new(command: DockCommand, payload: impl Into<Bytes>) -> Self {
		Self {
			command,
			payload: payload.into(),
		}
	}

	/// Packet with no payload.
	pub fn empty(command: DockCommand) -> Self {
		Self::new(command, Bytes::new())
	}

	/// Packet whose payload is each object as its own root NSOF stream, back to back.
	pub fn with_objects(command: DockCommand, objects: &[Object]) -> Result<Self> {
		let mut payload = Vec::new();
		for object in objects {
			payload.extend_from_slice(&encode_root(object)?);
		}
		Ok(Self::new(command, payload))
	}

	/// Bytes this packet occupies on the wire, padding included.
	pub fn encoded_len(&self) -> usize {
		HEADER_SIZE + padded_len(self.payload.len())
	}

	/// Append the framed packet to `out`.
	pub fn encode(&self, out: &mut impl BufMut) -> Result<()> {
		let len = self.payload.len();
		if len > MAX_PAYLOAD_SIZE {
			return Err(ProtocolError::PayloadTooLarge { len, max: MAX_PAYLOAD_SIZE });
		}

		out.put_slice(&MAGIC);
		out.put_slice(&self.command.code());
		out.put_u32(len as u32);
		out.put_slice(&self.payload);
		out.put_bytes(0, padded_len(len) - len);
		Ok(())
	}

	/// Framed packet as one buffer.
	pub fn to_bytes(&self) -> Result<Bytes> {
		let mut out = BytesMut::with_capacity(self.encoded_len());
		self.encode(&mut out)?;
		Ok(out.freeze())
	}

	/// Parse one packet from the front of `bytes`.
	///
	/// Returns the packet and the bytes it occupied, padding included.
	pub fn decode(bytes: &[u8]) -> Result<(Self, usize)> {
		if bytes.len() < HEADER_SIZE {
			return Err(ProtocolError::Truncated {
				need: HEADER_SIZE,
				have: bytes.len(),
			});
		}

		let (command, len) = parse_header(&bytes[..HEADER_SIZE])?;
		let total = HEADER_SIZE + padded_len(len);
		if bytes.len() < total {
			return Err(ProtocolError::Truncated {
				need: total,
				have: bytes.len(),
			});
		}

		let payload = Bytes::copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + len]);
		check_padding(command, &bytes[HEADER_SIZE + len..total])?;
		Ok((Self { command, payload }, total))
	}

	/// Decode exactly `count` root NSOF objects filling the whole payload.
	pub fn decode_objects(&self, count: usize) -> Result<Vec<Object>> {
		decode_root_objects(&self.payload, count)
	}

	/// Decode a payload holding exactly one root NSOF object.
	pub fn decode_object(&self) -> Result<Object> {
		let (object, consumed) = decode_root(&self.payload)?;
		ensure_consumed(self.payload.len(), consumed)?;
		Ok(object)
	}
}

/// Decode `count` back-to-back root NSOF streams that must fill `payload` exactly.
pub(crate) fn decode_root_objects(payload: &[u8], count: usize) -> Result<Vec<Object>> {
	let mut objects = Vec::with_capacity(count);
	let mut offset = 0;
	for _ in 0..count {
		let (object, used) = decode_root(&payload[offset..])?;
		offset += used;
		objects.push(object);
	}
	ensure_consumed(payload.len(), offset)?;
	Ok(objects)
}

pub(crate) fn ensure_consumed(declared: usize, consumed: usize) -> Result<()> {
	if consumed != declared {
		return Err(ProtocolError::TrailingBytes { declared, consumed });
	}
	Ok(())
}

fn padded_len(len: usize) -> usize {
	len.div_ceil(4) * 4
}

fn parse_header(header: &[u8]) -> Result<(DockCommand, usize)> {
	let mut magic = [0_u8; 8];
	magic.copy_from_slice(&header[..8]);
	if magic != MAGIC {
		return Err(ProtocolError::BadMagic { found: magic });
	}

	let mut code = [0_u8; 4];
	code.copy_from_slice(&header[8..12]);
	let len = u32::from_be_bytes([header[12], header[13], header[14], header[15]]) as usize;
	if len > MAX_PAYLOAD_SIZE {
		return Err(ProtocolError::PayloadTooLarge { len, max: MAX_PAYLOAD_SIZE });
	}
	Ok((DockCommand(code), len))
}

fn check_padding(command: DockCommand, padding: &[u8]) -> Result<()> {
	if padding.iter().any(|byte| *byte != 0) {
		return Err(ProtocolError::UnexpectedPayload {
			command,
			detail: "nonzero padding".to_owned(),
		});
	}
	Ok(())
}

/// Blocking packet reader over a byte stream.
///
/// Read timeouts between packets surface as `ProtocolError::Io` so a polling caller can
/// check for shutdown. Timeouts inside a packet are retried until the packet completes, or
/// until the attached [`CancelToken`] fires.
pub struct PacketReader<R> {
	inner: R,
	cancel: Option<CancelToken>,
}

impl<R: Read> PacketReader<R> {
	/// Wrap a stream.
	pub fn new(inner: R) -> Self {
		Self { inner, cancel: None }
	}

	/// Give up on a stalled packet once `cancel` fires.
	pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
		self.cancel = Some(cancel);
		self
	}

	/// Read the next packet; `Ok(None)` on clean end of stream before a packet starts.
	pub fn read_packet(&mut self) -> Result<Option<DockPacket>> {
		let mut header = [0_u8; HEADER_SIZE];
		if !self.fill(&mut header, true)? {
			return Ok(None);
		}

		let (command, len) = parse_header(&header)?;
		let mut body = vec![0_u8; padded_len(len)];
		self.fill(&mut body, false)?;
		check_padding(command, &body[len..])?;
		body.truncate(len);
		Ok(Some(DockPacket::new(command, body)))
	}

	/// Unwrap the stream.
	pub fn into_inner(self) -> R {
		self.inner
	}

	/// Fill `buf` completely; returns `false` only for end of stream before the first byte
	/// of a packet header.
	fn fill(&mut self, buf: &mut [u8], at_boundary: bool) -> Result<bool> {
		let mut filled = 0;
		while filled < buf.len() {
			match self.inner.read(&mut buf[filled..]) {
				Ok(0) if at_boundary && filled == 0 => return Ok(false),
				Ok(0) => {
					return Err(ProtocolError::Truncated {
						need: buf.len(),
						have: filled,
					});
				}
				Ok(n) => filled += n,
				Err(err) if err.kind() == ErrorKind::Interrupted => {}
				Err(err) if is_idle(&err) && !(at_boundary && filled == 0) => {
					if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
						return Err(ProtocolError::Io(std::io::Error::new(
							ErrorKind::TimedOut,
							format!("cancelled {filled} bytes into a {}-byte read", buf.len()),
						)));
					}
				}
				Err(err) => return Err(err.into()),
			}
		}
		Ok(true)
	}
}

/// Read timeouts on serial ports and non-blocking sockets.
pub(crate) fn is_idle(err: &std::io::Error) -> bool {
	matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests;
