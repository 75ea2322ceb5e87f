use crate::nsof::{DecodeError, Result};

/// Bounded big-endian cursor over an immutable byte slice.
pub(crate) struct Cursor<'a> {
	bytes: &'a [u8],
	pos: usize,
}

impl<'a> Cursor<'a> {
	/// Create a cursor at position 0.
	pub(crate) fn new(bytes: &'a [u8]) -> Self {
		Self { bytes, pos: 0 }
	}

	/// Return current byte offset.
	pub(crate) fn pos(&self) -> usize {
		self.pos
	}

	/// Return remaining unread bytes.
	pub(crate) fn remaining(&self) -> usize {
		self.bytes.len().saturating_sub(self.pos)
	}

	/// Read exactly `n` bytes and advance cursor.
	pub(crate) fn read_exact(&mut self, n: usize, field: &'static str) -> Result<&'a [u8]> {
		if n > self.remaining() {
			return Err(DecodeError::Truncated { field, at: self.pos });
		}

		let start = self.pos;
		self.pos += n;
		Ok(&self.bytes[start..self.pos])
	}

	/// Read one byte.
	pub(crate) fn read_u8(&mut self, field: &'static str) -> Result<u8> {
		Ok(self.read_exact(1, field)?[0])
	}

	/// Read a big-endian `u16`.
	pub(crate) fn read_u16_be(&mut self, field: &'static str) -> Result<u16> {
		let raw = self.read_exact(2, field)?;
		Ok(u16::from_be_bytes([raw[0], raw[1]]))
	}

	/// Read a big-endian `u32`.
	pub(crate) fn read_u32_be(&mut self, field: &'static str) -> Result<u32> {
		Ok(u32::from_be_bytes(self.read_array(field)?))
	}

	/// Read a big-endian `i32`.
	pub(crate) fn read_i32_be(&mut self, field: &'static str) -> Result<i32> {
		Ok(i32::from_be_bytes(self.read_array(field)?))
	}

	/// Read a fixed-size byte array.
	pub(crate) fn read_array<const N: usize>(&mut self, field: &'static str) -> Result<[u8; N]> {
		let raw = self.read_exact(N, field)?;
		let mut out = [0_u8; N];
		out.copy_from_slice(raw);
		Ok(out)
	}

	/// Read an NSOF xlong: one byte below `0xFF`, else `0xFF` and an `i32`.
	pub(crate) fn read_xlong(&mut self, field: &'static str) -> Result<i32> {
		match self.read_u8(field)? {
			0xFF => self.read_i32_be(field),
			byte => Ok(i32::from(byte)),
		}
	}

	/// Read a null-terminated UTF-16BE string, or the rest of input when no terminator is present.
	pub(crate) fn read_utf16_cstring(&mut self, field: &'static str) -> Result<String> {
		let at = self.pos;
		let mut units = Vec::with_capacity(self.remaining() / 2);
		while self.remaining() > 0 {
			let unit = self.read_u16_be(field)?;
			if unit == 0 {
				break;
			}
			units.push(unit);
		}
		String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16 { at })
	}
}
