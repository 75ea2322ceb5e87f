use std::collections::HashSet;
use std::sync::Arc;

use crate::nsof::bytes::Cursor;
use crate::nsof::tag::{NIL_REF, NSOF_VERSION, TRUE_REF};
use crate::nsof::{Array, Binary, DecodeError, Frame, Object, PlainArray, Result, SmallRect, Symbol, Tag};

/// Limits applied while decoding untrusted NSOF input.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
	/// Maximum object nesting depth.
	pub max_depth: u32,
	/// Maximum declared byte length or element count of one object.
	pub max_length: usize,
}

impl Default for DecodeOptions {
	fn default() -> Self {
		Self {
			max_depth: 64,
			max_length: 1 << 20,
		}
	}
}

impl DecodeOptions {
	/// Preset for offline inspection of larger dumps.
	pub fn for_inspection() -> Self {
		Self {
			max_depth: 256,
			max_length: 16 << 20,
		}
	}
}

/// Decode one bare object (no version byte) with default limits.
///
/// Returns the object and the exact number of bytes it occupied.
pub fn decode(bytes: &[u8]) -> Result<(Object, usize)> {
	decode_with(bytes, &DecodeOptions::default())
}

/// Decode one bare object with explicit limits.
pub fn decode_with(bytes: &[u8], options: &DecodeOptions) -> Result<(Object, usize)> {
	let mut decoder = Decoder::new(bytes, options);
	let object = decoder.decode_object()?;
	Ok((object, decoder.cursor.pos()))
}

/// Decode one top-level stream (version byte, then object) with default limits.
pub fn decode_root(bytes: &[u8]) -> Result<(Object, usize)> {
	decode_root_with(bytes, &DecodeOptions::default())
}

/// Decode one top-level stream with explicit limits.
pub fn decode_root_with(bytes: &[u8], options: &DecodeOptions) -> Result<(Object, usize)> {
	let mut decoder = Decoder::new(bytes, options);
	let version = decoder.cursor.read_u8("version")?;
	if version != NSOF_VERSION {
		return Err(DecodeError::UnsupportedVersion(version));
	}
	let object = decoder.decode_object()?;
	Ok((object, decoder.cursor.pos()))
}

/// Single-use decoder; its precedent table lives only as long as one decode call.
struct Decoder<'a> {
	cursor: Cursor<'a>,
	options: &'a DecodeOptions,
	precedents: Vec<Option<Object>>,
	depth: u32,
}

impl<'a> Decoder<'a> {
	fn new(bytes: &'a [u8], options: &'a DecodeOptions) -> Self {
		Self {
			cursor: Cursor::new(bytes),
			options,
			precedents: Vec::new(),
			depth: 0,
		}
	}

	fn decode_object(&mut self) -> Result<Object> {
		if self.depth >= self.options.max_depth {
			return Err(DecodeError::DepthExceeded { max: self.options.max_depth });
		}

		self.depth += 1;
		let result = self.decode_tagged();
		self.depth -= 1;
		result
	}

	fn decode_tagged(&mut self) -> Result<Object> {
		let byte = self.cursor.read_u8("tag")?;
		let tag = Tag::from_byte(byte).ok_or(DecodeError::UnknownTag(byte))?;

		match tag {
			Tag::Immediate => self.decode_immediate(),
			Tag::Character => Ok(Object::UnicodeCharacter(u16::from(self.cursor.read_u8("character")?))),
			Tag::UnicodeCharacter => Ok(Object::UnicodeCharacter(self.cursor.read_u16_be("unicode character")?)),
			Tag::Binary => self.decode_binary(),
			Tag::Array => self.decode_array(),
			Tag::PlainArray => self.decode_plain_array(),
			Tag::Frame => self.decode_frame(),
			Tag::Symbol => self.decode_symbol(),
			Tag::String => self.decode_string(),
			Tag::Precedent => self.decode_precedent(),
			Tag::Nil => Ok(Object::Nil),
			Tag::SmallRect => self.decode_small_rect(),
		}
	}

	fn decode_immediate(&mut self) -> Result<Object> {
		let value = self.cursor.read_xlong("immediate")?;
		match value {
			TRUE_REF => Ok(Object::True),
			NIL_REF => Ok(Object::Nil),
			v if v & 0b11 == 0 => Ok(Object::Integer(v >> 2)),
			v if v & 0b11 == 0b11 => Ok(Object::MagicPointer((v as u32) >> 2)),
			v if v & 0xF == 0b0110 => u16::try_from(v >> 4).map(Object::UnicodeCharacter).map_err(|_| DecodeError::InvalidImmediate(v)),
			v => Err(DecodeError::InvalidImmediate(v)),
		}
	}

	fn decode_binary(&mut self) -> Result<Object> {
		let slot = self.reserve();
		let len = self.read_length("binary length")?;
		let class = self.decode_object()?;
		let data = self.cursor.read_exact(len, "binary data")?.to_vec();
		Ok(self.settle(slot, Object::Binary(Arc::new(Binary { class, data }))))
	}

	fn decode_array(&mut self) -> Result<Object> {
		let slot = self.reserve();
		let count = self.read_count("array length")?;
		let class = self.decode_object()?;
		let elements = self.decode_elements(count)?;
		Ok(self.settle(slot, Object::Array(Arc::new(Array { class, elements }))))
	}

	fn decode_plain_array(&mut self) -> Result<Object> {
		let slot = self.reserve();
		let count = self.read_count("plain array length")?;
		let elements = self.decode_elements(count)?;
		Ok(self.settle(slot, Object::PlainArray(Arc::new(PlainArray { elements }))))
	}

	fn decode_elements(&mut self, count: usize) -> Result<Vec<Object>> {
		let mut elements = Vec::with_capacity(count);
		for _ in 0..count {
			elements.push(self.decode_object()?);
		}
		Ok(elements)
	}

	/// Frames carry all slot keys first, then all values in the same order.
	fn decode_frame(&mut self) -> Result<Object> {
		let slot = self.reserve();
		let count = self.read_count("frame slot count")?;

		let mut keys = Vec::with_capacity(count);
		let mut seen = HashSet::with_capacity(count);
		for _ in 0..count {
			let key = match self.decode_object()? {
				Object::Symbol(symbol) => symbol,
				other => {
					return Err(DecodeError::ExpectedSymbol {
						field: "frame slot key",
						found: other.kind_name(),
					});
				}
			};
			if !seen.insert(key.clone()) {
				return Err(DecodeError::DuplicateSlot { key: key.name().to_owned() });
			}
			keys.push(key);
		}

		let mut frame = Frame::with_capacity(count);
		for key in keys {
			let value = self.decode_object()?;
			frame.push_unchecked(key, value);
		}

		Ok(self.settle(slot, Object::Frame(Arc::new(frame))))
	}

	fn decode_symbol(&mut self) -> Result<Object> {
		let slot = self.reserve();
		let len = self.read_length("symbol length")?;
		let name: String = self.cursor.read_exact(len, "symbol name")?.iter().map(|byte| char::from(*byte)).collect();
		Ok(self.settle(slot, Object::Symbol(Symbol::new(name))))
	}

	fn decode_string(&mut self) -> Result<Object> {
		let slot = self.reserve();
		let len = self.read_length("string length")?;
		let at = self.cursor.pos();
		if len % 2 != 0 {
			return Err(DecodeError::InvalidLength {
				field: "string length",
				len: len as i64,
			});
		}

		let raw = self.cursor.read_exact(len, "string data")?;
		let mut units: Vec<u16> = raw.chunks_exact(2).map(|pair| u16::from_be_bytes([pair[0], pair[1]])).collect();
		if units.last() == Some(&0) {
			units.pop();
		}
		let text = String::from_utf16(&units).map_err(|_| DecodeError::InvalidUtf16 { at })?;
		Ok(self.settle(slot, Object::String(text)))
	}

	fn decode_small_rect(&mut self) -> Result<Object> {
		let slot = self.reserve();
		let top = self.cursor.read_u8("small rect top")?;
		let left = self.cursor.read_u8("small rect left")?;
		let bottom = self.cursor.read_u8("small rect bottom")?;
		let right = self.cursor.read_u8("small rect right")?;
		Ok(self.settle(slot, Object::SmallRect(SmallRect { top, left, bottom, right })))
	}

	/// Negative xlongs reinterpret as huge indices and fail the bounds check.
	fn decode_precedent(&mut self) -> Result<Object> {
		let index = self.cursor.read_xlong("precedent index")? as u32;
		self.precedents
			.get(index as usize)
			.and_then(Option::clone)
			.ok_or(DecodeError::InvalidPrecedent(index))
	}

	/// Claim the next precedent ordinal before any children are decoded.
	fn reserve(&mut self) -> usize {
		self.precedents.push(None);
		self.precedents.len() - 1
	}

	fn settle(&mut self, slot: usize, object: Object) -> Object {
		if let Some(entry) = self.precedents.get_mut(slot) {
			*entry = Some(object.clone());
		}
		object
	}

	fn read_length(&mut self, field: &'static str) -> Result<usize> {
		let raw = self.cursor.read_xlong(field)?;
		let len = usize::try_from(raw).map_err(|_| DecodeError::InvalidLength { field, len: i64::from(raw) })?;
		if len > self.options.max_length {
			return Err(DecodeError::TooLarge {
				field,
				len,
				max: self.options.max_length,
			});
		}
		Ok(len)
	}

	/// Element counts are bounded by remaining input, since every element takes at least one byte.
	fn read_count(&mut self, field: &'static str) -> Result<usize> {
		let count = self.read_length(field)?;
		if count > self.cursor.remaining() {
			return Err(DecodeError::Truncated {
				field,
				at: self.cursor.pos(),
			});
		}
		Ok(count)
	}
}

#[cfg(test)]
mod tests;
