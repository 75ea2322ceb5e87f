use std::collections::HashMap;
use std::sync::Arc;

use crate::nsof::tag::{IMMEDIATE_INT_MAX, IMMEDIATE_INT_MIN, MAGIC_POINTER_MAX, NIL_REF, NSOF_VERSION, TRUE_REF};
use crate::nsof::{EncodeError, Frame, Object, Symbol, Tag};

/// Encode one bare object (no version byte).
pub fn encode(object: &Object) -> Result<Vec<u8>, EncodeError> {
	let mut encoder = Encoder::default();
	encoder.write_object(object)?;
	Ok(encoder.out)
}

/// Encode one top-level stream: version byte, then the object.
pub fn encode_root(object: &Object) -> Result<Vec<u8>, EncodeError> {
	let mut encoder = Encoder::default();
	encoder.out.push(NSOF_VERSION);
	encoder.write_object(object)?;
	Ok(encoder.out)
}

/// Identity under which an already-written object can be referenced again.
#[derive(Debug, PartialEq, Eq, Hash)]
enum PrecedentKey {
	/// Address of a shared composite allocation.
	Composite(usize),
	/// Case-folded symbol name.
	Symbol(String),
}

/// Single-use encoder; its precedent table lives only as long as one encode call.
#[derive(Default)]
struct Encoder {
	out: Vec<u8>,
	precedents: HashMap<PrecedentKey, u32>,
	next_id: u32,
}

impl Encoder {
	fn write_object(&mut self, object: &Object) -> Result<(), EncodeError> {
		match object {
			Object::Integer(value) => {
				if !(IMMEDIATE_INT_MIN..=IMMEDIATE_INT_MAX).contains(value) {
					return Err(EncodeError::ValueOutOfRange {
						kind: "integer",
						value: i64::from(*value),
					});
				}
				self.write_immediate(*value << 2);
			}
			Object::True => self.write_immediate(TRUE_REF),
			Object::Nil => self.out.push(Tag::Nil.byte()),
			Object::UnicodeCharacter(code) => {
				self.out.push(Tag::UnicodeCharacter.byte());
				self.out.extend_from_slice(&code.to_be_bytes());
			}
			Object::MagicPointer(index) => {
				if *index > MAGIC_POINTER_MAX {
					return Err(EncodeError::ValueOutOfRange {
						kind: "magic pointer",
						value: i64::from(*index),
					});
				}
				self.write_immediate(((*index << 2) | 0b11) as i32);
			}
			Object::Symbol(symbol) => self.write_symbol(symbol)?,
			Object::String(text) => {
				self.number();
				let mut raw: Vec<u8> = text.encode_utf16().flat_map(u16::to_be_bytes).collect();
				raw.extend_from_slice(&[0, 0]);
				self.out.push(Tag::String.byte());
				self.write_length("string length", raw.len())?;
				self.out.extend_from_slice(&raw);
			}
			Object::SmallRect(rect) => {
				self.number();
				self.out.extend_from_slice(&[Tag::SmallRect.byte(), rect.top, rect.left, rect.bottom, rect.right]);
			}
			Object::Binary(binary) => {
				if self.write_precedent_for(composite_key(binary)) {
					return Ok(());
				}
				self.out.push(Tag::Binary.byte());
				self.write_length("binary length", binary.data.len())?;
				self.write_object(&binary.class)?;
				self.out.extend_from_slice(&binary.data);
			}
			Object::Array(array) => {
				if self.write_precedent_for(composite_key(array)) {
					return Ok(());
				}
				self.out.push(Tag::Array.byte());
				self.write_length("array length", array.elements.len())?;
				self.write_object(&array.class)?;
				self.write_elements(&array.elements)?;
			}
			Object::PlainArray(array) => {
				if self.write_precedent_for(composite_key(array)) {
					return Ok(());
				}
				self.out.push(Tag::PlainArray.byte());
				self.write_length("plain array length", array.elements.len())?;
				self.write_elements(&array.elements)?;
			}
			Object::Frame(frame) => {
				if self.write_precedent_for(composite_key(frame)) {
					return Ok(());
				}
				self.write_frame(frame)?;
			}
		}
		Ok(())
	}

	fn write_elements(&mut self, elements: &[Object]) -> Result<(), EncodeError> {
		for element in elements {
			self.write_object(element)?;
		}
		Ok(())
	}

	fn write_frame(&mut self, frame: &Frame) -> Result<(), EncodeError> {
		self.out.push(Tag::Frame.byte());
		self.write_length("frame slot count", frame.len())?;
		for key in frame.keys() {
			self.write_symbol(key)?;
		}
		for value in frame.values() {
			self.write_object(value)?;
		}
		Ok(())
	}

	fn write_symbol(&mut self, symbol: &Symbol) -> Result<(), EncodeError> {
		if self.write_precedent_for(PrecedentKey::Symbol(symbol.folded())) {
			return Ok(());
		}

		let name = symbol
			.name()
			.chars()
			.map(|ch| u8::try_from(u32::from(ch)))
			.collect::<Result<Vec<u8>, _>>()
			.map_err(|_| EncodeError::UnencodableSymbol {
				name: symbol.name().to_owned(),
			})?;
		self.out.push(Tag::Symbol.byte());
		self.write_length("symbol length", name.len())?;
		self.out.extend_from_slice(&name);
		Ok(())
	}

	/// Emit a precedent if `key` was written before; otherwise claim the next ordinal for it.
	fn write_precedent_for(&mut self, key: PrecedentKey) -> bool {
		if let Some(id) = self.precedents.get(&key).copied() {
			self.out.push(Tag::Precedent.byte());
			self.write_xlong(id as i32);
			return true;
		}
		let id = self.number();
		self.precedents.insert(key, id);
		false
	}

	/// Claim the next precedent ordinal.
	fn number(&mut self) -> u32 {
		let id = self.next_id;
		self.next_id += 1;
		id
	}

	fn write_immediate(&mut self, reference: i32) {
		debug_assert_ne!(reference, NIL_REF, "nil is written with its own tag");
		self.out.push(Tag::Immediate.byte());
		self.write_xlong(reference);
	}

	fn write_length(&mut self, field: &'static str, len: usize) -> Result<(), EncodeError> {
		let value = i32::try_from(len).map_err(|_| EncodeError::TooLarge { field, len })?;
		self.write_xlong(value);
		Ok(())
	}

	fn write_xlong(&mut self, value: i32) {
		match u8::try_from(value) {
			Ok(byte) if byte < 0xFF => self.out.push(byte),
			_ => {
				self.out.push(0xFF);
				self.out.extend_from_slice(&value.to_be_bytes());
			}
		}
	}
}

fn composite_key<T>(value: &Arc<T>) -> PrecedentKey {
	PrecedentKey::Composite(Arc::as_ptr(value).cast::<()>() as usize)
}

#[cfg(test)]
mod tests;
