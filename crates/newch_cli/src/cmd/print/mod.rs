use std::fmt::Write as _;

use newch::nsof::{Object, SmallRect};
use serde::Serialize;

use crate::cmd::util::hex_string;

/// Output truncation limits for rendered objects.
#[derive(Debug, Clone, Copy)]
pub struct PrintOptions {
	/// Maximum number of characters printed for strings.
	pub max_string_len: usize,
	/// Maximum number of bytes shown for binaries.
	pub max_binary_bytes: usize,
	/// Maximum number of elements or slots printed per composite.
	pub max_items: usize,
}

impl Default for PrintOptions {
	fn default() -> Self {
		Self {
			max_string_len: 200,
			max_binary_bytes: 32,
			max_items: 64,
		}
	}
}

/// Render an object as an indented tree, one line per node.
pub fn render_tree(object: &Object, options: &PrintOptions) -> String {
	let mut out = String::new();
	write_node(&mut out, object, 0, options);
	out
}

fn write_node(out: &mut String, object: &Object, depth: usize, options: &PrintOptions) {
	out.push_str(&render_leaf(object, options));
	out.push('\n');

	let indent = "  ".repeat(depth + 1);
	match object {
		Object::Frame(frame) => {
			for (key, value) in frame.iter().take(options.max_items) {
				let _ = write!(out, "{indent}{}: ", key.name());
				write_node(out, value, depth + 1, options);
			}
			write_elided(out, &indent, frame.len(), options.max_items);
		}
		Object::Array(_) | Object::PlainArray(_) => {
			let elements = object.as_array_elements().unwrap_or_default();
			for (index, element) in elements.iter().enumerate().take(options.max_items) {
				let _ = write!(out, "{indent}[{index}] ");
				write_node(out, element, depth + 1, options);
			}
			write_elided(out, &indent, elements.len(), options.max_items);
		}
		_ => {}
	}
}

fn write_elided(out: &mut String, indent: &str, len: usize, max: usize) {
	if len > max {
		let _ = writeln!(out, "{indent}... {} more", len - max);
	}
}

/// One-line form of an object; composites show their header only.
pub fn render_leaf(object: &Object, options: &PrintOptions) -> String {
	match object {
		Object::Integer(value) => value.to_string(),
		Object::True => "true".to_owned(),
		Object::Nil => "nil".to_owned(),
		Object::UnicodeCharacter(code) => render_character(*code),
		Object::MagicPointer(index) => format!("@{index}"),
		Object::Symbol(symbol) => format!("'{}", symbol.name()),
		Object::String(text) => render_string(text, options.max_string_len),
		Object::SmallRect(rect) => render_rect(*rect),
		Object::Binary(binary) => {
			let shown = binary.data.len().min(options.max_binary_bytes);
			let more = if shown < binary.data.len() { "..." } else { "" };
			format!(
				"binary {} ({} bytes) {}{more}",
				render_class(&binary.class, options),
				binary.data.len(),
				hex_string(&binary.data[..shown])
			)
		}
		Object::Array(array) => format!("array {} [{}]", render_class(&array.class, options), array.elements.len()),
		Object::PlainArray(array) => format!("[{}]", array.elements.len()),
		Object::Frame(frame) => format!("frame {{{}}}", frame.len()),
	}
}

fn render_class(class: &Object, options: &PrintOptions) -> String {
	match class {
		Object::Frame(_) | Object::Array(_) | Object::PlainArray(_) | Object::Binary(_) => format!("<{}>", class.kind_name()),
		other => render_leaf(other, options),
	}
}

fn render_character(code: u16) -> String {
	match char::from_u32(u32::from(code)) {
		Some(ch) if !ch.is_control() => format!("${ch}"),
		_ => format!("$\\u{code:04X}"),
	}
}

fn render_string(text: &str, max: usize) -> String {
	let mut shown: String = text.chars().take(max).collect();
	if shown.len() < text.len() {
		shown.push_str("...");
	}
	format!("{shown:?}")
}

fn render_rect(rect: SmallRect) -> String {
	format!("rect {{top: {}, left: {}, bottom: {}, right: {}}}", rect.top, rect.left, rect.bottom, rect.right)
}

/// JSON form of an object.
#[derive(Debug, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ObjectJson {
	/// Immediate integer.
	Integer {
		/// Value.
		value: i32,
	},
	/// Boolean true.
	True,
	/// Nil.
	Nil,
	/// Character as a one-character string.
	Character {
		/// Character text, or U+FFFD for unpaired surrogates.
		value: String,
		/// Raw 16-bit code.
		code: u16,
	},
	/// Magic pointer index.
	MagicPointer {
		/// ROM table index.
		index: u32,
	},
	/// Symbol.
	Symbol {
		/// Symbol name.
		name: String,
	},
	/// String.
	String {
		/// Text.
		value: String,
	},
	/// Small rectangle.
	SmallRect {
		/// Top edge.
		top: u8,
		/// Left edge.
		left: u8,
		/// Bottom edge.
		bottom: u8,
		/// Right edge.
		right: u8,
	},
	/// Classed binary.
	Binary {
		/// Class object.
		class: Box<ObjectJson>,
		/// Bytes as lowercase hex.
		hex: String,
	},
	/// Classed array.
	Array {
		/// Class object.
		class: Box<ObjectJson>,
		/// Elements.
		elements: Vec<ObjectJson>,
	},
	/// Plain array.
	PlainArray {
		/// Elements.
		elements: Vec<ObjectJson>,
	},
	/// Frame.
	Frame {
		/// Slots in wire order.
		slots: Vec<SlotJson>,
	},
}

/// One frame slot in JSON form.
#[derive(Debug, Serialize, PartialEq)]
pub struct SlotJson {
	/// Slot name.
	pub key: String,
	/// Slot value.
	pub value: ObjectJson,
}

impl From<&Object> for ObjectJson {
	fn from(object: &Object) -> Self {
		match object {
			Object::Integer(value) => Self::Integer { value: *value },
			Object::True => Self::True,
			Object::Nil => Self::Nil,
			Object::UnicodeCharacter(code) => Self::Character {
				value: char::decode_utf16([*code]).map(|ch| ch.unwrap_or(char::REPLACEMENT_CHARACTER)).collect(),
				code: *code,
			},
			Object::MagicPointer(index) => Self::MagicPointer { index: *index },
			Object::Symbol(symbol) => Self::Symbol {
				name: symbol.name().to_owned(),
			},
			Object::String(text) => Self::String { value: text.clone() },
			Object::SmallRect(rect) => Self::SmallRect {
				top: rect.top,
				left: rect.left,
				bottom: rect.bottom,
				right: rect.right,
			},
			Object::Binary(binary) => Self::Binary {
				class: Box::new(Self::from(&binary.class)),
				hex: hex_string(&binary.data),
			},
			Object::Array(array) => Self::Array {
				class: Box::new(Self::from(&array.class)),
				elements: array.elements.iter().map(Self::from).collect(),
			},
			Object::PlainArray(array) => Self::PlainArray {
				elements: array.elements.iter().map(Self::from).collect(),
			},
			Object::Frame(frame) => Self::Frame {
				slots: frame
					.iter()
					.map(|(key, value)| SlotJson {
						key: key.name().to_owned(),
						value: Self::from(value),
					})
					.collect(),
			},
		}
	}
}
