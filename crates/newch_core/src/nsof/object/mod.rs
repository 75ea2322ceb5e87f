use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::nsof::ObjectError;

/// NewtonScript symbol.
///
/// Equality and hashing ignore ASCII case, matching how NewtonScript compares symbols.
#[derive(Debug, Clone, Eq)]
pub struct Symbol(Box<str>);

impl Symbol {
	/// Create a symbol from its name.
	pub fn new(name: impl Into<Box<str>>) -> Self {
		Self(name.into())
	}

	/// Symbol name as written.
	pub fn name(&self) -> &str {
		&self.0
	}

	/// Case-folded name used for identity comparisons.
	pub(crate) fn folded(&self) -> String {
		self.0.to_ascii_lowercase()
	}
}

impl PartialEq for Symbol {
	fn eq(&self, other: &Self) -> bool {
		self.0.eq_ignore_ascii_case(&other.0)
	}
}

impl Hash for Symbol {
	fn hash<H: Hasher>(&self, state: &mut H) {
		for byte in self.0.bytes() {
			state.write_u8(byte.to_ascii_lowercase());
		}
		state.write_u8(0xFF);
	}
}

impl fmt::Display for Symbol {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for Symbol {
	fn from(name: &str) -> Self {
		Self::new(name)
	}
}

impl From<String> for Symbol {
	fn from(name: String) -> Self {
		Self::new(name)
	}
}

/// Fixed four-byte rectangle, always ordered top, left, bottom, right.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SmallRect {
	/// Top edge.
	pub top: u8,
	/// Left edge.
	pub left: u8,
	/// Bottom edge.
	pub bottom: u8,
	/// Right edge.
	pub right: u8,
}

/// Byte blob tagged with a class object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
	/// Class, usually a symbol.
	pub class: Object,
	/// Raw bytes.
	pub data: Vec<u8>,
}

/// Array tagged with a class object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Array {
	/// Class, usually a symbol.
	pub class: Object,
	/// Elements in order.
	pub elements: Vec<Object>,
}

/// Array without a class.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PlainArray {
	/// Elements in order.
	pub elements: Vec<Object>,
}

impl PlainArray {
	/// Create a plain array from its elements.
	pub fn new(elements: Vec<Object>) -> Self {
		Self { elements }
	}
}

/// Ordered map from symbol keys to values.
///
/// Keys are unique (ignoring ASCII case) and keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frame {
	slots: Vec<(Symbol, Object)>,
}

impl Frame {
	/// Create an empty frame.
	pub fn new() -> Self {
		Self::default()
	}

	/// Build a frame from slots, rejecting repeated keys.
	pub fn from_slots<K: Into<Symbol>>(slots: impl IntoIterator<Item = (K, Object)>) -> Result<Self, ObjectError> {
		let iter = slots.into_iter();
		let mut seen = HashSet::with_capacity(iter.size_hint().0);
		let mut frame = Self {
			slots: Vec::with_capacity(iter.size_hint().0),
		};
		for (key, value) in iter {
			let key = key.into();
			if !seen.insert(key.clone()) {
				return Err(ObjectError::DuplicateSlot { key: key.name().to_owned() });
			}
			frame.slots.push((key, value));
		}
		Ok(frame)
	}

	/// Append a slot; fails if the key is already present.
	pub fn insert(&mut self, key: impl Into<Symbol>, value: Object) -> Result<(), ObjectError> {
		let key = key.into();
		if self.contains(key.name()) {
			return Err(ObjectError::DuplicateSlot { key: key.name().to_owned() });
		}
		self.slots.push((key, value));
		Ok(())
	}

	/// Builder form of [`Frame::insert`].
	pub fn with_slot(mut self, key: impl Into<Symbol>, value: Object) -> Result<Self, ObjectError> {
		self.insert(key, value)?;
		Ok(self)
	}

	/// Look up a slot by name, ignoring ASCII case.
	pub fn get(&self, key: &str) -> Option<&Object> {
		self.slots.iter().find(|(slot, _)| slot.name().eq_ignore_ascii_case(key)).map(|(_, value)| value)
	}

	/// Whether a slot with this name exists.
	pub fn contains(&self, key: &str) -> bool {
		self.get(key).is_some()
	}

	/// Number of slots.
	pub fn len(&self) -> usize {
		self.slots.len()
	}

	/// Whether the frame has no slots.
	pub fn is_empty(&self) -> bool {
		self.slots.is_empty()
	}

	/// Slot keys in order.
	pub fn keys(&self) -> impl Iterator<Item = &Symbol> {
		self.slots.iter().map(|(key, _)| key)
	}

	/// Slot values in order.
	pub fn values(&self) -> impl Iterator<Item = &Object> {
		self.slots.iter().map(|(_, value)| value)
	}

	/// Slots in order.
	pub fn iter(&self) -> impl Iterator<Item = (&Symbol, &Object)> {
		self.slots.iter().map(|(key, value)| (key, value))
	}

	/// Append a slot whose key the caller already checked for uniqueness.
	pub(crate) fn push_unchecked(&mut self, key: Symbol, value: Object) {
		self.slots.push((key, value));
	}

	pub(crate) fn with_capacity(capacity: usize) -> Self {
		Self {
			slots: Vec::with_capacity(capacity),
		}
	}
}

/// NSOF value.
///
/// Composite kinds are shared through `Arc`; two composites are the same object only when
/// they share an allocation, which is what precedent deduplication keys on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
	/// Immediate integer (30-bit signed range on the wire).
	Integer(i32),
	/// Boolean true.
	True,
	/// Nil.
	Nil,
	/// 16-bit character.
	UnicodeCharacter(u16),
	/// Immediate reference into the ROM magic-pointer table.
	MagicPointer(u32),
	/// Symbol.
	Symbol(Symbol),
	/// Text string.
	String(String),
	/// Four-byte rectangle.
	SmallRect(SmallRect),
	/// Classed byte blob.
	Binary(Arc<Binary>),
	/// Classed array.
	Array(Arc<Array>),
	/// Classless array.
	PlainArray(Arc<PlainArray>),
	/// Slot map.
	Frame(Arc<Frame>),
}

impl Object {
	/// Symbol object.
	pub fn symbol(name: impl Into<Symbol>) -> Self {
		Self::Symbol(name.into())
	}

	/// String object.
	pub fn string(text: impl Into<String>) -> Self {
		Self::String(text.into())
	}

	/// Frame object.
	pub fn frame(frame: Frame) -> Self {
		Self::Frame(Arc::new(frame))
	}

	/// Plain array object.
	pub fn plain_array(elements: Vec<Object>) -> Self {
		Self::PlainArray(Arc::new(PlainArray { elements }))
	}

	/// Classed array object.
	pub fn array(class: Object, elements: Vec<Object>) -> Self {
		Self::Array(Arc::new(Array { class, elements }))
	}

	/// Binary object.
	pub fn binary(class: Object, data: Vec<u8>) -> Self {
		Self::Binary(Arc::new(Binary { class, data }))
	}

	/// Stable lowercase kind label.
	pub fn kind_name(&self) -> &'static str {
		match self {
			Self::Integer(_) => "integer",
			Self::True => "true",
			Self::Nil => "nil",
			Self::UnicodeCharacter(_) => "unicode_character",
			Self::MagicPointer(_) => "magic_pointer",
			Self::Symbol(_) => "symbol",
			Self::String(_) => "string",
			Self::SmallRect(_) => "small_rect",
			Self::Binary(_) => "binary",
			Self::Array(_) => "array",
			Self::PlainArray(_) => "plain_array",
			Self::Frame(_) => "frame",
		}
	}

	/// Integer value, if this is an integer.
	pub fn as_integer(&self) -> Option<i32> {
		match self {
			Self::Integer(value) => Some(*value),
			_ => None,
		}
	}

	/// Symbol, if this is a symbol.
	pub fn as_symbol(&self) -> Option<&Symbol> {
		match self {
			Self::Symbol(symbol) => Some(symbol),
			_ => None,
		}
	}

	/// Text, if this is a string.
	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(text) => Some(text),
			_ => None,
		}
	}

	/// Rectangle, if this is a small rect.
	pub fn as_small_rect(&self) -> Option<SmallRect> {
		match self {
			Self::SmallRect(rect) => Some(*rect),
			_ => None,
		}
	}

	/// Binary, if this is a binary object.
	pub fn as_binary(&self) -> Option<&Binary> {
		match self {
			Self::Binary(binary) => Some(binary),
			_ => None,
		}
	}

	/// Frame, if this is a frame.
	pub fn as_frame(&self) -> Option<&Frame> {
		match self {
			Self::Frame(frame) => Some(frame),
			_ => None,
		}
	}

	/// Elements of a classed or plain array.
	pub fn as_array_elements(&self) -> Option<&[Object]> {
		match self {
			Self::Array(array) => Some(&array.elements),
			Self::PlainArray(array) => Some(&array.elements),
			_ => None,
		}
	}

	/// Class of a classed array or binary.
	pub fn class(&self) -> Option<&Object> {
		match self {
			Self::Array(array) => Some(&array.class),
			Self::Binary(binary) => Some(&binary.class),
			_ => None,
		}
	}

	/// Frame slot lookup; `None` for missing keys and non-frames.
	pub fn get(&self, key: &str) -> Option<&Object> {
		self.as_frame()?.get(key)
	}

	/// Array element lookup; `None` for bad indices and non-arrays.
	pub fn at(&self, index: usize) -> Option<&Object> {
		self.as_array_elements()?.get(index)
	}

	/// Whether this is nil.
	pub fn is_nil(&self) -> bool {
		matches!(self, Self::Nil)
	}

	/// Whether both values are the same shared composite allocation.
	pub fn same_identity(&self, other: &Object) -> bool {
		match (self, other) {
			(Self::Binary(left), Self::Binary(right)) => Arc::ptr_eq(left, right),
			(Self::Array(left), Self::Array(right)) => Arc::ptr_eq(left, right),
			(Self::PlainArray(left), Self::PlainArray(right)) => Arc::ptr_eq(left, right),
			(Self::Frame(left), Self::Frame(right)) => Arc::ptr_eq(left, right),
			_ => false,
		}
	}
}

impl From<i32> for Object {
	fn from(value: i32) -> Self {
		Self::Integer(value)
	}
}

impl From<Symbol> for Object {
	fn from(symbol: Symbol) -> Self {
		Self::Symbol(symbol)
	}
}

impl From<SmallRect> for Object {
	fn from(rect: SmallRect) -> Self {
		Self::SmallRect(rect)
	}
}

impl From<Frame> for Object {
	fn from(frame: Frame) -> Self {
		Self::frame(frame)
	}
}

impl From<PlainArray> for Object {
	fn from(array: PlainArray) -> Self {
		Self::PlainArray(Arc::new(array))
	}
}
