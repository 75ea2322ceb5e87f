/// Version byte opening every top-level NSOF stream.
pub const NSOF_VERSION: u8 = 2;

/// One-byte NSOF type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
	/// Immediate ref (integer, true, nil, character, magic pointer).
	Immediate = 0,
	/// 8-bit character.
	Character = 1,
	/// 16-bit character.
	UnicodeCharacter = 2,
	/// Classed byte blob.
	Binary = 3,
	/// Classed array.
	Array = 4,
	/// Classless array.
	PlainArray = 5,
	/// Ordered slot map.
	Frame = 6,
	/// Symbol name.
	Symbol = 7,
	/// UTF-16 string.
	String = 8,
	/// Backreference to an earlier object.
	Precedent = 9,
	/// Nil.
	Nil = 10,
	/// Four-byte rectangle.
	SmallRect = 11,
}

impl Tag {
	/// Map a wire byte to its tag.
	///
	/// Compressed large binaries (tag 12) are not supported and map to `None`.
	pub fn from_byte(byte: u8) -> Option<Self> {
		Some(match byte {
			0 => Self::Immediate,
			1 => Self::Character,
			2 => Self::UnicodeCharacter,
			3 => Self::Binary,
			4 => Self::Array,
			5 => Self::PlainArray,
			6 => Self::Frame,
			7 => Self::Symbol,
			8 => Self::String,
			9 => Self::Precedent,
			10 => Self::Nil,
			11 => Self::SmallRect,
			_ => return None,
		})
	}

	/// Wire byte for this tag.
	pub fn byte(self) -> u8 {
		self as u8
	}
}

/// Immediate ref for `true`.
pub(crate) const TRUE_REF: i32 = 0x1A;
/// Immediate ref for `nil`.
pub(crate) const NIL_REF: i32 = 0x02;
/// Smallest integer that fits an immediate ref.
pub(crate) const IMMEDIATE_INT_MIN: i32 = -(1 << 29);
/// Largest integer that fits an immediate ref.
pub(crate) const IMMEDIATE_INT_MAX: i32 = (1 << 29) - 1;
/// Largest magic pointer index that fits an immediate ref.
pub(crate) const MAGIC_POINTER_MAX: u32 = (1 << 30) - 1;
