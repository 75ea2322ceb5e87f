use thiserror::Error;

/// Result alias for NSOF decoding.
pub type Result<T> = std::result::Result<T, DecodeError>;

/// Errors produced while decoding NSOF bytes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
	/// Tag byte does not name a supported object kind.
	#[error("unknown NSOF tag 0x{0:02x}")]
	UnknownTag(u8),
	/// Input ended before a field was complete.
	#[error("truncated NSOF input reading {field} at offset {at}")]
	Truncated {
		/// Field being read.
		field: &'static str,
		/// Byte offset where the read was attempted.
		at: usize,
	},
	/// Precedent index names no completed object.
	#[error("invalid precedent index {0}")]
	InvalidPrecedent(u32),
	/// Root stream started with an unexpected version byte.
	#[error("unsupported NSOF version {0} (expected 2)")]
	UnsupportedVersion(u8),
	/// Declared length is negative or malformed.
	#[error("invalid {field} {len}")]
	InvalidLength {
		/// Length field name.
		field: &'static str,
		/// Raw declared value.
		len: i64,
	},
	/// Declared length exceeds the configured limit.
	#[error("{field} {len} exceeds limit {max}")]
	TooLarge {
		/// Length field name.
		field: &'static str,
		/// Declared length.
		len: usize,
		/// Configured ceiling.
		max: usize,
	},
	/// Immediate reference bits match no immediate kind.
	#[error("invalid immediate ref 0x{0:08x}")]
	InvalidImmediate(i32),
	/// String payload is not valid UTF-16.
	#[error("invalid UTF-16 string at offset {at}")]
	InvalidUtf16 {
		/// Byte offset of the string payload.
		at: usize,
	},
	/// Frame declared the same slot twice.
	#[error("duplicate frame slot {key}")]
	DuplicateSlot {
		/// Repeated slot name.
		key: String,
	},
	/// Position requiring a symbol held another kind.
	#[error("expected symbol for {field}, got {found}")]
	ExpectedSymbol {
		/// Position being decoded.
		field: &'static str,
		/// Kind that was found instead.
		found: &'static str,
	},
	/// Object nesting exceeded the configured depth.
	#[error("NSOF nesting exceeded max depth {max}")]
	DepthExceeded {
		/// Configured depth ceiling.
		max: u32,
	},
}

/// Errors produced while encoding objects to NSOF.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
	/// Scalar does not fit its immediate encoding.
	#[error("{kind} value {value} out of range")]
	ValueOutOfRange {
		/// Object kind being encoded.
		kind: &'static str,
		/// Offending value.
		value: i64,
	},
	/// Length does not fit an xlong.
	#[error("{field} {len} too large to encode")]
	TooLarge {
		/// Length being encoded.
		field: &'static str,
		/// Actual length.
		len: usize,
	},
	/// Symbol name holds characters outside the 8-bit range.
	#[error("symbol {name:?} has characters outside U+0000..=U+00FF")]
	UnencodableSymbol {
		/// Offending symbol name.
		name: String,
	},
}

/// Errors produced while building objects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectError {
	/// Slot key already present in the frame.
	#[error("duplicate frame slot {key}")]
	DuplicateSlot {
		/// Repeated slot name.
		key: String,
	},
}
