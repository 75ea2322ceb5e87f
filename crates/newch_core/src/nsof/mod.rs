pub(crate) mod bytes;
mod decode;
mod encode;
mod error;
mod object;
mod tag;

/// Decoding entry points and limits.
pub use decode::{DecodeOptions, decode, decode_root, decode_root_with, decode_with};
/// Encoding entry points.
pub use encode::{encode, encode_root};
/// Error and result aliases.
pub use error::{DecodeError, EncodeError, ObjectError, Result};
/// Object model.
pub use object::{Array, Binary, Frame, Object, PlainArray, SmallRect, Symbol};
/// Wire tags and stream version.
pub use tag::{NSOF_VERSION, Tag};
