use std::io;
use std::path::PathBuf;

use newch::dock::ConnectionError;
use newch::nsof::DecodeError;

/// Result alias for CLI commands.
pub type Result<T> = std::result::Result<T, CliError>;

/// Anything a command can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CliError {
	/// Input file could not be read.
	#[error("read {path}: {source}")]
	ReadInput {
		/// File that failed.
		path: PathBuf,
		/// Underlying I/O error.
		#[source]
		source: io::Error,
	},
	/// Hex text was malformed.
	#[error("invalid hex at line {line}: {detail}")]
	InvalidHex {
		/// 1-based line number.
		line: usize,
		/// What was wrong.
		detail: String,
	},
	/// Input held no bytes to decode.
	#[error("no NSOF data in input")]
	EmptyInput,
	/// Object at a byte offset failed to decode.
	#[error("object at offset {offset}: {source}")]
	DecodeAt {
		/// Offset of the failing object in the input.
		offset: usize,
		/// Decoder error.
		#[source]
		source: DecodeError,
	},
	/// Serial port could not be opened.
	#[error("serial port: {0}")]
	Serial(#[from] serialport::Error),
	/// Session failure.
	#[error(transparent)]
	Connection(#[from] ConnectionError),
	/// The session closed without the user asking.
	#[error("session closed: {reason}")]
	SessionClosed {
		/// Close reason reported by the session.
		reason: String,
	},
	/// Console or socket I/O failed.
	#[error(transparent)]
	Io(#[from] io::Error),
	/// JSON output failed.
	#[error("json output: {0}")]
	Json(#[from] serde_json::Error),
}
