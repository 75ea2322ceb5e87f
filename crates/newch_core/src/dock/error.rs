use std::time::Duration;

use thiserror::Error;

use crate::dock::{DockCommand, SessionState};
use crate::nsof::{DecodeError, EncodeError};

/// Result alias for Dock packet framing and payloads.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors produced while framing or parsing Dock packets.
#[derive(Debug, Error)]
pub enum ProtocolError {
	/// Packet did not start with `newtdock`.
	#[error("bad dock magic {found:02x?}")]
	BadMagic {
		/// First eight bytes actually read.
		found: [u8; 8],
	},
	/// Input ended inside a packet.
	#[error("truncated dock packet: need {need} bytes, have {have}")]
	Truncated {
		/// Bytes required to finish the packet.
		need: usize,
		/// Bytes available.
		have: usize,
	},
	/// Payload held bytes beyond what its content consumed.
	#[error("dock payload declared {declared} bytes but content consumed {consumed}")]
	TrailingBytes {
		/// Payload length.
		declared: usize,
		/// Bytes consumed by the decoded content.
		consumed: usize,
	},
	/// Declared payload length exceeds the packet ceiling.
	#[error("dock payload length {len} exceeds limit {max}")]
	PayloadTooLarge {
		/// Declared length.
		len: usize,
		/// Configured ceiling.
		max: usize,
	},
	/// Packet carried a different command than the one being parsed.
	#[error("expected {expected} packet, got {found}")]
	UnexpectedCommand {
		/// Command the parser handles.
		expected: DockCommand,
		/// Command on the packet.
		found: DockCommand,
	},
	/// Payload framed correctly but its content is malformed.
	#[error("malformed {command} payload: {detail}")]
	UnexpectedPayload {
		/// Command whose payload failed.
		command: DockCommand,
		/// What was wrong.
		detail: String,
	},
	/// NSOF content failed to decode.
	#[error(transparent)]
	Decode(#[from] DecodeError),
	/// NSOF content failed to encode.
	#[error(transparent)]
	Encode(#[from] EncodeError),
	/// Underlying stream failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

/// Errors produced by the connection state machine and session driver.
#[derive(Debug, Error)]
pub enum ConnectionError {
	/// Handshake was aborted; the connection is now disconnected.
	#[error("handshake failed: {reason}")]
	HandshakeFailed {
		/// Why the handshake stopped.
		reason: String,
	},
	/// Operation is not allowed in the current state; nothing was sent.
	#[error("cannot {operation} while {state}")]
	InvalidStateForOperation {
		/// State at the time of the call.
		state: SessionState,
		/// Operation that was attempted.
		operation: &'static str,
	},
	/// Newton answered a request with a nonzero result code.
	#[error("newton rejected {operation} with error {code}")]
	Rejected {
		/// Operation that was rejected.
		operation: &'static str,
		/// Dock error code.
		code: i32,
	},
	/// A reply did not arrive in time; the connection is now disconnected.
	#[error("timed out after {waited:?} while {state}")]
	Timeout {
		/// State that was waiting.
		state: SessionState,
		/// How long it waited.
		waited: Duration,
	},
	/// Caller cancelled a blocking wait.
	#[error("cancelled")]
	Cancelled,
	/// Session ended before the awaited outcome.
	#[error("session disconnected")]
	Disconnected,
	/// Link event channel closed under the session.
	#[error("link closed")]
	LinkClosed,
	/// Packet framing or payload error.
	#[error(transparent)]
	Protocol(#[from] ProtocolError),
	/// Write half of the link failed.
	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl ConnectionError {
	/// Whether the error forces the connection into its terminal state.
	pub fn is_fatal(&self) -> bool {
		!matches!(self, Self::InvalidStateForOperation { .. } | Self::Rejected { .. })
	}
}
