use std::fmt;

/// Four-byte Dock command code.
///
/// The set is open: unknown codes still frame and route, they just have no typed payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct DockCommand(pub [u8; 4]);

impl DockCommand {
	/// Newton asks to start a session.
	pub const REQUEST_TO_DOCK: Self = Self(*b"rtdk");
	/// Host accepts and names the session type.
	pub const INITIATE_DOCKING: Self = Self(*b"dock");
	/// Newton identifies itself.
	pub const NEWTON_NAME: Self = Self(*b"name");
	/// Host describes itself.
	pub const DESKTOP_INFO: Self = Self(*b"dinf");
	/// Newton protocol version and challenge key.
	pub const NEWTON_INFO: Self = Self(*b"ninf");
	/// Host selects the icons shown on the Newton.
	pub const WHICH_ICONS: Self = Self(*b"wicn");
	/// Host sets the Newton-side timeout.
	pub const SET_TIMEOUT: Self = Self(*b"stim");
	/// Password exchange.
	pub const PASSWORD: Self = Self(*b"pass");
	/// Result code of the previous request.
	pub const RESULT: Self = Self(*b"dres");
	/// Keep-alive.
	pub const HELLO: Self = Self(*b"helo");
	/// Session teardown.
	pub const DISCONNECT: Self = Self(*b"disc");
	/// Keyboard passthrough request and acknowledgment.
	pub const START_KEYBOARD_PASSTHROUGH: Self = Self(*b"kybd");
	/// One keyboard character.
	pub const KEYBOARD_CHAR: Self = Self(*b"kbdc");
	/// Keyboard text run.
	pub const KEYBOARD_STRING: Self = Self(*b"kbds");
	/// Call a global function on the Newton.
	pub const CALL_ROOT_METHOD: Self = Self(*b"crmd");
	/// Return value of a root method call.
	pub const CALL_RESULT: Self = Self(*b"cres");
	/// Operation finished.
	pub const OPERATION_DONE: Self = Self(*b"opdn");
	/// Operation canceled by the sender.
	pub const OPERATION_CANCELED: Self = Self(*b"opca");
	/// Acknowledges an operation cancel.
	pub const OPERATION_CANCELED_ACK: Self = Self(*b"ocaa");

	/// Raw code bytes.
	pub fn code(self) -> [u8; 4] {
		self.0
	}
}

impl fmt::Display for DockCommand {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		for byte in self.0 {
			let ch = if byte.is_ascii_graphic() { char::from(byte) } else { '.' };
			write!(f, "{ch}")?;
		}
		Ok(())
	}
}

impl fmt::Debug for DockCommand {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "DockCommand({self})")
	}
}

impl From<[u8; 4]> for DockCommand {
	fn from(code: [u8; 4]) -> Self {
		Self(code)
	}
}
