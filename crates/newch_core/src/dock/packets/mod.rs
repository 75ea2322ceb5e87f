//! Typed payloads for each Dock command.
//!
//! Raw words are big-endian; strings are UTF-16BE with a terminating null; NSOF content is
//! carried as root streams (version byte each).

use std::sync::Arc;

use bytes::{BufMut, BytesMut};

use crate::dock::packet::{decode_root_objects, ensure_consumed};
use crate::dock::{DockCommand, DockPacket, ProtocolError, Result};
use crate::nsof::bytes::Cursor;
use crate::nsof::{Frame, Object, PlainArray, Symbol, decode_root, encode_root};

/// Version announced in `dinf`.
pub const DOCK_PROTOCOL_VERSION: u32 = 10;

/// Payload shape of one Dock command.
pub trait DockMessage: Sized {
	/// Command this payload belongs to.
	const COMMAND: DockCommand;

	/// Append the payload bytes.
	fn encode_payload(&self, out: &mut BytesMut) -> Result<()>;

	/// Parse a complete payload.
	fn decode_payload(payload: &[u8]) -> Result<Self>;

	/// Frame this message as a packet.
	fn to_packet(&self) -> Result<DockPacket> {
		let mut out = BytesMut::new();
		self.encode_payload(&mut out)?;
		Ok(DockPacket::new(Self::COMMAND, out.freeze()))
	}

	/// Parse a packet that must carry this message's command.
	fn from_packet(packet: &DockPacket) -> Result<Self> {
		if packet.command != Self::COMMAND {
			return Err(ProtocolError::UnexpectedCommand {
				expected: Self::COMMAND,
				found: packet.command,
			});
		}
		Self::decode_payload(&packet.payload)
	}
}

/// Kind of session the host asks for in `dock` and `dinf`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SessionType {
	/// Plain connection, no sync.
	#[default]
	None = 0,
	/// First-time setup.
	SettingUp = 1,
	/// Synchronize.
	Synchronize = 2,
	/// Restore.
	Restore = 3,
	/// Install a package.
	LoadPackage = 4,
	/// Communications test.
	TestComm = 5,
	/// Install a system patch.
	LoadPatch = 6,
	/// Store update.
	UpdatingStores = 7,
}

impl SessionType {
	/// Map a wire word to a session type.
	pub fn from_u32(value: u32) -> Option<Self> {
		Some(match value {
			0 => Self::None,
			1 => Self::SettingUp,
			2 => Self::Synchronize,
			3 => Self::Restore,
			4 => Self::LoadPackage,
			5 => Self::TestComm,
			6 => Self::LoadPatch,
			7 => Self::UpdatingStores,
			_ => return None,
		})
	}
}

/// Host platform announced in `dinf`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum DesktopType {
	/// Mac OS host.
	#[default]
	Macintosh = 0,
	/// Windows host.
	Windows = 1,
}

impl DesktopType {
	/// Map a wire word to a desktop type.
	pub fn from_u32(value: u32) -> Option<Self> {
		match value {
			0 => Some(Self::Macintosh),
			1 => Some(Self::Windows),
			_ => None,
		}
	}
}

/// `rtdk`: Newton asks to dock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestToDock {
	/// Newton protocol version.
	pub protocol_version: u32,
}

impl DockMessage for RequestToDock {
	const COMMAND: DockCommand = DockCommand::REQUEST_TO_DOCK;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_u32(self.protocol_version);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let protocol_version = reader.u32("protocol version")?;
		reader.finish()?;
		Ok(Self { protocol_version })
	}
}

/// `dock`: host accepts the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateDocking {
	/// Requested session type.
	pub session_type: SessionType,
}

impl DockMessage for InitiateDocking {
	const COMMAND: DockCommand = DockCommand::INITIATE_DOCKING;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_u32(self.session_type as u32);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let session_type = reader.session_type(Self::COMMAND)?;
		reader.finish()?;
		Ok(Self { session_type })
	}
}

/// `name`: Newton version block and owner name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewtonName {
	/// Version block words, as sent.
	pub version_info: Vec<u32>,
	/// Owner name.
	pub name: String,
}

impl DockMessage for NewtonName {
	const COMMAND: DockCommand = DockCommand::NEWTON_NAME;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_u32((self.version_info.len() * 4) as u32);
		for word in &self.version_info {
			out.put_u32(*word);
		}
		put_utf16_cstring(out, &self.name);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let info_len = reader.u32("version info length")? as usize;
		if info_len % 4 != 0 || info_len > reader.remaining() {
			return Err(malformed(Self::COMMAND, format!("version info length {info_len}")));
		}
		let version_info = (0..info_len / 4).map(|_| reader.u32("version info")).collect::<Result<Vec<_>>>()?;
		let name = reader.utf16_cstring("newton name")?;
		reader.finish()?;
		Ok(Self { version_info, name })
	}
}

/// `dinf`: host description and the desktop apps it offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesktopInfo {
	/// Host protocol version.
	pub protocol_version: u32,
	/// Host platform.
	pub desktop_type: DesktopType,
	/// Host challenge key.
	pub key: [u8; 8],
	/// Session type.
	pub session_type: SessionType,
	/// Whether selective sync is allowed.
	pub allow_selective_sync: bool,
	/// Array of desktop-app frames (`name`, `id`, `version`).
	pub desktop_apps: Arc<PlainArray>,
}

impl DesktopInfo {
	/// App list naming this host.
	pub fn default_apps() -> Arc<PlainArray> {
		let mut app = Frame::new();
		app.push_unchecked(Symbol::new("name"), Object::string("newch"));
		app.push_unchecked(Symbol::new("id"), Object::Integer(2));
		app.push_unchecked(Symbol::new("version"), Object::Integer(1));
		Arc::new(PlainArray::new(vec![Object::frame(app)]))
	}
}

impl DockMessage for DesktopInfo {
	const COMMAND: DockCommand = DockCommand::DESKTOP_INFO;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_u32(self.protocol_version);
		out.put_u32(self.desktop_type as u32);
		out.put_slice(&self.key);
		out.put_u32(self.session_type as u32);
		out.put_u32(u32::from(self.allow_selective_sync));
		out.put_slice(&encode_root(&Object::PlainArray(Arc::clone(&self.desktop_apps)))?);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let protocol_version = reader.u32("protocol version")?;
		let desktop_type = reader.u32("desktop type")?;
		let desktop_type = DesktopType::from_u32(desktop_type).ok_or_else(|| malformed(Self::COMMAND, format!("desktop type {desktop_type}")))?;
		let key = reader.key()?;
		let session_type = reader.session_type(Self::COMMAND)?;
		let allow_selective_sync = reader.u32("selective sync")? != 0;
		let desktop_apps = match reader.root_object()? {
			Object::PlainArray(apps) => apps,
			other => return Err(malformed(Self::COMMAND, format!("desktop apps is {}", other.kind_name()))),
		};
		reader.finish()?;
		Ok(Self {
			protocol_version,
			desktop_type,
			key,
			session_type,
			allow_selective_sync,
			desktop_apps,
		})
	}
}

/// `ninf`: Newton protocol version and challenge key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewtonInfo {
	/// Newton protocol version.
	pub protocol_version: u32,
	/// Newton challenge key.
	pub key: [u8; 8],
}

impl DockMessage for NewtonInfo {
	const COMMAND: DockCommand = DockCommand::NEWTON_INFO;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_u32(self.protocol_version);
		out.put_slice(&self.key);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let protocol_version = reader.u32("protocol version")?;
		let key = reader.key()?;
		reader.finish()?;
		Ok(Self { protocol_version, key })
	}
}

/// `wicn`: icon mask for the Newton's connection screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhichIcons {
	/// Icon bit mask.
	pub icons: u32,
}

impl DockMessage for WhichIcons {
	const COMMAND: DockCommand = DockCommand::WHICH_ICONS;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_u32(self.icons);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let icons = reader.u32("icons")?;
		reader.finish()?;
		Ok(Self { icons })
	}
}

/// `stim`: Newton-side idle timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetTimeout {
	/// Timeout in seconds.
	pub seconds: u32,
}

impl DockMessage for SetTimeout {
	const COMMAND: DockCommand = DockCommand::SET_TIMEOUT;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_u32(self.seconds);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let seconds = reader.u32("timeout")?;
		reader.finish()?;
		Ok(Self { seconds })
	}
}

/// `pass`: challenge response.
///
/// The key is carried as-is. Nothing here derives or checks the DES-encrypted response a
/// password-protected Newton expects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Password {
	/// Response key.
	pub key: [u8; 8],
}

impl DockMessage for Password {
	const COMMAND: DockCommand = DockCommand::PASSWORD;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_slice(&self.key);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let key = reader.key()?;
		reader.finish()?;
		Ok(Self { key })
	}
}

/// `dres`: result code of the previous request; zero is success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DockResult {
	/// Dock error code.
	pub error_code: i32,
}

impl DockResult {
	/// Success result.
	pub const OK: Self = Self { error_code: 0 };

	/// Whether the code signals success.
	pub fn is_ok(&self) -> bool {
		self.error_code == 0
	}
}

impl DockMessage for DockResult {
	const COMMAND: DockCommand = DockCommand::RESULT;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_i32(self.error_code);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let error_code = reader.i32("error code")?;
		reader.finish()?;
		Ok(Self { error_code })
	}
}

/// `kbdc`: one character typed into the Newton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardChar {
	/// UTF-16 code unit.
	pub character: u16,
	/// Modifier flags.
	pub flags: u16,
}

impl DockMessage for KeyboardChar {
	const COMMAND: DockCommand = DockCommand::KEYBOARD_CHAR;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_u16(self.character);
		out.put_u16(self.flags);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let character = reader.u16("character")?;
		let flags = reader.u16("flags")?;
		reader.finish()?;
		Ok(Self { character, flags })
	}
}

/// `kbds`: text typed into the Newton.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyboardString {
	/// Text to type.
	pub text: String,
}

impl DockMessage for KeyboardString {
	const COMMAND: DockCommand = DockCommand::KEYBOARD_STRING;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		put_utf16_cstring(out, &self.text);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut reader = PayloadReader::new(payload);
		let text = reader.utf16_cstring("keyboard text")?;
		reader.finish()?;
		Ok(Self { text })
	}
}

/// `crmd`: call a global function; name and arguments are two root streams.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRootMethod {
	/// Function name.
	pub name: Symbol,
	/// Positional arguments.
	pub arguments: Arc<PlainArray>,
}

impl DockMessage for CallRootMethod {
	const COMMAND: DockCommand = DockCommand::CALL_ROOT_METHOD;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_slice(&encode_root(&Object::Symbol(self.name.clone()))?);
		out.put_slice(&encode_root(&Object::PlainArray(Arc::clone(&self.arguments)))?);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let mut objects = decode_root_objects(payload, 2)?.into_iter();
		match (objects.next(), objects.next()) {
			(Some(Object::Symbol(name)), Some(Object::PlainArray(arguments))) => Ok(Self { name, arguments }),
			(name, arguments) => Err(malformed(
				Self::COMMAND,
				format!(
					"expected symbol and plain array, got {} and {}",
					name.as_ref().map_or("nothing", Object::kind_name),
					arguments.as_ref().map_or("nothing", Object::kind_name)
				),
			)),
		}
	}
}

/// `cres`: return value of a root method call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallResult {
	/// Returned object.
	pub result: Object,
}

impl DockMessage for CallResult {
	const COMMAND: DockCommand = DockCommand::CALL_RESULT;

	fn encode_payload(&self, out: &mut BytesMut) -> Result<()> {
		out.put_slice(&encode_root(&self.result)?);
		Ok(())
	}

	fn decode_payload(payload: &[u8]) -> Result<Self> {
		let (result, consumed) = decode_root(payload)?;
		ensure_consumed(payload.len(), consumed)?;
		Ok(Self { result })
	}
}

macro_rules! empty_message {
	($(#[$meta:meta])* $name:ident => $command:ident) => {
		$(#[$meta])*
		#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
		pub struct $name;

		impl DockMessage for $name {
			const COMMAND: DockCommand = DockCommand::$command;

			fn encode_payload(&self, _out: &mut BytesMut) -> Result<()> {
				Ok(())
			}

			fn decode_payload(payload: &[u8]) -> Result<Self> {
				ensure_consumed(payload.len(), 0)?;
				Ok(Self)
			}
		}
	};
}

empty_message!(
	/// `helo`: keep-alive.
	Hello => HELLO
);
empty_message!(
	/// `disc`: end the session.
	Disconnect => DISCONNECT
);
empty_message!(
	/// `kybd`: request (host) or acknowledge (Newton) keyboard passthrough.
	StartKeyboardPassthrough => START_KEYBOARD_PASSTHROUGH
);
empty_message!(
	/// `opdn`: operation finished.
	OperationDone => OPERATION_DONE
);
empty_message!(
	/// `opca`: operation canceled.
	OperationCanceled => OPERATION_CANCELED
);
empty_message!(
	/// `ocaa`: cancel acknowledged.
	OperationCanceledAck => OPERATION_CANCELED_ACK
);

fn malformed(command: DockCommand, detail: String) -> ProtocolError {
	ProtocolError::UnexpectedPayload { command, detail }
}

fn put_utf16_cstring(out: &mut BytesMut, text: &str) {
	for unit in text.encode_utf16() {
		out.put_u16(unit);
	}
	out.put_u16(0);
}

/// Sequential payload reader that must end exactly at the payload end.
struct PayloadReader<'a> {
	cursor: Cursor<'a>,
	payload: &'a [u8],
}

impl<'a> PayloadReader<'a> {
	fn new(payload: &'a [u8]) -> Self {
		Self {
			cursor: Cursor::new(payload),
			payload,
		}
	}

	fn remaining(&self) -> usize {
		self.cursor.remaining()
	}

	fn u16(&mut self, field: &'static str) -> Result<u16> {
		Ok(self.cursor.read_u16_be(field)?)
	}

	fn u32(&mut self, field: &'static str) -> Result<u32> {
		Ok(self.cursor.read_u32_be(field)?)
	}

	fn i32(&mut self, field: &'static str) -> Result<i32> {
		Ok(self.cursor.read_i32_be(field)?)
	}

	fn key(&mut self) -> Result<[u8; 8]> {
		Ok(self.cursor.read_array("key")?)
	}

	fn session_type(&mut self, command: DockCommand) -> Result<SessionType> {
		let raw = self.u32("session type")?;
		SessionType::from_u32(raw).ok_or_else(|| malformed(command, format!("session type {raw}")))
	}

	fn utf16_cstring(&mut self, field: &'static str) -> Result<String> {
		Ok(self.cursor.read_utf16_cstring(field)?)
	}

	fn root_object(&mut self) -> Result<Object> {
		let start = self.cursor.pos();
		let (object, used) = decode_root(&self.payload[start..])?;
		self.cursor.read_exact(used, "nsof object")?;
		Ok(object)
	}

	fn finish(self) -> Result<()> {
		ensure_consumed(self.payload.len(), self.cursor.pos())
	}
}
