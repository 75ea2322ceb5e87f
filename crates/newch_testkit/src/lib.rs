//! Shared test helpers for workspace crates.

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::Duration;

use newch::dock::packets::{
	CallResult, CallRootMethod, DockMessage, DockResult, KeyboardChar, KeyboardString, NewtonInfo, NewtonName, Password, RequestToDock,
	StartKeyboardPassthrough,
};
use newch::dock::{ConnectionConfig, DockCommand, DockPacket, DockSession, LinkEvent, ProtocolError, SessionOptions};
use newch::nsof::{Frame, Object, PlainArray, SmallRect, Symbol};

/// Resolve the workspace root path.
pub fn workspace_root() -> PathBuf {
	let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
	manifest_dir
		.join("..")
		.join("..")
		.canonicalize()
		.unwrap_or_else(|_| manifest_dir.join("..").join(".."))
}

/// Resolve the cargo target directory.
pub fn target_dir() -> PathBuf {
	std::env::var_os("CARGO_TARGET_DIR")
		.map(PathBuf::from)
		.unwrap_or_else(|| workspace_root().join("target"))
}

/// Resolve a fixture path under `<workspace>/fixtures`.
pub fn fixture_path(name: &str) -> PathBuf {
	workspace_root().join("fixtures").join(name)
}

/// Read a whitespace-separated hex fixture into bytes.
pub fn read_hex_fixture(name: &str) -> Vec<u8> {
	let path = fixture_path(name);
	let text = std::fs::read_to_string(&path).unwrap_or_else(|err| panic!("read {}: {err}", path.display()));
	let digits: String = text
		.lines()
		.map(|line| line.split('#').next().unwrap_or(""))
		.flat_map(str::chars)
		.filter(|ch| !ch.is_whitespace())
		.collect();
	assert!(digits.len() % 2 == 0, "odd hex digit count in {}", path.display());
	(0..digits.len())
		.step_by(2)
		.map(|at| u8::from_str_radix(&digits[at..at + 2], 16).expect("hex digit"))
		.collect()
}

/// The paper-roll note frame stored in `fixtures/paper_roll.hex`.
pub fn paper_roll_frame() -> Object {
	Object::frame(
		Frame::from_slots([
			("viewStationery", Object::symbol("para")),
			("text", Object::string("AB")),
			(
				"viewBounds",
				Object::SmallRect(SmallRect {
					top: 0,
					left: 0,
					bottom: 10,
					right: 20,
				}),
			),
		])
		.expect("paper roll frame"),
	)
}

/// Frame whose two slots hold the same plain array allocation.
pub fn shared_child_frame() -> Object {
	let child = Object::plain_array(vec![Object::Integer(1), Object::string("two")]);
	Object::frame(Frame::from_slots([("first", child.clone()), ("second", child)]).expect("shared child frame"))
}

/// Name and arguments of the `Add(1, 2)` root method call.
pub fn add_call() -> (Symbol, Arc<PlainArray>) {
	(Symbol::new("Add"), Arc::new(PlainArray::new(vec![Object::Integer(1), Object::Integer(2)])))
}

/// Split captured wire bytes into packets.
pub fn decode_stream(mut bytes: &[u8]) -> Result<Vec<DockPacket>, ProtocolError> {
	let mut packets = Vec::new();
	while !bytes.is_empty() {
		let (packet, used) = DockPacket::decode(bytes)?;
		packets.push(packet);
		bytes = &bytes[used..];
	}
	Ok(packets)
}

/// Timeouts short enough for tests that expect expiry.
pub fn fast_config() -> ConnectionConfig {
	ConnectionConfig {
		handshake_timeout: Duration::from_millis(60),
		reply_timeout: Duration::from_millis(60),
		..ConnectionConfig::default()
	}
}

/// Poll interval for tests.
pub fn fast_options() -> SessionOptions {
	SessionOptions {
		poll_interval: Duration::from_millis(5),
	}
}

/// How the scripted Newton answers `kybd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyboardReply {
	/// Acknowledge with `kybd`.
	Accept,
	/// Answer with a nonzero `dres`.
	Refuse(i32),
	/// Never answer.
	Silent,
}

/// How the scripted Newton answers `crmd`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallReply {
	/// Sum integer arguments and return the total.
	Sum,
	/// Return this object.
	Return(Object),
	/// Answer with a nonzero `dres`.
	Refuse(i32),
	/// Never answer.
	Silent,
}

/// Behaviour of a [`ScriptedNewton`].
#[derive(Debug, Clone)]
pub struct NewtonScript {
	/// Owner name sent in `name`.
	pub name: String,
	/// Challenge key sent in `ninf`.
	pub key: [u8; 8],
	/// Result code for the `wicn` step.
	pub icons_result: i32,
	/// Keyboard passthrough behaviour.
	pub keyboard: KeyboardReply,
	/// Root method call behaviour.
	pub call: CallReply,
	/// Send `helo` between handshake steps.
	pub chatty: bool,
}

impl Default for NewtonScript {
	fn default() -> Self {
		Self {
			name: "Test Newton".to_owned(),
			key: [0xA5; 8],
			icons_result: 0,
			keyboard: KeyboardReply::Accept,
			call: CallReply::Sum,
			chatty: false,
		}
	}
}

/// In-process Newton peer.
///
/// Used as the session's writer: every complete host packet written to it is recorded and
/// answered on the session's event channel according to its [`NewtonScript`].
pub struct ScriptedNewton {
	script: NewtonScript,
	events: Sender<LinkEvent>,
	pending: Vec<u8>,
	received: Vec<DockPacket>,
	typed: String,
}

impl ScriptedNewton {
	/// Create the peer and the event channel it answers on; the peer opens with `rtdk`.
	pub fn start(script: NewtonScript) -> (Self, Receiver<LinkEvent>) {
		let (events, rx) = mpsc::channel();
		let newton = Self {
			script,
			events,
			pending: Vec::new(),
			received: Vec::new(),
			typed: String::new(),
		};
		newton.send(&RequestToDock { protocol_version: 9 });
		(newton, rx)
	}

	/// Host packets received so far.
	pub fn received(&self) -> &[DockPacket] {
		&self.received
	}

	/// Commands of the host packets received so far.
	pub fn received_commands(&self) -> Vec<DockCommand> {
		self.received.iter().map(|packet| packet.command).collect()
	}

	/// Text typed through keyboard passthrough.
	pub fn typed(&self) -> &str {
		&self.typed
	}

	/// Inject an arbitrary packet as if the Newton sent it.
	pub fn inject(&self, packet: DockPacket) {
		let _ = self.events.send(LinkEvent::Packet(packet));
	}

	/// Inject a link event.
	pub fn inject_event(&self, event: LinkEvent) {
		let _ = self.events.send(event);
	}

	fn send(&self, message: &impl DockMessage) {
		self.inject(message.to_packet().expect("scripted packet encodes"));
	}

	fn hello(&self) {
		if self.script.chatty {
			self.inject(DockPacket::empty(DockCommand::HELLO));
		}
	}

	fn answer(&mut self, packet: &DockPacket) {
		match packet.command {
			DockCommand::INITIATE_DOCKING => {
				self.hello();
				self.send(&NewtonName {
					version_info: vec![0x0000_0010, 0x0200_0000],
					name: self.script.name.clone(),
				});
			}
			DockCommand::DESKTOP_INFO => {
				self.hello();
				self.send(&NewtonInfo {
					protocol_version: 10,
					key: self.script.key,
				});
			}
			DockCommand::WHICH_ICONS => self.send(&DockResult {
				error_code: self.script.icons_result,
			}),
			DockCommand::SET_TIMEOUT => {
				self.send(&DockResult::OK);
				self.hello();
				self.send(&Password { key: [0x5A; 8] });
			}
			DockCommand::START_KEYBOARD_PASSTHROUGH => match self.script.keyboard {
				KeyboardReply::Accept => self.send(&StartKeyboardPassthrough),
				KeyboardReply::Refuse(code) => self.send(&DockResult { error_code: code }),
				KeyboardReply::Silent => {}
			},
			DockCommand::KEYBOARD_STRING => {
				if let Ok(text) = KeyboardString::from_packet(packet) {
					self.typed.push_str(&text.text);
				}
			}
			DockCommand::KEYBOARD_CHAR => {
				if let Ok(key) = KeyboardChar::from_packet(packet) {
					self.typed.extend(char::decode_utf16([key.character]).map(|ch| ch.unwrap_or(char::REPLACEMENT_CHARACTER)));
				}
			}
			DockCommand::CALL_ROOT_METHOD => self.answer_call(packet),
			DockCommand::DISCONNECT => self.inject_event(LinkEvent::Closed),
			_ => {}
		}
	}

	fn answer_call(&self, packet: &DockPacket) {
		let Ok(call) = CallRootMethod::from_packet(packet) else {
			self.send(&DockResult { error_code: -48803 });
			return;
		};
		match &self.script.call {
			CallReply::Sum => {
				let total = call.arguments.elements.iter().filter_map(Object::as_integer).sum::<i32>();
				self.send(&CallResult {
					result: Object::Integer(total),
				});
			}
			CallReply::Return(result) => self.send(&CallResult { result: result.clone() }),
			CallReply::Refuse(code) => self.send(&DockResult { error_code: *code }),
			CallReply::Silent => {}
		}
	}
}

impl Write for ScriptedNewton {
	fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
		self.pending.extend_from_slice(buf);
		loop {
			match DockPacket::decode(&self.pending) {
				Ok((packet, used)) => {
					self.pending.drain(..used);
					self.answer(&packet);
					self.received.push(packet);
				}
				Err(ProtocolError::Truncated { .. }) => break,
				Err(err) => return Err(io::Error::new(io::ErrorKind::InvalidData, err)),
			}
		}
		Ok(buf.len())
	}

	fn flush(&mut self) -> io::Result<()> {
		Ok(())
	}
}

/// Session wired to a scripted Newton with test timeouts.
pub fn scripted_session(script: NewtonScript) -> DockSession<ScriptedNewton> {
	scripted_session_with(script, fast_config())
}

/// Session wired to a scripted Newton with explicit connection config.
pub fn scripted_session_with(script: NewtonScript, config: ConnectionConfig) -> DockSession<ScriptedNewton> {
	let (newton, events) = ScriptedNewton::start(script);
	DockSession::new(newton, events, config, fast_options())
}
