//! Dock connection state machine.
//!
//! The machine is sans-IO: every method takes the current time where it matters and returns
//! the actions the driver must perform. Nothing here reads, writes or sleeps.
//!
//! ```text
//! Idle ──initiate──> Handshaking ──pass──> Connected <──────────────┐
//!                        │                  │    │                   │
//!                        │            kybd  │    │ crmd              │ cres / dres
//!                        │                  v    v                   │
//!                        │   StartingKeyboardPassthrough   AwaitingCallResult
//!                        │                  │ kybd
//!                        │                  v
//!                        │          KeyboardPassthrough ──opca──> Connected
//!                        v
//!                  Disconnected (terminal; reached from every state)
//! ```
//!
//! The handshake is driven by the Newton: after `initiate` the host waits for `rtdk` and then
//! answers each Newton packet with the next host packet. Each step gets a fresh deadline.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dock::packets::{
	CallResult, CallRootMethod, DOCK_PROTOCOL_VERSION, DesktopInfo, DesktopType, Disconnect, DockMessage, DockResult, InitiateDocking, KeyboardChar,
	KeyboardString, NewtonInfo, NewtonName, OperationCanceledAck, Password, RequestToDock, SessionType, SetTimeout, StartKeyboardPassthrough,
	WhichIcons,
};
use crate::dock::{ConnectionError, DockCommand, DockPacket};
use crate::nsof::{Object, PlainArray, Symbol};

/// Result alias for connection operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Work the driver must perform after a state machine call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionAction {
	/// Write this packet to the link.
	SendPacket(DockPacket),
	/// Session is over; release the link.
	Close {
		/// Why the session ended.
		reason: String,
	},
	/// A root method call returned.
	CallReturned(Object),
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
	/// Nothing started yet.
	Idle,
	/// Handshake in progress.
	Handshaking,
	/// Docked and ready for operations.
	Connected,
	/// `kybd` sent, waiting for the Newton to acknowledge.
	StartingKeyboardPassthrough,
	/// Keyboard input is forwarded to the Newton.
	KeyboardPassthrough,
	/// `crmd` sent, waiting for `cres`.
	AwaitingCallResult,
	/// Terminal.
	Disconnected,
}

impl SessionState {
	/// Stable lowercase label.
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Idle => "idle",
			Self::Handshaking => "handshaking",
			Self::Connected => "connected",
			Self::StartingKeyboardPassthrough => "starting_keyboard_passthrough",
			Self::KeyboardPassthrough => "keyboard_passthrough",
			Self::AwaitingCallResult => "awaiting_call_result",
			Self::Disconnected => "disconnected",
		}
	}

	/// Whether the Newton is still reachable in this state.
	pub fn is_live(self) -> bool {
		!matches!(self, Self::Idle | Self::Disconnected)
	}
}

impl fmt::Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Newton packet the handshake is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandshakePhase {
	/// Waiting for `rtdk`.
	AwaitingRequest,
	/// `dock` sent, waiting for `name`.
	AwaitingName,
	/// `dinf` sent, waiting for `ninf`.
	AwaitingNewtonInfo,
	/// `wicn` sent, waiting for `dres`.
	AwaitingIconsResult,
	/// `stim` sent, waiting for `dres`.
	AwaitingTimeoutResult,
	/// Waiting for the Newton's `pass`.
	///
	/// The host answers with the `ninf` key unchanged. No DES challenge is computed, so the
	/// exchange is unauthenticated and only works with Newtons that have no password set.
	AwaitingPassword,
}

impl HandshakePhase {
	fn expected(self) -> DockCommand {
		match self {
			Self::AwaitingRequest => DockCommand::REQUEST_TO_DOCK,
			Self::AwaitingName => DockCommand::NEWTON_NAME,
			Self::AwaitingNewtonInfo => DockCommand::NEWTON_INFO,
			Self::AwaitingIconsResult | Self::AwaitingTimeoutResult => DockCommand::RESULT,
			Self::AwaitingPassword => DockCommand::PASSWORD,
		}
	}
}

/// Connection timing and handshake parameters.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
	/// Deadline for each handshake step.
	pub handshake_timeout: Duration,
	/// Deadline for replies to host requests once connected.
	pub reply_timeout: Duration,
	/// Session type sent in `dock` and `dinf`.
	pub session_type: SessionType,
	/// Platform sent in `dinf`.
	pub desktop_type: DesktopType,
	/// Icon mask sent in `wicn`.
	pub which_icons: u32,
	/// Newton-side timeout sent in `stim`, in seconds.
	pub newton_timeout_secs: u32,
}

impl Default for ConnectionConfig {
	fn default() -> Self {
		Self {
			handshake_timeout: Duration::from_secs(30),
			reply_timeout: Duration::from_secs(10),
			session_type: SessionType::None,
			desktop_type: DesktopType::Macintosh,
			which_icons: 0,
			newton_timeout_secs: 30,
		}
	}
}

/// Host side of one Dock session.
#[derive(Debug, Clone)]
pub struct DockConnection {
	state: SessionState,
	phase: HandshakePhase,
	config: ConnectionConfig,
	deadline: Option<(Instant, Duration)>,
	newton_name: Option<String>,
	newton_key: [u8; 8],
}

impl DockConnection {
	/// Create a connection in [`SessionState::Idle`].
	pub fn new(config: ConnectionConfig) -> Self {
		Self {
			state: SessionState::Idle,
			phase: HandshakePhase::AwaitingRequest,
			config,
			deadline: None,
			newton_name: None,
			newton_key: [0; 8],
		}
	}

	/// Current state.
	#[must_use]
	pub fn state(&self) -> SessionState {
		self.state
	}

	/// Handshake step, while handshaking.
	#[must_use]
	pub fn handshake_phase(&self) -> Option<HandshakePhase> {
		(self.state == SessionState::Handshaking).then_some(self.phase)
	}

	/// Owner name the Newton sent during the handshake.
	#[must_use]
	pub fn newton_name(&self) -> Option<&str> {
		self.newton_name.as_deref()
	}

	/// Configuration in use.
	pub fn config(&self) -> &ConnectionConfig {
		&self.config
	}

	/// Instant at which the pending step times out, if one is pending.
	#[must_use]
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline.map(|(at, _)| at)
	}

	/// Arm the handshake; the Newton opens it with `rtdk`.
	pub fn initiate(&mut self, now: Instant) -> Result<Vec<ConnectionAction>> {
		self.require(SessionState::Idle, "initiate")?;
		self.phase = HandshakePhase::AwaitingRequest;
		self.arm(now, self.config.handshake_timeout);
		self.enter(SessionState::Handshaking);
		Ok(Vec::new())
	}

	/// Ask the Newton to accept keyboard input.
	pub fn start_keyboard_passthrough(&mut self, now: Instant) -> Result<Vec<ConnectionAction>> {
		self.require(SessionState::Connected, "start keyboard passthrough")?;
		let packet = StartKeyboardPassthrough.to_packet()?;
		self.arm(now, self.config.reply_timeout);
		self.enter(SessionState::StartingKeyboardPassthrough);
		Ok(vec![ConnectionAction::SendPacket(packet)])
	}

	/// Type a string on the Newton.
	pub fn send_keyboard_string(&mut self, text: &str) -> Result<Vec<ConnectionAction>> {
		self.require(SessionState::KeyboardPassthrough, "send keyboard string")?;
		let packet = KeyboardString { text: text.to_owned() }.to_packet()?;
		Ok(vec![ConnectionAction::SendPacket(packet)])
	}

	/// Type one character on the Newton.
	pub fn send_keyboard_character(&mut self, character: u16, flags: u16) -> Result<Vec<ConnectionAction>> {
		self.require(SessionState::KeyboardPassthrough, "send keyboard character")?;
		let packet = KeyboardChar { character, flags }.to_packet()?;
		Ok(vec![ConnectionAction::SendPacket(packet)])
	}

	/// Call a global function on the Newton; the result arrives as [`ConnectionAction::CallReturned`].
	pub fn call_root_method(&mut self, name: Symbol, arguments: Arc<PlainArray>, now: Instant) -> Result<Vec<ConnectionAction>> {
		self.require(SessionState::Connected, "call root method")?;
		let packet = CallRootMethod { name, arguments }.to_packet()?;
		self.arm(now, self.config.reply_timeout);
		self.enter(SessionState::AwaitingCallResult);
		Ok(vec![ConnectionAction::SendPacket(packet)])
	}

	/// End the session, telling the Newton when it is still listening.
	pub fn disconnect(&mut self) -> Result<Vec<ConnectionAction>> {
		if self.state == SessionState::Disconnected {
			return Err(self.invalid("disconnect"));
		}

		let mut actions = Vec::with_capacity(2);
		if self.peer_heard() {
			actions.push(ConnectionAction::SendPacket(Disconnect.to_packet()?));
		}
		actions.push(self.close("host disconnected"));
		Ok(actions)
	}

	/// Live, and the Newton has sent at least its `rtdk`.
	fn peer_heard(&self) -> bool {
		self.state.is_live() && self.handshake_phase() != Some(HandshakePhase::AwaitingRequest)
	}

	/// Abandon the session without telling the Newton.
	pub fn cancel(&mut self) -> Vec<ConnectionAction> {
		if self.state == SessionState::Disconnected {
			return Vec::new();
		}
		vec![self.close("cancelled")]
	}

	/// The link failed or closed under the session.
	pub fn handle_link_error(&mut self, reason: &str) -> Vec<ConnectionAction> {
		if self.state == SessionState::Disconnected {
			return Vec::new();
		}
		warn!(reason, state = %self.state, "dock link lost");
		vec![self.close(&format!("link lost: {reason}"))]
	}

	/// Expire the pending deadline, if it has passed.
	pub fn tick(&mut self, now: Instant) -> Result<Vec<ConnectionAction>> {
		let Some((at, budget)) = self.deadline else {
			return Ok(Vec::new());
		};
		if now < at {
			return Ok(Vec::new());
		}

		let state = self.state;
		let waited = now.saturating_duration_since(at) + budget;
		warn!(%state, ?waited, "dock deadline expired");
		let err = if state == SessionState::Handshaking {
			ConnectionError::HandshakeFailed {
				reason: format!("timed out after {waited:?} {}", describe_phase(self.phase)),
			}
		} else {
			ConnectionError::Timeout { state, waited }
		};
		self.close(&err.to_string());
		Err(err)
	}

	/// Feed one packet received from the Newton.
	///
	/// Fatal errors leave the connection [`SessionState::Disconnected`]; the driver should
	/// release the link when the returned error is fatal.
	pub fn handle_packet(&mut self, packet: &DockPacket, now: Instant) -> Result<Vec<ConnectionAction>> {
		debug!(command = %packet.command, len = packet.payload.len(), state = %self.state, "received dock packet");

		let result = self.dispatch(packet, now);
		if let Err(err) = &result {
			if err.is_fatal() && self.state != SessionState::Disconnected {
				self.close(&err.to_string());
			}
		}
		result
	}

	fn dispatch(&mut self, packet: &DockPacket, now: Instant) -> Result<Vec<ConnectionAction>> {
		if self.state == SessionState::Disconnected {
			warn!(command = %packet.command, "ignoring packet after disconnect");
			return Ok(Vec::new());
		}

		match packet.command {
			DockCommand::HELLO => return Ok(Vec::new()),
			DockCommand::DISCONNECT => {
				Disconnect::from_packet(packet)?;
				let handshaking = self.state == SessionState::Handshaking;
				let phase = self.phase;
				let close = self.close("newton disconnected");
				if handshaking {
					return Err(ConnectionError::HandshakeFailed {
						reason: format!("newton disconnected {}", describe_phase(phase)),
					});
				}
				return Ok(vec![close]);
			}
			_ => {}
		}

		match self.state {
			SessionState::Handshaking => self.handle_handshake(packet, now),
			SessionState::StartingKeyboardPassthrough => self.handle_keyboard_start(packet),
			SessionState::KeyboardPassthrough => self.handle_keyboard(packet),
			SessionState::AwaitingCallResult => self.handle_call_reply(packet),
			SessionState::Idle | SessionState::Connected | SessionState::Disconnected => Ok(self.ignore(packet)),
		}
	}

	fn handle_handshake(&mut self, packet: &DockPacket, now: Instant) -> Result<Vec<ConnectionAction>> {
		let phase = self.phase;
		if packet.command == DockCommand::RESULT && phase.expected() != DockCommand::RESULT {
			let result = DockResult::from_packet(packet)?;
			if !result.is_ok() {
				return Err(handshake_rejected(phase, result.error_code));
			}
		}
		if packet.command != phase.expected() {
			return Err(ConnectionError::HandshakeFailed {
				reason: format!("unexpected {} {}", packet.command, describe_phase(phase)),
			});
		}

		let (reply, next) = match phase {
			HandshakePhase::AwaitingRequest => {
				let request = RequestToDock::from_packet(packet)?;
				debug!(protocol_version = request.protocol_version, "newton requested dock");
				let reply = InitiateDocking {
					session_type: self.config.session_type,
				};
				(Some(reply.to_packet()?), HandshakePhase::AwaitingName)
			}
			HandshakePhase::AwaitingName => {
				let name = NewtonName::from_packet(packet)?;
				info!(name = %name.name, "newton identified");
				self.newton_name = Some(name.name);
				let reply = DesktopInfo {
					protocol_version: DOCK_PROTOCOL_VERSION,
					desktop_type: self.config.desktop_type,
					key: [0; 8],
					session_type: self.config.session_type,
					allow_selective_sync: false,
					desktop_apps: DesktopInfo::default_apps(),
				};
				(Some(reply.to_packet()?), HandshakePhase::AwaitingNewtonInfo)
			}
			HandshakePhase::AwaitingNewtonInfo => {
				let newton = NewtonInfo::from_packet(packet)?;
				debug!(protocol_version = newton.protocol_version, "newton info received");
				self.newton_key = newton.key;
				let reply = WhichIcons {
					icons: self.config.which_icons,
				};
				(Some(reply.to_packet()?), HandshakePhase::AwaitingIconsResult)
			}
			HandshakePhase::AwaitingIconsResult => {
				self.expect_ok(packet, phase)?;
				let reply = SetTimeout {
					seconds: self.config.newton_timeout_secs,
				};
				(Some(reply.to_packet()?), HandshakePhase::AwaitingTimeoutResult)
			}
			HandshakePhase::AwaitingTimeoutResult => {
				self.expect_ok(packet, phase)?;
				(None, HandshakePhase::AwaitingPassword)
			}
			HandshakePhase::AwaitingPassword => {
				Password::from_packet(packet)?;
				let reply = Password { key: self.newton_key }.to_packet()?;
				self.deadline = None;
				self.enter(SessionState::Connected);
				return Ok(vec![ConnectionAction::SendPacket(reply)]);
			}
		};

		debug!(from = ?phase, to = ?next, "handshake step");
		self.phase = next;
		self.arm(now, self.config.handshake_timeout);
		Ok(reply.map(ConnectionAction::SendPacket).into_iter().collect())
	}

	fn expect_ok(&self, packet: &DockPacket, phase: HandshakePhase) -> Result<()> {
		let result = DockResult::from_packet(packet)?;
		if result.is_ok() { Ok(()) } else { Err(handshake_rejected(phase, result.error_code)) }
	}

	fn handle_keyboard_start(&mut self, packet: &DockPacket) -> Result<Vec<ConnectionAction>> {
		match packet.command {
			DockCommand::START_KEYBOARD_PASSTHROUGH => {
				StartKeyboardPassthrough::from_packet(packet)?;
				self.deadline = None;
				self.enter(SessionState::KeyboardPassthrough);
				Ok(Vec::new())
			}
			DockCommand::RESULT => self.reject_on_error(packet, "start keyboard passthrough"),
			_ => Ok(self.ignore(packet)),
		}
	}

	fn handle_keyboard(&mut self, packet: &DockPacket) -> Result<Vec<ConnectionAction>> {
		match packet.command {
			DockCommand::OPERATION_CANCELED => {
				self.enter(SessionState::Connected);
				Ok(vec![ConnectionAction::SendPacket(OperationCanceledAck.to_packet()?)])
			}
			DockCommand::RESULT => {
				let result = DockResult::from_packet(packet)?;
				if !result.is_ok() {
					warn!(code = result.error_code, "newton reported keyboard error");
				}
				Ok(Vec::new())
			}
			_ => Ok(self.ignore(packet)),
		}
	}

	fn handle_call_reply(&mut self, packet: &DockPacket) -> Result<Vec<ConnectionAction>> {
		match packet.command {
			DockCommand::CALL_RESULT => {
				let reply = CallResult::from_packet(packet)?;
				self.deadline = None;
				self.enter(SessionState::Connected);
				Ok(vec![ConnectionAction::CallReturned(reply.result)])
			}
			DockCommand::RESULT => self.reject_on_error(packet, "call root method"),
			_ => Ok(self.ignore(packet)),
		}
	}

	/// A `dres` answering a pending request: nonzero abandons the request.
	fn reject_on_error(&mut self, packet: &DockPacket, operation: &'static str) -> Result<Vec<ConnectionAction>> {
		let result = DockResult::from_packet(packet)?;
		if result.is_ok() {
			return Ok(Vec::new());
		}
		self.deadline = None;
		self.enter(SessionState::Connected);
		Err(ConnectionError::Rejected {
			operation,
			code: result.error_code,
		})
	}

	fn ignore(&self, packet: &DockPacket) -> Vec<ConnectionAction> {
		warn!(command = %packet.command, state = %self.state, "ignoring unsolicited dock packet");
		Vec::new()
	}

	fn require(&self, state: SessionState, operation: &'static str) -> Result<()> {
		if self.state == state { Ok(()) } else { Err(self.invalid(operation)) }
	}

	fn invalid(&self, operation: &'static str) -> ConnectionError {
		ConnectionError::InvalidStateForOperation {
			state: self.state,
			operation,
		}
	}

	fn arm(&mut self, now: Instant, budget: Duration) {
		self.deadline = Some((now + budget, budget));
	}

	fn close(&mut self, reason: &str) -> ConnectionAction {
		self.deadline = None;
		self.enter(SessionState::Disconnected);
		ConnectionAction::Close { reason: reason.to_owned() }
	}

	fn enter(&mut self, next: SessionState) {
		if self.state != next {
			info!(from = %self.state, to = %next, "dock state change");
			self.state = next;
		}
	}
}

fn handshake_rejected(phase: HandshakePhase, code: i32) -> ConnectionError {
	ConnectionError::HandshakeFailed {
		reason: format!("newton returned error {code} {}", describe_phase(phase)),
	}
}

fn describe_phase(phase: HandshakePhase) -> &'static str {
	match phase {
		HandshakePhase::AwaitingRequest => "waiting for request to dock",
		HandshakePhase::AwaitingName => "waiting for newton name",
		HandshakePhase::AwaitingNewtonInfo => "waiting for newton info",
		HandshakePhase::AwaitingIconsResult => "waiting for icons result",
		HandshakePhase::AwaitingTimeoutResult => "waiting for timeout result",
		HandshakePhase::AwaitingPassword => "waiting for password",
	}
}
