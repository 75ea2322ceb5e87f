use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::dock::{ConnectionAction, ConnectionConfig, ConnectionError, DockConnection, DockPacket, LinkEvent, SessionState};
use crate::nsof::{Object, PlainArray, Symbol};

/// Result alias for session operations.
pub type Result<T> = std::result::Result<T, ConnectionError>;

/// Handshake steps, each with its own deadline.
const HANDSHAKE_STEPS: u32 = 6;

/// Blocking driver tuning.
#[derive(Debug, Clone)]
pub struct SessionOptions {
	/// Longest a blocking wait sleeps on the event channel between deadline checks.
	pub poll_interval: Duration,
}

impl Default for SessionOptions {
	fn default() -> Self {
		Self {
			poll_interval: Duration::from_millis(50),
		}
	}
}

/// Shared flag that aborts blocking waits and the reader loop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
	/// Fresh, unfired token.
	pub fn new() -> Self {
		Self::default()
	}

	/// Fire the token.
	pub fn cancel(&self) {
		self.0.store(true, Ordering::SeqCst);
	}

	/// Whether the token fired.
	pub fn is_cancelled(&self) -> bool {
		self.0.load(Ordering::SeqCst)
	}
}

/// Blocking Dock session over a write half and a stream of link events.
///
/// All state transitions happen on the thread that owns the session; the reader thread only
/// produces [`LinkEvent`]s.
pub struct DockSession<W: Write> {
	connection: DockConnection,
	writer: W,
	events: Receiver<LinkEvent>,
	options: SessionOptions,
	cancel: CancelToken,
	call_result: Option<Object>,
	close_reason: Option<String>,
}

impl<W: Write> DockSession<W> {
	/// Create an idle session.
	pub fn new(writer: W, events: Receiver<LinkEvent>, config: ConnectionConfig, options: SessionOptions) -> Self {
		Self {
			connection: DockConnection::new(config),
			writer,
			events,
			options,
			cancel: CancelToken::new(),
			call_result: None,
			close_reason: None,
		}
	}

	/// Use an externally shared cancel token.
	pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
		self.cancel = cancel;
		self
	}

	/// Token that cancels this session's blocking waits.
	pub fn cancel_token(&self) -> CancelToken {
		self.cancel.clone()
	}

	/// Current state.
	pub fn state(&self) -> SessionState {
		self.connection.state()
	}

	/// Underlying state machine.
	pub fn connection(&self) -> &DockConnection {
		&self.connection
	}

	/// Write half.
	pub fn writer(&self) -> &W {
		&self.writer
	}

	/// Why the session closed, once it has.
	pub fn close_reason(&self) -> Option<&str> {
		self.close_reason.as_deref()
	}

	/// Take the last returned call result.
	pub fn take_call_result(&mut self) -> Option<Object> {
		self.call_result.take()
	}

	/// Feed one link event through the state machine and perform the resulting actions.
	pub fn handle_event(&mut self, event: LinkEvent, now: Instant) -> Result<()> {
		let result = match event {
			LinkEvent::Packet(packet) => self.connection.handle_packet(&packet, now),
			LinkEvent::Failed(reason) => Ok(self.connection.handle_link_error(&reason)),
			LinkEvent::Closed => Ok(self.connection.handle_link_error("newton closed the link")),
		};
		self.settle(result)
	}

	/// Expire deadlines.
	pub fn tick(&mut self, now: Instant) -> Result<()> {
		let result = self.connection.tick(now);
		self.settle(result)
	}

	/// Wait up to one poll interval for a link event, handle it, then check deadlines.
	pub fn poll(&mut self) -> Result<()> {
		if self.cancel.is_cancelled() && self.state() != SessionState::Disconnected {
			let actions = self.connection.cancel();
			self.perform(actions)?;
			return Err(ConnectionError::Cancelled);
		}

		match self.events.recv_timeout(self.options.poll_interval) {
			Ok(event) => self.handle_event(event, Instant::now())?,
			Err(RecvTimeoutError::Timeout) => {}
			Err(RecvTimeoutError::Disconnected) => {
				let actions = self.connection.handle_link_error("link event channel closed");
				self.perform(actions)?;
				return Err(ConnectionError::LinkClosed);
			}
		}
		self.tick(Instant::now())
	}

	/// Poll until `done` accepts the state, the session ends, or `timeout` passes.
	///
	/// Expiry and cancellation leave the session disconnected.
	pub fn wait_for(&mut self, mut done: impl FnMut(SessionState) -> bool, timeout: Duration) -> Result<SessionState> {
		let start = Instant::now();
		loop {
			let state = self.state();
			if done(state) {
				return Ok(state);
			}
			if state == SessionState::Disconnected {
				return Err(ConnectionError::Disconnected);
			}

			let waited = start.elapsed();
			if waited >= timeout {
				let actions = self.connection.cancel();
				self.perform(actions)?;
				return Err(ConnectionError::Timeout { state, waited });
			}
			self.poll()?;
		}
	}

	/// Arm the handshake and block until docked.
	pub fn connect(&mut self) -> Result<()> {
		let actions = self.connection.initiate(Instant::now())?;
		self.perform(actions)?;
		let budget = self.connection.config().handshake_timeout.saturating_mul(HANDSHAKE_STEPS);
		self.wait_for(|state| state == SessionState::Connected, budget)?;
		info!(name = self.connection.newton_name().unwrap_or("?"), "docked");
		Ok(())
	}

	/// Enter keyboard passthrough and block until the Newton acknowledges.
	pub fn start_keyboard_passthrough(&mut self) -> Result<()> {
		let actions = self.connection.start_keyboard_passthrough(Instant::now())?;
		self.perform(actions)?;
		let state = self.wait_for(|state| state != SessionState::StartingKeyboardPassthrough, self.reply_budget())?;
		if state == SessionState::KeyboardPassthrough { Ok(()) } else { Err(ConnectionError::Disconnected) }
	}

	/// Type a string on the Newton.
	pub fn send_keyboard_string(&mut self, text: &str) -> Result<()> {
		let actions = self.connection.send_keyboard_string(text)?;
		self.perform(actions)
	}

	/// Type one character on the Newton.
	pub fn send_keyboard_character(&mut self, character: u16, flags: u16) -> Result<()> {
		let actions = self.connection.send_keyboard_character(character, flags)?;
		self.perform(actions)
	}

	/// Call a global function on the Newton and block for its result.
	pub fn call_root_method(&mut self, name: Symbol, arguments: Arc<PlainArray>) -> Result<Object> {
		self.call_result = None;
		let actions = self.connection.call_root_method(name, arguments, Instant::now())?;
		self.perform(actions)?;
		self.wait_for(|state| state != SessionState::AwaitingCallResult, self.reply_budget())?;
		self.call_result.take().ok_or(ConnectionError::Disconnected)
	}

	/// End the session.
	pub fn disconnect(&mut self) -> Result<()> {
		let actions = self.connection.disconnect()?;
		self.perform(actions)
	}

	/// Unwrap the write half.
	pub fn into_writer(self) -> W {
		self.writer
	}

	/// Backstop for waits whose real deadline is enforced by the state machine.
	fn reply_budget(&self) -> Duration {
		self.connection.config().reply_timeout.saturating_mul(2)
	}

	fn settle(&mut self, result: Result<Vec<ConnectionAction>>) -> Result<()> {
		match result {
			Ok(actions) => self.perform(actions),
			Err(err) => {
				if self.state() == SessionState::Disconnected {
					self.release(&err.to_string());
				}
				Err(err)
			}
		}
	}

	fn perform(&mut self, actions: Vec<ConnectionAction>) -> Result<()> {
		for action in actions {
			match action {
				ConnectionAction::SendPacket(packet) => self.send(&packet)?,
				ConnectionAction::Close { reason } => self.release(&reason),
				ConnectionAction::CallReturned(result) => self.call_result = Some(result),
			}
		}
		Ok(())
	}

	fn send(&mut self, packet: &DockPacket) -> Result<()> {
		let bytes = packet.to_bytes()?;
		let written = self.writer.write_all(&bytes).and_then(|()| self.writer.flush());
		if let Err(err) = written {
			let actions = self.connection.handle_link_error(&err.to_string());
			for action in actions {
				if let ConnectionAction::Close { reason } = action {
					self.release(&reason);
				}
			}
			return Err(err.into());
		}
		debug!(command = %packet.command, len = packet.payload.len(), "sent dock packet");
		Ok(())
	}

	fn release(&mut self, reason: &str) {
		if self.close_reason.is_some() {
			return;
		}
		info!(reason, "dock session closed");
		self.close_reason = Some(reason.to_owned());
		if let Err(err) = self.writer.flush() {
			warn!(%err, "flush on close failed");
		}
	}
}
