use std::io::Write;
use std::sync::mpsc::{Receiver, TryRecvError};

use newch::dock::{ConnectionError, DockSession, SessionState};
use tracing::debug;

use crate::cmd::error::{CliError, Result};

/// Prompt command that requests keyboard passthrough.
pub const KEYBOARD_COMMAND: &str = "keyboard";

/// Line prompt driving a docked session.
///
/// Lines are commands while connected and keyboard text while in passthrough. Rejected or
/// unknown input prints a diagnostic and the prompt carries on; fatal session errors end it.
pub struct CommandPrompt<'a, W: Write, O: Write> {
	session: &'a mut DockSession<W>,
	out: O,
}

impl<'a, W: Write, O: Write> CommandPrompt<'a, W, O> {
	/// Wrap a connected session.
	pub fn new(session: &'a mut DockSession<W>, out: O) -> Self {
		Self { session, out }
	}

	/// Handle lines until input ends or the session closes.
	///
	/// End of input hangs up politely; a session closed from the other side is an error.
	pub fn run(&mut self, lines: &Receiver<String>) -> Result<()> {
		loop {
			if self.session.state() == SessionState::Disconnected {
				let reason = self.session.close_reason().unwrap_or("unknown").to_owned();
				writeln!(self.out, "disconnected: {reason}")?;
				return Err(CliError::SessionClosed { reason });
			}

			match lines.try_recv() {
				Ok(line) => self.handle_line(&line)?,
				Err(TryRecvError::Empty) => self.session.poll()?,
				Err(TryRecvError::Disconnected) => {
					debug!("prompt input ended");
					self.session.disconnect()?;
					writeln!(self.out, "disconnected")?;
					return Ok(());
				}
			}
		}
	}

	/// Handle one input line.
	pub fn handle_line(&mut self, line: &str) -> Result<()> {
		let line = line.trim_end_matches(['\r', '\n']);
		if self.session.state() == SessionState::KeyboardPassthrough {
			if line.is_empty() {
				return Ok(());
			}
			let result = self.session.send_keyboard_string(line);
			return self.report(result);
		}

		match line.trim() {
			"" => Ok(()),
			KEYBOARD_COMMAND => {
				let result = self.session.start_keyboard_passthrough();
				if result.is_ok() {
					writeln!(self.out, "keyboard passthrough active")?;
				}
				self.report(result)
			}
			other => {
				writeln!(self.out, "unknown command `{other}` (available: {KEYBOARD_COMMAND})")?;
				Ok(())
			}
		}
	}

	/// Print rejections and carry on; pass fatal errors up.
	fn report(&mut self, result: std::result::Result<(), ConnectionError>) -> Result<()> {
		match result {
			Ok(()) => Ok(()),
			Err(err) if !err.is_fatal() => {
				writeln!(self.out, "error: {err}")?;
				Ok(())
			}
			Err(err) => Err(err.into()),
		}
	}

	/// Unwrap the output writer.
	#[cfg(test)]
	pub(crate) fn into_output(self) -> O {
		self.out
	}
}

#[cfg(test)]
mod tests;
