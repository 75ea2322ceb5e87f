use std::io::{self, BufRead, Read, Write};
use std::net::TcpStream;
use std::sync::mpsc::{self, Receiver};
use std::thread;
use std::time::Duration;

use newch::dock::{CancelToken, ConnectionConfig, DockSession, SessionOptions, channel_reader};
use tracing::{info, warn};

use crate::cmd::error::Result;
use crate::cmd::prompt::{CommandPrompt, KEYBOARD_COMMAND};

/// Read timeout on the link, so the reader thread notices cancellation.
const LINK_READ_TIMEOUT: Duration = Duration::from_millis(200);

#[derive(clap::Args)]
pub struct Args {
	/// Serial device the Newton is attached to.
	#[arg(long, conflicts_with = "tcp", required_unless_present = "tcp")]
	pub serial: Option<String>,
	#[arg(long, default_value_t = 38_400)]
	pub baud: u32,
	/// TCP address of a serial bridge.
	#[arg(long)]
	pub tcp: Option<String>,
	/// Seconds allowed for each handshake step.
	#[arg(long = "handshake-timeout")]
	pub handshake_timeout: Option<u64>,
	/// Seconds allowed for a Newton reply.
	#[arg(long = "reply-timeout")]
	pub reply_timeout: Option<u64>,
}

type LinkHalves = (Box<dyn Read + Send>, Box<dyn Write + Send>, String);

/// Dock with a Newton and run the line prompt until input ends or the session closes.
pub fn run(args: Args) -> Result<()> {
	let mut config = ConnectionConfig::default();
	if let Some(secs) = args.handshake_timeout {
		config.handshake_timeout = Duration::from_secs(secs);
	}
	if let Some(secs) = args.reply_timeout {
		config.reply_timeout = Duration::from_secs(secs);
	}

	let (reader, writer, label) = open_link(&args)?;
	let cancel = CancelToken::new();
	let (events, reader_thread) = channel_reader(reader, cancel.clone())?;
	let mut session = DockSession::new(writer, events, config, SessionOptions::default()).with_cancel(cancel.clone());

	println!("waiting for newton on {label}");
	let outcome = dock_and_prompt(&mut session);

	cancel.cancel();
	if reader_thread.join().is_err() {
		warn!("dock reader thread panicked");
	}
	outcome
}

fn dock_and_prompt<W: Write>(session: &mut DockSession<W>) -> Result<()> {
	session.connect()?;
	println!("connected to {}", session.connection().newton_name().unwrap_or("newton"));
	println!("commands: {KEYBOARD_COMMAND}");

	let lines = spawn_stdin_lines()?;
	let stdout = io::stdout();
	CommandPrompt::new(session, stdout.lock()).run(&lines)
}

fn open_link(args: &Args) -> Result<LinkHalves> {
	if let Some(path) = &args.serial {
		info!(path = %path, baud = args.baud, "opening serial port");
		let port = serialport::new(path.as_str(), args.baud).timeout(LINK_READ_TIMEOUT).open()?;
		let reader = port.try_clone()?;
		return Ok((Box::new(reader), Box::new(port), format!("{path} at {} baud", args.baud)));
	}

	let addr = args.tcp.as_deref().unwrap_or_default();
	info!(addr, "connecting to serial bridge");
	let stream = TcpStream::connect(addr)?;
	stream.set_read_timeout(Some(LINK_READ_TIMEOUT))?;
	stream.set_nodelay(true)?;
	let reader = stream.try_clone()?;
	Ok((Box::new(reader), Box::new(stream), addr.to_owned()))
}

/// Forward stdin lines to a channel; the channel disconnects at end of input.
fn spawn_stdin_lines() -> io::Result<Receiver<String>> {
	let (tx, rx) = mpsc::channel();
	thread::Builder::new().name("newch-stdin".to_owned()).spawn(move || {
		for line in io::stdin().lock().lines() {
			let Ok(line) = line else { break };
			if tx.send(line).is_err() {
				break;
			}
		}
	})?;
	Ok(rx)
}
