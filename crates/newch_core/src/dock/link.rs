use std::io::{self, Read};
use std::sync::mpsc::{self, Receiver};
use std::thread::{self, JoinHandle};

use tracing::{debug, trace};

use crate::dock::packet::is_idle;
use crate::dock::{CancelToken, DockPacket, PacketReader, ProtocolError};

/// What the reader thread observed on the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
	/// One complete packet.
	Packet(DockPacket),
	/// Read failed; no further events follow.
	Failed(String),
	/// Peer closed the stream cleanly; no further events follow.
	Closed,
}

/// Run a blocking packet read loop on its own thread.
///
/// Each event goes to `on_event`; returning `false` stops the loop. The loop also stops after
/// `Failed` or `Closed`, or once `cancel` fires and the stream next reports a read timeout,
/// even partway through a packet.
pub fn spawn_reader<R, F>(reader: R, cancel: CancelToken, mut on_event: F) -> io::Result<JoinHandle<()>>
where
	R: Read + Send + 'static,
	F: FnMut(LinkEvent) -> bool + Send + 'static,
{
	thread::Builder::new().name("newch-dock-reader".to_owned()).spawn(move || {
		let mut packets = PacketReader::new(reader).with_cancel(cancel.clone());
		loop {
			if cancel.is_cancelled() {
				debug!("dock reader cancelled");
				break;
			}
			let event = match packets.read_packet() {
				Ok(Some(packet)) => LinkEvent::Packet(packet),
				Ok(None) => LinkEvent::Closed,
				Err(ProtocolError::Io(err)) if is_idle(&err) => {
					trace!("dock reader idle");
					continue;
				}
				Err(err) => LinkEvent::Failed(err.to_string()),
			};

			let last = !matches!(event, LinkEvent::Packet(_));
			if !on_event(event) || last {
				break;
			}
		}
	})
}

/// [`spawn_reader`] feeding a channel.
pub fn channel_reader<R>(reader: R, cancel: CancelToken) -> io::Result<(Receiver<LinkEvent>, JoinHandle<()>)>
where
	R: Read + Send + 'static,
{
	let (tx, rx) = mpsc::channel();
	let handle = spawn_reader(reader, cancel, move |event| tx.send(event).is_ok())?;
	Ok((rx, handle))
}
