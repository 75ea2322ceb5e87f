mod command;
mod connection;
mod error;
mod link;
mod packet;
pub mod packets;
mod session;

/// Command codes.
pub use command::DockCommand;
/// Sans-IO connection state machine.
pub use connection::{ConnectionAction, ConnectionConfig, DockConnection, HandshakePhase, SessionState};
/// Error and result aliases.
pub use error::{ConnectionError, ProtocolError, Result};
/// Reader thread and its events.
pub use link::{LinkEvent, channel_reader, spawn_reader};
/// Packet framing.
pub use packet::{DockPacket, HEADER_SIZE, MAGIC, MAX_PAYLOAD_SIZE, PacketReader};
/// Session-wide enums carried in handshake packets.
pub use packets::{DesktopType, SessionType};
/// Blocking session driver.
pub use session::{CancelToken, DockSession, SessionOptions};
