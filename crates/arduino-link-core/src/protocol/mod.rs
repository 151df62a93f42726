//! Serial Protocol Communication
//!
//! Implements the discovery handshake and the `!`-terminated text command
//! protocol spoken by the Arduino connector sketch.
//!
//! Outbound messages are plain UTF-8 tokens followed by a single `!`.
//! Inbound messages are whatever the transport considers one line.

pub mod commands;
mod connection;
mod error;
pub mod prober;
pub mod serial;
pub mod transport;

pub use commands::{decode_line, frame_message, ArduinoEvent, Command};
pub use connection::{Connection, ConnectionConfig, ConnectionState, Counters, ProbeAttempt};
pub use error::ProtocolError;
pub use prober::{probe, ProbeKind, ProbeOutcome};
pub use serial::{list_ports, PortInfo, SerialOpener, SerialTransport, SystemPorts};
pub use transport::{
    BoardType, ConnectionTarget, ControlLines, PortEnumerator, Transport, TransportOpener,
};

/// Port tried first when nothing else is known
#[cfg(windows)]
pub const DEFAULT_PORT: &str = "COM5";

/// Port tried first when nothing else is known
#[cfg(not(windows))]
pub const DEFAULT_PORT: &str = "/dev/ttyACM0";

/// Default baud rate of the connector sketch
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default per-read timeout in milliseconds
pub const DEFAULT_TIMEOUT_MS: u64 = 50;

/// Upper bound on candidate ports probed during a scan
pub const MAX_SCAN_PORTS: usize = 10;

/// Terminator appended to every outbound token
pub const MESSAGE_DELIMITER: char = '!';

/// Substring that identifies the connector sketch in a handshake reply
pub const HANDSHAKE_REPLY: &str = "ARDUINO";

/// Longest inbound line kept; the excess is read and discarded
pub const MAX_LINE_LENGTH: usize = 1024;
