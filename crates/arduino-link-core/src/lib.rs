//! # Arduino Link Core Library
//!
//! Host-side client for Arduino boards running the connector sketch.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Serial port enumeration with deterministic ordering
//! - Port probing with the `WHO!` / `ARDUINO` handshake
//! - Discovery that prefers the last working port, then scans
//! - `!`-terminated command messages and line-based replies
//!
//! ## Supported Boards
//!
//! - Arduino Uno
//! - Arduino Leonardo
//! - Arduino Nano
//! - Any board running the connector sketch at 9600 baud
//!
//! ## Example
//!
//! ```rust,no_run
//! use arduino_link_core::protocol::{Connection, ConnectionConfig};
//!
//! let mut arduino = Connection::new(ConnectionConfig::default());
//! if arduino.connect() {
//!     println!("Connected on {}", arduino.port_name());
//!     arduino.blink();
//!     if let Some(line) = arduino.read_line() {
//!         print!("{}", line);
//!     }
//!     arduino.disconnect();
//! }
//! ```

pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::protocol::{
        ArduinoEvent, BoardType, Command, Connection, ConnectionConfig, ConnectionState,
        ProbeKind, ProtocolError,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
