//! Transport abstraction
//!
//! The connection logic never touches a serial port directly. It talks to
//! three seams instead, so probing and discovery can be driven by an
//! in-memory double in tests:
//!
//! - [`TransportOpener`] opens a byte stream for a [`ConnectionTarget`]
//! - [`Transport`] is one open byte stream with a line-read primitive
//! - [`PortEnumerator`] lists candidate port names in platform order

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::ProtocolError;

/// Modem control lines asserted when a port is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlLines {
    /// Request To Send
    pub rts: bool,
    /// Data Terminal Ready
    pub dtr: bool,
}

impl Default for ControlLines {
    fn default() -> Self {
        Self {
            rts: true,
            dtr: true,
        }
    }
}

/// Board family, which decides how the control lines are driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoardType {
    /// Any board not listed below
    #[default]
    Generic,
    /// Arduino Uno
    Uno,
    /// Arduino Leonardo and other native-USB boards
    Leonardo,
    /// Arduino Nano
    Nano,
}

impl BoardType {
    /// Control lines to assert for this board.
    ///
    /// Everything asserts both lines except the Nano, which gets DTR only.
    pub fn control_lines(&self) -> ControlLines {
        match self {
            BoardType::Nano => ControlLines {
                rts: false,
                dtr: true,
            },
            BoardType::Generic | BoardType::Uno | BoardType::Leonardo => ControlLines::default(),
        }
    }
}

impl std::str::FromStr for BoardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "generic" => Ok(BoardType::Generic),
            "uno" => Ok(BoardType::Uno),
            "leonardo" => Ok(BoardType::Leonardo),
            "nano" => Ok(BoardType::Nano),
            other => Err(format!("unknown board type '{}'", other)),
        }
    }
}

/// Everything needed for one connection attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionTarget {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Upper bound for a single line read
    pub timeout: Duration,
    /// Lines asserted on open
    pub control_lines: ControlLines,
    /// Pause between opening the port and the first write
    pub settle_delay: Duration,
}

/// An open, exclusively owned byte stream to one device
pub trait Transport: Send {
    /// Name of the port this stream was opened on
    fn port_name(&self) -> &str;

    /// Whether the stream is still usable
    fn is_open(&self) -> bool;

    /// Write every byte or fail
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ProtocolError>;

    /// Read one line, bounded by the target's timeout.
    ///
    /// Returns the bytes read including the terminating newline, if one
    /// arrived. A timeout yields a short (possibly empty) read, not an error.
    fn read_line(&mut self) -> Result<Vec<u8>, ProtocolError>;

    /// Release the underlying device. Closing twice is a no-op.
    fn close(&mut self);
}

/// Opens transports; the platform serial library in production
pub trait TransportOpener: Send {
    /// Open the port described by `target` with its control lines asserted
    fn open(&self, target: &ConnectionTarget) -> Result<Box<dyn Transport>, ProtocolError>;
}

/// Lists port names worth probing, in the order they should be tried
pub trait PortEnumerator: Send {
    /// Return at most `max_count` port names
    fn list_candidate_ports(&self, max_count: usize) -> Vec<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_board_control_lines() {
        assert_eq!(
            BoardType::Generic.control_lines(),
            ControlLines { rts: true, dtr: true }
        );
        assert_eq!(
            BoardType::Leonardo.control_lines(),
            ControlLines { rts: true, dtr: true }
        );
        assert_eq!(
            BoardType::Nano.control_lines(),
            ControlLines { rts: false, dtr: true }
        );
    }

    #[test]
    fn test_default_board() {
        assert_eq!(BoardType::default(), BoardType::Generic);
    }

    #[test]
    fn test_board_type_from_str() {
        assert_eq!("Nano".parse::<BoardType>(), Ok(BoardType::Nano));
        assert_eq!("leonardo".parse::<BoardType>(), Ok(BoardType::Leonardo));
        assert!("mega".parse::<BoardType>().is_err());
    }
}
