//! Protocol commands
//!
//! Defines the command tokens understood by the connector sketch, the
//! `!`-terminated framing used to send them, and the events the board
//! reports back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{ProtocolError, MESSAGE_DELIMITER};

/// Commands sent from the host to the board
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Command {
    /// Handshake query ("WHO")
    Who,

    /// Post-connect acknowledgement ending the sketch's wait loop ("DONE")
    Done,

    /// Sent right before the host closes the port ("RESET")
    Reset,

    /// Flash the on-board LED once ("BLINK")
    Blink,

    /// Drive the pulse pin high ("PULSE+")
    PulseUp,

    /// Drive the pulse pin low ("PULSE-")
    PulseDown,
}

impl Command {
    /// Get the bare token, without the delimiter
    pub fn token(&self) -> &'static str {
        match self {
            Command::Who => "WHO",
            Command::Done => "DONE",
            Command::Reset => "RESET",
            Command::Blink => "BLINK",
            Command::PulseUp => "PULSE+",
            Command::PulseDown => "PULSE-",
        }
    }

    /// Get the bytes written to the wire for this command
    pub fn to_bytes(&self) -> Vec<u8> {
        // Fixed tokens never contain the delimiter
        format!("{}{}", self.token(), MESSAGE_DELIMITER).into_bytes()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// Frame a token for transmission by appending the delimiter.
///
/// The delimiter is appended, never escaped, so a token that already
/// contains `!` (or is empty) is rejected.
pub fn frame_message(token: &str) -> Result<Vec<u8>, ProtocolError> {
    if token.is_empty() || token.contains(MESSAGE_DELIMITER) {
        return Err(ProtocolError::InvalidMessage(token.to_string()));
    }
    let mut bytes = Vec::with_capacity(token.len() + 1);
    bytes.extend_from_slice(token.as_bytes());
    bytes.push(MESSAGE_DELIMITER as u8);
    Ok(bytes)
}

/// Decode one received line as UTF-8.
///
/// Line endings are preserved. Invalid UTF-8 yields `None` and is logged.
pub fn decode_line(bytes: Vec<u8>) -> Option<String> {
    match String::from_utf8(bytes) {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::warn!("Discarding undecodable line: {}", e);
            None
        }
    }
}

/// Events reported by the board as single lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ArduinoEvent {
    /// The sketch finished its current action
    Done,
    /// Red button pressed
    Red,
    /// Green button pressed
    Green,
    /// Yellow button pressed
    Yellow,
    /// Blue button pressed
    Blue,
}

impl ArduinoEvent {
    /// Classify a received line, ignoring its line ending.
    pub fn from_line(line: &str) -> Option<Self> {
        line.trim_end_matches(['\r', '\n']).parse().ok()
    }
}

impl FromStr for ArduinoEvent {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DONE" => Ok(ArduinoEvent::Done),
            "RED" => Ok(ArduinoEvent::Red),
            "GREEN" => Ok(ArduinoEvent::Green),
            "YELLOW" => Ok(ArduinoEvent::Yellow),
            "BLUE" => Ok(ArduinoEvent::Blue),
            other => Err(ProtocolError::InvalidMessage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_wire_bytes() {
        assert_eq!(Command::Who.to_bytes(), b"WHO!".to_vec());
        assert_eq!(Command::Done.to_bytes(), b"DONE!".to_vec());
        assert_eq!(Command::Reset.to_bytes(), b"RESET!".to_vec());
        assert_eq!(Command::Blink.to_bytes(), b"BLINK!".to_vec());
        assert_eq!(Command::PulseUp.to_bytes(), b"PULSE+!".to_vec());
    }

    #[test]
    fn test_pulse_tokens_are_distinct() {
        assert_ne!(Command::PulseUp.token(), Command::PulseDown.token());
        assert_eq!(Command::PulseDown.to_bytes(), b"PULSE-!".to_vec());
    }

    #[test]
    fn test_frame_message() {
        assert_eq!(frame_message("BLINK").unwrap(), b"BLINK!".to_vec());
        // Multi-byte characters are sent as UTF-8
        assert_eq!(frame_message("ÜBER").unwrap(), "ÜBER!".as_bytes().to_vec());
    }

    #[test]
    fn test_frame_message_rejects_delimiter() {
        assert!(matches!(
            frame_message("HI!THERE"),
            Err(ProtocolError::InvalidMessage(_))
        ));
        assert!(matches!(
            frame_message(""),
            Err(ProtocolError::InvalidMessage(_))
        ));
    }

    #[test]
    fn test_decode_line_keeps_line_ending() {
        assert_eq!(
            decode_line(b"ARDUINO READY\r\n".to_vec()).as_deref(),
            Some("ARDUINO READY\r\n")
        );
        assert_eq!(decode_line(Vec::new()).as_deref(), Some(""));
    }

    #[test]
    fn test_decode_line_invalid_utf8() {
        assert_eq!(decode_line(vec![0x41, 0xff, 0xfe, 0x0a]), None);
    }

    #[test]
    fn test_event_from_line() {
        assert_eq!(ArduinoEvent::from_line("DONE\r\n"), Some(ArduinoEvent::Done));
        assert_eq!(ArduinoEvent::from_line("BLUE\n"), Some(ArduinoEvent::Blue));
        assert_eq!(ArduinoEvent::from_line("YELLOW"), Some(ArduinoEvent::Yellow));
        assert_eq!(ArduinoEvent::from_line("PURPLE\n"), None);
        assert_eq!(ArduinoEvent::from_line("red\n"), None);
    }
}
