//! Protocol errors

use thiserror::Error;

/// Errors that can occur while talking to the board
#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("Serial port error: {0}")]
    SerialError(String),

    #[error("Not connected to a board")]
    NotConnected,

    #[error("Port not found: {0}")]
    PortNotFound(String),

    #[error("Invalid message token: {0:?}")]
    InvalidMessage(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<serialport::Error> for ProtocolError {
    fn from(e: serialport::Error) -> Self {
        match e.kind {
            serialport::ErrorKind::NoDevice => ProtocolError::PortNotFound(e.to_string()),
            _ => ProtocolError::SerialError(e.to_string()),
        }
    }
}
