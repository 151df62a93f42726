//! Port probing
//!
//! Opens one candidate port, runs the `WHO!` handshake and classifies the
//! result. A port that does not pass is always closed before returning, so
//! a scan never holds more than one handle.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::commands::{decode_line, Command};
use super::transport::{ConnectionTarget, Transport, TransportOpener};
use super::{ProtocolError, HANDSHAKE_REPLY};

/// Result of probing a single port
pub enum ProbeOutcome {
    /// The port could not be opened at all
    Unavailable(ProtocolError),
    /// The port opened but nothing answered the handshake
    Unresponsive,
    /// The connector sketch answered; the open handle is handed over
    Confirmed(Box<dyn Transport>),
}

impl ProbeOutcome {
    /// Classification without the payload
    pub fn kind(&self) -> ProbeKind {
        match self {
            ProbeOutcome::Unavailable(_) => ProbeKind::Unavailable,
            ProbeOutcome::Unresponsive => ProbeKind::Unresponsive,
            ProbeOutcome::Confirmed(_) => ProbeKind::Confirmed,
        }
    }
}

impl fmt::Debug for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Unavailable(e) => f.debug_tuple("Unavailable").field(e).finish(),
            ProbeOutcome::Unresponsive => f.write_str("Unresponsive"),
            ProbeOutcome::Confirmed(t) => f.debug_tuple("Confirmed").field(&t.port_name()).finish(),
        }
    }
}

/// Payload-free form of [`ProbeOutcome`], suitable for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeKind {
    /// Could not open
    Unavailable,
    /// Opened, no valid reply
    Unresponsive,
    /// Opened and identified
    Confirmed,
}

/// Check whether a handshake reply identifies the connector sketch
pub fn is_handshake_reply(line: &str) -> bool {
    line.contains(HANDSHAKE_REPLY)
}

/// Probe one port: open it, send `WHO!`, read one line and look for `ARDUINO`.
///
/// Never fails; an unopenable port is an expected outcome while scanning.
pub fn probe(opener: &dyn TransportOpener, target: &ConnectionTarget) -> ProbeOutcome {
    tracing::debug!("Probing {}", target.port_name);

    let mut transport = match opener.open(target) {
        Ok(t) => t,
        Err(e) => {
            tracing::warn!("Couldn't open {}: {}", target.port_name, e);
            return ProbeOutcome::Unavailable(e);
        }
    };

    if handshake(transport.as_mut()) {
        tracing::debug!("Handshake succeeded on {}", target.port_name);
        ProbeOutcome::Confirmed(transport)
    } else {
        tracing::debug!("No handshake reply on {}, closing", target.port_name);
        transport.close();
        ProbeOutcome::Unresponsive
    }
}

fn handshake(transport: &mut dyn Transport) -> bool {
    if let Err(e) = transport.write_all(&Command::Who.to_bytes()) {
        tracing::debug!("Handshake write to {} failed: {}", transport.port_name(), e);
        return false;
    }

    match transport.read_line() {
        Ok(bytes) => decode_line(bytes)
            .map(|line| is_handshake_reply(&line))
            .unwrap_or(false),
        Err(e) => {
            tracing::debug!("Handshake read from {} failed: {}", transport.port_name(), e);
            false
        }
    }
}
