//! Connection management
//!
//! Handles discovery, the single active connection and the message API.
//!
//! Discovery tries the remembered port first. If that does not answer the
//! handshake, up to [`MAX_SCAN_PORTS`] ports from the enumerator are probed
//! in the order given and the first confirmed one wins.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{
    commands::{decode_line, frame_message, ArduinoEvent, Command},
    prober::{probe, ProbeKind, ProbeOutcome},
    serial::{list_ports, PortInfo, SerialOpener, SystemPorts},
    transport::{BoardType, ConnectionTarget, PortEnumerator, Transport, TransportOpener},
    ProtocolError, DEFAULT_BAUD_RATE, DEFAULT_PORT, DEFAULT_TIMEOUT_MS, MAX_SCAN_PORTS,
};

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,
    /// Connected and handshake done
    Connected,
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Remembered serial port name; empty skips straight to scanning
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Per-read timeout in milliseconds
    pub timeout_ms: u64,
    /// Board family, selects the control lines
    pub board: BoardType,
    /// Delay after opening a port before the handshake, in milliseconds
    pub settle_delay_ms: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: DEFAULT_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout_ms: DEFAULT_TIMEOUT_MS,
            board: BoardType::default(),
            settle_delay_ms: 0,
        }
    }
}

impl ConnectionConfig {
    /// Config remembering `port_name`, defaults otherwise
    pub fn with_port(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Build the attempt description for one port
    pub fn target(&self, port_name: &str) -> ConnectionTarget {
        ConnectionTarget {
            port_name: port_name.to_string(),
            baud_rate: self.baud_rate,
            timeout: Duration::from_millis(self.timeout_ms),
            control_lines: self.board.control_lines(),
            settle_delay: Duration::from_millis(self.settle_delay_ms),
        }
    }
}

/// One port tried during discovery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeAttempt {
    /// Port that was probed
    pub port: String,
    /// How it went
    pub outcome: ProbeKind,
}

/// Cumulative traffic counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Bytes written, handshakes excluded
    pub tx_bytes: u64,
    /// Bytes read through [`Connection::read_line`]
    pub rx_bytes: u64,
    /// Messages written
    pub tx_messages: u64,
    /// Lines read
    pub rx_lines: u64,
}

/// Connection to an Arduino running the connector sketch
pub struct Connection {
    /// Active transport, if any
    port: Option<Box<dyn Transport>>,
    /// Connection configuration; `port_name` tracks the last working port
    config: ConnectionConfig,
    /// Opens transports
    opener: Box<dyn TransportOpener>,
    /// Lists candidate ports for scanning
    enumerator: Box<dyn PortEnumerator>,
    /// Ports tried by the most recent discovery
    last_scan: Vec<ProbeAttempt>,
    /// Traffic since construction
    counters: Counters,
}

impl Connection {
    /// Create a new connection using the system serial ports (not yet connected)
    pub fn new(config: ConnectionConfig) -> Self {
        Self::with_transport(config, SerialOpener, SystemPorts)
    }

    /// Create a connection over custom transport collaborators
    pub fn with_transport(
        config: ConnectionConfig,
        opener: impl TransportOpener + 'static,
        enumerator: impl PortEnumerator + 'static,
    ) -> Self {
        Self {
            port: None,
            config,
            opener: Box::new(opener),
            enumerator: Box::new(enumerator),
            last_scan: Vec::new(),
            counters: Counters::default(),
        }
    }

    /// List available serial ports
    pub fn list_ports() -> Vec<PortInfo> {
        list_ports()
    }

    /// Get the connection configuration
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Remembered port: the active one while connected, else the last that worked
    pub fn port_name(&self) -> &str {
        &self.config.port_name
    }

    /// Get current connection state
    pub fn state(&self) -> ConnectionState {
        if self.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Check whether the active transport is open
    pub fn is_connected(&self) -> bool {
        self.port.as_ref().map(|p| p.is_open()).unwrap_or(false)
    }

    /// Ports tried by the most recent discovery, in order
    pub fn last_scan(&self) -> &[ProbeAttempt] {
        &self.last_scan
    }

    /// Get cumulative traffic counters
    pub fn counters(&self) -> Counters {
        self.counters
    }

    /// Connect to the board, discovering it if needed.
    ///
    /// Returns `true` once connected. Already being connected is success
    /// and touches no port.
    pub fn connect(&mut self) -> bool {
        if self.is_connected() {
            return true;
        }

        let Some(port) = self.try_ports() else {
            tracing::info!(
                "No Arduino found after probing {} port(s)",
                self.last_scan.len()
            );
            return false;
        };

        tracing::info!("Connected to Arduino on {}", port.port_name());
        self.config.port_name = port.port_name().to_string();
        self.port = Some(port);
        self.send_fire_and_forget(Command::Done);
        true
    }

    /// Disconnect from the board, announcing it with `RESET!` first.
    ///
    /// Does nothing when not connected.
    pub fn disconnect(&mut self) {
        if !self.is_connected() {
            return;
        }
        self.send_fire_and_forget(Command::Reset);
        if let Some(mut port) = self.port.take() {
            port.close();
            tracing::info!("Disconnected from {}", port.port_name());
        }
    }

    /// Disconnect and run a full discovery again
    pub fn reset(&mut self) -> bool {
        self.disconnect();
        self.connect()
    }

    /// Read one line from the board.
    ///
    /// Returns `None` when not connected, on I/O errors and on lines that
    /// are not valid UTF-8. An empty string means the read timed out.
    pub fn read_line(&mut self) -> Option<String> {
        let port = self.port.as_mut()?;
        let bytes = match port.read_line() {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Read from {} failed: {}", port.port_name(), e);
                return None;
            }
        };
        if !bytes.is_empty() {
            self.counters.rx_bytes = self.counters.rx_bytes.saturating_add(bytes.len() as u64);
            self.counters.rx_lines = self.counters.rx_lines.saturating_add(1);
        }
        decode_line(bytes)
    }

    /// Read one line and classify it as an [`ArduinoEvent`]
    pub fn read_event(&mut self) -> Option<ArduinoEvent> {
        self.read_line().and_then(|line| ArduinoEvent::from_line(&line))
    }

    /// Flash the LED once (experimental)
    pub fn blink(&mut self) -> bool {
        self.send_if_connected(Command::Blink)
    }

    /// Drive the pulse pin high (experimental)
    pub fn pulse_up(&mut self) -> bool {
        self.send_if_connected(Command::PulseUp)
    }

    /// Drive the pulse pin low (experimental)
    pub fn pulse_down(&mut self) -> bool {
        self.send_if_connected(Command::PulseDown)
    }

    /// Send a custom token; the `!` delimiter is appended here.
    pub fn send_message(&mut self, token: &str) -> Result<(), ProtocolError> {
        let bytes = frame_message(token)?;
        self.write_raw(&bytes)
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let port = self
            .port
            .as_mut()
            .filter(|p| p.is_open())
            .ok_or(ProtocolError::NotConnected)?;
        port.write_all(bytes)?;
        self.counters.tx_bytes = self.counters.tx_bytes.saturating_add(bytes.len() as u64);
        self.counters.tx_messages = self.counters.tx_messages.saturating_add(1);
        Ok(())
    }

    /// Write a command nobody waits on; a failure is only logged since the
    /// board may already be unplugged.
    fn send_fire_and_forget(&mut self, command: Command) -> bool {
        match self.write_raw(&command.to_bytes()) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!("Failed to send {}: {}", command, e);
                false
            }
        }
    }

    fn send_if_connected(&mut self, command: Command) -> bool {
        self.is_connected() && self.send_fire_and_forget(command)
    }

    /// Remembered port first, then the scan list in enumeration order.
    fn try_ports(&mut self) -> Option<Box<dyn Transport>> {
        // A stale, already-closed handle may still be held
        if let Some(mut stale) = self.port.take() {
            stale.close();
        }
        self.last_scan.clear();

        if !self.config.port_name.is_empty() {
            let remembered = self.config.port_name.clone();
            if let Some(port) = self.try_port(&remembered) {
                return Some(port);
            }
        }

        let candidates = self.enumerator.list_candidate_ports(MAX_SCAN_PORTS);
        tracing::debug!("Scanning {} candidate port(s): {:?}", candidates.len(), candidates);
        candidates
            .iter()
            .take(MAX_SCAN_PORTS)
            .find_map(|name| self.try_port(name))
    }

    fn try_port(&mut self, port_name: &str) -> Option<Box<dyn Transport>> {
        let target = self.config.target(port_name);
        let outcome = probe(self.opener.as_ref(), &target);
        self.last_scan.push(ProbeAttempt {
            port: port_name.to_string(),
            outcome: outcome.kind(),
        });
        match outcome {
            ProbeOutcome::Confirmed(port) => Some(port),
            ProbeOutcome::Unavailable(_) | ProbeOutcome::Unresponsive => None,
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.disconnect();
    }
}
