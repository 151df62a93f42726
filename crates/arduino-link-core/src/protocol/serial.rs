//! Serial port handling
//!
//! Production implementations of the transport seams, backed by the
//! `serialport` crate.

use serialport::{
    ClearBuffer, DataBits, FlowControl, Parity, SerialPort, SerialPortInfo, SerialPortType,
    StopBits,
};
use std::collections::HashMap;
#[cfg(target_os = "linux")]
use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use super::transport::{
    ConnectionTarget, ControlLines, PortEnumerator, Transport, TransportOpener,
};
use super::{ProtocolError, MAX_LINE_LENGTH};

/// Information about an available serial port
#[derive(Debug, Clone)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0" or "COM3")
    pub name: String,

    /// USB vendor ID (if USB device)
    pub vid: Option<u16>,

    /// USB product ID (if USB device)
    pub pid: Option<u16>,

    /// Manufacturer name (if available)
    pub manufacturer: Option<String>,

    /// Product name (if available)
    pub product: Option<String>,
}

impl PortInfo {
    fn bare(name: String) -> Self {
        Self {
            name,
            vid: None,
            pid: None,
            manufacturer: None,
            product: None,
        }
    }
}

impl From<SerialPortInfo> for PortInfo {
    fn from(info: SerialPortInfo) -> Self {
        let (vid, pid, manufacturer, product) = match info.port_type {
            SerialPortType::UsbPort(usb_info) => (
                Some(usb_info.vid),
                Some(usb_info.pid),
                usb_info.manufacturer,
                usb_info.product,
            ),
            _ => (None, None, None, None),
        };

        Self {
            name: info.port_name,
            vid,
            pid,
            manufacturer,
            product,
        }
    }
}

/// Sort key so that ttyACM* come first, then ttyUSB*, then COM*, each
/// numerically by suffix, then everything else by name.
fn port_sort_key(name: &str) -> (u8, usize, String) {
    let basename = name.rsplit('/').next().unwrap_or(name);
    for (rank, prefix) in ["ttyACM", "ttyUSB", "COM"].iter().enumerate() {
        if let Some(rest) = basename.strip_prefix(prefix) {
            let num = rest.parse::<usize>().unwrap_or(usize::MAX);
            return (rank as u8, num, basename.to_string());
        }
    }
    (3, 0, basename.to_string())
}

/// List all available serial ports, with /dev fallbacks and deterministic ordering
pub fn list_ports() -> Vec<PortInfo> {
    let mut map: HashMap<String, PortInfo> = HashMap::new();
    match serialport::available_ports() {
        Ok(ports) => {
            for info in ports {
                let p = PortInfo::from(info);
                map.entry(p.name.clone()).or_insert(p);
            }
        }
        Err(e) => tracing::warn!("Port enumeration failed: {}", e),
    }

    // Linux-only: Add /dev/ttyACM* and /dev/ttyUSB* entries if present but not found by API
    #[cfg(target_os = "linux")]
    if let Ok(entries) = fs::read_dir("/dev") {
        for entry in entries.flatten() {
            if let Some(fname) = entry.file_name().to_str() {
                if fname.starts_with("ttyACM") || fname.starts_with("ttyUSB") {
                    let full = format!("/dev/{}", fname);
                    map.entry(full.clone()).or_insert_with(|| PortInfo::bare(full));
                }
            }
        }
    }

    let mut v: Vec<PortInfo> = map.into_values().collect();
    v.sort_by_key(|p| port_sort_key(&p.name));
    v
}

/// Enumerates the ports present on this machine
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemPorts;

impl PortEnumerator for SystemPorts {
    fn list_candidate_ports(&self, max_count: usize) -> Vec<String> {
        list_ports()
            .into_iter()
            .map(|p| p.name)
            .take(max_count)
            .collect()
    }
}

/// Drive RTS/DTR. A port that refuses is still usable, so failures are only logged.
fn assert_control_lines(port: &mut dyn SerialPort, lines: ControlLines) {
    if let Err(e) = port.write_data_terminal_ready(lines.dtr) {
        tracing::debug!("Failed to set DTR {}: {} (continuing)", lines.dtr, e);
    }
    if let Err(e) = port.write_request_to_send(lines.rts) {
        tracing::debug!("Failed to set RTS {}: {} (continuing)", lines.rts, e);
    }
}

/// Opens ports through the platform serial library
#[derive(Debug, Clone, Copy, Default)]
pub struct SerialOpener;

impl TransportOpener for SerialOpener {
    fn open(&self, target: &ConnectionTarget) -> Result<Box<dyn Transport>, ProtocolError> {
        // Standard 8N1, no flow control
        let mut port = serialport::new(&target.port_name, target.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(target.timeout)
            .open()?;

        assert_control_lines(port.as_mut(), target.control_lines);

        if !target.settle_delay.is_zero() {
            tracing::debug!(
                "Waiting {}ms after opening {}",
                target.settle_delay.as_millis(),
                target.port_name
            );
            std::thread::sleep(target.settle_delay);
        }

        // Drop boot noise so the handshake reply is the first line read
        if let Err(e) = port.clear(ClearBuffer::Input) {
            tracing::debug!("Failed to clear input on {}: {}", target.port_name, e);
        }

        Ok(Box::new(SerialTransport {
            name: target.port_name.clone(),
            port: Some(port),
            timeout: target.timeout,
        }))
    }
}

/// Drop an incomplete UTF-8 sequence left at the end by truncation
fn trim_partial_char(line: &mut Vec<u8>) {
    if let Err(e) = std::str::from_utf8(line) {
        if e.error_len().is_none() {
            line.truncate(e.valid_up_to());
        }
    }
}

/// A serial port opened by [`SerialOpener`]
pub struct SerialTransport {
    name: String,
    port: Option<Box<dyn SerialPort>>,
    timeout: Duration,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("name", &self.name)
            .field("open", &self.port.is_some())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Transport for SerialTransport {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.port.is_some()
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        let port = self.port.as_mut().ok_or(ProtocolError::NotConnected)?;
        tracing::debug!("{} <- {:?}", self.name, String::from_utf8_lossy(bytes));
        port.write_all(bytes)?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ProtocolError> {
        let port = self.port.as_mut().ok_or(ProtocolError::NotConnected)?;
        let deadline = Instant::now() + self.timeout;
        let mut line = Vec::new();
        let mut byte = [0u8; 1];
        let mut overflowed = false;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            port.set_timeout(remaining)?;
            match port.read(&mut byte) {
                Ok(0) => break,
                Ok(_) if byte[0] == b'\n' => {
                    if !overflowed {
                        line.push(byte[0]);
                    }
                    break;
                }
                Ok(_) if line.len() < MAX_LINE_LENGTH => line.push(byte[0]),
                // Over the cap: keep consuming so the tail is not read as a new line
                Ok(_) => overflowed = true,
                Err(ref e) if e.kind() == ErrorKind::TimedOut => break,
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(Duration::from_millis(1));
                }
                Err(ref e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }

        if overflowed {
            tracing::warn!(
                "Line from {} exceeded {} bytes, truncated",
                self.name,
                MAX_LINE_LENGTH
            );
            trim_partial_char(&mut line);
        }

        tracing::debug!("{} -> {:?}", self.name, String::from_utf8_lossy(&line));
        Ok(line)
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            tracing::debug!("Closed {}", self.name);
        }
    }
}
