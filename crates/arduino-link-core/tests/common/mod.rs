//! Scripted serial bench shared by the integration tests

#![allow(dead_code)]

use arduino_link_core::protocol::{
    ConnectionTarget, PortEnumerator, ProtocolError, Transport, TransportOpener,
};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// What sits behind a port name
#[derive(Debug, Clone)]
pub enum Device {
    /// Opening fails
    Missing,
    /// Opens, never says anything
    Silent,
    /// Opens and sends this line right after the handshake query
    Replies(Vec<u8>),
}

impl Device {
    pub fn arduino() -> Self {
        Device::Replies(b"ARDUINO READY\r\n".to_vec())
    }

    pub fn replies(line: &str) -> Self {
        Device::Replies(line.as_bytes().to_vec())
    }
}

/// Everything the code under test did to the bench, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    OpenFailed(String),
    Open(String),
    Write(String, String),
    Close(String),
}

#[derive(Default)]
struct BenchState {
    devices: HashMap<String, Device>,
    listing: Vec<String>,
    requested_max: Option<usize>,
    events: Vec<Event>,
    inbox: HashMap<String, VecDeque<Vec<u8>>>,
    unplugged: Vec<String>,
}

/// Acts as both the port opener and the port enumerator
#[derive(Clone, Default)]
pub struct Bench {
    state: Arc<Mutex<BenchState>>,
}

impl Bench {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a device; it is not listed unless `listed` is true
    pub fn attach(&self, port: &str, device: Device, listed: bool) -> &Self {
        let mut state = self.state.lock().unwrap();
        state.devices.insert(port.to_string(), device);
        if listed {
            state.listing.push(port.to_string());
        }
        self
    }

    /// Attach and list a device
    pub fn with(self, port: &str, device: Device) -> Self {
        self.attach(port, device, true);
        self
    }

    /// List a port name without any device behind it
    pub fn list_only(&self, port: &str) {
        self.state.lock().unwrap().listing.push(port.to_string());
    }

    /// Queue a line the board will send on `port`
    pub fn queue_line(&self, port: &str, bytes: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .inbox
            .entry(port.to_string())
            .or_default()
            .push_back(bytes.to_vec());
    }

    /// Simulate the cable being pulled: writes and reads start failing
    pub fn unplug(&self, port: &str) {
        self.state.lock().unwrap().unplugged.push(port.to_string());
    }

    pub fn events(&self) -> Vec<Event> {
        self.state.lock().unwrap().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.lock().unwrap().events.clear();
    }

    pub fn requested_max(&self) -> Option<usize> {
        self.state.lock().unwrap().requested_max
    }

    /// Number of open attempts, successful or not
    pub fn open_attempts(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Event::Open(_) | Event::OpenFailed(_)))
            .count()
    }

    /// Ports currently held open
    pub fn open_ports(&self) -> Vec<String> {
        let mut open = Vec::new();
        for event in self.events() {
            match event {
                Event::Open(p) => open.push(p),
                Event::Close(p) => open.retain(|o| *o != p),
                _ => {}
            }
        }
        open
    }

    /// Writes seen on `port`, as text
    pub fn writes_to(&self, port: &str) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Write(p, text) if p == port => Some(text),
                _ => None,
            })
            .collect()
    }

    fn record(&self, event: Event) {
        self.state.lock().unwrap().events.push(event);
    }

    fn is_unplugged(&self, port: &str) -> bool {
        self.state.lock().unwrap().unplugged.iter().any(|p| p == port)
    }
}

impl TransportOpener for Bench {
    fn open(&self, target: &ConnectionTarget) -> Result<Box<dyn Transport>, ProtocolError> {
        let device = self
            .state
            .lock()
            .unwrap()
            .devices
            .get(&target.port_name)
            .cloned()
            .unwrap_or(Device::Missing);

        if matches!(device, Device::Missing) {
            self.record(Event::OpenFailed(target.port_name.clone()));
            return Err(ProtocolError::PortNotFound(target.port_name.clone()));
        }

        self.record(Event::Open(target.port_name.clone()));
        Ok(Box::new(BenchPort {
            name: target.port_name.clone(),
            device,
            bench: self.clone(),
            open: true,
            pending_reply: None,
        }))
    }
}

impl PortEnumerator for Bench {
    // Ignores the limit on purpose so callers have to enforce it themselves
    fn list_candidate_ports(&self, max_count: usize) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        state.requested_max = Some(max_count);
        state.listing.clone()
    }
}

struct BenchPort {
    name: String,
    device: Device,
    bench: Bench,
    open: bool,
    pending_reply: Option<Vec<u8>>,
}

impl Transport for BenchPort {
    fn port_name(&self) -> &str {
        &self.name
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), ProtocolError> {
        if !self.open {
            return Err(ProtocolError::NotConnected);
        }
        if self.bench.is_unplugged(&self.name) {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        self.bench.record(Event::Write(
            self.name.clone(),
            String::from_utf8_lossy(bytes).into_owned(),
        ));
        if bytes == b"WHO!" {
            if let Device::Replies(reply) = &self.device {
                self.pending_reply = Some(reply.clone());
            }
        }
        Ok(())
    }

    fn read_line(&mut self) -> Result<Vec<u8>, ProtocolError> {
        if !self.open {
            return Err(ProtocolError::NotConnected);
        }
        if self.bench.is_unplugged(&self.name) {
            return Err(std::io::Error::from(std::io::ErrorKind::BrokenPipe).into());
        }
        if let Some(reply) = self.pending_reply.take() {
            return Ok(reply);
        }
        let queued = self
            .bench
            .state
            .lock()
            .unwrap()
            .inbox
            .get_mut(&self.name)
            .and_then(|q| q.pop_front());
        // Nothing buffered behaves like a timeout: an empty read
        Ok(queued.unwrap_or_default())
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.bench.record(Event::Close(self.name.clone()));
        }
    }
}
