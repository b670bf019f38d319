//! In-memory stand-ins for a gate controller and its port.

use crate::{Connector, LinkError, Result, Transport};
use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::io::ErrorKind;
use std::rc::Rc;

#[derive(Default)]
struct Wire {
    inbound: VecDeque<Vec<u8>>,
    outbound: Vec<u8>,
    unplugged: bool,
    write_failure: Option<ErrorKind>,
}

/// Test-side handle to a simulated controller.
///
/// Each pushed chunk is delivered by one read, the way a controller line
/// usually arrives in a single serial read.
#[derive(Clone, Default)]
pub struct MockDevice {
    wire: Rc<RefCell<Wire>>,
}

impl MockDevice {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_line(&self, line: &str) {
        self.push_bytes(line.as_bytes());
    }

    pub fn push_bytes(&self, bytes: &[u8]) {
        self.wire.borrow_mut().inbound.push_back(bytes.to_vec());
    }

    /// Chunks not yet read by the link.
    pub fn pending(&self) -> usize {
        self.wire.borrow().inbound.len()
    }

    /// Everything written by the link, split into lines.
    pub fn sent(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.wire.borrow().outbound)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Makes every following operation fail as if the cable were pulled.
    pub fn unplug(&self) {
        self.wire.borrow_mut().unplugged = true;
    }

    /// Makes writes fail while reads keep working.
    pub fn fail_writes(&self) {
        self.wire.borrow_mut().write_failure = Some(ErrorKind::BrokenPipe);
    }

    /// Makes writes time out while reads keep working.
    pub fn time_out_writes(&self) {
        self.wire.borrow_mut().write_failure = Some(ErrorKind::TimedOut);
    }

    pub fn transport(&self, name: &str) -> MockTransport {
        MockTransport {
            name: name.to_string(),
            wire: self.wire.clone(),
        }
    }
}

fn broken_pipe() -> LinkError {
    LinkError::from(std::io::Error::from(ErrorKind::BrokenPipe))
}

pub struct MockTransport {
    name: String,
    wire: Rc<RefCell<Wire>>,
}

impl Transport for MockTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize> {
        let mut wire = self.wire.borrow_mut();
        if wire.unplugged {
            return Err(broken_pipe());
        }
        let Some(mut chunk) = wire.inbound.pop_front() else {
            return Ok(0);
        };
        let len = chunk.len().min(buf.len());
        buf[..len].copy_from_slice(&chunk[..len]);
        if len < chunk.len() {
            wire.inbound.push_front(chunk.split_off(len));
        }
        Ok(len)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut wire = self.wire.borrow_mut();
        if wire.unplugged {
            return Err(broken_pipe());
        }
        if let Some(kind) = wire.write_failure {
            return Err(LinkError::from(std::io::Error::from(kind)));
        }
        wire.outbound.extend_from_slice(bytes);
        Ok(())
    }

    fn discard_input(&mut self) -> Result<()> {
        let mut wire = self.wire.borrow_mut();
        if wire.unplugged {
            return Err(broken_pipe());
        }
        wire.inbound.clear();
        Ok(())
    }
}

/// Connector that only knows the ports registered on it.
#[derive(Default)]
pub struct MockConnector {
    devices: HashMap<String, MockDevice>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device(mut self, port: &str, device: MockDevice) -> Self {
        self.devices.insert(port.to_string(), device);
        self
    }
}

impl Connector for MockConnector {
    fn open(&self, port: &str) -> Result<Box<dyn Transport>> {
        match self.devices.get(port) {
            Some(device) => Ok(Box::new(device.transport(port))),
            None => Err(LinkError::from(std::io::Error::from(ErrorKind::NotFound))),
        }
    }
}

/// A link attached to a fresh simulated controller on `port`.
pub fn connected_link(port: &str) -> (crate::DeviceLink, MockDevice) {
    let device = MockDevice::new();
    let mut link = crate::DeviceLink::disconnected();
    link.attach(Box::new(device.transport(port)));
    (link, device)
}
