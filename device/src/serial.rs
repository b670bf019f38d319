//! Serial port transport.

use crate::{Connector, LinkError, Transport};
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::{Read, Write};
use std::time::Duration;

/// Framing and timeouts for the gate controller: 9600 8N1, 50 ms timeouts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LineSettings {
    pub baud_rate: u32,
    pub data_bits: DataBits,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub timeout: Duration,
}

impl Default for LineSettings {
    fn default() -> Self {
        Self {
            baud_rate: 9600,
            data_bits: DataBits::Eight,
            parity: Parity::None,
            stop_bits: StopBits::One,
            timeout: Duration::from_millis(50),
        }
    }
}

/// Opens candidate ports as serial devices.
#[derive(Clone, Copy, Debug, Default)]
pub struct SerialConnector {
    settings: LineSettings,
}

impl SerialConnector {
    pub fn new(settings: LineSettings) -> Self {
        Self { settings }
    }
}

impl Connector for SerialConnector {
    fn open(&self, port: &str) -> Result<Box<dyn Transport>, LinkError> {
        let handle = serialport::new(port, self.settings.baud_rate)
            .data_bits(self.settings.data_bits)
            .parity(self.settings.parity)
            .stop_bits(self.settings.stop_bits)
            .flow_control(FlowControl::None)
            .timeout(self.settings.timeout)
            .open()?;
        Ok(Box::new(SerialTransport {
            name: port.to_string(),
            handle,
        }))
    }
}

pub struct SerialTransport {
    name: String,
    handle: Box<dyn SerialPort>,
}

impl Transport for SerialTransport {
    fn name(&self) -> &str {
        &self.name
    }

    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let pending = self.handle.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(0);
        }
        let len = pending.min(buf.len());
        Ok(self.handle.read(&mut buf[..len])?)
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), LinkError> {
        self.handle.write_all(bytes)?;
        self.handle.flush()?;
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), LinkError> {
        self.handle.clear(ClearBuffer::Input)?;
        Ok(())
    }
}
