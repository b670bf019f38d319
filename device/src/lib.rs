//! Byte-stream link to the gate controller.
//!
//! The controller sends short newline-terminated lines carrying a command
//! code and expects a single acknowledgment digit back. [`DeviceLink`] wraps
//! one session over a [`Transport`], polls it without blocking, and keeps only
//! the most recent inbound line (see [`Mailbox`]).

mod line;
mod link;
mod mailbox;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
mod serial;

pub use line::InboundLine;
pub use link::{DeviceLink, READ_CHUNK};
pub use mailbox::Mailbox;
pub use serial::{LineSettings, SerialConnector, SerialTransport};

use std::io;
use thiserror::Error;

/// Error type for link operations. All of them leave the caller running.
#[derive(Error, Debug)]
pub enum LinkError {
    #[error("no device port responded (tried: {})", tried.join(", "))]
    Unavailable { tried: Vec<String> },
    #[error("device link is not connected")]
    Disconnected,
    #[error("device timed out")]
    Timeout,
    #[error("serial error: {0}")]
    Serial(#[from] serialport::Error),
    #[error("i/o error: {0}")]
    Io(io::Error),
}

impl LinkError {
    /// Whether the session should be dropped after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, LinkError::Timeout | LinkError::Disconnected)
    }
}

impl From<io::Error> for LinkError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => LinkError::Timeout,
            _ => LinkError::Io(err),
        }
    }
}

/// Result type for link operations.
pub type Result<T> = std::result::Result<T, LinkError>;

/// An open byte stream to the controller.
pub trait Transport {
    fn name(&self) -> &str;

    /// Reads bytes already received, at most `buf.len()`. Returns 0 when
    /// nothing is pending instead of waiting.
    fn read_available(&mut self, buf: &mut [u8]) -> Result<usize>;

    fn write_all(&mut self, bytes: &[u8]) -> Result<()>;

    /// Drops received bytes that have not been read.
    fn discard_input(&mut self) -> Result<()>;
}

/// Opens a transport by port name.
pub trait Connector {
    fn open(&self, port: &str) -> Result<Box<dyn Transport>>;
}
