use crate::{Connector, InboundLine, LinkError, Mailbox, Result, Transport};
use parkgate_types::Ack;
use tracing::{debug, info, warn};

/// Largest chunk taken from the transport per poll.
pub const READ_CHUNK: usize = 255;

/// Session with the gate controller, or the lack of one.
///
/// A link without a session is valid: polling yields nothing and sends fail
/// with [`LinkError::Disconnected`], so the caller keeps running in
/// simulation mode.
pub struct DeviceLink {
    session: Option<Box<dyn Transport>>,
    mailbox: Mailbox<InboundLine>,
}

impl Default for DeviceLink {
    fn default() -> Self {
        Self::disconnected()
    }
}

impl DeviceLink {
    pub fn disconnected() -> Self {
        Self {
            session: None,
            mailbox: Mailbox::new(),
        }
    }

    /// Tries each candidate in order and keeps the first that opens.
    ///
    /// On failure the link stays disconnected; the caller decides whether
    /// that is fatal (it normally is not).
    pub fn connect<S: AsRef<str>>(
        &mut self,
        connector: &dyn Connector,
        candidates: &[S],
    ) -> Result<String> {
        for candidate in candidates {
            let candidate = candidate.as_ref();
            match connector.open(candidate) {
                Ok(transport) => {
                    self.attach(transport);
                    return Ok(candidate.to_string());
                }
                Err(err) => debug!(port = candidate, %err, "device port unavailable"),
            }
        }
        let tried: Vec<String> = candidates.iter().map(|c| c.as_ref().to_string()).collect();
        warn!(tried = ?tried, "no device port responded; running without device");
        Err(LinkError::Unavailable { tried })
    }

    /// Adopts an already open transport, discarding anything it buffered.
    pub fn attach(&mut self, transport: Box<dyn Transport>) {
        info!(port = transport.name(), "device connected");
        self.session = Some(transport);
        self.clear_input();
    }

    pub fn disconnect(&mut self) {
        if let Some(transport) = self.session.take() {
            info!(port = transport.name(), "device disconnected");
        }
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn port_name(&self) -> Option<&str> {
        self.session.as_ref().map(|transport| transport.name())
    }

    /// Reads one pending chunk, if any, and publishes it as the latest line.
    ///
    /// Never blocks beyond the transport's own timeout. Returns the line just
    /// published; it stays in the mailbox until [`DeviceLink::take_latest`].
    pub fn poll(&mut self) -> Option<&InboundLine> {
        let transport = self.session.as_mut()?;
        let mut buf = [0u8; READ_CHUNK];
        let read = match transport.read_available(&mut buf) {
            Ok(read) => read,
            Err(err) => {
                self.on_error("read", &err);
                return None;
            }
        };
        if read == 0 {
            return None;
        }
        let line = InboundLine::normalize(&buf[..read])?;
        debug!(line = %line, bytes = read, "device line received");
        if let Some(lost) = self.mailbox.publish(line) {
            debug!(line = %lost, "unread device line overwritten");
        }
        self.mailbox.latest()
    }

    /// Takes the line published since the last take, clearing the new-data flag.
    pub fn take_latest(&mut self) -> Option<InboundLine> {
        self.mailbox.take()
    }

    pub fn has_new_data(&self) -> bool {
        self.mailbox.has_new()
    }

    /// Most recent line, consumed or not.
    pub fn last_line(&self) -> Option<&InboundLine> {
        self.mailbox.latest()
    }

    /// Writes `ack` followed by a newline.
    ///
    /// A timed out write keeps the session and returns [`LinkError::Timeout`];
    /// any other failure drops it.
    pub fn send(&mut self, ack: Ack) -> Result<()> {
        let Some(transport) = self.session.as_mut() else {
            return Err(LinkError::Disconnected);
        };
        match transport.write_all(&ack.encode()) {
            Ok(()) => {
                debug!(%ack, "ack sent");
                Ok(())
            }
            Err(err) => {
                warn!(%ack, %err, "failed to send ack");
                self.on_error("write", &err);
                Err(err)
            }
        }
    }

    /// Discards received bytes that have not been polled yet.
    pub fn clear_input(&mut self) {
        let Some(transport) = self.session.as_mut() else {
            return;
        };
        if let Err(err) = transport.discard_input() {
            self.on_error("clear", &err);
        }
    }

    fn on_error(&mut self, operation: &'static str, err: &LinkError) {
        if err.is_fatal() {
            warn!(operation, %err, "device link lost; continuing without device");
            self.session = None;
        } else {
            debug!(operation, %err, "device operation timed out");
        }
    }
}
