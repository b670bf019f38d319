use parkgate_types::{Command, ParseError};
use std::fmt;

/// One inbound read, normalized into a logical line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundLine(String);

impl InboundLine {
    /// Decodes `bytes` (invalid UTF-8 is replaced) and strips trailing CR/LF.
    /// Returns `None` when nothing is left.
    pub fn normalize(bytes: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(bytes);
        let line = text.trim_end_matches(['\r', '\n']);
        (!line.is_empty()).then(|| Self(line.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn command(&self) -> Result<Command, ParseError> {
        Command::parse(&self.0)
    }
}

impl fmt::Display for InboundLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
