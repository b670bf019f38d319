//! Line-oriented wire protocol spoken with the gate controller.
//!
//! Inbound lines carry a numeric command code somewhere in the text (the
//! controller firmware prefixes it with free-form noise such as `A40`).
//! Outbound lines are a single acknowledgment digit followed by `\n`.

use std::fmt;
use thiserror::Error as ThisError;

/// Vehicle tripped the entry sensor.
pub const CODE_ENTRY: u8 = 40;
/// Vehicle tripped the exit sensor.
pub const CODE_EXIT: u8 = 30;

/// Maximum number of digits that form a command code.
const MAX_CODE_DIGITS: usize = 2;

/// Typed inbound command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    Entry,
    Exit,
    Unknown(u8),
}

#[derive(Debug, ThisError, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("no command digits in line")]
    NoDigits,
}

impl Command {
    /// Parses the first run of ASCII digits (at most two) anywhere in `line`.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let bytes = line.as_bytes();
        let start = bytes
            .iter()
            .position(u8::is_ascii_digit)
            .ok_or(ParseError::NoDigits)?;
        let code = bytes[start..]
            .iter()
            .take(MAX_CODE_DIGITS)
            .take_while(|b| b.is_ascii_digit())
            .fold(0u8, |acc, b| acc * 10 + (b - b'0'));
        Ok(Self::from_code(code))
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            CODE_ENTRY => Command::Entry,
            CODE_EXIT => Command::Exit,
            other => Command::Unknown(other),
        }
    }
}

/// Acknowledgment sent back to the controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Ack {
    /// Full, not found, cancelled, unrecognized.
    Rejected,
    /// Entry granted, or exit free of charge.
    Granted,
    /// Exit granted with a fee billed.
    Billed,
}

impl Ack {
    pub fn digit(self) -> char {
        match self {
            Ack::Rejected => '0',
            Ack::Granted => '1',
            Ack::Billed => '2',
        }
    }

    /// Wire form: the digit terminated by `\n`.
    pub fn encode(self) -> [u8; 2] {
        [self.digit() as u8, b'\n']
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digit())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_code_with_prefix_noise() {
        assert_eq!(Command::parse("A40"), Ok(Command::Entry));
        assert_eq!(Command::parse("A40\r\n"), Ok(Command::Entry));
        assert_eq!(Command::parse("sensor 30"), Ok(Command::Exit));
    }

    #[test]
    fn takes_at_most_two_digits() {
        assert_eq!(Command::parse("405"), Ok(Command::Entry));
        assert_eq!(Command::parse("123"), Ok(Command::Unknown(12)));
    }

    #[test]
    fn single_digit_run_is_its_own_code() {
        assert_eq!(Command::parse("4x0"), Ok(Command::Unknown(4)));
        assert_eq!(Command::parse("x7"), Ok(Command::Unknown(7)));
    }

    #[test]
    fn only_first_run_counts() {
        assert_eq!(Command::parse("9 40"), Ok(Command::Unknown(9)));
    }

    #[test]
    fn no_digits_is_unparseable() {
        assert_eq!(Command::parse(""), Err(ParseError::NoDigits));
        assert_eq!(Command::parse("ENTRY"), Err(ParseError::NoDigits));
    }

    #[test]
    fn ack_wire_form() {
        assert_eq!(&Ack::Rejected.encode(), b"0\n");
        assert_eq!(&Ack::Granted.encode(), b"1\n");
        assert_eq!(&Ack::Billed.encode(), b"2\n");
    }
}
