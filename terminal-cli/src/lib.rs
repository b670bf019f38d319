//! Operator terminal for the parking gate.
//!
//! [`ControlLoop`] owns the slot registry and the device link and arbitrates
//! between controller lines and operator keystrokes. The `parkgate` binary
//! wraps it with a terminal UI.

mod controller;
mod input;

pub use controller::{ControlLoop, Outcome, Prompt, State, JOURNAL_LEN};
pub use input::{InputSource, Key, LineEditor, LineEvent, MAX_INPUT_LEN};
