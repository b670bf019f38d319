//! Operator keystrokes, independent of the terminal backend.

use std::collections::VecDeque;

/// Longest argument an operator prompt accepts.
pub const MAX_INPUT_LEN: usize = 32;

/// A keystroke as the control loop sees it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Esc,
    /// Ctrl-C: quit from any state.
    Interrupt,
}

/// Non-blocking source of keystrokes.
pub trait InputSource {
    /// Returns the next pending key, or `None` when none is waiting.
    fn next_key(&mut self) -> Option<Key>;
}

/// Scripted input, one key per call.
impl InputSource for VecDeque<Key> {
    fn next_key(&mut self) -> Option<Key> {
        self.pop_front()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LineEvent {
    Pending,
    Submitted(String),
    Cancelled,
}

/// Single-line editor behind the manual exit and operator prompts.
#[derive(Clone, Debug, Default)]
pub struct LineEditor {
    buffer: String,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Applies one key. Enter on an empty (or blank) buffer stays pending;
    /// submitting or cancelling clears the buffer.
    pub fn handle(&mut self, key: Key) -> LineEvent {
        match key {
            Key::Char(c) if !c.is_control() => {
                if self.buffer.chars().count() < MAX_INPUT_LEN {
                    self.buffer.push(c);
                }
                LineEvent::Pending
            }
            Key::Char(_) => LineEvent::Pending,
            Key::Backspace => {
                self.buffer.pop();
                LineEvent::Pending
            }
            Key::Enter => {
                let line = self.buffer.trim().to_string();
                if line.is_empty() {
                    return LineEvent::Pending;
                }
                self.buffer.clear();
                LineEvent::Submitted(line)
            }
            Key::Esc | Key::Interrupt => {
                self.buffer.clear();
                LineEvent::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_str(editor: &mut LineEditor, text: &str) {
        for c in text.chars() {
            assert_eq!(editor.handle(Key::Char(c)), LineEvent::Pending);
        }
    }

    #[test]
    fn submit_returns_trimmed_line_and_clears() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, " TCK-1 ");
        assert_eq!(editor.handle(Key::Enter), LineEvent::Submitted("TCK-1".into()));
        assert_eq!(editor.buffer(), "");
    }

    #[test]
    fn empty_enter_is_ignored() {
        let mut editor = LineEditor::new();
        assert_eq!(editor.handle(Key::Enter), LineEvent::Pending);
        type_str(&mut editor, "  ");
        assert_eq!(editor.handle(Key::Enter), LineEvent::Pending);
    }

    #[test]
    fn backspace_and_cancel() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, "ab");
        editor.handle(Key::Backspace);
        assert_eq!(editor.buffer(), "a");
        assert_eq!(editor.handle(Key::Esc), LineEvent::Cancelled);
        assert_eq!(editor.buffer(), "");
    }

    #[test]
    fn input_is_bounded() {
        let mut editor = LineEditor::new();
        type_str(&mut editor, &"9".repeat(MAX_INPUT_LEN + 5));
        assert_eq!(editor.buffer().len(), MAX_INPUT_LEN);
    }

    #[test]
    fn scripted_input_drains_in_order() {
        let mut keys: VecDeque<Key> = [Key::Char('e'), Key::Enter].into_iter().collect();
        assert_eq!(keys.next_key(), Some(Key::Char('e')));
        assert_eq!(keys.next_key(), Some(Key::Enter));
        assert_eq!(keys.next_key(), None);
    }
}
