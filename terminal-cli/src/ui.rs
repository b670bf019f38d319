use std::io::{self, Stdout};
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use parkgate_registry::Clock;
use parkgate_terminal::{ControlLoop, InputSource, Key, State};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Wrap};
use ratatui::Terminal;
use tracing::warn;

const HOTKEYS: &str =
    "E entry | S exit | I lookup | F free slot | L list | H history | D audit | R repair | Q quit";

/// Raw-mode alternate screen, restored on drop.
pub struct Tui {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl Tui {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("enable raw mode")?;
        let mut stdout = io::stdout();
        crossterm::execute!(stdout, EnterAlternateScreen).context("enter alternate screen")?;
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        terminal.clear()?;
        Ok(Self { terminal })
    }

    pub fn draw<C: Clock>(&mut self, control: &ControlLoop<C>) -> Result<()> {
        self.terminal.draw(|f| draw_ui(f, control))?;
        Ok(())
    }
}

impl Drop for Tui {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = crossterm::execute!(
            self.terminal.backend_mut(),
            LeaveAlternateScreen,
            crossterm::cursor::Show
        );
        let _ = self.terminal.show_cursor();
    }
}

/// Keystrokes from the terminal, read without waiting.
pub struct CrosstermInput;

impl InputSource for CrosstermInput {
    fn next_key(&mut self) -> Option<Key> {
        loop {
            match event::poll(Duration::ZERO) {
                Ok(true) => {}
                Ok(false) => return None,
                Err(err) => {
                    warn!("terminal poll failed: {err}");
                    return None;
                }
            }
            match event::read() {
                Ok(Event::Key(ev)) if ev.kind == KeyEventKind::Press => {
                    if let Some(key) = map_key(ev) {
                        return Some(key);
                    }
                }
                Ok(_) => {}
                Err(err) => {
                    warn!("terminal read failed: {err}");
                    return None;
                }
            }
        }
    }
}

fn map_key(ev: KeyEvent) -> Option<Key> {
    match (ev.code, ev.modifiers) {
        (KeyCode::Char('c'), m) if m.contains(KeyModifiers::CONTROL) => Some(Key::Interrupt),
        (KeyCode::Char(c), _) => Some(Key::Char(c)),
        (KeyCode::Enter, _) => Some(Key::Enter),
        (KeyCode::Backspace, _) => Some(Key::Backspace),
        (KeyCode::Esc, _) => Some(Key::Esc),
        _ => None,
    }
}

fn draw_ui<C: Clock>(f: &mut ratatui::Frame, control: &ControlLoop<C>) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(2), Constraint::Min(1), Constraint::Length(3)].as_ref())
        .split(f.area());

    // Header
    let registry = control.registry();
    let summary = registry.summary();
    let link = match control.link().port_name() {
        Some(port) => format!("device {port}"),
        None => "no device (simulation)".to_string(),
    };
    let last_line = control
        .link()
        .last_line()
        .map(|line| format!(" | last rx {line:?}"))
        .unwrap_or_default();
    let header = Paragraph::new(vec![
        Line::raw(format!(
            "Occupied {}/{} | Free {} | {}/hour after {} min | {link}{last_line}",
            summary.occupied,
            summary.capacity,
            summary.free(),
            summary.hourly_rate,
            registry.fee_policy().grace().num_minutes(),
        )),
        Line::raw(HOTKEYS),
    ])
    .style(Style::default().fg(Color::Gray));
    f.render_widget(header, chunks[0]);

    let main_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)].as_ref())
        .split(chunks[1]);

    // Slot board
    let now = registry.now();
    let active = registry.list_active();
    let board: Vec<ListItem> = (1..=summary.capacity)
        .map(|number| {
            let record = active.iter().find(|r| r.slot.position() + 1 == number);
            match record {
                Some(r) => ListItem::new(Line::from(vec![
                    Span::styled(
                        format!("{:<6}", r.slot.to_string()),
                        Style::default().fg(Color::Red),
                    ),
                    Span::raw(format!("{}  {} min", r.ticket, r.minutes_parked(now))),
                ])),
                None => ListItem::new(Line::from(vec![
                    Span::styled(format!("A-{number:<4}"), Style::default().fg(Color::Green)),
                    Span::raw("free"),
                ])),
            }
        })
        .collect();
    let board = List::new(board).block(Block::default().borders(Borders::ALL).title("Slots"));
    f.render_widget(board, main_chunks[0]);

    // Log pane
    let log_lines: Vec<Line> = control
        .journal()
        .rev()
        .take((main_chunks[1].height.saturating_sub(2)) as usize)
        .rev()
        .map(|l| Line::raw(l.to_string()))
        .collect();
    let log = Paragraph::new(log_lines)
        .block(Block::default().borders(Borders::ALL).title("Log"))
        .wrap(Wrap { trim: true });
    f.render_widget(log, main_chunks[1]);

    // Input
    let (title, prompt, color) = match control.state() {
        State::AwaitingManualEntry => (
            "Exit requested by gate (Esc cancels)".to_string(),
            format!("ticket > {}", control.input_buffer()),
            Color::Yellow,
        ),
        State::Interactive(prompt) => (
            format!("{} (Esc cancels)", prompt.label()),
            format!("> {}", control.input_buffer()),
            Color::Cyan,
        ),
        State::Idle | State::Terminated => ("Command".to_string(), String::new(), Color::Gray),
    };
    let input = Paragraph::new(prompt)
        .style(Style::default().fg(color))
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(input, chunks[2]);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_ctrl_c_to_interrupt() {
        let ev = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key(ev), Some(Key::Interrupt));
        let ev = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE);
        assert_eq!(map_key(ev), Some(Key::Char('c')));
    }

    #[test]
    fn maps_editing_keys() {
        assert_eq!(map_key(KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE)), Some(Key::Enter));
        assert_eq!(map_key(KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE)), Some(Key::Esc));
        assert_eq!(
            map_key(KeyEvent::new(KeyCode::Backspace, KeyModifiers::NONE)),
            Some(Key::Backspace)
        );
        assert_eq!(map_key(KeyEvent::new(KeyCode::Up, KeyModifiers::NONE)), None);
    }
}
