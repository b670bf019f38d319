//! The gate state machine.
//!
//! One [`ControlLoop::tick`] reads at most one device line and one keystroke.
//! Device lines are only read while idle: during manual ticket entry or an
//! operator prompt they stay queued on the link (and are discarded when a
//! manual exit finishes).

use crate::input::{InputSource, Key, LineEditor, LineEvent};
use parkgate_device::{DeviceLink, InboundLine};
use parkgate_registry::{Clock, SlotRegistry, SystemClock};
use parkgate_types::{
    Ack, Allocation, Command, Inconsistency, Receipt, RegistryError, RepairReport, SlotIndex,
    SlotRecord, Ticket, TicketId, Timestamp,
};
use std::collections::VecDeque;
use std::fmt;
use tracing::{debug, info};

/// Journal lines kept for display.
pub const JOURNAL_LEN: usize = 300;

/// Operator prompts that collect one argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prompt {
    Consult,
    Exit,
    ForceRelease,
}

impl Prompt {
    pub fn label(self) -> &'static str {
        match self {
            Prompt::Consult => "Ticket to look up",
            Prompt::Exit => "Ticket for exit",
            Prompt::ForceRelease => "Slot number to free",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Idle,
    /// The exit sensor fired; the operator types the ticket presented.
    AwaitingManualEntry,
    Interactive(Prompt),
    Terminated,
}

/// What one handled event did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome {
    Allocated(Allocation),
    Full,
    ExitRequested,
    /// Exit sensor fired with no vehicle parked.
    NothingParked,
    Released(Receipt),
    NotFound(TicketId),
    ExitCancelled,
    Unrecognized(String),
    Consulted(SlotRecord),
    ForceReleased(SlotIndex),
    ForceReleaseRefused(String),
    Active(Vec<SlotRecord>),
    History(Vec<Ticket>),
    Audited(Vec<Inconsistency>),
    Repaired(RepairReport),
    PromptOpened(Prompt),
    PromptCancelled(Prompt),
    UnknownKey(char),
    Terminated,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Allocated(a) => write!(f, "Entry granted: {} ticket {}", a.slot, a.ticket),
            Outcome::Full => f.write_str("Entry refused: parking is full"),
            Outcome::ExitRequested => {
                f.write_str("Exit requested: type the ticket and press Enter (Esc cancels)")
            }
            Outcome::NothingParked => f.write_str("Exit refused: no vehicles parked"),
            Outcome::Released(r) if r.fee.is_zero() => {
                write!(f, "Exit: ticket {} from {} (free)", r.ticket, r.slot)
            }
            Outcome::Released(r) => {
                write!(f, "Exit: ticket {} from {} charged {}", r.ticket, r.slot, r.fee)
            }
            Outcome::NotFound(ticket) => write!(f, "Ticket not found: {ticket}"),
            Outcome::ExitCancelled => f.write_str("Exit cancelled"),
            Outcome::Unrecognized(line) => write!(f, "Unrecognized device command: {line:?}"),
            Outcome::Consulted(record) => write!(
                f,
                "Ticket {} is in {} since {}",
                record.ticket,
                record.slot,
                record.entered_at.format("%d/%m/%Y %H:%M")
            ),
            Outcome::ForceReleased(slot) => write!(f, "{slot} force-released"),
            Outcome::ForceReleaseRefused(arg) => write!(f, "Could not free slot {arg:?}"),
            Outcome::Active(records) => write!(f, "{} vehicle(s) parked", records.len()),
            Outcome::History(tickets) => write!(f, "{} ticket(s) issued", tickets.len()),
            Outcome::Audited(findings) if findings.is_empty() => {
                f.write_str("Audit: slot table and index agree")
            }
            Outcome::Audited(findings) => write!(f, "Audit: {} inconsistency(ies)", findings.len()),
            Outcome::Repaired(report) if report.is_clean() => {
                write!(f, "Repair: nothing to fix ({} entries)", report.rebuilt)
            }
            Outcome::Repaired(report) => write!(
                f,
                "Repair: {} entries rebuilt, {} slot(s) freed, {} stale removed, {} ticket(s) closed",
                report.rebuilt,
                report.freed.len(),
                report.stale_removed,
                report.orphans_closed
            ),
            Outcome::PromptOpened(prompt) => write!(f, "{}:", prompt.label()),
            Outcome::PromptCancelled(_) => f.write_str("Cancelled"),
            Outcome::UnknownKey(c) => write!(f, "Unknown key {c:?}"),
            Outcome::Terminated => f.write_str("Shutting down"),
        }
    }
}

/// Drives the registry from device lines and operator keys.
pub struct ControlLoop<C: Clock = SystemClock> {
    registry: SlotRegistry<C>,
    link: DeviceLink,
    state: State,
    editor: LineEditor,
    journal: VecDeque<String>,
}

impl<C: Clock> ControlLoop<C> {
    pub fn new(registry: SlotRegistry<C>, link: DeviceLink) -> Self {
        Self {
            registry,
            link,
            state: State::Idle,
            editor: LineEditor::new(),
            journal: VecDeque::new(),
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state != State::Terminated
    }

    pub fn registry(&self) -> &SlotRegistry<C> {
        &self.registry
    }

    pub fn link(&self) -> &DeviceLink {
        &self.link
    }

    /// Text typed so far at the current prompt.
    pub fn input_buffer(&self) -> &str {
        self.editor.buffer()
    }

    /// Recent outcomes, oldest first.
    pub fn journal(&self) -> impl DoubleEndedIterator<Item = &str> + ExactSizeIterator {
        self.journal.iter().map(String::as_str)
    }

    /// Runs one iteration: at most one device line, then at most one key.
    pub fn tick(&mut self, input: &mut dyn InputSource) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        if let Some(outcome) = self.poll_device() {
            outcomes.push(outcome);
        }
        if self.is_running() {
            if let Some(outcome) = input.next_key().and_then(|key| self.handle_key(key)) {
                outcomes.push(outcome);
            }
        }
        outcomes
    }

    /// Handles the newest device line, if one arrived. Does nothing unless idle.
    pub fn poll_device(&mut self) -> Option<Outcome> {
        if self.state != State::Idle {
            return None;
        }
        self.link.poll();
        let line = self.link.take_latest()?;
        Some(self.handle_line(&line))
    }

    fn handle_line(&mut self, line: &InboundLine) -> Outcome {
        let outcome = match line.command() {
            Ok(Command::Entry) => self.entry(),
            Ok(Command::Exit) if self.registry.occupied_count() > 0 => {
                info!("exit sensor fired; awaiting ticket");
                self.editor.clear();
                self.state = State::AwaitingManualEntry;
                Outcome::ExitRequested
            }
            Ok(Command::Exit) => {
                self.ack(Ack::Rejected);
                Outcome::NothingParked
            }
            Ok(Command::Unknown(code)) => {
                debug!(code, %line, "unrecognized device command");
                self.ack(Ack::Rejected);
                Outcome::Unrecognized(line.to_string())
            }
            Err(err) => {
                debug!(%err, %line, "unparseable device line");
                self.ack(Ack::Rejected);
                Outcome::Unrecognized(line.to_string())
            }
        };
        self.link.clear_input();
        self.record(outcome)
    }

    /// Applies one operator keystroke to the current state.
    pub fn handle_key(&mut self, key: Key) -> Option<Outcome> {
        if key == Key::Interrupt {
            return Some(self.terminate());
        }
        match self.state {
            State::Idle => self.hotkey(key),
            State::AwaitingManualEntry => {
                let outcome = match self.editor.handle(key) {
                    LineEvent::Pending => return None,
                    LineEvent::Submitted(ticket) => self.exit(TicketId::from(ticket)),
                    LineEvent::Cancelled => {
                        self.ack(Ack::Rejected);
                        Outcome::ExitCancelled
                    }
                };
                self.editor.clear();
                self.link.clear_input();
                self.state = State::Idle;
                Some(self.record(outcome))
            }
            State::Interactive(prompt) => {
                let outcome = match self.editor.handle(key) {
                    LineEvent::Pending => return None,
                    LineEvent::Submitted(arg) => {
                        self.state = State::Idle;
                        self.run_prompt(prompt, arg)
                    }
                    LineEvent::Cancelled => {
                        self.state = State::Idle;
                        Outcome::PromptCancelled(prompt)
                    }
                };
                Some(self.record(outcome))
            }
            State::Terminated => None,
        }
    }

    fn hotkey(&mut self, key: Key) -> Option<Outcome> {
        let Key::Char(c) = key else {
            return None;
        };
        let outcome = match c.to_ascii_uppercase() {
            'E' => self.entry(),
            'S' => self.open_prompt(Prompt::Exit),
            'I' => self.open_prompt(Prompt::Consult),
            'F' => self.open_prompt(Prompt::ForceRelease),
            'L' => Outcome::Active(self.registry.list_active()),
            'H' => Outcome::History(self.registry.tickets().to_vec()),
            'D' => Outcome::Audited(self.registry.audit()),
            'R' => Outcome::Repaired(self.registry.repair()),
            'Q' => return Some(self.terminate()),
            _ => Outcome::UnknownKey(c),
        };
        Some(self.record(outcome))
    }

    fn open_prompt(&mut self, prompt: Prompt) -> Outcome {
        self.editor.clear();
        self.state = State::Interactive(prompt);
        Outcome::PromptOpened(prompt)
    }

    fn run_prompt(&mut self, prompt: Prompt, arg: String) -> Outcome {
        match prompt {
            Prompt::Exit => self.exit(TicketId::from(arg)),
            Prompt::Consult => {
                let ticket = TicketId::from(arg);
                match self.registry.consult(&ticket) {
                    Ok(record) => Outcome::Consulted(record),
                    Err(_) => Outcome::NotFound(ticket),
                }
            }
            Prompt::ForceRelease => match arg.parse::<u16>() {
                Ok(number) if self.registry.force_release(number) => {
                    match SlotIndex::new(number) {
                        Some(slot) => Outcome::ForceReleased(slot),
                        None => Outcome::ForceReleaseRefused(arg),
                    }
                }
                _ => Outcome::ForceReleaseRefused(arg),
            },
        }
    }

    fn entry(&mut self) -> Outcome {
        match self.registry.allocate() {
            Ok(allocation) => {
                self.ack(Ack::Granted);
                Outcome::Allocated(allocation)
            }
            Err(err) => {
                debug!(%err, "entry refused");
                self.ack(Ack::Rejected);
                Outcome::Full
            }
        }
    }

    fn exit(&mut self, ticket: TicketId) -> Outcome {
        match self.registry.release(&ticket) {
            Ok(receipt) => {
                self.ack(if receipt.fee.is_zero() {
                    Ack::Granted
                } else {
                    Ack::Billed
                });
                Outcome::Released(receipt)
            }
            Err(RegistryError::TicketNotFound(ticket)) => {
                self.ack(Ack::Rejected);
                Outcome::NotFound(ticket)
            }
            Err(err) => {
                debug!(%err, "exit refused");
                self.ack(Ack::Rejected);
                Outcome::NotFound(ticket)
            }
        }
    }

    fn terminate(&mut self) -> Outcome {
        if self.state == State::AwaitingManualEntry {
            self.ack(Ack::Rejected);
        }
        self.editor.clear();
        self.state = State::Terminated;
        self.link.disconnect();
        info!("control loop terminated");
        self.record(Outcome::Terminated)
    }

    fn ack(&mut self, ack: Ack) {
        if !self.link.is_connected() {
            debug!(%ack, "no device attached; ack not sent");
            return;
        }
        // Send failures are logged by the link, which drops the session unless
        // the write only timed out.
        let _ = self.link.send(ack);
    }

    fn record(&mut self, outcome: Outcome) -> Outcome {
        let now = self.registry.now();
        let stamp = now.format("%H:%M:%S");
        self.push_journal(format!("{stamp} {outcome}"));
        for detail in details(&outcome, now) {
            self.push_journal(format!("{stamp}   {detail}"));
        }
        outcome
    }

    fn push_journal(&mut self, line: String) {
        self.journal.push_back(line);
        while self.journal.len() > JOURNAL_LEN {
            self.journal.pop_front();
        }
    }
}

/// Per-item lines for outcomes that carry a list.
fn details(outcome: &Outcome, now: Timestamp) -> Vec<String> {
    match outcome {
        Outcome::Active(records) => records
            .iter()
            .map(|r| format!("{} {} {} min", r.slot, r.ticket, r.minutes_parked(now)))
            .collect(),
        Outcome::History(tickets) => tickets
            .iter()
            .map(|t| match (t.active, t.fee) {
                (true, _) => format!("{} {} active", t.id, t.slot),
                (false, Some(fee)) => format!("{} {} closed {fee}", t.id, t.slot),
                (false, None) => format!("{} {} closed (forced)", t.id, t.slot),
            })
            .collect(),
        Outcome::Audited(findings) => findings.iter().map(ToString::to_string).collect(),
        Outcome::Repaired(report) => report
            .freed
            .iter()
            .map(|slot| format!("freed {slot}"))
            .collect(),
        Outcome::Consulted(record) => {
            vec![format!("parked {} min", record.minutes_parked(now))]
        }
        _ => Vec::new(),
    }
}
