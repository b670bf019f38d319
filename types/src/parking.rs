//! Slot, ticket and money types shared by the registry and the terminal.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error as ThisError;

/// Wall-clock instant used for entry and exit stamps.
pub type Timestamp = DateTime<Local>;

/// Prefix shared by every generated ticket id.
pub const TICKET_PREFIX: &str = "TCK-";

/// 1-based number of a physical parking bay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotIndex(u16);

impl SlotIndex {
    /// Returns `None` for 0, which is never a valid bay number.
    pub fn new(number: u16) -> Option<Self> {
        (number > 0).then_some(Self(number))
    }

    /// Bay number for a 0-based position in the slot table.
    pub fn from_position(position: usize) -> Self {
        Self(position as u16 + 1)
    }

    pub fn get(self) -> u16 {
        self.0
    }

    /// 0-based position in the slot table.
    pub fn position(self) -> usize {
        self.0 as usize - 1
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "A-{}", self.0)
    }
}

/// Identifier printed on a parking ticket.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TicketId(String);

impl TicketId {
    /// Builds `TCK-DDMMYYYY` followed by the sequence number padded to 4 digits.
    ///
    /// The date part is fixed width, so distinct sequence numbers always yield
    /// distinct ids regardless of the date.
    pub fn compose(date: Timestamp, sequence: u64) -> Self {
        Self(format!(
            "{TICKET_PREFIX}{}{:04}",
            date.format("%d%m%Y"),
            sequence
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TicketId {
    fn from(value: &str) -> Self {
        Self(value.trim().to_string())
    }
}

impl From<String> for TicketId {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for TicketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Amount of money in cents.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub const fn cents(self) -> u64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn saturating_mul(self, factor: u64) -> Self {
        Self(self.0.saturating_mul(factor))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// One parking session, kept in the ledger after it ends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub slot: SlotIndex,
    pub entered_at: Timestamp,
    pub exited_at: Option<Timestamp>,
    /// Billed amount; `None` while active and for forced releases.
    pub fee: Option<Money>,
    pub active: bool,
}

/// Read-only view of an occupied slot.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRecord {
    pub slot: SlotIndex,
    pub ticket: TicketId,
    pub entered_at: Timestamp,
}

impl SlotRecord {
    /// Whole minutes parked as of `now`, never negative.
    pub fn minutes_parked(&self, now: Timestamp) -> i64 {
        (now - self.entered_at).num_minutes().max(0)
    }
}

/// Result of a successful allocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Allocation {
    pub slot: SlotIndex,
    pub ticket: TicketId,
    pub entered_at: Timestamp,
}

/// Result of a successful release.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub ticket: TicketId,
    pub slot: SlotIndex,
    pub entered_at: Timestamp,
    pub exited_at: Timestamp,
    pub fee: Money,
}

/// Errors surfaced by registry operations. None of them is fatal to the caller.
#[derive(Debug, ThisError, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("parking is full")]
    Full,
    #[error("ticket not found: {0}")]
    TicketNotFound(TicketId),
    #[error("capacity must be between 1 and 65535 (got {0})")]
    InvalidCapacity(usize),
}

/// A disagreement between the slot table and the ticket index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Inconsistency {
    /// The same ticket id occupies more than one slot.
    DuplicateTicket { ticket: TicketId, slots: Vec<SlotIndex> },
    /// An occupied slot has no index entry pointing back at it.
    MissingIndexEntry { ticket: TicketId, slot: SlotIndex },
    /// An index entry points at a slot that is free or holds another id.
    StaleIndexEntry { ticket: TicketId, slot: SlotIndex },
    /// A slot is marked occupied without a ticket id.
    OccupiedWithoutTicket { slot: SlotIndex },
    /// A slot holds the id of a ticket the ledger has already closed.
    ClosedTicketHeld { ticket: TicketId, slot: SlotIndex },
}

impl fmt::Display for Inconsistency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Inconsistency::DuplicateTicket { ticket, slots } => {
                let slots: Vec<String> = slots.iter().map(|s| s.to_string()).collect();
                write!(f, "ticket {ticket} occupies {}", slots.join(", "))
            }
            Inconsistency::MissingIndexEntry { ticket, slot } => {
                write!(f, "{slot} holds {ticket} but the index has no entry for it")
            }
            Inconsistency::StaleIndexEntry { ticket, slot } => {
                write!(f, "index maps {ticket} to {slot}, which does not hold it")
            }
            Inconsistency::OccupiedWithoutTicket { slot } => {
                write!(f, "{slot} is occupied without a ticket")
            }
            Inconsistency::ClosedTicketHeld { ticket, slot } => {
                write!(f, "{slot} holds {ticket}, which is already closed")
            }
        }
    }
}

/// Outcome of an index rebuild.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Index entries written by the rebuild.
    pub rebuilt: usize,
    /// Slots freed because they held no id, a closed ticket's id, or an id
    /// already claimed by a lower slot.
    pub freed: Vec<SlotIndex>,
    /// Entries present before the rebuild that did not survive it.
    pub stale_removed: usize,
    /// Active tickets closed because no slot holds them any more.
    pub orphans_closed: usize,
}

impl RepairReport {
    /// True when the rebuild had nothing to fix.
    pub fn is_clean(&self) -> bool {
        self.freed.is_empty() && self.stale_removed == 0 && self.orphans_closed == 0
    }
}

/// Counters for the status header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistrySummary {
    pub capacity: usize,
    pub occupied: usize,
    pub tickets_issued: u64,
    pub index_entries: usize,
    pub hourly_rate: Money,
}

impl RegistrySummary {
    pub fn free(&self) -> usize {
        self.capacity.saturating_sub(self.occupied)
    }
}
