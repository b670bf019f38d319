//! Test doubles: a hand-driven clock and helpers that corrupt registry state
//! the way index drift does in the field.

use crate::{Clock, RegistryConfig, Slot, SlotRegistry};
use chrono::{Local, TimeDelta, TimeZone};
use parkgate_types::{SlotIndex, TicketId, Timestamp};
use std::cell::Cell;
use std::rc::Rc;

/// Clock that only moves when told to. Clones share the same time.
#[derive(Clone, Debug)]
pub struct ManualClock {
    now: Rc<Cell<Timestamp>>,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Rc::new(Cell::new(start)),
        }
    }

    /// 27 Nov 2025, 10:06 local time.
    pub fn fixed() -> Self {
        let start = Local
            .with_ymd_and_hms(2025, 11, 27, 10, 6, 0)
            .single()
            .unwrap_or_else(Local::now);
        Self::new(start)
    }

    pub fn advance(&self, delta: TimeDelta) {
        self.now.set(self.now.get() + delta);
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(TimeDelta::minutes(minutes));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.get()
    }
}

/// Registry with the default configuration on a fixed manual clock.
pub fn create_registry() -> (SlotRegistry<ManualClock>, ManualClock) {
    create_registry_with(RegistryConfig::default())
}

pub fn create_registry_with(config: RegistryConfig) -> (SlotRegistry<ManualClock>, ManualClock) {
    let clock = ManualClock::fixed();
    let registry = SlotRegistry::with_clock(config, clock.clone())
        .unwrap_or_else(|err| panic!("invalid test registry config: {err}"));
    (registry, clock)
}

impl<C: Clock> SlotRegistry<C> {
    /// Marks `slot` occupied by `ticket` without touching the index or ledger.
    pub fn corrupt_slot(&mut self, slot: u16, ticket: Option<TicketId>) {
        let entered_at = self.clock.now();
        if let Some(entry) = self.slot_mut(slot) {
            *entry = Slot {
                occupied: true,
                ticket,
                entered_at: Some(entered_at),
            };
        }
    }

    /// Inserts a raw `ticket -> slot` index entry.
    pub fn corrupt_index(&mut self, ticket: TicketId, slot: u16) {
        if let Some(slot) = SlotIndex::new(slot) {
            self.index.insert(ticket, slot);
        }
    }

    pub fn drop_index_entry(&mut self, ticket: &TicketId) {
        self.index.remove(ticket);
    }

    /// Index contents sorted by slot.
    pub fn index_entries(&self) -> Vec<(TicketId, SlotIndex)> {
        let mut entries: Vec<_> = self
            .index
            .iter()
            .map(|(ticket, slot)| (ticket.clone(), *slot))
            .collect();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }

    fn slot_mut(&mut self, slot: u16) -> Option<&mut Slot> {
        let slot = SlotIndex::new(slot)?;
        self.slots.get_mut(slot.position())
    }
}
