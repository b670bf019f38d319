//! Slot and ticket registry for a fixed set of parking bays.
//!
//! The registry owns three structures:
//! - the slot table, fixed in size at construction
//! - the ticket ledger, append-only history of every ticket ever issued
//! - the ticket index, a secondary `ticket -> slot` map used for O(1) lookups
//!
//! The index must agree with the slot table: every occupied slot has an entry
//! pointing back at it, and every entry points at a slot holding that ticket.
//! Mutations keep the two in step, but the registry does not re-verify that
//! after each call. [`SlotRegistry::audit`] reports disagreements and
//! [`SlotRegistry::repair`] rebuilds the index from the slot table.
//!
//! Mutation is single-writer: `allocate`, `release` and `repair` must not be
//! interleaved from several threads.

mod clock;
mod fee;
#[cfg(any(test, feature = "mocks"))]
pub mod mocks;
mod seed;

pub use clock::{Clock, SystemClock};
pub use fee::FeePolicy;
pub use seed::SeedEntry;

use parkgate_types::{
    Allocation, Inconsistency, Money, Receipt, RegistryError, RegistrySummary, RepairReport,
    SlotIndex, SlotRecord, Ticket, TicketId, Timestamp,
};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

/// Number of bays in the reference installation.
pub const DEFAULT_CAPACITY: usize = 6;
/// $20.00 per started hour.
pub const DEFAULT_HOURLY_RATE: Money = Money::from_cents(2000);
pub const DEFAULT_GRACE_MINUTES: u32 = 15;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegistryConfig {
    pub capacity: usize,
    pub hourly_rate: Money,
    pub grace_minutes: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            hourly_rate: DEFAULT_HOURLY_RATE,
            grace_minutes: DEFAULT_GRACE_MINUTES,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct Slot {
    occupied: bool,
    ticket: Option<TicketId>,
    entered_at: Option<Timestamp>,
}

impl Slot {
    fn holds(&self, ticket: &TicketId) -> bool {
        self.occupied && self.ticket.as_ref() == Some(ticket)
    }
}

pub struct SlotRegistry<C: Clock = SystemClock> {
    slots: Vec<Slot>,
    ledger: Vec<Ticket>,
    /// Ledger position of the most recent ticket with a given id.
    ledger_positions: HashMap<TicketId, usize>,
    index: HashMap<TicketId, SlotIndex>,
    issued: u64,
    fees: FeePolicy,
    clock: C,
}

impl SlotRegistry<SystemClock> {
    pub fn new(config: RegistryConfig) -> Result<Self, RegistryError> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SlotRegistry<C> {
    pub fn with_clock(config: RegistryConfig, clock: C) -> Result<Self, RegistryError> {
        if config.capacity == 0 || config.capacity > u16::MAX as usize {
            return Err(RegistryError::InvalidCapacity(config.capacity));
        }
        Ok(Self {
            slots: vec![Slot::default(); config.capacity],
            ledger: Vec::new(),
            ledger_positions: HashMap::new(),
            index: HashMap::with_capacity(config.capacity),
            issued: 0,
            fees: FeePolicy::new(config.hourly_rate, config.grace_minutes),
            clock,
        })
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn fee_policy(&self) -> &FeePolicy {
        &self.fees
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.occupied).count()
    }

    pub fn active_ticket_count(&self) -> usize {
        self.ledger.iter().filter(|ticket| ticket.active).count()
    }

    /// Parks a vehicle in the lowest free slot.
    ///
    /// Returns [`RegistryError::Full`] without side effects when every slot is taken.
    pub fn allocate(&mut self) -> Result<Allocation, RegistryError> {
        let Some(position) = self.slots.iter().position(|slot| !slot.occupied) else {
            debug!(capacity = self.capacity(), "allocation refused: full");
            return Err(RegistryError::Full);
        };
        let now = self.clock.now();
        let slot = SlotIndex::from_position(position);
        let ticket = self.next_ticket_id(now);
        self.occupy(slot, ticket.clone(), now);
        info!(%slot, %ticket, "vehicle entered");
        Ok(Allocation {
            slot,
            ticket,
            entered_at: now,
        })
    }

    /// Closes the ticket, bills the stay and frees its slot.
    ///
    /// Looks the ticket up through the index and falls back to a scan of the
    /// slot table when the index has drifted. Unknown ids, and ids whose ticket
    /// is already closed, leave all state untouched.
    pub fn release(&mut self, ticket: &TicketId) -> Result<Receipt, RegistryError> {
        let slot = self
            .locate(ticket)
            .ok_or_else(|| RegistryError::TicketNotFound(ticket.clone()))?;
        if self.is_closed_in_ledger(ticket) {
            warn!(%slot, %ticket, "slot holds a closed ticket; refusing release");
            return Err(RegistryError::TicketNotFound(ticket.clone()));
        }
        let now = self.clock.now();
        let entered_at = self.slots[slot.position()].entered_at.unwrap_or(now);
        let fee = self.fees.fee(entered_at, now);

        self.slots[slot.position()] = Slot::default();
        self.index.remove(ticket);
        self.close_ticket(ticket, now, Some(fee));
        info!(%slot, %ticket, %fee, "vehicle exited");

        Ok(Receipt {
            ticket: ticket.clone(),
            slot,
            entered_at,
            exited_at: now,
            fee,
        })
    }

    /// Frees slot `number` without requiring its ticket id.
    ///
    /// Returns false when the number is out of range or the slot is already free.
    pub fn force_release(&mut self, number: u16) -> bool {
        let Some(slot) = SlotIndex::new(number).filter(|slot| slot.position() < self.capacity())
        else {
            return false;
        };
        if !self.slots[slot.position()].occupied {
            return false;
        }
        let held = std::mem::take(&mut self.slots[slot.position()]).ticket;
        match held {
            Some(ticket) => {
                if !self.is_held(&ticket) {
                    self.index.remove(&ticket);
                    let now = self.clock.now();
                    self.close_ticket(&ticket, now, None);
                } else if self.index.get(&ticket) == Some(&slot) {
                    self.index.remove(&ticket);
                }
                warn!(%slot, %ticket, "slot force-released");
            }
            None => warn!(%slot, "slot without ticket force-released"),
        }
        true
    }

    /// Rebuilds the ticket index from the slot table.
    ///
    /// Slots are folded left to right: the first slot holding an id claims it
    /// and any later slot repeating that id is freed. Occupied slots without an
    /// id, or holding an id whose ticket is already closed, are freed as well.
    /// Active tickets that no slot holds afterwards are closed without a fee,
    /// and held ids missing from the ledger are recorded so that occupancy and
    /// active tickets agree again.
    pub fn repair(&mut self) -> RepairReport {
        let previous = std::mem::take(&mut self.index);
        let mut report = RepairReport::default();

        for position in 0..self.slots.len() {
            let slot = SlotIndex::from_position(position);
            if !self.slots[position].occupied {
                continue;
            }
            match self.slots[position].ticket.clone() {
                Some(ticket) if self.is_closed_in_ledger(&ticket) => {
                    warn!(%slot, %ticket, "freeing slot holding a closed ticket");
                    self.slots[position] = Slot::default();
                    report.freed.push(slot);
                }
                Some(ticket) if !self.index.contains_key(&ticket) => {
                    self.index.insert(ticket, slot);
                    report.rebuilt += 1;
                }
                Some(ticket) => {
                    warn!(%slot, %ticket, "freeing duplicate ticket");
                    self.slots[position] = Slot::default();
                    report.freed.push(slot);
                }
                None => {
                    warn!(%slot, "freeing occupied slot without ticket");
                    self.slots[position] = Slot::default();
                    report.freed.push(slot);
                }
            }
        }

        report.stale_removed = previous
            .iter()
            .filter(|(ticket, slot)| self.index.get(*ticket) != Some(*slot))
            .count();

        let now = self.clock.now();
        for ticket in &mut self.ledger {
            if ticket.active && !self.index.contains_key(&ticket.id) {
                ticket.active = false;
                ticket.exited_at = Some(now);
                report.orphans_closed += 1;
            }
        }
        let unrecorded: Vec<(TicketId, SlotIndex)> = self
            .index
            .iter()
            .filter(|(ticket, _)| self.ticket(ticket).is_none())
            .map(|(ticket, slot)| (ticket.clone(), *slot))
            .collect();
        for (ticket, slot) in unrecorded {
            let entered_at = self.slots[slot.position()].entered_at.unwrap_or(now);
            debug!(%slot, %ticket, "recording ticket missing from ledger");
            self.record_ticket(ticket, slot, entered_at);
        }

        info!(
            rebuilt = report.rebuilt,
            freed = report.freed.len(),
            stale_removed = report.stale_removed,
            orphans_closed = report.orphans_closed,
            "ticket index rebuilt"
        );
        report
    }

    /// Read-only lookup of an active occupancy.
    pub fn consult(&self, ticket: &TicketId) -> Result<SlotRecord, RegistryError> {
        self.locate(ticket)
            .and_then(|slot| self.record(slot))
            .ok_or_else(|| RegistryError::TicketNotFound(ticket.clone()))
    }

    /// Occupied slots in index order.
    pub fn list_active(&self) -> Vec<SlotRecord> {
        (0..self.slots.len())
            .filter_map(|position| self.record(SlotIndex::from_position(position)))
            .collect()
    }

    /// Ledger entry for `ticket`, active or not.
    pub fn ticket(&self, ticket: &TicketId) -> Option<&Ticket> {
        self.ledger_positions
            .get(ticket)
            .and_then(|position| self.ledger.get(*position))
    }

    /// Every ticket issued by this process, oldest first.
    pub fn tickets(&self) -> &[Ticket] {
        &self.ledger
    }

    /// Reports every disagreement between the slot table and the index without
    /// changing anything.
    pub fn audit(&self) -> Vec<Inconsistency> {
        let mut findings = Vec::new();
        let mut holders: BTreeMap<&TicketId, Vec<SlotIndex>> = BTreeMap::new();

        for (position, entry) in self.slots.iter().enumerate() {
            if !entry.occupied {
                continue;
            }
            let slot = SlotIndex::from_position(position);
            match &entry.ticket {
                Some(ticket) => holders.entry(ticket).or_default().push(slot),
                None => findings.push(Inconsistency::OccupiedWithoutTicket { slot }),
            }
        }

        for (ticket, slots) in &holders {
            if self.is_closed_in_ledger(ticket) {
                for slot in slots {
                    findings.push(Inconsistency::ClosedTicketHeld {
                        ticket: (*ticket).clone(),
                        slot: *slot,
                    });
                }
            }
            if slots.len() > 1 {
                findings.push(Inconsistency::DuplicateTicket {
                    ticket: (*ticket).clone(),
                    slots: slots.clone(),
                });
            } else if self.index.get(*ticket) != Some(&slots[0]) {
                findings.push(Inconsistency::MissingIndexEntry {
                    ticket: (*ticket).clone(),
                    slot: slots[0],
                });
            }
        }

        let mut entries: Vec<(&TicketId, &SlotIndex)> = self.index.iter().collect();
        entries.sort_by_key(|(ticket, slot)| (**slot, *ticket));
        for (ticket, slot) in entries {
            if !self.holds(*slot, ticket) {
                findings.push(Inconsistency::StaleIndexEntry {
                    ticket: ticket.clone(),
                    slot: *slot,
                });
            }
        }
        findings
    }

    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary {
            capacity: self.capacity(),
            occupied: self.occupied_count(),
            tickets_issued: self.issued,
            index_entries: self.index.len(),
            hourly_rate: self.fees.hourly_rate(),
        }
    }

    /// Occupies the given slots with freshly numbered tickets dated at their
    /// entry time. Entries for unknown or already occupied slots are skipped.
    pub fn seed(&mut self, entries: &[SeedEntry]) -> Vec<Allocation> {
        let mut seeded = Vec::with_capacity(entries.len());
        for entry in entries {
            let slot = entry.slot;
            if slot.position() >= self.capacity() || self.slots[slot.position()].occupied {
                warn!(%slot, "skipping seed entry for unavailable slot");
                continue;
            }
            let ticket = self.next_ticket_id(entry.entered_at);
            self.occupy(slot, ticket.clone(), entry.entered_at);
            seeded.push(Allocation {
                slot,
                ticket,
                entered_at: entry.entered_at,
            });
        }
        info!(seeded = seeded.len(), "registry seeded");
        seeded
    }

    fn next_ticket_id(&mut self, date: Timestamp) -> TicketId {
        self.issued += 1;
        TicketId::compose(date, self.issued)
    }

    fn occupy(&mut self, slot: SlotIndex, ticket: TicketId, entered_at: Timestamp) {
        self.slots[slot.position()] = Slot {
            occupied: true,
            ticket: Some(ticket.clone()),
            entered_at: Some(entered_at),
        };
        self.index.insert(ticket.clone(), slot);
        self.record_ticket(ticket, slot, entered_at);
    }

    fn record_ticket(&mut self, ticket: TicketId, slot: SlotIndex, entered_at: Timestamp) {
        self.ledger_positions.insert(ticket.clone(), self.ledger.len());
        self.ledger.push(Ticket {
            id: ticket,
            slot,
            entered_at,
            exited_at: None,
            fee: None,
            active: true,
        });
    }

    fn close_ticket(&mut self, ticket: &TicketId, exited_at: Timestamp, fee: Option<Money>) {
        let Some(position) = self.ledger_positions.get(ticket).copied() else {
            return;
        };
        let entry = &mut self.ledger[position];
        if !entry.active {
            return;
        }
        entry.active = false;
        entry.exited_at = Some(exited_at);
        entry.fee = fee;
    }

    fn is_closed_in_ledger(&self, ticket: &TicketId) -> bool {
        self.ticket(ticket).is_some_and(|entry| !entry.active)
    }

    fn holds(&self, slot: SlotIndex, ticket: &TicketId) -> bool {
        self.slots
            .get(slot.position())
            .is_some_and(|entry| entry.holds(ticket))
    }

    fn is_held(&self, ticket: &TicketId) -> bool {
        self.slots.iter().any(|entry| entry.holds(ticket))
    }

    fn locate(&self, ticket: &TicketId) -> Option<SlotIndex> {
        if let Some(slot) = self.index.get(ticket) {
            if self.holds(*slot, ticket) {
                return Some(*slot);
            }
        }
        let found = self
            .slots
            .iter()
            .position(|entry| entry.holds(ticket))
            .map(SlotIndex::from_position);
        if let Some(slot) = found {
            warn!(%slot, %ticket, "ticket index out of date; found by slot scan");
        }
        found
    }

    fn record(&self, slot: SlotIndex) -> Option<SlotRecord> {
        let entry = self.slots.get(slot.position())?;
        if !entry.occupied {
            return None;
        }
        Some(SlotRecord {
            slot,
            ticket: entry.ticket.clone()?,
            entered_at: entry.entered_at.unwrap_or_else(|| self.clock.now()),
        })
    }
}

#[cfg(test)]
mod tests;
