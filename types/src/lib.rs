//! Common types used throughout parkgate.

pub mod parking;
pub mod protocol;

pub use parking::{
    Allocation, Inconsistency, Money, Receipt, RegistryError, RegistrySummary, RepairReport,
    SlotIndex, SlotRecord, Ticket, TicketId, Timestamp, TICKET_PREFIX,
};
pub use protocol::{Ack, Command, ParseError, CODE_ENTRY, CODE_EXIT};
