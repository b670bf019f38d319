//! Demonstration occupancy loaded at startup.

use chrono::TimeDelta;
use parkgate_types::{SlotIndex, Timestamp};

/// One pre-occupied slot. The ticket id is generated on load, so seeded
/// records are always consistent with the index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SeedEntry {
    pub slot: SlotIndex,
    pub entered_at: Timestamp,
}

impl SeedEntry {
    pub fn new(slot: SlotIndex, entered_at: Timestamp) -> Self {
        Self { slot, entered_at }
    }

    /// Three parked vehicles with stays that land in different tariff bands:
    /// inside the grace window, a few hours, and over a day.
    pub fn demo_set(now: Timestamp) -> Vec<SeedEntry> {
        [
            (1, TimeDelta::minutes(10)),
            (2, TimeDelta::hours(3) + TimeDelta::minutes(22)),
            (3, TimeDelta::days(1) + TimeDelta::hours(14)),
        ]
        .into_iter()
        .filter_map(|(slot, ago)| SlotIndex::new(slot).map(|slot| SeedEntry::new(slot, now - ago)))
        .collect()
    }
}
