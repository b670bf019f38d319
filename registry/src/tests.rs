use crate::mocks::{create_registry, create_registry_with};
use crate::{Clock, RegistryConfig, SeedEntry, SlotRegistry};
use chrono::TimeDelta;
use parkgate_types::{Inconsistency, Money, RegistryError, SlotIndex, TicketId};
use proptest::prelude::*;
use std::collections::HashSet;

fn slot(number: u16) -> SlotIndex {
    SlotIndex::new(number).unwrap()
}

#[test]
fn fills_slots_in_order_then_reports_full() {
    let (mut registry, _) = create_registry();
    let slots: Vec<u16> = (0..6)
        .map(|_| registry.allocate().unwrap().slot.get())
        .collect();
    assert_eq!(slots, vec![1, 2, 3, 4, 5, 6]);

    let issued = registry.summary().tickets_issued;
    assert_eq!(registry.allocate(), Err(RegistryError::Full));
    assert_eq!(registry.summary().tickets_issued, issued);
    assert_eq!(registry.occupied_count(), 6);
}

#[test]
fn allocation_reuses_lowest_free_slot() {
    let (mut registry, _) = create_registry();
    let first = registry.allocate().unwrap();
    registry.allocate().unwrap();
    registry.release(&first.ticket).unwrap();
    assert_eq!(registry.allocate().unwrap().slot, slot(1));
}

#[test]
fn immediate_release_is_free() {
    let (mut registry, _) = create_registry();
    let allocation = registry.allocate().unwrap();
    let receipt = registry.release(&allocation.ticket).unwrap();
    assert_eq!(receipt.fee, Money::ZERO);
    assert_eq!(receipt.slot, allocation.slot);
    assert_eq!(registry.occupied_count(), 0);
}

#[test]
fn release_bills_started_hours() {
    let (mut registry, clock) = create_registry();
    let allocation = registry.allocate().unwrap();
    clock.advance_minutes(125);
    let receipt = registry.release(&allocation.ticket).unwrap();
    assert_eq!(receipt.fee, Money::from_cents(6000));
    assert_eq!(receipt.exited_at - receipt.entered_at, TimeDelta::minutes(125));

    let ticket = registry.ticket(&allocation.ticket).unwrap();
    assert!(!ticket.active);
    assert_eq!(ticket.fee, Some(Money::from_cents(6000)));
    assert_eq!(ticket.exited_at, Some(receipt.exited_at));
}

#[test]
fn releasing_unknown_ticket_changes_nothing() {
    let (mut registry, _) = create_registry();
    registry.allocate().unwrap();
    registry.allocate().unwrap();
    let before_active = registry.list_active();
    let before_tickets = registry.tickets().to_vec();
    let before_index = registry.index_entries();

    let missing = TicketId::from("TCK-000000000099");
    assert_eq!(
        registry.release(&missing),
        Err(RegistryError::TicketNotFound(missing.clone()))
    );
    assert_eq!(
        registry.release(&missing),
        Err(RegistryError::TicketNotFound(missing))
    );

    assert_eq!(registry.list_active(), before_active);
    assert_eq!(registry.tickets(), before_tickets.as_slice());
    assert_eq!(registry.index_entries(), before_index);
}

#[test]
fn released_ticket_cannot_be_released_twice() {
    let (mut registry, _) = create_registry();
    let allocation = registry.allocate().unwrap();
    registry.release(&allocation.ticket).unwrap();
    assert!(matches!(
        registry.release(&allocation.ticket),
        Err(RegistryError::TicketNotFound(_))
    ));
}

#[test]
fn release_refuses_ticket_already_closed() {
    let (mut registry, clock) = create_registry();
    let allocation = registry.allocate().unwrap();
    registry.release(&allocation.ticket).unwrap();
    let closed = registry.ticket(&allocation.ticket).unwrap().clone();

    clock.advance_minutes(300);
    registry.corrupt_slot(2, Some(allocation.ticket.clone()));
    assert_eq!(
        registry.release(&allocation.ticket),
        Err(RegistryError::TicketNotFound(allocation.ticket.clone()))
    );
    assert_eq!(registry.ticket(&allocation.ticket), Some(&closed));
    assert_eq!(registry.occupied_count(), 1);
    assert_eq!(registry.tickets().len(), 1);
}

#[test]
fn release_falls_back_to_slot_scan() {
    let (mut registry, clock) = create_registry();
    let allocation = registry.allocate().unwrap();
    registry.drop_index_entry(&allocation.ticket);
    clock.advance_minutes(16);

    let receipt = registry.release(&allocation.ticket).unwrap();
    assert_eq!(receipt.slot, slot(1));
    assert_eq!(receipt.fee, Money::from_cents(2000));
    assert!(registry.audit().is_empty());
}

#[test]
fn release_ignores_index_entry_pointing_at_wrong_slot() {
    let (mut registry, _) = create_registry();
    let first = registry.allocate().unwrap();
    registry.allocate().unwrap();
    registry.corrupt_index(first.ticket.clone(), 2);

    let receipt = registry.release(&first.ticket).unwrap();
    assert_eq!(receipt.slot, slot(1));
    assert_eq!(registry.list_active().len(), 1);
    assert_eq!(registry.list_active()[0].slot, slot(2));
}

#[test]
fn ticket_ids_are_never_reused() {
    let (mut registry, clock) = create_registry();
    let mut seen = HashSet::new();
    for round in 0..50 {
        let allocation = registry.allocate().unwrap();
        assert!(seen.insert(allocation.ticket.clone()), "round {round}");
        clock.advance(TimeDelta::hours(7));
        registry.release(&allocation.ticket).unwrap();
    }
    assert_eq!(registry.tickets().len(), 50);
}

#[test]
fn ticket_id_embeds_entry_date() {
    let (mut registry, _) = create_registry();
    let allocation = registry.allocate().unwrap();
    assert_eq!(allocation.ticket.as_str(), "TCK-271120250001");
}

#[test]
fn consult_is_read_only() {
    let (mut registry, _) = create_registry();
    registry.allocate().unwrap();
    let second = registry.allocate().unwrap();

    let record = registry.consult(&second.ticket).unwrap();
    assert_eq!(record.slot, slot(2));
    assert_eq!(record.entered_at, second.entered_at);
    assert_eq!(registry.occupied_count(), 2);
    assert!(registry.ticket(&second.ticket).unwrap().active);

    let unknown = TicketId::from("nope");
    assert_eq!(
        registry.consult(&unknown),
        Err(RegistryError::TicketNotFound(unknown))
    );
}

#[test]
fn history_keeps_closed_tickets() {
    let (mut registry, _) = create_registry();
    let allocation = registry.allocate().unwrap();
    registry.release(&allocation.ticket).unwrap();

    assert!(registry.consult(&allocation.ticket).is_err());
    let ticket = registry.ticket(&allocation.ticket).unwrap();
    assert_eq!(ticket.slot, slot(1));
    assert!(!ticket.active);
}

#[test]
fn force_release_frees_without_ticket() {
    let (mut registry, _) = create_registry();
    let allocation = registry.allocate().unwrap();

    assert!(registry.force_release(1));
    assert!(!registry.force_release(1));
    assert_eq!(registry.occupied_count(), 0);
    assert_eq!(registry.active_ticket_count(), 0);

    let ticket = registry.ticket(&allocation.ticket).unwrap();
    assert!(!ticket.active);
    assert_eq!(ticket.fee, None);
    assert!(registry.audit().is_empty());
}

#[test]
fn force_release_rejects_out_of_range() {
    let (mut registry, _) = create_registry();
    registry.allocate().unwrap();
    assert!(!registry.force_release(0));
    assert!(!registry.force_release(7));
    assert_eq!(registry.occupied_count(), 1);
}

#[test]
fn force_release_keeps_ticket_held_elsewhere_active() {
    let (mut registry, _) = create_registry();
    let first = registry.allocate().unwrap();
    registry.corrupt_slot(3, Some(first.ticket.clone()));

    assert!(registry.force_release(3));
    assert!(registry.ticket(&first.ticket).unwrap().active);
    assert_eq!(registry.ticket(&first.ticket).unwrap().exited_at, None);
    assert_eq!(registry.index_entries(), vec![(first.ticket.clone(), slot(1))]);
    assert_eq!(registry.consult(&first.ticket).unwrap().slot, slot(1));
    assert!(registry.audit().is_empty());
}

#[test]
fn force_release_drops_index_entry_pointing_at_freed_duplicate() {
    let (mut registry, _) = create_registry();
    let first = registry.allocate().unwrap();
    registry.corrupt_slot(3, Some(first.ticket.clone()));
    registry.corrupt_index(first.ticket.clone(), 3);

    assert!(registry.force_release(3));
    assert!(registry.ticket(&first.ticket).unwrap().active);
    assert!(registry.index_entries().is_empty());
    assert_eq!(
        registry.audit(),
        vec![Inconsistency::MissingIndexEntry {
            ticket: first.ticket.clone(),
            slot: slot(1),
        }]
    );
    // Still reachable through the slot scan.
    assert_eq!(registry.release(&first.ticket).unwrap().slot, slot(1));
}

#[test]
fn audit_reports_duplicates_and_stale_entries() {
    let (mut registry, _) = create_registry();
    let first = registry.allocate().unwrap();
    registry.corrupt_slot(4, Some(first.ticket.clone()));
    registry.corrupt_index(TicketId::from("TCK-GHOST"), 3);
    registry.corrupt_slot(6, None);

    let findings = registry.audit();
    assert!(findings.contains(&Inconsistency::DuplicateTicket {
        ticket: first.ticket.clone(),
        slots: vec![slot(1), slot(4)],
    }));
    assert!(findings.contains(&Inconsistency::StaleIndexEntry {
        ticket: TicketId::from("TCK-GHOST"),
        slot: slot(3),
    }));
    assert!(findings.contains(&Inconsistency::OccupiedWithoutTicket { slot: slot(6) }));
    assert_eq!(findings.len(), 3);
}

#[test]
fn audit_reports_missing_index_entry() {
    let (mut registry, _) = create_registry();
    let allocation = registry.allocate().unwrap();
    registry.drop_index_entry(&allocation.ticket);
    assert_eq!(
        registry.audit(),
        vec![Inconsistency::MissingIndexEntry {
            ticket: allocation.ticket,
            slot: slot(1),
        }]
    );
}

#[test]
fn repair_frees_higher_duplicate() {
    let (mut registry, _) = create_registry();
    let first = registry.allocate().unwrap();
    let second = registry.allocate().unwrap();
    registry.corrupt_slot(5, Some(first.ticket.clone()));
    registry.corrupt_slot(3, Some(second.ticket.clone()));
    registry.corrupt_index(second.ticket.clone(), 3);

    let report = registry.repair();
    assert_eq!(report.rebuilt, 2);
    assert_eq!(report.freed, vec![slot(3), slot(5)]);
    assert_eq!(report.stale_removed, 1);
    assert!(registry.audit().is_empty());
    assert_eq!(
        registry.index_entries(),
        vec![(first.ticket, slot(1)), (second.ticket, slot(2))]
    );
    assert_eq!(registry.occupied_count(), registry.active_ticket_count());
}

#[test]
fn repair_drops_orphaned_index_entries() {
    let (mut registry, _) = create_registry();
    let allocation = registry.allocate().unwrap();
    registry.corrupt_index(TicketId::from("TCK-251120250003"), 5);
    registry.corrupt_index(TicketId::from("TCK-261120250009"), 6);

    let report = registry.repair();
    assert_eq!(report.rebuilt, 1);
    assert_eq!(report.stale_removed, 2);
    assert!(report.freed.is_empty());
    assert_eq!(registry.index_entries(), vec![(allocation.ticket, slot(1))]);
    assert!(registry.audit().is_empty());
}

#[test]
fn repair_closes_tickets_no_slot_holds() {
    let (mut registry, _) = create_registry();
    let allocation = registry.allocate().unwrap();
    registry.corrupt_slot(1, Some(TicketId::from("TCK-OTHER")));

    let report = registry.repair();
    assert_eq!(report.orphans_closed, 1);
    assert!(!registry.ticket(&allocation.ticket).unwrap().active);
    assert!(registry.ticket(&TicketId::from("TCK-OTHER")).unwrap().active);
    assert_eq!(registry.occupied_count(), registry.active_ticket_count());
}

#[test]
fn repair_frees_slot_holding_closed_ticket() {
    let (mut registry, clock) = create_registry();
    let allocation = registry.allocate().unwrap();
    registry.release(&allocation.ticket).unwrap();
    let closed = registry.ticket(&allocation.ticket).unwrap().clone();
    clock.advance_minutes(45);
    registry.corrupt_slot(2, Some(allocation.ticket.clone()));

    assert!(registry.audit().contains(&Inconsistency::ClosedTicketHeld {
        ticket: allocation.ticket.clone(),
        slot: slot(2),
    }));

    let report = registry.repair();
    assert_eq!(report.freed, vec![slot(2)]);
    assert_eq!(report.rebuilt, 0);
    assert_eq!(registry.occupied_count(), 0);
    assert_eq!(registry.tickets().len(), 1);
    assert_eq!(registry.ticket(&allocation.ticket), Some(&closed));
    assert!(registry.audit().is_empty());
}

#[test]
fn repair_on_clean_registry_is_noop() {
    let (mut registry, _) = create_registry();
    registry.allocate().unwrap();
    registry.allocate().unwrap();
    let before = registry.index_entries();

    let report = registry.repair();
    assert!(report.is_clean());
    assert_eq!(report.rebuilt, 2);
    assert_eq!(registry.index_entries(), before);
}

#[test]
fn seed_generates_consistent_records() {
    let (mut registry, clock) = create_registry();
    let seeded = registry.seed(&SeedEntry::demo_set(clock.now()));
    assert_eq!(seeded.len(), 3);
    assert!(registry.audit().is_empty());
    assert_eq!(registry.summary().tickets_issued, 3);
    assert_eq!(registry.active_ticket_count(), 3);

    let next = registry.allocate().unwrap();
    assert_eq!(next.slot, slot(4));
    assert!(seeded.iter().all(|s| s.ticket != next.ticket));
}

#[test]
fn seed_skips_unavailable_slots() {
    let (mut registry, clock) = create_registry_with(RegistryConfig {
        capacity: 2,
        ..RegistryConfig::default()
    });
    registry.allocate().unwrap();
    let seeded = registry.seed(&SeedEntry::demo_set(clock.now()));
    assert_eq!(seeded.len(), 1);
    assert_eq!(seeded[0].slot, slot(2));
}

#[test]
fn zero_capacity_is_rejected() {
    let result = SlotRegistry::new(RegistryConfig {
        capacity: 0,
        ..RegistryConfig::default()
    });
    assert!(matches!(result, Err(RegistryError::InvalidCapacity(0))));
}

#[test]
fn summary_tracks_counts() {
    let (mut registry, _) = create_registry();
    registry.allocate().unwrap();
    let summary = registry.summary();
    assert_eq!(summary.capacity, 6);
    assert_eq!(summary.occupied, 1);
    assert_eq!(summary.free(), 5);
    assert_eq!(summary.index_entries, 1);
    assert_eq!(summary.hourly_rate, Money::from_cents(2000));
}

#[derive(Clone, Debug)]
enum Op {
    Allocate,
    Release(usize),
    ReleaseUnknown,
    ForceRelease(u16),
    Advance(i64),
    Repair,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Allocate),
        3 => (0usize..16).prop_map(Op::Release),
        1 => Just(Op::ReleaseUnknown),
        1 => (0u16..9).prop_map(Op::ForceRelease),
        2 => (0i64..200).prop_map(Op::Advance),
        1 => Just(Op::Repair),
    ]
}

proptest! {
    #[test]
    fn occupancy_matches_active_tickets(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let (mut registry, clock) = create_registry();
        let mut issued: Vec<TicketId> = Vec::new();

        for op in ops {
            match op {
                Op::Allocate => {
                    if let Ok(allocation) = registry.allocate() {
                        issued.push(allocation.ticket);
                    }
                }
                Op::Release(i) => {
                    if !issued.is_empty() {
                        let ticket = issued[i % issued.len()].clone();
                        let _ = registry.release(&ticket);
                    }
                }
                Op::ReleaseUnknown => {
                    let _ = registry.release(&TicketId::from("TCK-UNKNOWN"));
                }
                Op::ForceRelease(n) => {
                    registry.force_release(n);
                }
                Op::Advance(minutes) => clock.advance_minutes(minutes),
                Op::Repair => {
                    prop_assert!(registry.repair().is_clean());
                }
            }
            prop_assert_eq!(registry.occupied_count(), registry.active_ticket_count());
            prop_assert!(registry.audit().is_empty());
        }

        let distinct: HashSet<&TicketId> = issued.iter().collect();
        prop_assert_eq!(distinct.len(), issued.len());
    }
}
