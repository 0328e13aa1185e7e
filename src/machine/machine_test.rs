// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Tests for [`Machine`] lifecycle, addressing and environment frames.

use super::Machine;
use crate::cell::Cell;
use crate::config::MachineConfig;
use crate::types::Addr;
use proptest::prelude::*;

fn small_machine() -> Machine {
    Machine::new(MachineConfig::new(4, 16, 16, 8))
}

#[test]
fn reset_zeroes_the_data_area_and_resets_cursors() {
    let mut m = small_machine();
    m.set(Addr::new(5), Cell::reference(Addr::new(5)));
    m.hp = Addr::new(9);
    m.ip = 42;

    m.reset();

    assert_eq!(m.get(Addr::new(5)), Some(Cell::zeroed()));
    assert_eq!(m.hp, m.config().heap_base());
    assert_eq!(m.sp, m.config().heap_base());
    assert_eq!(m.ep, m.config().stack_base());
    assert_eq!(m.esp, m.config().stack_base());
    assert_eq!(m.up, m.config().top());
    assert_eq!(m.cp, 0);
    assert_eq!(m.ip, 0);
    assert!(!m.write_mode);
}

#[test]
fn get_and_set_are_bounds_checked() {
    let mut m = small_machine();
    let top = m.config().top();
    assert_eq!(m.get(top), None);
    assert!(!m.set(top, Cell::zeroed()));

    let last = Addr::new(top.as_u32() - 1);
    assert!(m.set(last, Cell::reference(last)));
    assert_eq!(m.get(last), Some(Cell::reference(last)));
}

#[test]
fn reg_rejects_out_of_range_index() {
    let m = small_machine();
    assert_eq!(m.reg(0), Some(Cell::zeroed()));
    assert_eq!(m.reg(3), Some(Cell::zeroed()));
    assert_eq!(m.reg(4), None);
}

#[test]
fn stack_slot_addresses_permanent_variables_after_the_header() {
    let m = small_machine();
    let base = m.ep;
    assert_eq!(m.stack_slot(0), base.add(3));
    assert_eq!(m.stack_slot(2), base.add(5));
}

#[test]
fn free_space_shrinks_as_heap_and_stack_are_used() {
    let mut m = small_machine();
    let before = m.free_space();
    m.hp = m.hp.add(1);
    m.esp = m.esp.add(1);
    assert!(m.free_space() < before);
}

#[test]
fn allocate_then_deallocate_restores_ep_cp_and_esp() {
    let mut m = small_machine();
    m.cp = 7;
    let ep_before = m.ep;
    let cp_before = m.cp;
    let esp_before = m.esp;

    m.allocate(2).expect("allocate should succeed");
    assert_ne!(m.ep, ep_before);
    assert_eq!(m.esp, esp_before.add(5));

    m.cp = 99;
    m.deallocate().expect("deallocate should succeed");

    assert_eq!(m.ep, ep_before);
    assert_eq!(m.esp, esp_before);
    assert_eq!(m.cp, cp_before);
}

#[test]
fn nested_allocate_chains_through_prev_ep() {
    let mut m = small_machine();
    m.cp = 1;
    m.allocate(1).unwrap();
    let outer_ep = m.ep;
    m.cp = 2;
    m.allocate(1).unwrap();

    let frame = m.current_frame().unwrap();
    assert_eq!(frame.prev_ep, outer_ep);
    assert_eq!(frame.cp, 2);
    assert_eq!(frame.n, 1);

    m.deallocate().unwrap();
    assert_eq!(m.ep, outer_ep);
    assert_eq!(m.cp, 1);
}

#[test]
fn deallocate_without_a_frame_is_an_error() {
    let mut m = small_machine();
    assert_eq!(m.deallocate(), Err(super::frame::FrameError::NoFrame));
}

#[test]
fn allocate_reports_stack_overflow_against_the_pdl() {
    let mut m = small_machine();
    assert!(m.allocate(1_000).is_err());
}

proptest! {
    /// For any frame size that fits, a single `ALLOCATE`/`DEALLOCATE` pair
    /// must restore `ep`, `esp` and `cp` exactly, whatever `cp` held before
    /// the matching `DEALLOCATE` overwrote it mid-call.
    #[test]
    fn allocate_deallocate_round_trips_for_any_frame_size(n in 0u32..15, cp in 0usize..100_000) {
        let mut m = small_machine();
        m.cp = cp;
        let ep_before = m.ep;
        let esp_before = m.esp;

        m.allocate(n).expect("a frame this small always fits");
        m.cp = cp.wrapping_add(1);
        m.deallocate().expect("deallocate always succeeds after a matching allocate");

        prop_assert_eq!(m.ep, ep_before);
        prop_assert_eq!(m.esp, esp_before);
        prop_assert_eq!(m.cp, cp);
    }
}
