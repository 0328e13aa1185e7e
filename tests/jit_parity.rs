// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Scenario 7: the interpreter and the Cranelift-lowered path must agree
//! on the boolean result for the same byte code.

#![cfg(feature = "jit")]

use wam_core::bytecode::{mode, op};
use wam_core::{MachineConfig, WamMachine};

fn proceed_only() -> Vec<u8> {
    vec![op::PROCEED]
}

fn unlinked_call() -> Vec<u8> {
    let mut buf = vec![op::CALL];
    buf.extend_from_slice(&(-1i32).to_le_bytes());
    buf
}

fn unknown_opcode() -> Vec<u8> {
    vec![0xFF]
}

fn put_struc_a0() -> Vec<u8> {
    let mut buf = vec![op::PUT_STRUC, mode::REG_ADDR, 0];
    buf.extend_from_slice(&(1u32 << 8).to_le_bytes());
    buf
}

fn run_both(buf: &[u8]) -> (bool, bool) {
    let mut interpreted = WamMachine::new(MachineConfig::default());
    interpreted.code_added(buf, 0, buf.len()).unwrap();
    let ok_interp = interpreted.execute(buf, 0);

    let mut jit = WamMachine::new(MachineConfig::default().with_opt_level(0));
    jit.code_added(buf, 0, buf.len()).unwrap();
    let ok_jit = jit.execute(buf, 0);

    (ok_interp, ok_jit)
}

#[test]
fn proceed_only_agrees() {
    let (a, b) = run_both(&proceed_only());
    assert_eq!(a, b);
}

#[test]
fn unlinked_call_agrees() {
    let (a, b) = run_both(&unlinked_call());
    assert_eq!(a, b);
    assert!(!a);
}

#[test]
fn unknown_opcode_agrees() {
    let (a, b) = run_both(&unknown_opcode());
    assert_eq!(a, b);
    assert!(!a);
}

#[test]
fn put_struc_agrees() {
    let (a, b) = run_both(&put_struc_a0());
    assert_eq!(a, b);
    assert!(a);
}

#[test]
fn a_deferred_caller_links_once_its_callee_is_ingested() {
    // Caller at offset 0 (`CALL 5`) targets a callee placed immediately
    // after it at offset 5 (`PROCEED`), which doesn't exist yet when the
    // caller is ingested first.
    let mut buf = vec![op::CALL];
    buf.extend_from_slice(&5i32.to_le_bytes());
    buf.push(op::PROCEED);

    let mut vm = WamMachine::new(MachineConfig::default().with_opt_level(0));
    vm.code_added(&buf, 0, 5).expect("a deferred fragment is not an ingest error");
    vm.code_added(&buf, 5, 1).expect("the callee fragment always lowers on its own");

    assert!(vm.execute(&buf, 0), "the caller should have been relinked and executed natively");
}
