// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! End-to-end tests for the interpreter dispatch loop.

use super::{run, RuntimeError};
use crate::asm::Assembler;
use crate::bytecode::UNLINKED_CALL;
use crate::cell::{Cell, Tag};
use crate::config::MachineConfig;
use crate::machine::Machine;
use crate::unify::UnifyError;

fn machine() -> Machine {
    Machine::new(MachineConfig::default())
}

#[test]
fn build_p_z_h_z_w_f_w_in_registers() {
    let mut m = machine();
    let mut a = Assembler::new();
    a.put_struc(3, 7, 2) // h/2 into X3
        .set_var(2) // X2 = Z
        .set_var(5) // X5 = W
        .put_struc(4, 9, 1) // f/1 into X4
        .set_val(5)
        .put_struc(1, 11, 3) // p/3 into X1
        .set_val(2)
        .set_val(3)
        .set_val(4);
    let buf = a.into_bytes();

    run(&mut m, &buf, 0).expect("building a ground structure always succeeds");

    let x1 = m.get(crate::types::Addr::new(1)).unwrap();
    assert_eq!(x1.tag(), Some(Tag::Str));
    let functor_addr = x1.payload();
    let functor_word = m.get(functor_addr).unwrap();
    assert_eq!(functor_word.functor_id(), 11);
    assert_eq!(functor_word.functor_arity(), 3);

    let d = crate::unify::dereference(&mut m, crate::types::Addr::new(1));
    assert_eq!(d, crate::types::Addr::new(1));
    assert_eq!(m.last_deref_tag, Tag::Str as u8);
}

#[test]
fn get_struc_against_a_free_variable_binds_it_and_enters_write_mode() {
    let mut m = machine();
    m.set(crate::types::Addr::new(0), Cell::free_var(crate::types::Addr::new(0)));

    let mut a = Assembler::new();
    a.get_struc(0, 42, 0);
    let buf = a.into_bytes();

    run(&mut m, &buf, 0).expect("matching against a free variable always succeeds");

    let x0 = m.get(crate::types::Addr::new(0)).unwrap();
    assert_eq!(x0.tag(), Some(Tag::Str));
    assert!(m.write_mode);
}

#[test]
fn get_struc_mismatch_fails() {
    let mut m = machine();
    let mut build = Assembler::new();
    build.put_struc(0, 1, 0); // a/0 into X0
    run(&mut m, &build.into_bytes(), 0).unwrap();

    let mut check = Assembler::new();
    check.get_struc(0, 2, 0); // expect b/0
    let result = run(&mut m, &check.into_bytes(), 0);
    assert_eq!(result, Err(RuntimeError::Unify(UnifyError::Mismatch)));
}

#[test]
fn call_and_return_restores_ep_and_esp() {
    let mut m = machine();
    let ep_before = m.ep;
    let esp_before = m.esp;

    let mut caller = Assembler::new();
    caller.allocate(0).call(42).deallocate();
    let mut buf = caller.into_bytes();
    while buf.len() < 42 {
        buf.push(0);
    }
    buf.push(crate::bytecode::op::PROCEED);

    run(&mut m, &buf, 0).expect("call/return round trip always succeeds");

    assert_eq!(m.ep, ep_before);
    assert_eq!(m.esp, esp_before);
}

#[test]
fn unlinked_call_fails() {
    let mut m = machine();
    let mut a = Assembler::new();
    a.call(UNLINKED_CALL);
    let result = run(&mut m, &a.into_bytes(), 0);
    assert_eq!(result, Err(RuntimeError::UnlinkedCall));
}

#[test]
fn unknown_opcode_fails() {
    let mut m = machine();
    let result = run(&mut m, &[0xFF], 0);
    assert_eq!(result, Err(RuntimeError::UnknownOpcode(0xFF)));
}
