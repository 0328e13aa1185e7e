// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Externally-linked primitives every Cranelift-lowered fragment calls
//! into. Each emitted fragment gets real per-instruction IR (see
//! `super::ingest`), but the IR never pokes at `Machine`'s private `data`
//! array directly — every heap/register read or write, every dereference,
//! unify, and frame operation goes through one of these `extern "C"`
//! functions, so the lowered code reuses exactly the logic the interpreter
//! is tested against rather than duplicating it as raw pointer arithmetic.

use crate::cell::Cell;
use crate::interp::resolve;
use crate::machine::frame::FrameError;
use crate::machine::Machine;
use crate::types::Addr;
use crate::unify::{dereference, unify, UnifyError};

/// `(symbol name, function pointer)` pairs to register with the
/// `JITBuilder` before any fragment is ingested.
pub(super) fn symbols() -> [(&'static str, *const u8); 14] {
    [
        ("wam_resolve", prim_resolve as *const u8),
        ("wam_get", prim_get as *const u8),
        ("wam_set", prim_set as *const u8),
        ("wam_dereference", prim_dereference as *const u8),
        ("wam_unify", prim_unify as *const u8),
        ("wam_allocate", prim_allocate as *const u8),
        ("wam_deallocate", prim_deallocate as *const u8),
        ("wam_hp", prim_hp as *const u8),
        ("wam_set_hp", prim_set_hp as *const u8),
        ("wam_sp", prim_sp as *const u8),
        ("wam_set_sp", prim_set_sp as *const u8),
        ("wam_write_mode", prim_write_mode as *const u8),
        ("wam_set_write_mode", prim_set_write_mode as *const u8),
        ("wam_set_cp", prim_set_cp as *const u8),
    ]
}

extern "C" fn prim_resolve(machine: *const Machine, mode: i64, slot: i64) -> i64 {
    let machine = unsafe { &*machine };
    i64::from(resolve(machine, mode as u8, slot as u8).as_u32())
}

extern "C" fn prim_get(machine: *const Machine, addr: i64) -> i64 {
    let machine = unsafe { &*machine };
    i64::from(machine.get(Addr::new(addr as u32)).map(Cell::raw).unwrap_or(0))
}

extern "C" fn prim_set(machine: *mut Machine, addr: i64, cell: i64) {
    let machine = unsafe { &mut *machine };
    machine.set(Addr::new(addr as u32), Cell::from_raw(cell as u32));
}

extern "C" fn prim_dereference(machine: *mut Machine, addr: i64) -> i64 {
    let machine = unsafe { &mut *machine };
    i64::from(dereference(machine, Addr::new(addr as u32)).as_u32())
}

/// Status codes: `0` = ok, `1` = [`UnifyError::Mismatch`], `2` =
/// [`UnifyError::PdlOverflow`].
extern "C" fn prim_unify(machine: *mut Machine, a1: i64, a2: i64) -> i64 {
    let machine = unsafe { &mut *machine };
    match unify(machine, Addr::new(a1 as u32), Addr::new(a2 as u32)) {
        Ok(()) => 0,
        Err(UnifyError::Mismatch) => 1,
        Err(UnifyError::PdlOverflow) => 2,
    }
}

/// Status codes: `0` = ok, nonzero = [`FrameError`].
extern "C" fn prim_allocate(machine: *mut Machine, n: i64) -> i64 {
    let machine = unsafe { &mut *machine };
    match machine.allocate(n as u32) {
        Ok(()) => 0,
        Err(FrameError::StackOverflow) => 1,
        Err(FrameError::NoFrame) => 2,
    }
}

extern "C" fn prim_deallocate(machine: *mut Machine) -> i64 {
    let machine = unsafe { &mut *machine };
    match machine.deallocate() {
        Ok(()) => 0,
        Err(FrameError::NoFrame) => 1,
        Err(FrameError::StackOverflow) => 2,
    }
}

extern "C" fn prim_hp(machine: *const Machine) -> i64 {
    i64::from(unsafe { &*machine }.hp.as_u32())
}

extern "C" fn prim_set_hp(machine: *mut Machine, value: i64) {
    unsafe { &mut *machine }.hp = Addr::new(value as u32);
}

extern "C" fn prim_sp(machine: *const Machine) -> i64 {
    i64::from(unsafe { &*machine }.sp.as_u32())
}

extern "C" fn prim_set_sp(machine: *mut Machine, value: i64) {
    unsafe { &mut *machine }.sp = Addr::new(value as u32);
}

extern "C" fn prim_write_mode(machine: *const Machine) -> i64 {
    i64::from(unsafe { &*machine }.write_mode)
}

extern "C" fn prim_set_write_mode(machine: *mut Machine, value: i64) {
    unsafe { &mut *machine }.write_mode = value != 0;
}

extern "C" fn prim_set_cp(machine: *mut Machine, value: i64) {
    unsafe { &mut *machine }.cp = value as usize;
}
