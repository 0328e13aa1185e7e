// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! The interpreter: the main dispatch loop over the fourteen instructions.

#[cfg(test)]
mod interp_test;

use crate::bytecode::{decode, mode, DecodeError, Instr, UNLINKED_CALL};
use crate::cell::{Cell, Tag};
use crate::machine::frame::FrameError;
use crate::machine::Machine;
use crate::types::Addr;
use crate::unify::{dereference, unify, UnifyError};
use core::fmt;

/// Failure outcomes of [`run`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RuntimeError {
    /// The byte at `ip` names no known instruction.
    UnknownOpcode(u8),
    /// `ip` ran past the end of the code buffer mid-instruction.
    Truncated,
    /// A `GET_STRUC`/`GET_VAL`/`UNIFY_VAL` failed to unify.
    Unify(UnifyError),
    /// `CALL` targeted the unlinked-predicate sentinel.
    UnlinkedCall,
    /// `ALLOCATE`/`DEALLOCATE` could not be carried out.
    Frame(FrameError),
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownOpcode(b) => write!(f, "unknown opcode {b:#04x}"),
            Self::Truncated => write!(f, "instruction truncated by end of buffer"),
            Self::Unify(e) => write!(f, "{e}"),
            Self::UnlinkedCall => write!(f, "call to unlinked predicate"),
            Self::Frame(FrameError::StackOverflow) => write!(f, "environment stack overflow"),
            Self::Frame(FrameError::NoFrame) => write!(f, "deallocate with no frame"),
        }
    }
}

impl From<UnifyError> for RuntimeError {
    fn from(e: UnifyError) -> Self {
        Self::Unify(e)
    }
}

impl From<FrameError> for RuntimeError {
    fn from(e: FrameError) -> Self {
        Self::Frame(e)
    }
}

impl From<DecodeError> for RuntimeError {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::UnknownOpcode(b) => Self::UnknownOpcode(b),
            DecodeError::OutOfBounds | DecodeError::Truncated => Self::Truncated,
        }
    }
}

/// Resolve a mode byte + slot index to an absolute address.
///
/// `REG_ADDR` slots are absolute register addresses; `STACK_ADDR` slots are
/// permanent-variable indices within the current environment frame.
pub(crate) fn resolve(machine: &Machine, addr_mode: u8, slot: u8) -> Addr {
    if addr_mode == mode::STACK_ADDR {
        machine.stack_slot(u32::from(slot))
    } else {
        Addr::new(u32::from(slot))
    }
}

/// Run the code in `buf` starting at byte offset `offset` until `PROCEED`
/// runs off the end of the buffer, or a failure condition is hit.
///
/// # Errors
///
/// Returns the specific [`RuntimeError`] for the failure; all error kinds
/// other than a malformed buffer are equally reported to the caller as a
/// boolean `false` (see `execute`).
pub fn run(machine: &mut Machine, buf: &[u8], offset: usize) -> Result<(), RuntimeError> {
    machine.ip = offset;
    // The top-level call has no caller to return to; seed `cp` with the
    // end-of-buffer sentinel so a bare `PROCEED` (or a `DEALLOCATE` that
    // restores it from an `ALLOCATE` frame) resumes past `buf.len()` and
    // the dispatch loop below terminates instead of re-entering offset 0.
    machine.cp = buf.len();
    while machine.ip < buf.len() {
        let instr = decode(buf, machine.ip)?;
        let len = instr.len();
        step(machine, instr)?;
        if advances(instr) {
            machine.ip += len;
        }
    }
    Ok(())
}

/// Whether `ip` should be advanced by the instruction's length after
/// `step` runs. Control-transfer instructions set `ip` themselves.
const fn advances(instr: Instr) -> bool {
    !matches!(instr, Instr::Call { .. } | Instr::Proceed | Instr::Deallocate)
}

fn step(machine: &mut Machine, instr: Instr) -> Result<(), RuntimeError> {
    match instr {
        Instr::PutStruc { mode: m, xi, functor_id, arity } => {
            let h = machine.hp;
            machine.set(h, Cell::structure(h.add(1)));
            machine.set(h.add(1), Cell::functor(functor_id, arity));
            machine.set(resolve(machine, m, xi), Cell::structure(h.add(1)));
            machine.hp = h.add(2);
        }
        Instr::SetVar { mode: m, xi } => {
            let h = machine.hp;
            machine.set(h, Cell::free_var(h));
            machine.set(resolve(machine, m, xi), Cell::free_var(h));
            machine.hp = h.add(1);
        }
        Instr::SetVal { mode: m, xi } => {
            let h = machine.hp;
            let val = machine.get(resolve(machine, m, xi)).unwrap_or(Cell::zeroed());
            machine.set(h, val);
            machine.hp = h.add(1);
        }
        Instr::GetStruc { mode: m, xi, functor_id, arity } => {
            let addr = resolve(machine, m, xi);
            let d = dereference(machine, addr);
            let tag = machine.get(d).and_then(Cell::tag);
            if tag == Some(Tag::Ref) {
                let h = machine.hp;
                machine.set(h, Cell::structure(h.add(1)));
                machine.set(h.add(1), Cell::functor(functor_id, arity));
                machine.set(d, Cell::reference(h));
                machine.hp = h.add(2);
                machine.write_mode = true;
            } else {
                let str_payload = machine.get(d).map(Cell::payload).unwrap_or(Addr::zero());
                let word = machine.get(str_payload).unwrap_or(Cell::zeroed());
                if word.raw() == Cell::functor(functor_id, arity).raw() {
                    machine.sp = str_payload.add(1);
                    machine.write_mode = false;
                } else {
                    return Err(RuntimeError::Unify(UnifyError::Mismatch));
                }
            }
        }
        Instr::UnifyVar { mode: m, xi } => {
            if machine.write_mode {
                let h = machine.hp;
                machine.set(h, Cell::free_var(h));
                machine.set(resolve(machine, m, xi), Cell::free_var(h));
                machine.hp = h.add(1);
            } else {
                let val = machine.get(machine.sp).unwrap_or(Cell::zeroed());
                machine.set(resolve(machine, m, xi), val);
            }
            machine.sp = machine.sp.add(1);
        }
        Instr::UnifyVal { mode: m, xi } => {
            if machine.write_mode {
                let h = machine.hp;
                let val = machine.get(resolve(machine, m, xi)).unwrap_or(Cell::zeroed());
                machine.set(h, val);
                machine.hp = h.add(1);
            } else {
                unify(machine, resolve(machine, m, xi), machine.sp)?;
            }
            machine.sp = machine.sp.add(1);
        }
        Instr::PutVar { mode: m, xi, ai } => {
            let h = machine.hp;
            machine.set(h, Cell::free_var(h));
            machine.set(resolve(machine, m, xi), Cell::free_var(h));
            machine.set(Addr::new(u32::from(ai)), Cell::free_var(h));
            machine.hp = h.add(1);
        }
        Instr::PutVal { mode: m, xi, ai } => {
            let val = machine.get(resolve(machine, m, xi)).unwrap_or(Cell::zeroed());
            machine.set(Addr::new(u32::from(ai)), val);
        }
        Instr::GetVar { mode: m, xi, ai } => {
            let val = machine.get(Addr::new(u32::from(ai))).unwrap_or(Cell::zeroed());
            machine.set(resolve(machine, m, xi), val);
        }
        Instr::GetVal { mode: m, xi, ai } => {
            unify(machine, resolve(machine, m, xi), Addr::new(u32::from(ai)))?;
        }
        Instr::Call { target } => {
            if target == UNLINKED_CALL {
                return Err(RuntimeError::UnlinkedCall);
            }
            machine.cp = machine.ip + instr.len();
            machine.ip = target as usize;
        }
        Instr::Proceed => {
            machine.ip = machine.cp;
        }
        Instr::Allocate { n } => {
            machine.allocate(n)?;
        }
        Instr::Deallocate => {
            machine.deallocate()?;
            machine.ip = machine.cp;
        }
    }
    Ok(())
}
