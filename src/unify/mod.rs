// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Dereference, bind and structural unification, driven by the PDL.


use crate::cell::{Cell, Tag};
use crate::machine::Machine;
use crate::types::Addr;
use core::fmt;

/// Failure outcomes of [`unify`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnifyError {
    /// The two terms do not unify: functor/arity mismatch, or a structural
    /// clash between two non-REF cells.
    Mismatch,
    /// The PDL grew past the environment stack's top.
    PdlOverflow,
}

impl fmt::Display for UnifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mismatch => write!(f, "unification mismatch"),
            Self::PdlOverflow => write!(f, "PDL overflow"),
        }
    }
}

/// Follow a `REF` chain starting at `a` until reaching a non-`REF` cell or a
/// free variable (a `REF` cell pointing at itself).
///
/// Publishes the terminal cell's tag and payload into `machine.last_deref_*`
/// and returns the terminal address.
pub fn dereference(machine: &mut Machine, a: Addr) -> Addr {
    let mut addr = a;
    loop {
        let Some(cell) = machine.get(addr) else {
            machine.last_deref_tag = 0;
            machine.last_deref_val = 0;
            return addr;
        };
        match cell.tag() {
            Some(Tag::Ref) => {
                let target = cell.payload();
                if target == addr {
                    machine.last_deref_tag = Tag::Ref as u8;
                    machine.last_deref_val = target.as_u32();
                    return addr;
                }
                addr = target;
            }
            Some(Tag::Str) => {
                machine.last_deref_tag = Tag::Str as u8;
                machine.last_deref_val = cell.payload().as_u32();
                return addr;
            }
            None => {
                machine.last_deref_tag = 0;
                machine.last_deref_val = cell.raw();
                return addr;
            }
        }
    }
}

/// Bind the two (already-dereferenced) endpoints `d1`, `d2`.
///
/// Requires at least one endpoint to hold a `REF` cell. If both do, `d1` is
/// made to point at `d2` — the tie is broken by argument order, not by
/// address age.
fn bind(machine: &mut Machine, d1: Addr, d2: Addr) {
    let t1 = machine.get(d1).and_then(Cell::tag);
    if t1 == Some(Tag::Ref) {
        machine.set(d1, Cell::reference(d2));
    } else {
        machine.set(d2, Cell::reference(d1));
    }
}

fn pdl_push(machine: &mut Machine, addr: Addr) -> Result<(), UnifyError> {
    let next = machine.up.sub(1);
    if next.diff(machine.config().stack_end()) < 0 {
        return Err(UnifyError::PdlOverflow);
    }
    machine.set(next, Cell::from_raw(addr.as_u32()));
    machine.up = next;
    Ok(())
}

fn pdl_pop(machine: &mut Machine) -> Option<Addr> {
    if machine.up.diff(machine.config().top()) >= 0 {
        return None;
    }
    let cell = machine.get(machine.up)?;
    machine.up = machine.up.add(1);
    Some(Addr::new(cell.raw()))
}

/// Structurally unify `a1` and `a2`, pushing work onto the machine's PDL.
///
/// # Errors
///
/// Returns [`UnifyError::Mismatch`] on a functor/arity clash, or
/// [`UnifyError::PdlOverflow`] if the PDL grows into the environment stack.
pub fn unify(machine: &mut Machine, a1: Addr, a2: Addr) -> Result<(), UnifyError> {
    pdl_push(machine, a1)?;
    pdl_push(machine, a2)?;

    while let Some(b2) = pdl_pop(machine) {
        let b1 = pdl_pop(machine).expect("PDL entries are pushed in pairs");

        let d1 = dereference(machine, b1);
        let d2 = dereference(machine, b2);
        if d1 == d2 {
            continue;
        }

        let t1 = machine.get(d1).and_then(Cell::tag);
        let t2 = machine.get(d2).and_then(Cell::tag);

        if t1 == Some(Tag::Ref) || t2 == Some(Tag::Ref) {
            bind(machine, d1, d2);
            continue;
        }

        let f1 = machine
            .get(d1)
            .filter(|c| c.tag() == Some(Tag::Str))
            .ok_or(UnifyError::Mismatch)?
            .payload();
        let f2 = machine
            .get(d2)
            .filter(|c| c.tag() == Some(Tag::Str))
            .ok_or(UnifyError::Mismatch)?
            .payload();

        let word1 = machine.get(f1).ok_or(UnifyError::Mismatch)?;
        let word2 = machine.get(f2).ok_or(UnifyError::Mismatch)?;
        if word1.raw() != word2.raw() {
            return Err(UnifyError::Mismatch);
        }

        let arity = word1.functor_arity();
        for i in 1..=u32::from(arity) {
            pdl_push(machine, f1.add(i))?;
            pdl_push(machine, f2.add(i))?;
        }
    }

    Ok(())
}
