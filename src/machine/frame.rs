// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Environment-stack discipline: `ALLOCATE` / `DEALLOCATE` and frame layout.
//!
//! An environment frame at `ep` is laid out as: slot 0 = saved previous
//! `ep`; slot 1 = saved continuation `cp`; slot 2 = frame size `N`; slots
//! `3..3+N` = the `N` permanent variables `Y0..YN-1`. Frame header slots
//! hold plain integers, not tagged `REF`/`STR` cells, so they're written and
//! read through [`Cell::from_raw`] / [`Cell::raw`].

use crate::cell::Cell;
use crate::config::FRAME_HEADER_SIZE;
use crate::types::Addr;

use super::Machine;

/// A decoded environment-frame header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameHeader {
    /// Saved previous `ep`.
    pub prev_ep: Addr,
    /// Saved continuation pointer (a code offset).
    pub cp: usize,
    /// Frame size: number of permanent variables.
    pub n: u32,
}

/// Outcome of [`Machine::allocate`] / [`Machine::deallocate`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// The new frame would extend past the environment stack's top into
    /// the PDL region.
    StackOverflow,
    /// `DEALLOCATE` was issued with no environment frame on the stack
    /// (`ep` at the base of the stack region).
    NoFrame,
}

impl Machine {
    /// `ALLOCATE N`: push a new environment frame of `n` permanent
    /// variables, saving the current `ep` and `cp` in its header.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::StackOverflow`] if the new frame would collide
    /// with the PDL.
    pub fn allocate(&mut self, n: u32) -> Result<(), FrameError> {
        let new_esp = self.esp.add(FRAME_HEADER_SIZE + n);
        if new_esp.diff(self.up) > 0 {
            return Err(FrameError::StackOverflow);
        }

        let header_base = self.esp;
        self.set(header_base, Cell::from_raw(self.ep.as_u32()));
        self.set(header_base.add(1), Cell::from_raw(self.cp as u32));
        self.set(header_base.add(2), Cell::from_raw(n));

        self.ep = header_base;
        self.esp = new_esp;
        Ok(())
    }

    /// `DEALLOCATE`: pop the current environment frame, restoring `ep` and
    /// `cp` from its header.
    ///
    /// `cp` is read from the header *before* `ep` is overwritten — reusing
    /// the already-restored `ep` to read `cp` would silently resume into
    /// the wrong continuation (see SPEC_FULL.md §9).
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::NoFrame`] if there is no frame to pop.
    pub fn deallocate(&mut self) -> Result<(), FrameError> {
        if self.ep == self.config().stack_base() {
            return Err(FrameError::NoFrame);
        }

        let saved_cp = self.get(self.ep.add(1)).map(Cell::raw).unwrap_or(0) as usize;
        let saved_ep = self.get(self.ep).map(Cell::raw).unwrap_or(0);

        self.esp = self.ep;
        self.ep = Addr::new(saved_ep);
        self.cp = saved_cp;
        Ok(())
    }

    /// Read the header of the frame currently at `ep`.
    #[must_use]
    pub fn current_frame(&self) -> Option<FrameHeader> {
        if self.ep == self.config().stack_base() {
            return None;
        }
        let prev_ep = Addr::new(self.get(self.ep)?.raw());
        let cp = self.get(self.ep.add(1))?.raw() as usize;
        let n = self.get(self.ep.add(2))?.raw();
        Some(FrameHeader { prev_ep, cp, n })
    }
}
