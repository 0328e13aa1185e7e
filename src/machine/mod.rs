// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! The machine's flat data area and execution state.
//!
//! A [`Machine`] owns the single address space holding registers, heap,
//! environment stack and PDL (see `src/config`), plus the scalar execution
//! state (`hp`, `sp`, `up`, `ep`, `esp`, `cp`, `ip`, `write_mode`) every
//! instruction reads and writes. There is no process-wide static anywhere in
//! this crate: every primitive operates on an explicit `&mut Machine`.

#[cfg(test)]
mod machine_test;
pub mod frame;

pub use frame::FrameHeader;

#[cfg(any(test, feature = "std"))]
use std::vec::Vec;

#[cfg(not(any(test, feature = "std")))]
use alloc::vec::Vec;

use crate::cell::Cell;
use crate::config::MachineConfig;
use crate::types::Addr;

/// Owns the data area and execution state of one WAM-style machine.
pub struct Machine {
    config: MachineConfig,
    data: Vec<Cell>,

    /// Heap pointer: next free heap cell.
    pub hp: Addr,
    /// Next-match pointer: next heap cell to read in read mode.
    pub sp: Addr,
    /// PDL pointer: address of the top-most pushed entry (PDL grows down
    /// from `config.top()`; empty when `up >= config.top()`).
    pub up: Addr,
    /// Environment pointer: base of the current environment frame.
    pub ep: Addr,
    /// Environment-stack top: first free environment-stack cell.
    pub esp: Addr,
    /// Continuation pointer: resumed into by `PROCEED` / `DEALLOCATE`.
    pub cp: usize,
    /// Instruction pointer: byte offset into the code buffer being run.
    pub ip: usize,
    /// Read (`false`) / write (`true`) mode, set by `GET_STRUC`.
    pub write_mode: bool,

    /// Tag published by the most recent `dereference`.
    pub last_deref_tag: u8,
    /// Payload published by the most recent `dereference`.
    pub last_deref_val: u32,
}

impl Machine {
    /// Build a fresh machine with the given sizing configuration.
    #[must_use]
    pub fn new(config: MachineConfig) -> Self {
        let mut machine = Self {
            config,
            data: Vec::new(),
            hp: Addr::zero(),
            sp: Addr::zero(),
            up: Addr::zero(),
            ep: Addr::zero(),
            esp: Addr::zero(),
            cp: 0,
            ip: 0,
            write_mode: false,
            last_deref_tag: 0,
            last_deref_val: 0,
        };
        machine.reset();
        machine
    }

    /// The sizing configuration this machine was built with.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> MachineConfig {
        self.config
    }

    /// Re-initializes all state: the data area is reallocated zeroed and
    /// the cursors are reset to the §3 lifecycle values. `cp` is left at
    /// zero here; `interp::run` (and the `jit` lowering's `Codegen::call`)
    /// seed it with the end-of-buffer sentinel on every top-level
    /// execution, since the buffer length isn't known until then.
    pub fn reset(&mut self) {
        self.data.clear();
        self.data.resize(self.config.total_cells(), Cell::zeroed());
        self.hp = self.config.heap_base();
        self.sp = self.config.heap_base();
        self.ep = self.config.stack_base();
        self.esp = self.config.stack_base();
        self.up = self.config.top();
        self.cp = 0;
        self.ip = 0;
        self.write_mode = false;
        self.last_deref_tag = 0;
        self.last_deref_val = 0;
    }

    /// Read the cell at `addr`, or `None` if `addr` is outside `[0, TOP)`.
    #[inline]
    #[must_use]
    pub fn get(&self, addr: Addr) -> Option<Cell> {
        self.data.get(addr.as_usize()).copied()
    }

    /// Write `cell` at `addr`. Returns `false` (without writing) if `addr`
    /// is outside `[0, TOP)`.
    #[inline]
    pub fn set(&mut self, addr: Addr, cell: Cell) -> bool {
        match self.data.get_mut(addr.as_usize()) {
            Some(slot) => {
                *slot = cell;
                true
            }
            None => false,
        }
    }

    /// Read a register (`X0..X(REG_SIZE-1)`), or `None` if out of range.
    #[inline]
    #[must_use]
    pub fn reg(&self, index: u32) -> Option<Cell> {
        if index >= self.config.reg_size() {
            return None;
        }
        self.get(Addr::new(index))
    }

    /// Resolve a `STACK_ADDR` permanent-variable index to its absolute
    /// address: `ep + FRAME_HEADER_SIZE + k`.
    #[inline]
    #[must_use]
    pub fn stack_slot(&self, k: u32) -> Addr {
        self.ep.add(crate::config::FRAME_HEADER_SIZE + k)
    }

    /// Number of free (unused) cells across heap and environment stack, for
    /// diagnostics.
    #[must_use]
    pub fn free_space(&self) -> usize {
        let heap_free = self.config.stack_base().diff(self.hp).max(0) as usize;
        let stack_free = self.up.diff(self.esp).max(0) as usize;
        heap_free + stack_free
    }
}
