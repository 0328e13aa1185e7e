// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Address into the machine's single flat data area.
//!
//! The data area holds registers, heap, environment stack and PDL in one
//! address space (see `src/config`), so a single newtype covers all of them.
//! Addresses are 24-bit payloads per the cell tagging scheme (`src/cell`),
//! but are carried as `u32` so arithmetic never needs to special-case the
//! width until a cell is actually packed.

use core::fmt;
use core::ops::{Add, Sub};

/// An address into the machine's data area (registers ∪ heap ∪ stack ∪ PDL).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Addr(u32);

impl Addr {
    /// Create a new address.
    #[inline]
    #[must_use]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    /// The zero address.
    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Get the raw address value.
    #[inline]
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Get the raw address value as a `usize` index.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }

    /// Add an offset to this address.
    #[inline]
    #[must_use]
    pub const fn add(self, offset: u32) -> Self {
        Self(self.0.wrapping_add(offset))
    }

    /// Subtract an offset from this address.
    #[inline]
    #[must_use]
    pub const fn sub(self, offset: u32) -> Self {
        Self(self.0.wrapping_sub(offset))
    }

    /// Calculate the difference between two addresses.
    #[inline]
    #[must_use]
    pub const fn diff(self, other: Self) -> i64 {
        self.0 as i64 - other.0 as i64
    }
}

impl fmt::Debug for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Addr({:#x})", self.0)
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u32> for Addr {
    fn from(addr: u32) -> Self {
        Self(addr)
    }
}

impl From<usize> for Addr {
    fn from(addr: usize) -> Self {
        Self(addr as u32)
    }
}

impl Add<u32> for Addr {
    type Output = Self;

    fn add(self, rhs: u32) -> Self::Output {
        self.add(rhs)
    }
}

impl Sub<u32> for Addr {
    type Output = Self;

    fn sub(self, rhs: u32) -> Self::Output {
        self.sub(rhs)
    }
}
