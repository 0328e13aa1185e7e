// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Core type definitions for the WAM core.
//!
//! This module provides a type-safe wrapper for addresses into the data area.
//! Using a newtype prevents mixing an address with an arbitrary integer (a
//! register index, a functor id) at the call site.


mod address;

pub use address::Addr;
