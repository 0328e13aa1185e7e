// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Fragment table: maps code offsets to executable entries and tracks
//! link status across `code_added` calls.

#[cfg(test)]
mod loader_test;

#[cfg(any(test, feature = "std"))]
use std::collections::BTreeMap;

#[cfg(not(any(test, feature = "std")))]
use alloc::collections::BTreeMap;

/// An entry the loader's `offset -> entry` map resolves to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    /// Dispatch straight into the interpreter at this offset (identity
    /// dispatch, used whenever the `jit` feature is disabled or a fragment
    /// has not yet been lowered).
    Interpreted(usize),
    /// Dispatch into a Cranelift-lowered native entry, identified by the
    /// same offset that names the fragment in the loader's table.
    #[cfg(feature = "jit")]
    Compiled(usize),
}

/// Link status of an ingested fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkStatus {
    /// All `CALL` targets inside the fragment resolve to a known entry.
    Linked,
    /// At least one `CALL` target has not yet been ingested.
    Deferred,
}

/// Errors raised while ingesting a fragment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoaderError {
    /// The fragment's `[offset, offset + length)` span overlaps one
    /// already registered.
    OverlappingFragment,
}

/// Maps code offsets to dispatch entries and tracks link status so a
/// previously deferred fragment can be retried once its callee arrives.
#[derive(Default)]
pub struct Loader {
    entries: BTreeMap<usize, Entry>,
    status: BTreeMap<usize, LinkStatus>,
    spans: BTreeMap<usize, usize>,
}

impl Loader {
    /// An empty loader.
    #[must_use]
    pub fn new() -> Self {
        Self { entries: BTreeMap::new(), status: BTreeMap::new(), spans: BTreeMap::new() }
    }

    /// Register a fragment at `offset` as identity-dispatched (interpreter)
    /// and mark it linked: the pure-interpreter build never defers, since
    /// `CALL` resolution happens against the code buffer directly rather
    /// than against this table.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::OverlappingFragment`] if `offset` is already
    /// registered.
    pub fn register_interpreted(&mut self, offset: usize) -> Result<(), LoaderError> {
        if self.entries.contains_key(&offset) {
            return Err(LoaderError::OverlappingFragment);
        }
        self.entries.insert(offset, Entry::Interpreted(offset));
        self.status.insert(offset, LinkStatus::Linked);
        Ok(())
    }

    /// Register a compiled entry for `offset`, with an explicit link
    /// status (set to `Deferred` when the code generator could not
    /// resolve every `CALL` target yet) and the fragment's `length`, so a
    /// `Deferred` entry can later be handed back to the code generator for
    /// a retry.
    #[cfg(feature = "jit")]
    pub fn register_compiled(
        &mut self,
        offset: usize,
        length: usize,
        status: LinkStatus,
    ) -> Result<(), LoaderError> {
        if self.entries.contains_key(&offset) {
            return Err(LoaderError::OverlappingFragment);
        }
        self.entries.insert(offset, Entry::Compiled(offset));
        self.status.insert(offset, status);
        self.spans.insert(offset, length);
        Ok(())
    }

    /// The `length` a compiled fragment was registered with, if any.
    #[cfg(feature = "jit")]
    #[must_use]
    pub fn span(&self, offset: usize) -> Option<usize> {
        self.spans.get(&offset).copied()
    }

    /// Look up the dispatch entry for `offset`.
    #[must_use]
    pub fn entry(&self, offset: usize) -> Option<Entry> {
        self.entries.get(&offset).copied()
    }

    /// Link status of the fragment at `offset`.
    #[must_use]
    pub fn status(&self, offset: usize) -> Option<LinkStatus> {
        self.status.get(&offset).copied()
    }

    /// Offsets of fragments still awaiting a link.
    pub fn deferred(&self) -> impl Iterator<Item = usize> + '_ {
        self.status
            .iter()
            .filter(|(_, s)| **s == LinkStatus::Deferred)
            .map(|(offset, _)| *offset)
    }

    /// Mark a previously deferred fragment as linked, once its callee has
    /// arrived and recompilation has succeeded.
    pub fn mark_linked(&mut self, offset: usize) {
        self.status.insert(offset, LinkStatus::Linked);
    }

    /// Discard all registered fragments (called by `reset`).
    pub fn clear(&mut self) {
        self.entries.clear();
        self.status.clear();
        self.spans.clear();
    }
}
