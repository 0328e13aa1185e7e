// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! A tagged-cell abstract-machine core for executing compiled first-order
//! logic programs, in the Warren Abstract Machine tradition.
//!
//! The engine implements the L0-L3 progression as a single unified machine:
//! dereference-and-unify over a tagged-cell memory model, the fourteen-
//! instruction byte-code interpreter, and the `ALLOCATE`/`DEALLOCATE`
//! environment-frame discipline for clause call/return. With the `jit`
//! feature, ingested fragments are additionally lowered to native code via
//! Cranelift, calling back into the same dereference/unify primitives the
//! interpreter uses.
//!
//! There is no process-wide static anywhere in this crate: every primitive
//! takes an explicit `&mut Machine` (or, for `jit`, a machine-state
//! pointer), so an embedder owns as many independent machines as it needs.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

#[cfg(any(test, feature = "std"))]
extern crate std;

#[cfg(not(any(test, feature = "std")))]
extern crate alloc;

#[cfg(test)]
mod asm;
pub mod bytecode;
pub mod cell;
pub mod codegen;
pub mod config;
pub mod inspect;
pub mod interp;
pub mod loader;
pub mod machine;
pub mod types;
pub mod unify;

pub use bytecode::DecodeError;
pub use cell::{Cell, Tag};
pub use config::MachineConfig;
pub use interp::RuntimeError;
pub use loader::{Entry, Loader, LoaderError};
pub use machine::{frame::FrameError, FrameHeader, Machine};
pub use types::Addr;
pub use unify::UnifyError;

#[cfg(feature = "jit")]
pub use codegen::{Codegen, CodegenError};

/// Crate version, surfaced for diagnostics (mirrors the host's own
/// `CARGO_PKG_VERSION` when embedded).
pub const VERSION: Option<&str> = option_env!("CARGO_PKG_VERSION");

/// Error surfaced by [`WamMachine::code_added`].
#[derive(Debug)]
pub enum IngestError {
    /// The fragment table rejected this offset.
    Loader(LoaderError),
    /// The Cranelift lowering path could not ingest this fragment yet.
    #[cfg(feature = "jit")]
    Codegen(CodegenError),
}

impl From<LoaderError> for IngestError {
    fn from(e: LoaderError) -> Self {
        Self::Loader(e)
    }
}

#[cfg(feature = "jit")]
impl From<CodegenError> for IngestError {
    fn from(e: CodegenError) -> Self {
        Self::Codegen(e)
    }
}

/// Top-level facade: a [`Machine`], its fragment [`Loader`], and (under
/// `jit`) the Cranelift lowering engine, composed behind the conceptual API
/// of §6: `reset`, `code_added`, `execute`, plus the inspection accessors.
pub struct WamMachine {
    machine: Machine,
    loader: Loader,
    #[cfg(feature = "jit")]
    codegen: Codegen,
}

impl WamMachine {
    /// Build a fresh machine with the given sizing configuration.
    #[must_use]
    pub fn new(config: MachineConfig) -> Self {
        let mut wam = Self {
            machine: Machine::new(config),
            loader: Loader::new(),
            #[cfg(feature = "jit")]
            codegen: Codegen::new(config.opt_level),
        };
        wam.reset();
        wam
    }

    /// Re-initializes all state: the data area, the fragment table, and
    /// (under `jit`) the lowering engine. Must be called before first use.
    pub fn reset(&mut self) {
        self.machine.reset();
        self.loader.clear();
    }

    /// Ingest a compiled byte-code fragment spanning
    /// `buf[offset..offset + length)`. Under `jit`, this may lower the
    /// fragment to native code; a fragment whose `CALL` targets are not
    /// yet known is registered for interpreted dispatch and can be
    /// retried later.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError`] if the loader rejects the offset, or (under
    /// `jit`) if lowering could not complete for a reason other than an
    /// unresolved call.
    pub fn code_added(
        &mut self,
        buf: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<(), IngestError> {
        #[cfg(feature = "jit")]
        {
            return match self.codegen.ingest(buf, offset, length) {
                Ok(()) => {
                    self.codegen.finalize();
                    self.loader.register_compiled(offset, length, loader::LinkStatus::Linked)?;
                    self.retry_deferred(buf);
                    Ok(())
                }
                Err(CodegenError::UnresolvedCall(_)) => {
                    self.loader.register_compiled(offset, length, loader::LinkStatus::Deferred)?;
                    Ok(())
                }
                Err(e) => Err(IngestError::Codegen(e)),
            };
        }
        #[cfg(not(feature = "jit"))]
        {
            let _ = length;
            let _ = buf;
            self.loader.register_interpreted(offset)?;
            Ok(())
        }
    }

    /// Re-attempt compilation of every fragment still marked `Deferred`,
    /// now that a new fragment (possibly a callee one of them was waiting
    /// on) has just been linked. Recompiled fragments that succeed are
    /// marked linked; ones that still reference an unresolved `CALL` stay
    /// deferred for a later retry.
    #[cfg(feature = "jit")]
    fn retry_deferred(&mut self, buf: &[u8]) {
        let pending: Vec<usize> = self.loader.deferred().collect();
        for offset in pending {
            let Some(length) = self.loader.span(offset) else { continue };
            if self.codegen.ingest(buf, offset, length).is_ok() {
                self.codegen.finalize();
                self.loader.mark_linked(offset);
            }
        }
    }

    /// Execute the code at `buf[offset..]`, dispatching through the
    /// interpreter (or, under `jit`, the lowered entry if one exists).
    /// Returns `true` on success, `false` on any recoverable failure.
    pub fn execute(&mut self, buf: &[u8], offset: usize) -> bool {
        #[cfg(feature = "jit")]
        {
            if self.loader.status(offset) == Some(loader::LinkStatus::Linked) {
                if let Some(result) = self.codegen.call(&mut self.machine, buf, offset) {
                    return result;
                }
            }
        }
        interp::run(&mut self.machine, buf, offset).is_ok()
    }

    /// Shared read-only access to the underlying machine, for inspection.
    #[must_use]
    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    /// Shared mutable access to the underlying machine, for the
    /// inspection accessors (`deref` publishes into `last_deref_*`).
    pub fn machine_mut(&mut self) -> &mut Machine {
        &mut self.machine
    }
}
