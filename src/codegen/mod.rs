// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Cranelift-based lowering of ingested fragments to native entries
//! (feature `jit`).
//!
//! Each ingested fragment gets its own emitted function: for every decoded
//! instruction, `ingest` emits the matching load/store sequence as
//! Cranelift IR, calling out to the externally-linked primitives in
//! [`prims`] for dereference, unify, and frame bookkeeping rather than
//! re-emitting that logic per fragment. `CALL` to an already-lowered
//! fragment becomes a genuine Cranelift `call` into that fragment's
//! function; `PROCEED`/`DEALLOCATE` become native returns, using
//! Cranelift's own call stack in place of the interpreter's `ip`/`cp`
//! byte-offset jumps. A `CALL` whose target has not yet been lowered
//! aborts compilation of the current fragment cleanly, so a later
//! `code_added` covering the target can complete the link and the caller
//! can be recompiled.

#![cfg(feature = "jit")]

#[cfg(test)]
mod codegen_test;
mod prims;

use crate::bytecode::{decode, DecodeError, Instr, UNLINKED_CALL};
use crate::machine::Machine;
use cranelift_codegen::ir::condcodes::IntCC;
use cranelift_codegen::ir::{types, AbiParam, FuncRef, InstBuilder, Value};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_codegen::{verify_function, Context};
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_jit::{JITBuilder, JITModule};
use cranelift_module::{FuncId, Linkage, Module};
use std::collections::BTreeMap;

/// Bit offset of the tag within a [`crate::cell::Cell`]'s raw word.
/// Mirrors the private constant in `src/cell/mod.rs`; duplicated here
/// because the lowered IR builds and inspects cell words directly rather
/// than through `Cell`'s own methods.
const TAG_SHIFT: i64 = 24;
/// Mask over a cell's 24-bit payload. Mirrors `src/cell/mod.rs`.
const PAYLOAD_MASK: i64 = 0x00FF_FFFF;
const TAG_REF: i64 = 1;

/// Errors raised while lowering a fragment.
#[derive(Debug)]
pub enum CodegenError {
    /// The fragment's bytes could not be decoded by the shared decoder.
    Decode(DecodeError),
    /// A `CALL` inside this fragment targets an offset not yet ingested;
    /// the current fragment is abandoned and must be retried once the
    /// callee is ingested.
    UnresolvedCall(i32),
    /// Cranelift rejected the emitted module (declaration/definition
    /// failed for a reason other than the verifier, which panics instead).
    Module(cranelift_module::ModuleError),
}

impl From<cranelift_module::ModuleError> for CodegenError {
    fn from(e: cranelift_module::ModuleError) -> Self {
        Self::Module(e)
    }
}

/// Cranelift-backed lowering engine: owns the `JITModule` and the table of
/// already-emitted fragment entries.
pub struct Codegen {
    module: JITModule,
    fragments: BTreeMap<usize, FuncId>,
    opt_level: u8,
}

fn clif_opt_level_name(level: u8) -> &'static str {
    match level {
        0 => "none",
        1 | 2 => "speed",
        _ => "speed_and_size",
    }
}

/// Native entry signature: `(machine_ptr) -> bool`. Every lowered fragment
/// shares this shape so a resolved `CALL` can be emitted as a direct
/// Cranelift `call` into the callee's function.
fn entry_signature(module: &JITModule) -> cranelift_codegen::ir::Signature {
    let mut sig = module.make_signature();
    sig.params.push(AbiParam::new(types::I64));
    sig.returns.push(AbiParam::new(types::I8));
    sig
}

/// Declare one of the `prims` functions as an import in `module`, for use
/// inside a to-be-emitted fragment. Cranelift modules treat repeated
/// `declare_function` calls for the same name/signature as idempotent, so
/// this can be called once per fragment without tracking `FuncId`s
/// across calls.
fn declare_prim(
    module: &mut JITModule,
    name: &str,
    arity: usize,
    returns: bool,
) -> Result<FuncId, CodegenError> {
    let mut sig = module.make_signature();
    for _ in 0..arity {
        sig.params.push(AbiParam::new(types::I64));
    }
    if returns {
        sig.returns.push(AbiParam::new(types::I64));
    }
    Ok(module.declare_function(name, Linkage::Import, &sig)?)
}

/// The primitive `FuncId`s a fragment body needs, declared once per
/// `ingest` call.
struct Prims {
    resolve: FuncId,
    get: FuncId,
    set: FuncId,
    dereference: FuncId,
    unify: FuncId,
    allocate: FuncId,
    deallocate: FuncId,
    hp: FuncId,
    set_hp: FuncId,
    sp: FuncId,
    set_sp: FuncId,
    write_mode: FuncId,
    set_write_mode: FuncId,
    set_cp: FuncId,
}

impl Prims {
    fn declare(module: &mut JITModule) -> Result<Self, CodegenError> {
        Ok(Self {
            resolve: declare_prim(module, "wam_resolve", 3, true)?,
            get: declare_prim(module, "wam_get", 2, true)?,
            set: declare_prim(module, "wam_set", 3, false)?,
            dereference: declare_prim(module, "wam_dereference", 2, true)?,
            unify: declare_prim(module, "wam_unify", 3, true)?,
            allocate: declare_prim(module, "wam_allocate", 2, true)?,
            deallocate: declare_prim(module, "wam_deallocate", 1, true)?,
            hp: declare_prim(module, "wam_hp", 1, true)?,
            set_hp: declare_prim(module, "wam_set_hp", 2, false)?,
            sp: declare_prim(module, "wam_sp", 1, true)?,
            set_sp: declare_prim(module, "wam_set_sp", 2, false)?,
            write_mode: declare_prim(module, "wam_write_mode", 1, true)?,
            set_write_mode: declare_prim(module, "wam_set_write_mode", 2, false)?,
            set_cp: declare_prim(module, "wam_set_cp", 2, false)?,
        })
    }
}

fn func_ref(module: &mut JITModule, builder: &mut FunctionBuilder, fid: FuncId) -> FuncRef {
    module.declare_func_in_func(fid, builder.func)
}

/// Emit a call to a value-returning primitive and return its result.
fn call1(
    module: &mut JITModule,
    builder: &mut FunctionBuilder,
    fid: FuncId,
    args: &[Value],
) -> Value {
    let fref = func_ref(module, builder, fid);
    let call = builder.ins().call(fref, args);
    builder.inst_results(call)[0]
}

/// Emit a call to a void-returning primitive.
fn call0(module: &mut JITModule, builder: &mut FunctionBuilder, fid: FuncId, args: &[Value]) {
    let fref = func_ref(module, builder, fid);
    builder.ins().call(fref, args);
}

impl Codegen {
    /// Build a new lowering engine at the given Cranelift optimization
    /// level (`0..=4`, per `MachineConfig::opt_level`).
    ///
    /// # Panics
    ///
    /// Panics if the host's native Cranelift ISA cannot be resolved — this
    /// indicates a toolchain/target problem rather than a data error.
    #[must_use]
    pub fn new(opt_level: u8) -> Self {
        let mut flags = settings::builder();
        flags
            .set("opt_level", clif_opt_level_name(opt_level))
            .expect("opt_level is a recognised Cranelift setting");
        let isa_builder = cranelift_native::builder().expect("host ISA must be available");
        let isa = isa_builder
            .finish(settings::Flags::new(flags))
            .expect("ISA flags must be compatible with the host");

        let mut jit_builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        for (name, ptr) in prims::symbols() {
            jit_builder.symbol(name, ptr);
        }
        let module = JITModule::new(jit_builder);

        Self { module, fragments: BTreeMap::new(), opt_level }
    }

    /// The configured optimization level.
    #[must_use]
    pub const fn opt_level(&self) -> u8 {
        self.opt_level
    }

    /// Lower the fragment at `buf[offset..offset+length)` and define it
    /// into the JIT module.
    ///
    /// # Errors
    ///
    /// Returns [`CodegenError::UnresolvedCall`] if a `CALL` inside the
    /// fragment targets an offset that has not itself already been
    /// lowered (the caller should retry after the callee is ingested);
    /// [`CodegenError::Decode`] if the fragment's bytes are malformed.
    /// Self-recursive fragments (a `CALL` back to `offset` itself) are
    /// reported the same way, since a fragment's `FuncId` is only known to
    /// be callable after this method returns successfully.
    ///
    /// # Panics
    ///
    /// Panics if Cranelift's verifier rejects the emitted function: a
    /// malformed emitted module is an internal compiler bug, not
    /// recoverable user data (see the crate's error-model notes).
    pub fn ingest(
        &mut self,
        buf: &[u8],
        offset: usize,
        length: usize,
    ) -> Result<(), CodegenError> {
        // Every CALL must target an already-lowered fragment before this
        // fragment can be emitted at all: the generated `call` instruction
        // needs a concrete, already-defined `FuncId` to refer to.
        let mut scan_ip = offset;
        while scan_ip < offset + length {
            let instr = decode(buf, scan_ip).map_err(CodegenError::Decode)?;
            if let Instr::Call { target } = instr {
                if target != UNLINKED_CALL && !self.fragments.contains_key(&(target as usize)) {
                    return Err(CodegenError::UnresolvedCall(target));
                }
            }
            scan_ip += instr.len();
        }

        let prims = Prims::declare(&mut self.module)?;
        let sig = entry_signature(&self.module);
        let func_id =
            self.module.declare_function(&format!("fragment_{offset}"), Linkage::Local, &sig)?;

        let mut ctx = Context::new();
        ctx.func.signature = sig;
        {
            let mut fn_builder_ctx = FunctionBuilderContext::new();
            let mut builder = FunctionBuilder::new(&mut ctx.func, &mut fn_builder_ctx);

            let entry_block = builder.create_block();
            builder.append_block_params_for_function_params(entry_block);
            builder.switch_to_block(entry_block);
            builder.seal_block(entry_block);
            let machine_ptr = builder.block_params(entry_block)[0];

            let fail_block = builder.create_block();

            let mut ip = offset;
            let mut terminated = false;
            while ip < offset + length {
                let instr = decode(buf, ip).expect("validated in the scan above");
                let len = instr.len();
                terminated = emit_instr(
                    &mut self.module,
                    &mut builder,
                    &prims,
                    machine_ptr,
                    instr,
                    ip,
                    len,
                    fail_block,
                    &self.fragments,
                );
                ip += len;
                if terminated {
                    break;
                }
            }
            if !terminated {
                let one = builder.ins().iconst(types::I8, 1);
                builder.ins().return_(&[one]);
            }

            builder.switch_to_block(fail_block);
            let zero = builder.ins().iconst(types::I8, 0);
            builder.ins().return_(&[zero]);
            builder.seal_block(fail_block);

            builder.finalize();
        }

        if let Err(errors) = verify_function(&ctx.func, self.module.isa().flags()) {
            panic!("generated fragment failed verification: {errors}");
        }

        self.module.define_function(func_id, &mut ctx)?;
        self.fragments.insert(offset, func_id);
        Ok(())
    }

    /// Flush all pending definitions so emitted entries are callable.
    pub fn finalize(&mut self) {
        self.module.finalize_definitions().expect("defined functions must finalize");
    }

    /// Whether `offset` has a lowered entry.
    #[must_use]
    pub fn is_lowered(&self, offset: usize) -> bool {
        self.fragments.contains_key(&offset)
    }

    /// Invoke the lowered entry for `offset`, returning `None` if no entry
    /// has been lowered for it. Seeds `machine.cp` with the end-of-buffer
    /// sentinel first, exactly as `interp::run` does, so `ALLOCATE`/
    /// `DEALLOCATE` frames captured while executing natively-lowered code
    /// stay consistent with the interpreted path.
    ///
    /// # Safety note
    ///
    /// The pointer cast from the finalized code address to a Rust `fn`
    /// relies on the signature declared at `ingest` time matching exactly;
    /// both are defined in this module so the two stay in lock-step.
    pub fn call(&self, machine: &mut Machine, buf: &[u8], offset: usize) -> Option<bool> {
        let func_id = *self.fragments.get(&offset)?;
        machine.cp = buf.len();
        let code_ptr = self.module.get_finalized_function(func_id);
        let entry: extern "C" fn(i64) -> u8 =
            unsafe { core::mem::transmute::<*const u8, extern "C" fn(i64) -> u8>(code_ptr) };
        let machine_ptr = core::ptr::from_mut(machine) as i64;
        Some(entry(machine_ptr) != 0)
    }
}

/// Emit the IR for one decoded instruction. Returns whether the fragment
/// is now terminated (a native `return_` was emitted, so no further
/// instructions should be translated).
#[allow(clippy::too_many_arguments)]
fn emit_instr(
    module: &mut JITModule,
    builder: &mut FunctionBuilder,
    prims: &Prims,
    machine_ptr: Value,
    instr: Instr,
    ip: usize,
    len: usize,
    fail_block: cranelift_codegen::ir::Block,
    fragments: &BTreeMap<usize, FuncId>,
) -> bool {
    let i64c = |builder: &mut FunctionBuilder, v: i64| builder.ins().iconst(types::I64, v);

    match instr {
        Instr::PutStruc { mode: m, xi, functor_id, arity } => {
            let functor_word =
                i64c(builder, ((i64::from(functor_id) << 8) | i64::from(arity)) & 0xFFFF_FFFF);
            let h = call1(module, builder, prims.hp, &[machine_ptr]);
            let h1 = builder.ins().iadd_imm(h, 1);
            let masked_h1 = builder.ins().band_imm(h1, PAYLOAD_MASK);
            let str_cell = builder.ins().bor_imm(masked_h1, 2 << TAG_SHIFT);
            call0(module, builder, prims.set, &[machine_ptr, h, str_cell]);
            call0(module, builder, prims.set, &[machine_ptr, h1, functor_word]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            call0(module, builder, prims.set, &[machine_ptr, addr, str_cell]);
            let h2 = builder.ins().iadd_imm(h, 2);
            call0(module, builder, prims.set_hp, &[machine_ptr, h2]);
            false
        }
        Instr::SetVar { mode: m, xi } => {
            let h = call1(module, builder, prims.hp, &[machine_ptr]);
            let masked_h = builder.ins().band_imm(h, PAYLOAD_MASK);
            let ref_cell = builder.ins().bor_imm(masked_h, TAG_REF << TAG_SHIFT);
            call0(module, builder, prims.set, &[machine_ptr, h, ref_cell]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            call0(module, builder, prims.set, &[machine_ptr, addr, ref_cell]);
            let h1 = builder.ins().iadd_imm(h, 1);
            call0(module, builder, prims.set_hp, &[machine_ptr, h1]);
            false
        }
        Instr::SetVal { mode: m, xi } => {
            let h = call1(module, builder, prims.hp, &[machine_ptr]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            let val = call1(module, builder, prims.get, &[machine_ptr, addr]);
            call0(module, builder, prims.set, &[machine_ptr, h, val]);
            let h1 = builder.ins().iadd_imm(h, 1);
            call0(module, builder, prims.set_hp, &[machine_ptr, h1]);
            false
        }
        Instr::GetStruc { mode: m, xi, functor_id, arity } => {
            let functor_word =
                i64c(builder, ((i64::from(functor_id) << 8) | i64::from(arity)) & 0xFFFF_FFFF);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            let d = call1(module, builder, prims.dereference, &[machine_ptr, addr]);
            let raw_d = call1(module, builder, prims.get, &[machine_ptr, d]);
            let tag_d = builder.ins().ushr_imm(raw_d, TAG_SHIFT);
            let tag_d = builder.ins().band_imm(tag_d, 0xFF);
            let ref_tag = i64c(builder, TAG_REF);
            let is_ref = builder.ins().icmp(IntCC::Equal, tag_d, ref_tag);

            let write_block = builder.create_block();
            let read_block = builder.create_block();
            let cont_block = builder.create_block();
            builder.ins().brif(is_ref, write_block, &[], read_block, &[]);

            builder.switch_to_block(write_block);
            let h = call1(module, builder, prims.hp, &[machine_ptr]);
            let h1 = builder.ins().iadd_imm(h, 1);
            let masked_h1 = builder.ins().band_imm(h1, PAYLOAD_MASK);
            let str_cell = builder.ins().bor_imm(masked_h1, 2 << TAG_SHIFT);
            call0(module, builder, prims.set, &[machine_ptr, h, str_cell]);
            call0(module, builder, prims.set, &[machine_ptr, h1, functor_word]);
            let masked_h = builder.ins().band_imm(h, PAYLOAD_MASK);
            let ref_cell = builder.ins().bor_imm(masked_h, TAG_REF << TAG_SHIFT);
            call0(module, builder, prims.set, &[machine_ptr, d, ref_cell]);
            let h2 = builder.ins().iadd_imm(h, 2);
            call0(module, builder, prims.set_hp, &[machine_ptr, h2]);
            let one = i64c(builder, 1);
            call0(module, builder, prims.set_write_mode, &[machine_ptr, one]);
            builder.ins().jump(cont_block, &[]);
            builder.seal_block(write_block);

            builder.switch_to_block(read_block);
            let str_payload = builder.ins().band_imm(raw_d, PAYLOAD_MASK);
            let word = call1(module, builder, prims.get, &[machine_ptr, str_payload]);
            let matches = builder.ins().icmp(IntCC::Equal, word, functor_word);
            let ok_block = builder.create_block();
            builder.ins().brif(matches, ok_block, &[], fail_block, &[]);

            builder.switch_to_block(ok_block);
            let new_sp = builder.ins().iadd_imm(str_payload, 1);
            call0(module, builder, prims.set_sp, &[machine_ptr, new_sp]);
            let zero = i64c(builder, 0);
            call0(module, builder, prims.set_write_mode, &[machine_ptr, zero]);
            builder.ins().jump(cont_block, &[]);
            builder.seal_block(ok_block);
            builder.seal_block(read_block);

            builder.switch_to_block(cont_block);
            builder.seal_block(cont_block);
            false
        }
        Instr::UnifyVar { mode: m, xi } => {
            let wm = call1(module, builder, prims.write_mode, &[machine_ptr]);
            let zero = i64c(builder, 0);
            let is_write = builder.ins().icmp(IntCC::NotEqual, wm, zero);

            let write_block = builder.create_block();
            let read_block = builder.create_block();
            let cont_block = builder.create_block();
            builder.ins().brif(is_write, write_block, &[], read_block, &[]);

            builder.switch_to_block(write_block);
            let h = call1(module, builder, prims.hp, &[machine_ptr]);
            let masked_h = builder.ins().band_imm(h, PAYLOAD_MASK);
            let ref_cell = builder.ins().bor_imm(masked_h, TAG_REF << TAG_SHIFT);
            call0(module, builder, prims.set, &[machine_ptr, h, ref_cell]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            call0(module, builder, prims.set, &[machine_ptr, addr, ref_cell]);
            let h1 = builder.ins().iadd_imm(h, 1);
            call0(module, builder, prims.set_hp, &[machine_ptr, h1]);
            builder.ins().jump(cont_block, &[]);
            builder.seal_block(write_block);

            builder.switch_to_block(read_block);
            let sp = call1(module, builder, prims.sp, &[machine_ptr]);
            let val = call1(module, builder, prims.get, &[machine_ptr, sp]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            call0(module, builder, prims.set, &[machine_ptr, addr, val]);
            builder.ins().jump(cont_block, &[]);
            builder.seal_block(read_block);

            builder.switch_to_block(cont_block);
            builder.seal_block(cont_block);
            let sp_now = call1(module, builder, prims.sp, &[machine_ptr]);
            let sp_next = builder.ins().iadd_imm(sp_now, 1);
            call0(module, builder, prims.set_sp, &[machine_ptr, sp_next]);
            false
        }
        Instr::UnifyVal { mode: m, xi } => {
            let wm = call1(module, builder, prims.write_mode, &[machine_ptr]);
            let zero = i64c(builder, 0);
            let is_write = builder.ins().icmp(IntCC::NotEqual, wm, zero);

            let write_block = builder.create_block();
            let read_block = builder.create_block();
            let cont_block = builder.create_block();
            builder.ins().brif(is_write, write_block, &[], read_block, &[]);

            builder.switch_to_block(write_block);
            let h = call1(module, builder, prims.hp, &[machine_ptr]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            let val = call1(module, builder, prims.get, &[machine_ptr, addr]);
            call0(module, builder, prims.set, &[machine_ptr, h, val]);
            let h1 = builder.ins().iadd_imm(h, 1);
            call0(module, builder, prims.set_hp, &[machine_ptr, h1]);
            builder.ins().jump(cont_block, &[]);
            builder.seal_block(write_block);

            builder.switch_to_block(read_block);
            let sp = call1(module, builder, prims.sp, &[machine_ptr]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            let status = call1(module, builder, prims.unify, &[machine_ptr, addr, sp]);
            let failed = builder.ins().icmp(IntCC::NotEqual, status, zero);
            let ok_block = builder.create_block();
            builder.ins().brif(failed, fail_block, &[], ok_block, &[]);
            builder.switch_to_block(ok_block);
            builder.ins().jump(cont_block, &[]);
            builder.seal_block(ok_block);
            builder.seal_block(read_block);

            builder.switch_to_block(cont_block);
            builder.seal_block(cont_block);
            let sp_now = call1(module, builder, prims.sp, &[machine_ptr]);
            let sp_next = builder.ins().iadd_imm(sp_now, 1);
            call0(module, builder, prims.set_sp, &[machine_ptr, sp_next]);
            false
        }
        Instr::PutVar { mode: m, xi, ai } => {
            let h = call1(module, builder, prims.hp, &[machine_ptr]);
            let masked_h = builder.ins().band_imm(h, PAYLOAD_MASK);
            let ref_cell = builder.ins().bor_imm(masked_h, TAG_REF << TAG_SHIFT);
            call0(module, builder, prims.set, &[machine_ptr, h, ref_cell]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            call0(module, builder, prims.set, &[machine_ptr, addr, ref_cell]);
            let ai_addr = i64c(builder, i64::from(ai));
            call0(module, builder, prims.set, &[machine_ptr, ai_addr, ref_cell]);
            let h1 = builder.ins().iadd_imm(h, 1);
            call0(module, builder, prims.set_hp, &[machine_ptr, h1]);
            false
        }
        Instr::PutVal { mode: m, xi, ai } => {
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            let val = call1(module, builder, prims.get, &[machine_ptr, addr]);
            let ai_addr = i64c(builder, i64::from(ai));
            call0(module, builder, prims.set, &[machine_ptr, ai_addr, val]);
            false
        }
        Instr::GetVar { mode: m, xi, ai } => {
            let ai_addr = i64c(builder, i64::from(ai));
            let val = call1(module, builder, prims.get, &[machine_ptr, ai_addr]);
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            call0(module, builder, prims.set, &[machine_ptr, addr, val]);
            false
        }
        Instr::GetVal { mode: m, xi, ai } => {
            let mode_val = i64c(builder, i64::from(m));
            let xi_val = i64c(builder, i64::from(xi));
            let addr = call1(module, builder, prims.resolve, &[machine_ptr, mode_val, xi_val]);
            let ai_addr = i64c(builder, i64::from(ai));
            let status = call1(module, builder, prims.unify, &[machine_ptr, addr, ai_addr]);
            let zero = i64c(builder, 0);
            let failed = builder.ins().icmp(IntCC::NotEqual, status, zero);
            let ok_block = builder.create_block();
            builder.ins().brif(failed, fail_block, &[], ok_block, &[]);
            builder.switch_to_block(ok_block);
            builder.seal_block(ok_block);
            false
        }
        Instr::Allocate { n } => {
            let n_val = i64c(builder, i64::from(n));
            let status = call1(module, builder, prims.allocate, &[machine_ptr, n_val]);
            let zero = i64c(builder, 0);
            let failed = builder.ins().icmp(IntCC::NotEqual, status, zero);
            let ok_block = builder.create_block();
            builder.ins().brif(failed, fail_block, &[], ok_block, &[]);
            builder.switch_to_block(ok_block);
            builder.seal_block(ok_block);
            false
        }
        Instr::Deallocate => {
            let status = call1(module, builder, prims.deallocate, &[machine_ptr]);
            let zero = i64c(builder, 0);
            let failed = builder.ins().icmp(IntCC::NotEqual, status, zero);
            let ok_block = builder.create_block();
            builder.ins().brif(failed, fail_block, &[], ok_block, &[]);
            builder.switch_to_block(ok_block);
            builder.seal_block(ok_block);
            let one = builder.ins().iconst(types::I8, 1);
            builder.ins().return_(&[one]);
            true
        }
        Instr::Proceed => {
            let one = builder.ins().iconst(types::I8, 1);
            builder.ins().return_(&[one]);
            true
        }
        Instr::Call { target } => {
            if target == UNLINKED_CALL {
                let zero = builder.ins().iconst(types::I8, 0);
                builder.ins().return_(&[zero]);
                return true;
            }
            let return_addr = i64c(builder, (ip + len) as i64);
            call0(module, builder, prims.set_cp, &[machine_ptr, return_addr]);
            let callee = *fragments
                .get(&(target as usize))
                .expect("CALL target validated as already lowered during the scan pass");
            let callee_ref = func_ref(module, builder, callee);
            let call = builder.ins().call(callee_ref, &[machine_ptr]);
            let result = builder.inst_results(call)[0];
            let zero8 = builder.ins().iconst(types::I8, 0);
            let failed = builder.ins().icmp(IntCC::Equal, result, zero8);
            let ok_block = builder.create_block();
            builder.ins().brif(failed, fail_block, &[], ok_block, &[]);
            builder.switch_to_block(ok_block);
            builder.seal_block(ok_block);
            false
        }
    }
}
