// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Tests for the Cranelift lowering path.

use super::{Codegen, CodegenError};
use crate::asm::Assembler;

#[test]
fn ingests_a_self_contained_fragment() {
    let mut codegen = Codegen::new(0);
    let mut a = Assembler::new();
    a.proceed();
    let buf = a.into_bytes();

    codegen.ingest(&buf, 0, buf.len()).expect("self-contained fragment always lowers");
    codegen.finalize();
    assert!(codegen.is_lowered(0));
}

#[test]
fn unresolved_call_is_reported_and_does_not_register() {
    let mut codegen = Codegen::new(0);
    let mut a = Assembler::new();
    a.call(99);
    let buf = a.into_bytes();

    let result = codegen.ingest(&buf, 0, buf.len());
    assert!(matches!(result, Err(CodegenError::UnresolvedCall(99))));
    assert!(!codegen.is_lowered(0));
}

#[test]
fn a_call_to_an_already_lowered_fragment_resolves() {
    let mut codegen = Codegen::new(0);

    // A single shared buffer, addressed by absolute offset: a caller at 0
    // calling into a callee fragment placed at offset 40.
    let mut buf = Assembler::new().call(40).into_bytes();
    while buf.len() < 40 {
        buf.push(0);
    }
    buf.push(crate::bytecode::op::PROCEED);

    codegen.ingest(&buf, 40, 1).unwrap();
    codegen.ingest(&buf, 0, 5).expect("callee is already lowered");
}

#[test]
fn opt_level_is_recorded() {
    let codegen = Codegen::new(3);
    assert_eq!(codegen.opt_level(), 3);
}

#[test]
fn a_lowered_proceed_only_fragment_executes_successfully() {
    use crate::config::MachineConfig;
    use crate::machine::Machine;

    let mut codegen = Codegen::new(0);
    let mut a = Assembler::new();
    a.proceed();
    let buf = a.into_bytes();

    codegen.ingest(&buf, 0, buf.len()).unwrap();
    codegen.finalize();

    let mut machine = Machine::new(MachineConfig::default());
    let result = codegen.call(&mut machine, &buf, 0);
    assert_eq!(result, Some(true));
}
