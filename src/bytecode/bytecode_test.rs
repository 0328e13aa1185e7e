// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Tests for instruction decoding.

use super::{decode, mode, op, DecodeError, Instr};

#[test]
fn decodes_put_struc() {
    let mut buf = vec![op::PUT_STRUC, mode::REG_ADDR, 3];
    buf.extend_from_slice(&((7u32 << 8) | 2).to_le_bytes());
    let instr = decode(&buf, 0).unwrap();
    assert_eq!(
        instr,
        Instr::PutStruc { mode: mode::REG_ADDR, xi: 3, functor_id: 7, arity: 2 }
    );
    assert_eq!(instr.len(), 7);
}

#[test]
fn decodes_set_var_and_set_val() {
    let buf = [op::SET_VAR, mode::REG_ADDR, 2];
    assert_eq!(decode(&buf, 0).unwrap(), Instr::SetVar { mode: mode::REG_ADDR, xi: 2 });

    let buf = [op::SET_VAL, mode::STACK_ADDR, 1];
    assert_eq!(decode(&buf, 0).unwrap(), Instr::SetVal { mode: mode::STACK_ADDR, xi: 1 });
}

#[test]
fn decodes_call_with_negative_target() {
    let mut buf = vec![op::CALL];
    buf.extend_from_slice(&(-1i32).to_le_bytes());
    assert_eq!(decode(&buf, 0).unwrap(), Instr::Call { target: -1 });
}

#[test]
fn decodes_proceed_and_deallocate() {
    assert_eq!(decode(&[op::PROCEED], 0).unwrap(), Instr::Proceed);
    assert_eq!(decode(&[op::DEALLOCATE], 0).unwrap(), Instr::Deallocate);
}

#[test]
fn decodes_allocate() {
    let buf = [op::ALLOCATE, 5];
    assert_eq!(decode(&buf, 0).unwrap(), Instr::Allocate { n: 5 });
}

#[test]
fn unknown_opcode_is_reported() {
    assert_eq!(decode(&[0xFF], 0), Err(DecodeError::UnknownOpcode(0xFF)));
}

#[test]
fn ip_past_end_is_out_of_bounds() {
    let buf = [op::PROCEED];
    assert_eq!(decode(&buf, 1), Err(DecodeError::OutOfBounds));
}

#[test]
fn truncated_operand_is_reported() {
    let buf = [op::SET_VAR, mode::REG_ADDR];
    assert_eq!(decode(&buf, 0), Err(DecodeError::Truncated));
}
