// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright 2026 Contributors

//! Byte-code format: opcodes, addressing-mode bytes, and instruction
//! decoding.
//!
//! Unlike a fixed-width word format, instructions here are variable-length
//! byte sequences: a 1-byte opcode, then operand bytes whose count and
//! meaning depend on the opcode (see the table in `src/interp`).

#[cfg(test)]
mod bytecode_test;

/// Opcode constants, values `0x01..=0x0E`.
pub mod op {
    pub const PUT_STRUC: u8 = 0x01;
    pub const SET_VAR: u8 = 0x02;
    pub const SET_VAL: u8 = 0x03;
    pub const GET_STRUC: u8 = 0x04;
    pub const UNIFY_VAR: u8 = 0x05;
    pub const UNIFY_VAL: u8 = 0x06;
    pub const PUT_VAR: u8 = 0x07;
    pub const PUT_VAL: u8 = 0x08;
    pub const GET_VAR: u8 = 0x09;
    pub const GET_VAL: u8 = 0x0A;
    pub const CALL: u8 = 0x0B;
    pub const PROCEED: u8 = 0x0C;
    pub const ALLOCATE: u8 = 0x0D;
    pub const DEALLOCATE: u8 = 0x0E;
}

/// Addressing-mode byte values.
pub mod mode {
    /// Slot index is an absolute register address `0..REG_SIZE`.
    pub const REG_ADDR: u8 = 0x01;
    /// Slot index is a permanent-variable index within the current frame.
    pub const STACK_ADDR: u8 = 0x02;
}

/// Sentinel `p/n` call target meaning "unlinked predicate".
pub const UNLINKED_CALL: i32 = -1;

/// A decoded instruction together with the byte length it occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Instr {
    PutStruc { mode: u8, xi: u8, functor_id: u32, arity: u8 },
    SetVar { mode: u8, xi: u8 },
    SetVal { mode: u8, xi: u8 },
    GetStruc { mode: u8, xi: u8, functor_id: u32, arity: u8 },
    UnifyVar { mode: u8, xi: u8 },
    UnifyVal { mode: u8, xi: u8 },
    PutVar { mode: u8, xi: u8, ai: u8 },
    PutVal { mode: u8, xi: u8, ai: u8 },
    GetVar { mode: u8, xi: u8, ai: u8 },
    GetVal { mode: u8, xi: u8, ai: u8 },
    Call { target: i32 },
    Proceed,
    Allocate { n: u32 },
    Deallocate,
}

impl Instr {
    /// Byte length this instruction occupies in the code buffer, including
    /// its opcode byte.
    #[must_use]
    pub const fn len(self) -> usize {
        match self {
            Self::PutStruc { .. } | Self::GetStruc { .. } => 7,
            Self::SetVar { .. }
            | Self::SetVal { .. }
            | Self::UnifyVar { .. }
            | Self::UnifyVal { .. } => 3,
            Self::PutVar { .. } | Self::PutVal { .. } | Self::GetVar { .. } | Self::GetVal { .. } => 4,
            Self::Call { .. } => 5,
            Self::Proceed | Self::Deallocate => 1,
            Self::Allocate { .. } => 2,
        }
    }
}

/// Errors decoding an instruction out of a byte-code buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DecodeError {
    /// `ip` is at or past the end of the buffer.
    OutOfBounds,
    /// The opcode byte names no known instruction.
    UnknownOpcode(u8),
    /// An operand byte was truncated by the end of the buffer.
    Truncated,
}

fn read_u8(buf: &[u8], at: usize) -> Result<u8, DecodeError> {
    buf.get(at).copied().ok_or(DecodeError::Truncated)
}

fn read_u32(buf: &[u8], at: usize) -> Result<u32, DecodeError> {
    let bytes = buf.get(at..at + 4).ok_or(DecodeError::Truncated)?;
    Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn read_i32(buf: &[u8], at: usize) -> Result<i32, DecodeError> {
    read_u32(buf, at).map(|w| w as i32)
}

/// Decode the instruction at byte offset `ip` in `buf`.
///
/// # Errors
///
/// Returns [`DecodeError::OutOfBounds`] if `ip` is at or past `buf.len()`,
/// [`DecodeError::UnknownOpcode`] if the opcode byte is unrecognised, or
/// [`DecodeError::Truncated`] if an operand runs past the buffer's end.
pub fn decode(buf: &[u8], ip: usize) -> Result<Instr, DecodeError> {
    let opcode = *buf.get(ip).ok_or(DecodeError::OutOfBounds)?;
    match opcode {
        op::PUT_STRUC | op::GET_STRUC => {
            let mode = read_u8(buf, ip + 1)?;
            let xi = read_u8(buf, ip + 2)?;
            let functor_word = read_u32(buf, ip + 3)?;
            let functor_id = functor_word >> 8;
            let arity = (functor_word & 0xFF) as u8;
            if opcode == op::PUT_STRUC {
                Ok(Instr::PutStruc { mode, xi, functor_id, arity })
            } else {
                Ok(Instr::GetStruc { mode, xi, functor_id, arity })
            }
        }
        op::SET_VAR => Ok(Instr::SetVar { mode: read_u8(buf, ip + 1)?, xi: read_u8(buf, ip + 2)? }),
        op::SET_VAL => Ok(Instr::SetVal { mode: read_u8(buf, ip + 1)?, xi: read_u8(buf, ip + 2)? }),
        op::UNIFY_VAR => Ok(Instr::UnifyVar { mode: read_u8(buf, ip + 1)?, xi: read_u8(buf, ip + 2)? }),
        op::UNIFY_VAL => Ok(Instr::UnifyVal { mode: read_u8(buf, ip + 1)?, xi: read_u8(buf, ip + 2)? }),
        op::PUT_VAR => Ok(Instr::PutVar {
            mode: read_u8(buf, ip + 1)?,
            xi: read_u8(buf, ip + 2)?,
            ai: read_u8(buf, ip + 3)?,
        }),
        op::PUT_VAL => Ok(Instr::PutVal {
            mode: read_u8(buf, ip + 1)?,
            xi: read_u8(buf, ip + 2)?,
            ai: read_u8(buf, ip + 3)?,
        }),
        op::GET_VAR => Ok(Instr::GetVar {
            mode: read_u8(buf, ip + 1)?,
            xi: read_u8(buf, ip + 2)?,
            ai: read_u8(buf, ip + 3)?,
        }),
        op::GET_VAL => Ok(Instr::GetVal {
            mode: read_u8(buf, ip + 1)?,
            xi: read_u8(buf, ip + 2)?,
            ai: read_u8(buf, ip + 3)?,
        }),
        op::CALL => Ok(Instr::Call { target: read_i32(buf, ip + 1)? }),
        op::PROCEED => Ok(Instr::Proceed),
        op::ALLOCATE => Ok(Instr::Allocate { n: u32::from(read_u8(buf, ip + 1)?) }),
        op::DEALLOCATE => Ok(Instr::Deallocate),
        other => Err(DecodeError::UnknownOpcode(other)),
    }
}
