//! Redcode instruction representation.
//!
//! Every core cell holds one [`Instruction`]: an operation code plus an A and
//! a B operand, each made of an addressing [`Mode`] and an integer field.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Addressing mode of an operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    /// `#field`: the field itself is the value.
    Immediate,
    /// `field`: the field is an offset relative to the executing cell.
    #[default]
    Direct,
    /// `@field`: the A-field of the cell at the offset is a second offset.
    Indirect,
}

impl Mode {
    /// Parse a source prefix character (`#`, `@`) into a mode.
    pub fn from_prefix(prefix: Option<char>) -> Option<Self> {
        match prefix {
            None => Some(Mode::Direct),
            Some('#') => Some(Mode::Immediate),
            Some('@') => Some(Mode::Indirect),
            Some(_) => None,
        }
    }

    /// Source prefix for this mode (empty for direct).
    pub fn prefix(self) -> &'static str {
        match self {
            Mode::Immediate => "#",
            Mode::Direct => "",
            Mode::Indirect => "@",
        }
    }
}

/// The thirteen operation codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OpCode {
    // ==================== Data ====================
    /// Terminate the executing thread.
    #[default]
    Dat,
    /// B.a := A.value
    Mov,

    // ==================== Arithmetic ====================
    /// B.a := B.value + A.value
    Add,
    /// B.a := B.value - A.value
    Sub,
    /// B.a := B.value * A.value
    Mul,
    /// B.a := B.value / A.value (truncated)
    Div,
    /// B.a := B.value % A.value (sign of dividend)
    Mod,

    // ==================== Branching ====================
    /// Continue at A.address.
    Jmp,
    /// Continue at B.address if A.value is zero.
    Jmz,
    /// Skip the next cell if A.value equals B.value.
    Cmp,

    // ==================== Special ====================
    /// Spawn a new thread at A.address.
    Frk,
    /// Reset the cell at A.address.
    Clr,
    /// Copy the cell at A.address to B.address.
    Cpy,
}

impl OpCode {
    /// All operation codes, in declaration order.
    pub const ALL: [OpCode; 13] = [
        OpCode::Dat,
        OpCode::Mov,
        OpCode::Add,
        OpCode::Sub,
        OpCode::Mul,
        OpCode::Div,
        OpCode::Mod,
        OpCode::Jmp,
        OpCode::Jmz,
        OpCode::Cmp,
        OpCode::Frk,
        OpCode::Clr,
        OpCode::Cpy,
    ];

    /// The three-letter mnemonic.
    pub fn mnemonic(self) -> &'static str {
        match self {
            OpCode::Dat => "DAT",
            OpCode::Mov => "MOV",
            OpCode::Add => "ADD",
            OpCode::Sub => "SUB",
            OpCode::Mul => "MUL",
            OpCode::Div => "DIV",
            OpCode::Mod => "MOD",
            OpCode::Jmp => "JMP",
            OpCode::Jmz => "JMZ",
            OpCode::Cmp => "CMP",
            OpCode::Frk => "FRK",
            OpCode::Clr => "CLR",
            OpCode::Cpy => "CPY",
        }
    }
}

impl FromStr for OpCode {
    type Err = UnknownOpCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        OpCode::ALL
            .into_iter()
            .find(|op| op.mnemonic() == s)
            .ok_or_else(|| UnknownOpCode(s.to_string()))
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A mnemonic that names none of the thirteen operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid op-code: {0}")]
pub struct UnknownOpCode(pub String);

/// One core cell.
///
/// The default value, `DAT 0, 0` with direct operands, is what an empty or
/// cleared cell holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Instruction {
    pub op: OpCode,
    pub a_mode: Mode,
    pub a_field: i64,
    pub b_mode: Mode,
    pub b_field: i64,
}

impl Instruction {
    /// Build an instruction from its parts.
    pub const fn new(op: OpCode, a_mode: Mode, a_field: i64, b_mode: Mode, b_field: i64) -> Self {
        Self { op, a_mode, a_field, b_mode, b_field }
    }

    /// Reset to the cleared value in place.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether this cell holds the cleared value.
    pub fn is_cleared(&self) -> bool {
        *self == Self::default()
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}{}, {}{}",
            self.op,
            self.a_mode.prefix(),
            self.a_field,
            self.b_mode.prefix(),
            self.b_field
        )
    }
}
