//! Opcode - T3-ISA mnemonics
//!
//! Opcodes are grouped by class in 16-opcode ranges:
//!
//! | Range | Class          | Mnemonics                                   |
//! |-------|----------------|---------------------------------------------|
//! | 0x0x  | System         | NOP, HALT, SYSCALL                          |
//! | 0x1x  | Data movement  | LOAD, STORE, MOV, LI                        |
//! | 0x2x  | Arithmetic     | ADD, SUB, MUL, DIV, NEG, INC, DEC           |
//! | 0x3x  | Logic          | AND, OR, NOT, XOR, GATE                     |
//! | 0x4x  | Control flow   | JMP, JZ, JNZ, JPOS, JNEG, CALL, RET         |
//! | 0x5x  | Stack          | PUSH, POP                                   |

use crate::error::TernaryError;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Operation opcode (1 byte on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[repr(u8)]
pub enum Opcode {
    // System (0x0x)
    Nop = 0x00,
    Halt = 0x01,
    Syscall = 0x02,

    // Data movement (0x1x)
    /// rd = mem[rs1 + imm]
    Load = 0x10,
    /// mem[rs1 + imm] = rs2
    Store = 0x11,
    /// rd = rs1
    Mov = 0x12,
    /// rd = imm
    Li = 0x13,

    // Arithmetic (0x2x)
    Add = 0x20,
    Sub = 0x21,
    Mul = 0x22,
    /// Truncating division
    Div = 0x23,
    Neg = 0x24,
    Inc = 0x25,
    Dec = 0x26,

    // Logic (0x3x)
    And = 0x30,
    Or = 0x31,
    Not = 0x32,
    Xor = 0x33,
    /// rd = dyadic gate imm applied to (rs1, rs2) trit by trit
    Gate = 0x34,

    // Control flow (0x4x), offsets relative to the jumping instruction
    Jmp = 0x40,
    Jz = 0x41,
    Jnz = 0x42,
    Jpos = 0x43,
    Jneg = 0x44,
    Call = 0x45,
    Ret = 0x46,

    // Stack (0x5x)
    Push = 0x50,
    Pop = 0x51,
}

/// Operand layout of an opcode, used by the assembler and disassembler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperandPattern {
    /// No operands
    None,
    /// rd
    Rd,
    /// rs1
    Rs1,
    /// rd, rs1
    RdRs1,
    /// rd, imm
    RdImm,
    /// rd, rs1, rs2
    RdRs1Rs2,
    /// rd, rs1, rs2, imm
    RdRs1Rs2Imm,
    /// rd, rs1, imm
    RdRs1Imm,
    /// rs2, rs1, imm
    Rs2Rs1Imm,
    /// imm
    Imm,
    /// rs1, imm
    Rs1Imm,
}

impl Opcode {
    /// Every opcode in encoding order
    pub const ALL: [Opcode; 28] = [
        Self::Nop,
        Self::Halt,
        Self::Syscall,
        Self::Load,
        Self::Store,
        Self::Mov,
        Self::Li,
        Self::Add,
        Self::Sub,
        Self::Mul,
        Self::Div,
        Self::Neg,
        Self::Inc,
        Self::Dec,
        Self::And,
        Self::Or,
        Self::Not,
        Self::Xor,
        Self::Gate,
        Self::Jmp,
        Self::Jz,
        Self::Jnz,
        Self::Jpos,
        Self::Jneg,
        Self::Call,
        Self::Ret,
        Self::Push,
        Self::Pop,
    ];

    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Decode an opcode byte
    pub fn from_u8(byte: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_u8() == byte)
    }

    /// Class nibble (0x00, 0x10, ...)
    pub const fn category(self) -> u8 {
        self as u8 & 0xF0
    }

    pub const fn mnemonic(self) -> &'static str {
        match self {
            Self::Nop => "NOP",
            Self::Halt => "HALT",
            Self::Syscall => "SYSCALL",
            Self::Load => "LOAD",
            Self::Store => "STORE",
            Self::Mov => "MOV",
            Self::Li => "LI",
            Self::Add => "ADD",
            Self::Sub => "SUB",
            Self::Mul => "MUL",
            Self::Div => "DIV",
            Self::Neg => "NEG",
            Self::Inc => "INC",
            Self::Dec => "DEC",
            Self::And => "AND",
            Self::Or => "OR",
            Self::Not => "NOT",
            Self::Xor => "XOR",
            Self::Gate => "GATE",
            Self::Jmp => "JMP",
            Self::Jz => "JZ",
            Self::Jnz => "JNZ",
            Self::Jpos => "JPOS",
            Self::Jneg => "JNEG",
            Self::Call => "CALL",
            Self::Ret => "RET",
            Self::Push => "PUSH",
            Self::Pop => "POP",
        }
    }

    /// Parse a mnemonic (case-insensitive)
    pub fn from_mnemonic(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(name))
    }

    pub const fn operands(self) -> OperandPattern {
        match self {
            Self::Nop | Self::Halt | Self::Syscall | Self::Ret => OperandPattern::None,
            Self::Inc | Self::Dec | Self::Pop => OperandPattern::Rd,
            Self::Push => OperandPattern::Rs1,
            Self::Mov | Self::Neg | Self::Not => OperandPattern::RdRs1,
            Self::Li => OperandPattern::RdImm,
            Self::Add | Self::Sub | Self::Mul | Self::Div | Self::And | Self::Or | Self::Xor => {
                OperandPattern::RdRs1Rs2
            }
            Self::Gate => OperandPattern::RdRs1Rs2Imm,
            Self::Load => OperandPattern::RdRs1Imm,
            Self::Store => OperandPattern::Rs2Rs1Imm,
            Self::Jmp | Self::Call => OperandPattern::Imm,
            Self::Jz | Self::Jnz | Self::Jpos | Self::Jneg => OperandPattern::Rs1Imm,
        }
    }

    /// Sets PC explicitly (the interpreter must not auto-advance)
    pub const fn modifies_pc(self) -> bool {
        matches!(
            self,
            Self::Jmp | Self::Jz | Self::Jnz | Self::Jpos | Self::Jneg | Self::Call | Self::Ret
        )
    }

    /// Immediate is a PC-relative offset
    pub const fn is_branch(self) -> bool {
        matches!(
            self,
            Self::Jmp | Self::Jz | Self::Jnz | Self::Jpos | Self::Jneg | Self::Call
        )
    }

    /// Control never falls through to the next instruction
    pub const fn is_terminator(self) -> bool {
        matches!(self, Self::Halt | Self::Jmp | Self::Ret)
    }
}

impl TryFrom<u8> for Opcode {
    type Error = TernaryError;

    fn try_from(byte: u8) -> Result<Self, Self::Error> {
        Opcode::from_u8(byte).ok_or(TernaryError::BadOpcode(byte))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic())
    }
}
