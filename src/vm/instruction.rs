//! Instruction - 8-byte instruction format for the T3-ISA
//!
//! ## Format
//!
//! ```text
//! [OPCODE:1][RD:1][RS1:1][RS2:1][IMM:2][RESERVED:2]
//!     ↓       ↓     ↓      ↓      ↓        ↓
//!  opcode   dest  src1   src2  i16 LE    zero
//!
//! Total: 8 bytes
//! ```
//!
//! ## Examples
//!
//! ```text
//! ADD R2, R0, R1
//!   OPCODE = 0x20, RD = 0x02, RS1 = 0x00, RS2 = 0x01, IMM = 0
//!
//! JNZ R3, -4
//!   OPCODE = 0x42, RD = 0x00, RS1 = 0x03, RS2 = 0x00, IMM = 0xFFFC
//! ```

use super::opcode::{OperandPattern, Opcode};
use super::register::Reg;
use crate::error::{Result, TernaryError};
use crate::gate::DyadicGate;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A T3 instruction (8 bytes on the wire)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Instruction {
    pub opcode: Opcode,
    /// Destination register
    pub rd: Reg,
    /// First source register (base address for LOAD/STORE)
    pub rs1: Reg,
    /// Second source register (stored value for STORE)
    pub rs2: Reg,
    /// Signed immediate; GATE reads it as an unsigned gate index
    pub imm: i16,
}

impl Instruction {
    /// Instruction size in bytes
    pub const SIZE: usize = 8;

    pub const fn new(opcode: Opcode, rd: Reg, rs1: Reg, rs2: Reg, imm: i16) -> Self {
        Self {
            opcode,
            rd,
            rs1,
            rs2,
            imm,
        }
    }

    /// Instruction with no operands
    pub const fn system(opcode: Opcode) -> Self {
        Self::new(opcode, Reg::R0, Reg::R0, Reg::R0, 0)
    }

    // =========================================================================
    // Common Instruction Builders
    // =========================================================================

    pub const fn nop() -> Self {
        Self::system(Opcode::Nop)
    }

    pub const fn halt() -> Self {
        Self::system(Opcode::Halt)
    }

    pub const fn syscall() -> Self {
        Self::system(Opcode::Syscall)
    }

    /// rd = imm
    pub const fn li(rd: Reg, imm: i16) -> Self {
        Self::new(Opcode::Li, rd, Reg::R0, Reg::R0, imm)
    }

    /// rd = rs1
    pub const fn mov(rd: Reg, rs1: Reg) -> Self {
        Self::new(Opcode::Mov, rd, rs1, Reg::R0, 0)
    }

    /// rd = mem[rs1 + offset]
    pub const fn load(rd: Reg, base: Reg, offset: i16) -> Self {
        Self::new(Opcode::Load, rd, base, Reg::R0, offset)
    }

    /// mem[base + offset] = value
    pub const fn store(value: Reg, base: Reg, offset: i16) -> Self {
        Self::new(Opcode::Store, Reg::R0, base, value, offset)
    }

    /// Three-register form used by ADD/SUB/MUL/DIV/AND/OR/XOR
    pub const fn binary(opcode: Opcode, rd: Reg, rs1: Reg, rs2: Reg) -> Self {
        Self::new(opcode, rd, rs1, rs2, 0)
    }

    /// Two-register form used by NEG/NOT
    pub const fn unary(opcode: Opcode, rd: Reg, rs1: Reg) -> Self {
        Self::new(opcode, rd, rs1, Reg::R0, 0)
    }

    pub const fn add(rd: Reg, rs1: Reg, rs2: Reg) -> Self {
        Self::binary(Opcode::Add, rd, rs1, rs2)
    }

    pub const fn sub(rd: Reg, rs1: Reg, rs2: Reg) -> Self {
        Self::binary(Opcode::Sub, rd, rs1, rs2)
    }

    pub const fn inc(rd: Reg) -> Self {
        Self::new(Opcode::Inc, rd, Reg::R0, Reg::R0, 0)
    }

    pub const fn dec(rd: Reg) -> Self {
        Self::new(Opcode::Dec, rd, Reg::R0, Reg::R0, 0)
    }

    /// rd = gate(rs1[i], rs2[i]) for every trit position
    pub fn gate(rd: Reg, rs1: Reg, rs2: Reg, gate: DyadicGate) -> Self {
        Self::new(Opcode::Gate, rd, rs1, rs2, gate.index() as u16 as i16)
    }

    /// PC-relative jump
    pub const fn jmp(offset: i16) -> Self {
        Self::new(Opcode::Jmp, Reg::R0, Reg::R0, Reg::R0, offset)
    }

    /// Conditional PC-relative jump (JZ/JNZ/JPOS/JNEG) testing `rs1`
    pub const fn branch(opcode: Opcode, rs1: Reg, offset: i16) -> Self {
        Self::new(opcode, Reg::R0, rs1, Reg::R0, offset)
    }

    pub const fn call(offset: i16) -> Self {
        Self::new(Opcode::Call, Reg::R0, Reg::R0, Reg::R0, offset)
    }

    pub const fn ret() -> Self {
        Self::system(Opcode::Ret)
    }

    pub const fn push(rs1: Reg) -> Self {
        Self::new(Opcode::Push, Reg::R0, rs1, Reg::R0, 0)
    }

    pub const fn pop(rd: Reg) -> Self {
        Self::new(Opcode::Pop, rd, Reg::R0, Reg::R0, 0)
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    pub fn to_bytes(&self) -> [u8; 8] {
        let imm = self.imm.to_le_bytes();
        [
            self.opcode.as_u8(),
            self.rd.byte(),
            self.rs1.byte(),
            self.rs2.byte(),
            imm[0],
            imm[1],
            0,
            0,
        ]
    }

    /// Decode 8 bytes, rejecting unknown opcodes and register bytes above 15
    pub fn from_bytes(bytes: &[u8; 8]) -> Result<Self> {
        let opcode = Opcode::try_from(bytes[0])?;
        let rd = Reg::new(bytes[1])?;
        let rs1 = Reg::new(bytes[2])?;
        let rs2 = Reg::new(bytes[3])?;
        let imm = i16::from_le_bytes([bytes[4], bytes[5]]);
        Ok(Self::new(opcode, rd, rs1, rs2, imm))
    }

    /// Parse instructions from a byte slice
    pub fn parse_all(bytes: &[u8]) -> Result<Vec<Self>> {
        if bytes.len() % Self::SIZE != 0 {
            return Err(TernaryError::overflow(format!(
                "code section of {} bytes (not a multiple of {})",
                bytes.len(),
                Self::SIZE
            )));
        }
        let mut result = Vec::with_capacity(bytes.len() / Self::SIZE);
        for chunk in bytes.chunks_exact(Self::SIZE) {
            let mut arr = [0u8; Self::SIZE];
            arr.copy_from_slice(chunk);
            result.push(Self::from_bytes(&arr)?);
        }
        Ok(result)
    }

    /// Serialize multiple instructions to bytes
    pub fn to_bytes_all(instructions: &[Self]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(instructions.len() * Self::SIZE);
        for instr in instructions {
            bytes.extend_from_slice(&instr.to_bytes());
        }
        bytes
    }

    // =========================================================================
    // Query Methods
    // =========================================================================

    /// Immediate as an unsigned gate index (GATE)
    pub fn gate_index(&self) -> u32 {
        self.imm as u16 as u32
    }

    /// Branch target for a PC-relative instruction at `pc`
    pub fn branch_target(&self, pc: usize) -> i64 {
        pc as i64 + self.imm as i64
    }

    pub fn modifies_pc(&self) -> bool {
        self.opcode.modifies_pc()
    }

    /// Registers read by this instruction
    pub fn reads(&self) -> Vec<Reg> {
        match self.opcode.operands() {
            OperandPattern::None => match self.opcode {
                Opcode::Syscall => vec![Reg::R0],
                _ => Vec::new(),
            },
            OperandPattern::Rd => match self.opcode {
                Opcode::Pop => Vec::new(),
                _ => vec![self.rd],
            },
            OperandPattern::Rs1 | OperandPattern::RdRs1 => vec![self.rs1],
            OperandPattern::Rs1Imm | OperandPattern::RdRs1Imm => vec![self.rs1],
            OperandPattern::RdRs1Rs2 | OperandPattern::RdRs1Rs2Imm => vec![self.rs1, self.rs2],
            OperandPattern::Rs2Rs1Imm => vec![self.rs2, self.rs1],
            OperandPattern::RdImm | OperandPattern::Imm => Vec::new(),
        }
    }

    /// Register written by this instruction, if any
    pub fn writes(&self) -> Option<Reg> {
        match self.opcode.operands() {
            OperandPattern::Rd
            | OperandPattern::RdRs1
            | OperandPattern::RdImm
            | OperandPattern::RdRs1Rs2
            | OperandPattern::RdRs1Rs2Imm
            | OperandPattern::RdRs1Imm => Some(self.rd),
            _ => None,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let op = self.opcode;
        match op.operands() {
            OperandPattern::None => write!(f, "{}", op),
            OperandPattern::Rd => write!(f, "{} {}", op, self.rd),
            OperandPattern::Rs1 => write!(f, "{} {}", op, self.rs1),
            OperandPattern::RdRs1 => write!(f, "{} {}, {}", op, self.rd, self.rs1),
            OperandPattern::RdImm => write!(f, "{} {}, {}", op, self.rd, self.imm),
            OperandPattern::RdRs1Rs2 => {
                write!(f, "{} {}, {}, {}", op, self.rd, self.rs1, self.rs2)
            }
            OperandPattern::RdRs1Rs2Imm => write!(
                f,
                "{} {}, {}, {}, {}",
                op,
                self.rd,
                self.rs1,
                self.rs2,
                self.gate_index()
            ),
            OperandPattern::RdRs1Imm => {
                write!(f, "{} {}, {}, {}", op, self.rd, self.rs1, self.imm)
            }
            OperandPattern::Rs2Rs1Imm => {
                write!(f, "{} {}, {}, {}", op, self.rs2, self.rs1, self.imm)
            }
            OperandPattern::Imm => write!(f, "{} {}", op, self.imm),
            OperandPattern::Rs1Imm => write!(f, "{} {}, {}", op, self.rs1, self.imm),
        }
    }
}

impl Default for Instruction {
    fn default() -> Self {
        Self::nop()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instruction_roundtrip() {
        let instr = Instruction::add(Reg::R2, Reg::R0, Reg::R1);
        let bytes = instr.to_bytes();
        assert_eq!(bytes, [0x20, 2, 0, 1, 0, 0, 0, 0]);
        assert_eq!(Instruction::from_bytes(&bytes).unwrap(), instr);
    }

    #[test]
    fn test_negative_immediate_little_endian() {
        let instr = Instruction::branch(Opcode::Jnz, Reg::R3, -4);
        let bytes = instr.to_bytes();
        assert_eq!(&bytes[4..6], &[0xFC, 0xFF]);
        assert_eq!(Instruction::from_bytes(&bytes).unwrap().imm, -4);
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            Instruction::from_bytes(&[0xEE, 0, 0, 0, 0, 0, 0, 0]),
            Err(TernaryError::BadOpcode(0xEE))
        ));
        assert!(matches!(
            Instruction::from_bytes(&[0x20, 16, 0, 0, 0, 0, 0, 0]),
            Err(TernaryError::BadRegister(16))
        ));
    }

    #[test]
    fn test_gate_index_unsigned() {
        let instr = Instruction::gate(Reg::R1, Reg::R2, Reg::R3, DyadicGate::KLEENE_OR);
        assert!(instr.imm < 0);
        assert_eq!(instr.gate_index(), crate::gate::KLEENE_OR);
    }

    #[test]
    fn test_parse_all() {
        let instructions = vec![
            Instruction::li(Reg::R0, 1),
            Instruction::push(Reg::R0),
            Instruction::pop(Reg::R1),
            Instruction::halt(),
        ];

        let bytes = Instruction::to_bytes_all(&instructions);
        assert_eq!(bytes.len(), 32);

        let parsed = Instruction::parse_all(&bytes).unwrap();
        assert_eq!(parsed, instructions);
        assert!(Instruction::parse_all(&bytes[..7]).is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(
            Instruction::store(Reg::R1, Reg::R15, 7).to_string(),
            "STORE R1, R15, 7"
        );
        assert_eq!(Instruction::load(Reg::R4, Reg::R2, 0).to_string(), "LOAD R4, R2, 0");
        assert_eq!(Instruction::call(-3).to_string(), "CALL -3");
        assert_eq!(Instruction::ret().to_string(), "RET");
        assert_eq!(
            Instruction::branch(Opcode::Jz, Reg::R6, 5).to_string(),
            "JZ R6, 5"
        );
    }

    #[test]
    fn test_reads_writes() {
        let store = Instruction::store(Reg::R1, Reg::R15, 0);
        assert_eq!(store.reads(), vec![Reg::R1, Reg::R15]);
        assert_eq!(store.writes(), None);
        assert_eq!(Instruction::pop(Reg::R3).writes(), Some(Reg::R3));
        assert!(Instruction::pop(Reg::R3).reads().is_empty());
    }
}
