//! Register - The TVM register file
//!
//! ```text
//! R0..R15   general purpose (R0 doubles as the syscall number register)
//! PC        program counter (instruction index)
//! SP        stack pointer (byte address, grows downward)
//! FLAGS     condition codes as trits
//! ```
//!
//! Every register is a 27-trit word. FLAGS layout:
//!
//! ```text
//! FLAGS[0] sign      sign of the last result
//! FLAGS[1] zero      +1 when the last result was zero
//! FLAGS[2] overflow  +1 positive / -1 negative wrap
//! FLAGS[3] carry     carry out of trit 0 of the last arithmetic result
//! ```

use crate::error::{Result, TernaryError};
use crate::trit::Trit;
use crate::trit_array::TritArray;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Trits per register word
pub const WORD_TRITS: usize = 27;

/// Number of general-purpose registers
pub const REGISTER_COUNT: usize = 16;

/// A register-width trit array
pub type Word = TritArray;

/// Numeric value of a register-width word.
///
/// 27 trits always fit in i64, so the conversion cannot fail for words
/// produced by the register file.
pub fn word_value(word: &Word) -> i64 {
    word.to_i128().map(|v| v as i64).unwrap_or_default()
}

/// Wrap `value` into a register-width word, returning the overflow direction
pub fn word_from(value: i128) -> (Word, Trit) {
    TritArray::wrapping(value, WORD_TRITS)
}

/// A general-purpose register reference (R0-R15).
///
/// Only [`Reg::new`], [`Reg::parse`] and the named constants build one, so
/// every `Reg` indexes the register file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u8", into = "u8"))]
pub struct Reg(u8);

impl Reg {
    pub const R0: Self = Self(0);
    pub const R1: Self = Self(1);
    pub const R2: Self = Self(2);
    pub const R3: Self = Self(3);
    pub const R4: Self = Self(4);
    pub const R5: Self = Self(5);
    pub const R6: Self = Self(6);
    pub const R7: Self = Self(7);
    pub const R8: Self = Self(8);
    pub const R9: Self = Self(9);
    pub const R10: Self = Self(10);
    pub const R11: Self = Self(11);
    pub const R12: Self = Self(12);
    pub const R13: Self = Self(13);
    pub const R14: Self = Self(14);
    pub const R15: Self = Self(15);

    /// Create a register, rejecting indices above 15
    pub fn new(index: u8) -> Result<Self> {
        if index as usize >= REGISTER_COUNT {
            return Err(TernaryError::BadRegister(index));
        }
        Ok(Self(index))
    }

    pub const fn index(&self) -> usize {
        self.0 as usize
    }

    /// Encoded register byte
    pub const fn byte(&self) -> u8 {
        self.0
    }

    /// Parse `R0`..`R15` (case-insensitive)
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        let digits = s.strip_prefix('R').or_else(|| s.strip_prefix('r'))?;
        let index: u8 = digits.parse().ok()?;
        Self::new(index).ok()
    }
}

impl TryFrom<u8> for Reg {
    type Error = TernaryError;

    fn try_from(index: u8) -> Result<Self> {
        Self::new(index)
    }
}

impl From<Reg> for u8 {
    fn from(reg: Reg) -> u8 {
        reg.0
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0)
    }
}

/// Condition-code positions in FLAGS
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Flag {
    Sign = 0,
    Zero = 1,
    Overflow = 2,
    Carry = 3,
}

/// Full register state
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegisterFile {
    gpr: Vec<Word>,
    pc: Word,
    sp: Word,
    flags: Word,
}

impl RegisterFile {
    pub fn new() -> Self {
        Self {
            gpr: vec![TritArray::zeros(WORD_TRITS); REGISTER_COUNT],
            pc: TritArray::zeros(WORD_TRITS),
            sp: TritArray::zeros(WORD_TRITS),
            flags: TritArray::zeros(WORD_TRITS),
        }
    }

    /// Zero every register
    pub fn clear(&mut self) {
        *self = Self::new();
    }

    pub fn get(&self, reg: Reg) -> &Word {
        &self.gpr[reg.index()]
    }

    /// Store a word; it must already be register width
    pub fn set(&mut self, reg: Reg, word: Word) {
        debug_assert_eq!(word.len(), WORD_TRITS);
        self.gpr[reg.index()] = word;
    }

    pub fn read(&self, reg: Reg) -> i64 {
        word_value(self.get(reg))
    }

    /// Write an integer, wrapping into word range; returns the overflow trit
    pub fn write(&mut self, reg: Reg, value: i64) -> Trit {
        let (word, overflow) = word_from(value as i128);
        self.set(reg, word);
        overflow
    }

    pub fn pc(&self) -> usize {
        word_value(&self.pc).max(0) as usize
    }

    pub fn pc_word(&self) -> &Word {
        &self.pc
    }

    pub fn set_pc(&mut self, pc: usize) {
        self.pc = word_from(pc as i128).0;
    }

    pub fn sp(&self) -> i64 {
        word_value(&self.sp)
    }

    pub fn sp_word(&self) -> &Word {
        &self.sp
    }

    pub fn set_sp(&mut self, sp: i64) {
        self.sp = word_from(sp as i128).0;
    }

    pub fn flags(&self) -> &Word {
        &self.flags
    }

    pub fn flag(&self, flag: Flag) -> Trit {
        self.flags.trit(flag as usize)
    }

    pub fn set_flag(&mut self, flag: Flag, value: Trit) {
        self.flags.set(flag as usize, value);
    }

    /// Update sign and zero from a result word
    pub fn set_result_flags(&mut self, result: &Word) {
        self.set_flag(Flag::Sign, result.sign());
        self.set_flag(
            Flag::Zero,
            if result.is_zero() { Trit::Pos } else { Trit::Zero },
        );
    }

    /// Update sign, zero, overflow and carry after arithmetic
    pub fn set_arith_flags(&mut self, result: &Word, overflow: Trit, carry: Trit) {
        self.set_result_flags(result);
        self.set_flag(Flag::Overflow, overflow);
        self.set_flag(Flag::Carry, carry);
    }
}

impl Default for RegisterFile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_parse() {
        assert_eq!(Reg::parse("R0"), Some(Reg::R0));
        assert_eq!(Reg::parse("r15"), Some(Reg::R15));
        assert_eq!(Reg::parse("R16"), None);
        assert_eq!(Reg::parse("X1"), None);
        assert!(matches!(Reg::new(16), Err(TernaryError::BadRegister(16))));
        assert_eq!(Reg::R13.to_string(), "R13");
    }

    #[test]
    fn test_register_bounds() {
        for index in 0..REGISTER_COUNT as u8 {
            let reg = Reg::new(index).unwrap();
            assert_eq!(reg.byte(), index);
            assert_eq!(Reg::try_from(index).unwrap(), reg);
        }
        assert!(matches!(Reg::new(20), Err(TernaryError::BadRegister(20))));
        assert!(Reg::try_from(255).is_err());

        // Every constructible register indexes the file
        let mut regs = RegisterFile::new();
        regs.write(Reg::R14, 9);
        assert_eq!(regs.read(Reg::R14), 9);
        assert_eq!(u8::from(Reg::R15), 15);
    }

    #[test]
    fn test_read_write() {
        let mut regs = RegisterFile::new();
        assert_eq!(regs.write(Reg::R3, -42), Trit::Zero);
        assert_eq!(regs.read(Reg::R3), -42);
        assert_eq!(regs.get(Reg::R3).len(), WORD_TRITS);

        let max = crate::trit_array::max_magnitude(WORD_TRITS).unwrap() as i64;
        assert_eq!(regs.write(Reg::R4, max + 1), Trit::Pos);
        assert_eq!(regs.read(Reg::R4), -max);
    }

    #[test]
    fn test_special_registers() {
        let mut regs = RegisterFile::new();
        regs.set_pc(17);
        regs.set_sp(65536);
        assert_eq!(regs.pc(), 17);
        assert_eq!(regs.sp(), 65536);
    }

    #[test]
    fn test_flags() {
        let mut regs = RegisterFile::new();
        regs.set_result_flags(&TritArray::zeros(WORD_TRITS));
        assert_eq!(regs.flag(Flag::Zero), Trit::Pos);
        assert_eq!(regs.flag(Flag::Sign), Trit::Zero);

        let (neg, _) = word_from(-5);
        regs.set_arith_flags(&neg, Trit::Neg, Trit::Pos);
        assert_eq!(regs.flag(Flag::Zero), Trit::Zero);
        assert_eq!(regs.flag(Flag::Sign), Trit::Neg);
        assert_eq!(regs.flag(Flag::Overflow), Trit::Neg);
        assert_eq!(regs.flag(Flag::Carry), Trit::Pos);
    }
}
