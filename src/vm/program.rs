//! Program - A linked, loadable T3 image

use super::instruction::Instruction;
use crate::error::{Result, TernaryError};
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Address space a symbol lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SymbolSpace {
    /// Instruction index
    Code,
    /// Byte offset into the data section
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProgramSymbol {
    pub address: usize,
    pub space: SymbolSpace,
}

/// Linked instructions, initial data, entry point and symbol map.
///
/// Code is kept as encoded bytes so the interpreter decodes on fetch.
/// Symbols are debug metadata and do not take part in equality.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Program {
    code: Vec<u8>,
    /// Copied to address 0 on load
    pub data: Vec<u8>,
    /// Instruction index execution starts at
    pub entry: usize,
    pub symbols: BTreeMap<String, ProgramSymbol>,
}

impl Program {
    pub fn new(instructions: &[Instruction]) -> Self {
        Self {
            code: Instruction::to_bytes_all(instructions),
            ..Self::default()
        }
    }

    /// Program from raw code bytes (length must be a multiple of 8)
    pub fn from_code_bytes(code: Vec<u8>) -> Result<Self> {
        if code.len() % Instruction::SIZE != 0 {
            return Err(TernaryError::overflow(format!(
                "code section of {} bytes (not a multiple of {})",
                code.len(),
                Instruction::SIZE
            )));
        }
        Ok(Self {
            code,
            ..Self::default()
        })
    }

    pub fn with_data(mut self, data: impl Into<Vec<u8>>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_entry(mut self, entry: usize) -> Self {
        self.entry = entry;
        self
    }

    pub fn code_bytes(&self) -> &[u8] {
        &self.code
    }

    /// Number of instructions
    pub fn len(&self) -> usize {
        self.code.len() / Instruction::SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    /// Raw bytes of instruction `index`
    pub fn raw(&self, index: usize) -> Option<[u8; 8]> {
        let start = index.checked_mul(Instruction::SIZE)?;
        let chunk = self.code.get(start..start + Instruction::SIZE)?;
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(chunk);
        Some(bytes)
    }

    /// Decode instruction `index`
    pub fn instruction(&self, index: usize) -> Result<Instruction> {
        let raw = self
            .raw(index)
            .ok_or_else(|| TernaryError::overflow(format!("instruction index {}", index)))?;
        Instruction::from_bytes(&raw)
    }

    /// Decode every instruction
    pub fn instructions(&self) -> Result<Vec<Instruction>> {
        Instruction::parse_all(&self.code)
    }

    pub fn symbol(&self, name: &str) -> Option<ProgramSymbol> {
        self.symbols.get(name).copied()
    }

    /// Name of the code symbol at `index`, if any
    pub fn label_at(&self, index: usize) -> Option<&str> {
        self.symbols
            .iter()
            .find(|(_, s)| s.space == SymbolSpace::Code && s.address == index)
            .map(|(name, _)| name.as_str())
    }
}

impl PartialEq for Program {
    fn eq(&self, other: &Self) -> bool {
        self.code == other.code && self.data == other.data && self.entry == other.entry
    }
}

impl Eq for Program {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::register::Reg;

    #[test]
    fn test_program_decode() {
        let program = Program::new(&[Instruction::li(Reg::R1, 5), Instruction::halt()]);
        assert_eq!(program.len(), 2);
        assert_eq!(program.instruction(0).unwrap(), Instruction::li(Reg::R1, 5));
        assert!(program.instruction(2).is_err());
        assert_eq!(program.raw(1).unwrap()[0], 0x01);
    }

    #[test]
    fn test_code_bytes_validation() {
        assert!(Program::from_code_bytes(vec![0; 12]).is_err());
        let program = Program::from_code_bytes(vec![0xEE, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        assert!(matches!(
            program.instruction(0),
            Err(TernaryError::BadOpcode(0xEE))
        ));
    }

    #[test]
    fn test_equality_ignores_symbols() {
        let a = Program::new(&[Instruction::halt()]).with_data(b"hi".to_vec());
        let mut b = a.clone();
        b.symbols.insert(
            "main".to_string(),
            ProgramSymbol {
                address: 0,
                space: SymbolSpace::Code,
            },
        );
        assert_eq!(a, b);
        assert_eq!(b.label_at(0), Some("main"));
        assert_ne!(a, b.clone().with_entry(1));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_roundtrip() {
        let program = Program::new(&[Instruction::li(Reg::R1, -7), Instruction::halt()])
            .with_data(b"abc".to_vec())
            .with_entry(1);
        let json = serde_json::to_string(&program).unwrap();
        let restored: Program = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, program);
    }
}
