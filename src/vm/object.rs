//! Object - Unlinked T3 assembly units and their binary file format
//!
//! ## File Format (all integers little-endian)
//!
//! ```text
//! HEADER (8 bytes)
//! ├── Magic:     "T3\0\x01" (4 bytes)
//! ├── Version:   u16 (= 1)
//! └── Sections:  u16 (section count)
//!
//! SECTION (repeated)
//! ├── NameLen:   u16
//! ├── Name:      [u8; name_len]
//! ├── Kind:      u8 (1 code, 2 data, 3 symbols, 4 relocations)
//! ├── Length:    u32
//! └── Payload:   [u8; length]
//!
//! SYMBOL ENTRY
//! ├── NameLen:   u16
//! ├── Name:      [u8; name_len]
//! ├── Address:   u32 (instruction index, or data byte offset)
//! └── Type:      u8 (low bits: 0 local, 1 global, 2 undefined; bit 7: data space)
//!
//! RELOCATION ENTRY
//! ├── Offset:    u32 (byte offset of the instruction in the code section)
//! ├── Symbol:    u16 (index into the symbol table)
//! └── Kind:      u8 (0 absolute, 1 pc-relative)
//! ```

use super::instruction::Instruction;
use super::program::SymbolSpace;
use anyhow::{Context, Result};
use std::path::Path;

/// Magic bytes for T3 object files
pub const T3_MAGIC: [u8; 4] = [b'T', b'3', 0x00, 0x01];

/// Current object format version
pub const T3_VERSION: u16 = 1;

const HEADER_SIZE: usize = 8;
const DATA_SPACE_BIT: u8 = 0x80;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectionKind {
    Code = 1,
    Data = 2,
    Symbols = 3,
    Relocations = 4,
}

impl SectionKind {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Code),
            2 => Some(Self::Data),
            3 => Some(Self::Symbols),
            4 => Some(Self::Relocations),
            _ => None,
        }
    }
}

/// Symbol visibility
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Binding {
    /// Visible inside its own object only
    Local = 0,
    /// Exported to other objects
    Global = 1,
    /// Referenced here, defined elsewhere
    Undefined = 2,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    pub name: String,
    pub address: u32,
    pub binding: Binding,
    pub space: SymbolSpace,
}

impl Symbol {
    fn type_byte(&self) -> u8 {
        let space = match self.space {
            SymbolSpace::Code => 0,
            SymbolSpace::Data => DATA_SPACE_BIT,
        };
        self.binding as u8 | space
    }

    fn from_type_byte(name: String, address: u32, ty: u8) -> Result<Self> {
        let binding = match ty & !DATA_SPACE_BIT {
            0 => Binding::Local,
            1 => Binding::Global,
            2 => Binding::Undefined,
            other => anyhow::bail!("Invalid symbol binding {} for '{}'", other, name),
        };
        let space = if ty & DATA_SPACE_BIT != 0 {
            SymbolSpace::Data
        } else {
            SymbolSpace::Code
        };
        Ok(Self {
            name,
            address,
            binding,
            space,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RelocKind {
    /// imm = symbol address
    Abs = 0,
    /// imm = symbol address - instruction index
    PcRel = 1,
}

/// A pending patch of one instruction's immediate field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Relocation {
    /// Byte offset of the instruction within this object's code
    pub offset: u32,
    /// Index into this object's symbol table
    pub symbol: u16,
    pub kind: RelocKind,
}

/// Output of the assembler; input of the linker
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Object {
    pub code: Vec<u8>,
    pub data: Vec<u8>,
    pub symbols: Vec<Symbol>,
    pub relocations: Vec<Relocation>,
}

impl Object {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of instructions in the code section
    pub fn instruction_count(&self) -> usize {
        self.code.len() / Instruction::SIZE
    }

    pub fn find_symbol(&self, name: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s.name == name)
    }
}

// =============================================================================
// Serialization
// =============================================================================

fn push_name(buf: &mut Vec<u8>, name: &str) {
    buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
    buf.extend_from_slice(name.as_bytes());
}

fn push_section(buf: &mut Vec<u8>, name: &str, kind: SectionKind, payload: &[u8]) {
    push_name(buf, name);
    buf.push(kind as u8);
    buf.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    buf.extend_from_slice(payload);
}

/// Serialize an object to the T3 file format
pub fn serialize(object: &Object) -> Vec<u8> {
    let mut symtab = Vec::new();
    for sym in &object.symbols {
        push_name(&mut symtab, &sym.name);
        symtab.extend_from_slice(&sym.address.to_le_bytes());
        symtab.push(sym.type_byte());
    }

    let mut reltab = Vec::new();
    for rel in &object.relocations {
        reltab.extend_from_slice(&rel.offset.to_le_bytes());
        reltab.extend_from_slice(&rel.symbol.to_le_bytes());
        reltab.push(rel.kind as u8);
    }

    let mut bytes = Vec::with_capacity(HEADER_SIZE + object.code.len() + object.data.len());
    bytes.extend_from_slice(&T3_MAGIC);
    bytes.extend_from_slice(&T3_VERSION.to_le_bytes());
    bytes.extend_from_slice(&4u16.to_le_bytes());
    push_section(&mut bytes, ".code", SectionKind::Code, &object.code);
    push_section(&mut bytes, ".data", SectionKind::Data, &object.data);
    push_section(&mut bytes, ".symtab", SectionKind::Symbols, &symtab);
    push_section(&mut bytes, ".rel", SectionKind::Relocations, &reltab);
    bytes
}

/// Bounds-checked little-endian reader
struct Reader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn is_empty(&self) -> bool {
        self.offset >= self.data.len()
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let end = self
            .offset
            .checked_add(len)
            .filter(|&end| end <= self.data.len())
            .with_context(|| {
                format!(
                    "Unexpected end of data: need {} bytes at offset {}, have {}",
                    len,
                    self.offset,
                    self.data.len()
                )
            })?;
        let slice = &self.data[self.offset..end];
        self.offset = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into()?))
    }

    fn name(&mut self) -> Result<String> {
        let len = self.u16()? as usize;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)
            .context("Name is not valid UTF-8")?
            .to_string())
    }
}

fn parse_symbols(payload: &[u8]) -> Result<Vec<Symbol>> {
    let mut reader = Reader::new(payload);
    let mut symbols = Vec::new();
    while !reader.is_empty() {
        let name = reader.name()?;
        let address = reader.u32()?;
        let ty = reader.u8()?;
        symbols.push(Symbol::from_type_byte(name, address, ty)?);
    }
    Ok(symbols)
}

fn parse_relocations(payload: &[u8], symbol_count: usize) -> Result<Vec<Relocation>> {
    let mut reader = Reader::new(payload);
    let mut relocations = Vec::new();
    while !reader.is_empty() {
        let offset = reader.u32()?;
        let symbol = reader.u16()?;
        let kind = match reader.u8()? {
            0 => RelocKind::Abs,
            1 => RelocKind::PcRel,
            other => anyhow::bail!("Invalid relocation kind {}", other),
        };
        if symbol as usize >= symbol_count {
            anyhow::bail!(
                "Relocation at offset {} names symbol {} of {}",
                offset,
                symbol,
                symbol_count
            );
        }
        relocations.push(Relocation {
            offset,
            symbol,
            kind,
        });
    }
    Ok(relocations)
}

/// Deserialize a T3 object file
pub fn deserialize(data: &[u8]) -> Result<Object> {
    if data.len() < HEADER_SIZE {
        anyhow::bail!("Header too short: {} bytes", data.len());
    }
    let mut reader = Reader::new(data);
    let magic = reader.take(4)?;
    if magic != T3_MAGIC {
        anyhow::bail!("Invalid magic: expected T3\\0\\x01, got {:02X?}", magic);
    }
    let version = reader.u16()?;
    if version != T3_VERSION {
        anyhow::bail!("Unsupported object version {}", version);
    }
    let section_count = reader.u16()?;

    let mut object = Object::new();
    let mut symbol_payload: &[u8] = &[];
    let mut reloc_payload: &[u8] = &[];

    for i in 0..section_count {
        let name = reader.name().with_context(|| format!("Section {} name", i))?;
        let kind_byte = reader.u8()?;
        let len = reader.u32()? as usize;
        let payload = reader
            .take(len)
            .with_context(|| format!("Section '{}' payload", name))?;

        match SectionKind::from_u8(kind_byte) {
            Some(SectionKind::Code) => {
                if payload.len() % Instruction::SIZE != 0 {
                    anyhow::bail!(
                        "Code section '{}' is {} bytes, not a multiple of {}",
                        name,
                        payload.len(),
                        Instruction::SIZE
                    );
                }
                object.code.extend_from_slice(payload);
            }
            Some(SectionKind::Data) => object.data.extend_from_slice(payload),
            Some(SectionKind::Symbols) => symbol_payload = payload,
            Some(SectionKind::Relocations) => reloc_payload = payload,
            None => {
                log::warn!("Skipping section '{}' of unknown kind {}", name, kind_byte);
            }
        }
    }

    object.symbols = parse_symbols(symbol_payload).context("Symbol table")?;
    object.relocations =
        parse_relocations(reloc_payload, object.symbols.len()).context("Relocation table")?;

    log::debug!(
        "Decoded object: {} instructions, {} data bytes, {} symbols, {} relocations",
        object.instruction_count(),
        object.data.len(),
        object.symbols.len(),
        object.relocations.len()
    );
    Ok(object)
}

/// True when `data` starts with the T3 object magic
pub fn is_object(data: &[u8]) -> bool {
    data.starts_with(&T3_MAGIC)
}

/// Save object to file
pub fn save_to_file(object: &Object, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    std::fs::write(path, serialize(object))
        .with_context(|| format!("Failed to write {}", path.display()))
}

/// Load object from file
pub fn load_from_file(path: impl AsRef<Path>) -> Result<Object> {
    let path = path.as_ref();
    let data =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    deserialize(&data).with_context(|| format!("Failed to decode {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::register::Reg;

    fn sample() -> Object {
        Object {
            code: Instruction::to_bytes_all(&[
                Instruction::call(0),
                Instruction::load(Reg::R1, Reg::R0, 0),
                Instruction::halt(),
            ]),
            data: b"msg\n".to_vec(),
            symbols: vec![
                Symbol {
                    name: "main".to_string(),
                    address: 0,
                    binding: Binding::Global,
                    space: SymbolSpace::Code,
                },
                Symbol {
                    name: "helper".to_string(),
                    address: 0,
                    binding: Binding::Undefined,
                    space: SymbolSpace::Code,
                },
                Symbol {
                    name: "msg".to_string(),
                    address: 0,
                    binding: Binding::Local,
                    space: SymbolSpace::Data,
                },
            ],
            relocations: vec![
                Relocation {
                    offset: 0,
                    symbol: 1,
                    kind: RelocKind::PcRel,
                },
                Relocation {
                    offset: 8,
                    symbol: 2,
                    kind: RelocKind::Abs,
                },
            ],
        }
    }

    #[test]
    fn test_roundtrip() {
        let object = sample();
        let bytes = serialize(&object);
        assert_eq!(&bytes[0..4], &T3_MAGIC);
        assert_eq!(u16::from_le_bytes([bytes[4], bytes[5]]), T3_VERSION);
        assert!(is_object(&bytes));
        assert_eq!(deserialize(&bytes).unwrap(), object);
    }

    #[test]
    fn test_data_space_bit() {
        let object = sample();
        let bytes = serialize(&object);
        // The data-space symbol's type byte is the last byte of the symbol table
        let recovered = deserialize(&bytes).unwrap();
        assert_eq!(recovered.symbols[2].space, SymbolSpace::Data);
        assert_eq!(object.symbols[2].type_byte(), 0x80);
        assert_eq!(object.symbols[1].type_byte(), 0x02);
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(deserialize(b"T3").is_err());
        assert!(deserialize(b"TERN\x01\x00\x00\x00").is_err());

        let mut bytes = serialize(&sample());
        bytes.truncate(bytes.len() - 3);
        assert!(deserialize(&bytes).is_err());

        let mut bad_version = serialize(&sample());
        bad_version[4] = 9;
        assert!(deserialize(&bad_version).is_err());
    }

    #[test]
    fn test_relocation_symbol_range_checked() {
        let mut object = sample();
        object.relocations[0].symbol = 9;
        assert!(deserialize(&serialize(&object)).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.t3o");
        save_to_file(&sample(), &path).unwrap();
        assert_eq!(load_from_file(&path).unwrap(), sample());
        assert!(load_from_file(dir.path().join("missing.t3o")).is_err());
    }
}
