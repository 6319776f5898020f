//! Linker - Merges T3 objects into a loadable [`Program`]
//!
//! Code sections are concatenated in input order, and so are data sections.
//! Global symbols are bound across objects; local symbols only within their
//! own object. Every relocation patches the 16-bit immediate field of one
//! instruction.

use super::instruction::Instruction;
use super::object::{Binding, Object, RelocKind};
use super::program::{Program, ProgramSymbol, SymbolSpace};
use crate::error::{Result, TernaryError};
use std::collections::BTreeMap;

/// Symbol name of the program entry point
pub const ENTRY_SYMBOL: &str = "main";

/// Where one object landed in the merged image
#[derive(Debug, Clone, Copy)]
struct Placement {
    /// First instruction index
    code: usize,
    /// First data byte
    data: usize,
}

impl Placement {
    fn resolve(&self, space: SymbolSpace, address: u32) -> ProgramSymbol {
        let base = match space {
            SymbolSpace::Code => self.code,
            SymbolSpace::Data => self.data,
        };
        ProgramSymbol {
            address: base + address as usize,
            space,
        }
    }
}

/// Incremental linker
#[derive(Debug, Default)]
pub struct Linker {
    objects: Vec<Object>,
}

impl Linker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, object: Object) -> &mut Self {
        self.objects.push(object);
        self
    }

    pub fn link(&self) -> Result<Program> {
        link(&self.objects)
    }
}

/// Link objects into a program
pub fn link(objects: &[Object]) -> Result<Program> {
    let mut placements = Vec::with_capacity(objects.len());
    let mut code = Vec::new();
    let mut data = Vec::new();
    for object in objects {
        placements.push(Placement {
            code: code.len() / Instruction::SIZE,
            data: data.len(),
        });
        code.extend_from_slice(&object.code);
        data.extend_from_slice(&object.data);
    }

    // Bind globals
    let mut globals: BTreeMap<String, ProgramSymbol> = BTreeMap::new();
    for (object, place) in objects.iter().zip(&placements) {
        for sym in object.symbols.iter().filter(|s| s.binding == Binding::Global) {
            if globals.contains_key(&sym.name) {
                return Err(TernaryError::DuplicateSymbol(sym.name.clone()));
            }
            globals.insert(sym.name.clone(), place.resolve(sym.space, sym.address));
        }
    }

    // Patch relocations
    for (object, place) in objects.iter().zip(&placements) {
        for rel in &object.relocations {
            let sym = object
                .symbols
                .get(rel.symbol as usize)
                .ok_or_else(|| TernaryError::UnresolvedSymbol(format!("#{}", rel.symbol)))?;
            let target = match sym.binding {
                Binding::Undefined => *globals
                    .get(&sym.name)
                    .ok_or_else(|| TernaryError::UnresolvedSymbol(sym.name.clone()))?,
                Binding::Local | Binding::Global => place.resolve(sym.space, sym.address),
            };

            let site = place.code + rel.offset as usize / Instruction::SIZE;
            let value = match rel.kind {
                RelocKind::Abs => target.address as i64,
                RelocKind::PcRel => {
                    if target.space == SymbolSpace::Data {
                        log::warn!("PC-relative reference to data symbol '{}'", sym.name);
                    }
                    target.address as i64 - site as i64
                }
            };
            let imm = i16::try_from(value).map_err(|_| TernaryError::RelocationOverflow {
                symbol: sym.name.clone(),
                value,
            })?;

            let at = site * Instruction::SIZE + 4;
            let field = code.get_mut(at..at + 2).ok_or_else(|| {
                TernaryError::overflow(format!("relocation offset {} past code end", rel.offset))
            })?;
            field.copy_from_slice(&imm.to_le_bytes());
        }
    }

    // Symbol map: globals first, then locals that do not shadow anything
    let mut symbols = globals;
    for (object, place) in objects.iter().zip(&placements) {
        for sym in object.symbols.iter().filter(|s| s.binding == Binding::Local) {
            symbols
                .entry(sym.name.clone())
                .or_insert_with(|| place.resolve(sym.space, sym.address));
        }
    }

    let entry = symbols
        .get(ENTRY_SYMBOL)
        .filter(|s| s.space == SymbolSpace::Code)
        .map(|s| s.address)
        .unwrap_or(0);

    let mut program = Program::from_code_bytes(code)?
        .with_data(data)
        .with_entry(entry);
    program.symbols = symbols;

    log::debug!(
        "Linked {} objects: {} instructions, {} data bytes, entry {}",
        objects.len(),
        program.len(),
        program.data.len(),
        entry
    );
    Ok(program)
}
