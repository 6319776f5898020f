//! Assembler - Parses human-readable T3 assembly into an [`Object`]
//!
//! ## Assembly Syntax
//!
//! ```text
//! ; Comments start with semicolon
//!
//! .data
//! greeting:
//!     .bytes "hello\n"
//! answer:
//!     .word 42
//!     .zero 7
//!
//! .code
//! .global main
//! main:
//!     LI      R0, 1            ; write(1, greeting, 6)
//!     LI      R1, 1
//!     LI      R2, greeting
//!     LI      R3, 6
//!     SYSCALL
//!     LOAD    R4, R0, answer
//!     GATE    R5, R4, R4, CONSENSUS
//!     JNZ     R5, done
//! done:
//!     HALT
//! ```
//!
//! Immediates may be decimal, hex (`0x1F`), balanced ternary (`0t+-0`), a
//! named gate (GATE only) or a label. Label operands become relocations:
//! pc-relative for jumps and calls, absolute everywhere else.

use super::instruction::Instruction;
use super::object::{Binding, Object, RelocKind, Relocation, Symbol};
use super::opcode::{OperandPattern, Opcode};
use super::program::{Program, SymbolSpace};
use super::register::{Reg, WORD_TRITS};
use crate::error::{Result, TernaryError};
use crate::gate::{named_gate, DYADIC_COUNT};
use crate::trit_array::TritArray;
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Code,
    Data,
}

/// Immediate operand before relocation
enum Operand {
    Value(i16),
    Label(String),
}

/// A label reference waiting for the symbol table
struct PendingReloc {
    instruction: usize,
    label: String,
    kind: RelocKind,
}

/// Assembler for T3 source
pub struct Assembler {
    line_number: usize,
    section: Section,
    code: Vec<Instruction>,
    data: Vec<u8>,
    /// Defined labels: name -> (space, address), in definition order
    labels: Vec<(String, SymbolSpace, u32)>,
    label_index: HashMap<String, usize>,
    globals: BTreeSet<String>,
    pending: Vec<PendingReloc>,
}

impl Assembler {
    pub fn new() -> Self {
        Self {
            line_number: 0,
            section: Section::Code,
            code: Vec::new(),
            data: Vec::new(),
            labels: Vec::new(),
            label_index: HashMap::new(),
            globals: BTreeSet::new(),
            pending: Vec::new(),
        }
    }

    /// Assemble source into an unlinked object
    pub fn assemble(&mut self, source: &str) -> Result<Object> {
        *self = Self::new();

        for (idx, raw) in source.lines().enumerate() {
            self.line_number = idx + 1;
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }
            self.parse_line(line)?;
        }

        self.line_number = 0;
        let object = self.build_object();
        log::debug!(
            "Assembled {} instructions, {} data bytes, {} symbols",
            object.instruction_count(),
            object.data.len(),
            object.symbols.len()
        );
        Ok(object)
    }

    fn parse_line(&mut self, line: &str) -> Result<()> {
        let mut rest = line;

        // Leading labels (`a: b: INSTR` is allowed)
        while let Some((head, tail)) = split_label(rest) {
            self.define_label(head)?;
            rest = tail.trim();
        }
        if rest.is_empty() {
            return Ok(());
        }

        if rest.starts_with('.') {
            self.parse_directive(rest)
        } else {
            self.parse_instruction(rest)
        }
    }

    fn define_label(&mut self, name: &str) -> Result<()> {
        if !is_identifier(name) {
            return Err(self.error(format!("Invalid label name: {}", name)));
        }
        if self.label_index.contains_key(name) {
            return Err(self.error(format!("Duplicate label: {}", name)));
        }
        let (space, address) = match self.section {
            Section::Code => (SymbolSpace::Code, self.code.len()),
            Section::Data => (SymbolSpace::Data, self.data.len()),
        };
        let address = u32::try_from(address)
            .map_err(|_| self.error(format!("Label {} beyond 32-bit address range", name)))?;
        self.label_index.insert(name.to_string(), self.labels.len());
        self.labels.push((name.to_string(), space, address));
        Ok(())
    }

    fn parse_directive(&mut self, line: &str) -> Result<()> {
        let (name, args) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], line[pos..].trim()),
            None => (line, ""),
        };

        match name.to_ascii_lowercase().as_str() {
            ".code" | ".text" => self.section = Section::Code,
            ".data" => self.section = Section::Data,
            ".global" | ".globl" => {
                for sym in args.split(',').map(str::trim) {
                    if !is_identifier(sym) {
                        return Err(self.error(format!("Invalid symbol in .global: {}", sym)));
                    }
                    self.globals.insert(sym.to_string());
                }
            }
            ".word" => {
                self.require_data(name)?;
                for value in args.split(',').map(str::trim) {
                    let n = parse_number(value)
                        .ok_or_else(|| self.error(format!("Invalid .word value: {}", value)))?;
                    let word = TritArray::from_int_width(n, WORD_TRITS)
                        .map_err(|e| self.error(format!(".word {}: {}", value, e)))?;
                    self.data.extend_from_slice(word.to_packed_bytes());
                }
            }
            ".bytes" | ".ascii" => {
                self.require_data(name)?;
                let bytes = self.parse_string(args)?;
                self.data.extend_from_slice(&bytes);
            }
            ".zero" => {
                self.require_data(name)?;
                let n = parse_number(args)
                    .filter(|n| *n >= 0)
                    .ok_or_else(|| self.error(format!("Invalid .zero count: {}", args)))?;
                self.data.resize(self.data.len() + n as usize, 0);
            }
            other => return Err(self.error(format!("Unknown directive: {}", other))),
        }
        Ok(())
    }

    fn require_data(&self, directive: &str) -> Result<()> {
        if self.section != Section::Data {
            return Err(self.error(format!("{} outside .data section", directive)));
        }
        Ok(())
    }

    /// Parse a quoted string literal with `\n \t \\ \" \xNN` escapes
    fn parse_string(&self, literal: &str) -> Result<Vec<u8>> {
        let inner = literal
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .ok_or_else(|| self.error(format!("Expected quoted string, got: {}", literal)))?;

        let mut out = Vec::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                let mut buf = [0u8; 4];
                out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
                continue;
            }
            match chars.next() {
                Some('n') => out.push(b'\n'),
                Some('t') => out.push(b'\t'),
                Some('r') => out.push(b'\r'),
                Some('0') => out.push(0),
                Some('\\') => out.push(b'\\'),
                Some('"') => out.push(b'"'),
                Some('x') => {
                    let hex: String = chars.by_ref().take(2).collect();
                    let byte = u8::from_str_radix(&hex, 16)
                        .map_err(|_| self.error(format!("Invalid escape: \\x{}", hex)))?;
                    out.push(byte);
                }
                Some(other) => return Err(self.error(format!("Invalid escape: \\{}", other))),
                None => return Err(self.error("Dangling backslash in string".to_string())),
            }
        }
        Ok(out)
    }

    fn parse_instruction(&mut self, line: &str) -> Result<()> {
        if self.section != Section::Code {
            return Err(self.error(format!("Instruction in .data section: {}", line)));
        }

        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(pos) => (&line[..pos], line[pos..].trim()),
            None => (line, ""),
        };
        let opcode = Opcode::from_mnemonic(mnemonic)
            .ok_or_else(|| self.error(format!("Unknown instruction: {}", mnemonic)))?;
        let ops: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        let instr = self.build_instruction(opcode, &ops)?;
        self.code.push(instr);
        Ok(())
    }

    fn build_instruction(&mut self, opcode: Opcode, ops: &[&str]) -> Result<Instruction> {
        let expected = match opcode.operands() {
            OperandPattern::None => 0,
            OperandPattern::Rd | OperandPattern::Rs1 | OperandPattern::Imm => 1,
            OperandPattern::RdRs1 | OperandPattern::RdImm | OperandPattern::Rs1Imm => 2,
            OperandPattern::RdRs1Rs2
            | OperandPattern::RdRs1Imm
            | OperandPattern::Rs2Rs1Imm => 3,
            OperandPattern::RdRs1Rs2Imm => 4,
        };
        if ops.len() != expected {
            return Err(self.error(format!(
                "{} expects {} operands, got {}",
                opcode,
                expected,
                ops.len()
            )));
        }

        let mut instr = Instruction::system(opcode);
        match opcode.operands() {
            OperandPattern::None => {}
            OperandPattern::Rd => instr.rd = self.parse_register(ops[0])?,
            OperandPattern::Rs1 => instr.rs1 = self.parse_register(ops[0])?,
            OperandPattern::RdRs1 => {
                instr.rd = self.parse_register(ops[0])?;
                instr.rs1 = self.parse_register(ops[1])?;
            }
            OperandPattern::RdImm => {
                instr.rd = self.parse_register(ops[0])?;
                instr.imm = self.parse_imm(opcode, ops[1])?;
            }
            OperandPattern::RdRs1Rs2 => {
                instr.rd = self.parse_register(ops[0])?;
                instr.rs1 = self.parse_register(ops[1])?;
                instr.rs2 = self.parse_register(ops[2])?;
            }
            OperandPattern::RdRs1Rs2Imm => {
                instr.rd = self.parse_register(ops[0])?;
                instr.rs1 = self.parse_register(ops[1])?;
                instr.rs2 = self.parse_register(ops[2])?;
                instr.imm = self.parse_imm(opcode, ops[3])?;
            }
            OperandPattern::RdRs1Imm => {
                instr.rd = self.parse_register(ops[0])?;
                instr.rs1 = self.parse_register(ops[1])?;
                instr.imm = self.parse_imm(opcode, ops[2])?;
            }
            OperandPattern::Rs2Rs1Imm => {
                instr.rs2 = self.parse_register(ops[0])?;
                instr.rs1 = self.parse_register(ops[1])?;
                instr.imm = self.parse_imm(opcode, ops[2])?;
            }
            OperandPattern::Imm => instr.imm = self.parse_imm(opcode, ops[0])?,
            OperandPattern::Rs1Imm => {
                instr.rs1 = self.parse_register(ops[0])?;
                instr.imm = self.parse_imm(opcode, ops[1])?;
            }
        }
        Ok(instr)
    }

    fn parse_register(&self, op: &str) -> Result<Reg> {
        Reg::parse(op).ok_or_else(|| self.error(format!("Invalid register: {}", op)))
    }

    /// Parse an immediate; labels are recorded as relocations and encode as 0
    fn parse_imm(&mut self, opcode: Opcode, op: &str) -> Result<i16> {
        match self.parse_operand(opcode, op)? {
            Operand::Value(v) => Ok(v),
            Operand::Label(label) => {
                let kind = if opcode.is_branch() {
                    RelocKind::PcRel
                } else {
                    RelocKind::Abs
                };
                self.pending.push(PendingReloc {
                    instruction: self.code.len(),
                    label,
                    kind,
                });
                Ok(0)
            }
        }
    }

    fn parse_operand(&self, opcode: Opcode, op: &str) -> Result<Operand> {
        if opcode == Opcode::Gate {
            let index = match named_gate(op) {
                Some(index) => index as i64,
                None => match parse_number(op) {
                    Some(n) => n,
                    None => return self.label_operand(op),
                },
            };
            if !(0..DYADIC_COUNT as i64).contains(&index) {
                return Err(self.error(format!("Gate index out of range: {}", op)));
            }
            return Ok(Operand::Value(index as u16 as i16));
        }

        match parse_number(op) {
            Some(n) => i16::try_from(n)
                .map(Operand::Value)
                .map_err(|_| self.error(format!("Immediate out of 16-bit range: {}", op))),
            None => self.label_operand(op),
        }
    }

    fn label_operand(&self, op: &str) -> Result<Operand> {
        if is_identifier(op) {
            Ok(Operand::Label(op.to_string()))
        } else {
            Err(self.error(format!("Invalid immediate: {}", op)))
        }
    }

    /// Emit the symbol table and relocations
    fn build_object(&self) -> Object {
        let mut symbols: Vec<Symbol> = self
            .labels
            .iter()
            .map(|(name, space, address)| Symbol {
                name: name.clone(),
                address: *address,
                binding: if self.globals.contains(name) {
                    Binding::Global
                } else {
                    Binding::Local
                },
                space: *space,
            })
            .collect();
        let mut index: HashMap<String, usize> = symbols
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();

        // Globals declared but never defined are imports
        for name in &self.globals {
            if !index.contains_key(name) {
                index.insert(name.clone(), symbols.len());
                symbols.push(undefined(name));
            }
        }

        let mut relocations = Vec::with_capacity(self.pending.len());
        for reloc in &self.pending {
            let symbol = match index.get(&reloc.label) {
                Some(&i) => i,
                None => {
                    index.insert(reloc.label.clone(), symbols.len());
                    symbols.push(undefined(&reloc.label));
                    symbols.len() - 1
                }
            };
            relocations.push(Relocation {
                offset: (reloc.instruction * Instruction::SIZE) as u32,
                symbol: symbol as u16,
                kind: reloc.kind,
            });
        }

        Object {
            code: Instruction::to_bytes_all(&self.code),
            data: self.data.clone(),
            symbols,
            relocations,
        }
    }

    /// Create an error at current line
    fn error(&self, message: String) -> TernaryError {
        TernaryError::Parse {
            line: self.line_number,
            message,
        }
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Self::new()
    }
}

fn undefined(name: &str) -> Symbol {
    Symbol {
        name: name.to_string(),
        address: 0,
        binding: Binding::Undefined,
        space: SymbolSpace::Code,
    }
}

/// Remove a `;` comment, ignoring semicolons inside string literals
fn strip_comment(line: &str) -> &str {
    let mut in_string = false;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        match c {
            _ if escaped => escaped = false,
            '\\' if in_string => escaped = true,
            '"' => in_string = !in_string,
            ';' if !in_string => return &line[..i],
            _ => {}
        }
    }
    line
}

/// Split `label: rest`, only when the part before the colon is a bare name
fn split_label(line: &str) -> Option<(&str, &str)> {
    let pos = line.find(':')?;
    let head = line[..pos].trim();
    if head.is_empty() || head.contains(char::is_whitespace) || head.contains('"') {
        return None;
    }
    Some((head, &line[pos + 1..]))
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$')
}

/// Parse decimal, hex (`0x`) or balanced-ternary (`0t`) integers, optionally signed
pub fn parse_number(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Some(trits) = s.strip_prefix("0t") {
        if trits.is_empty() {
            return None;
        }
        return trits.parse::<TritArray>().ok()?.to_i64().ok();
    }
    let (negative, body) = match s.strip_prefix('-') {
        Some(body) => (true, body),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let magnitude = if let Some(hex) = body.strip_prefix("0x").or_else(|| body.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if body.starts_with(|c: char| c.is_ascii_digit()) {
        body.parse::<i64>().ok()?
    } else {
        return None;
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Assemble source into an object
pub fn assemble(source: &str) -> Result<Object> {
    Assembler::new().assemble(source)
}

/// Assemble and link a single source file
pub fn assemble_program(source: &str) -> Result<Program> {
    super::linker::link(&[assemble(source)?])
}
