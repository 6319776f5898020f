//! T3 Program Validator - Pre-Execution Validation Pipeline
//!
//! Validates programs before execution to catch errors early:
//! - Opcode decoding and register bounds
//! - Non-canonical encodings (reserved bytes, unused operand fields)
//! - Control flow integrity (jump/call targets, entry point)
//! - Gate index range
//! - Termination (a reachable HALT or exit syscall, CALL/RET balance)

use super::instruction::Instruction;
use super::opcode::{OperandPattern, Opcode};
use super::program::Program;
use super::register::{Reg, REGISTER_COUNT};
use crate::gate::DYADIC_COUNT;
use std::collections::BTreeSet;
use std::fmt;

// =========================================================================
// Configuration
// =========================================================================

/// Controls which validation passes run.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Check register operand bounds and canonical operand encoding.
    pub check_registers: bool,
    /// Check jump, call and entry targets.
    pub check_control_flow: bool,
    /// Check that a HALT or exit syscall is reachable from the entry.
    pub check_termination: bool,
    /// Check GATE indices.
    pub check_gates: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self::full()
    }
}

impl ValidationConfig {
    /// All checks enabled.
    pub fn full() -> Self {
        Self {
            check_registers: true,
            check_control_flow: true,
            check_termination: true,
            check_gates: true,
        }
    }

    /// Only the checks whose failures would fault at runtime.
    pub fn quick() -> Self {
        Self {
            check_registers: true,
            check_control_flow: true,
            check_termination: false,
            check_gates: true,
        }
    }
}

// =========================================================================
// Diagnostics
// =========================================================================

/// Diagnostic severity level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    /// The program would fault if this instruction executed.
    Error,
    /// Suspicious but executable.
    Warning,
    /// Informational, no action needed.
    Info,
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    /// Instruction index where the issue was found (if applicable).
    pub instruction_idx: Option<usize>,
    /// Human-readable message.
    pub message: String,
}

impl Diagnostic {
    fn at(level: DiagnosticLevel, idx: usize, message: String) -> Self {
        Self {
            level,
            instruction_idx: Some(idx),
            message,
        }
    }

    fn global(level: DiagnosticLevel, message: String) -> Self {
        Self {
            level,
            instruction_idx: None,
            message,
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level_str = match self.level {
            DiagnosticLevel::Error => "ERROR",
            DiagnosticLevel::Warning => "WARN",
            DiagnosticLevel::Info => "INFO",
        };
        if let Some(idx) = self.instruction_idx {
            write!(f, "[{}] instruction {}: {}", level_str, idx, self.message)
        } else {
            write!(f, "[{}] {}", level_str, self.message)
        }
    }
}

// =========================================================================
// Validator
// =========================================================================

/// Validates T3 programs before execution.
pub struct ProgramValidator {
    config: ValidationConfig,
}

impl ProgramValidator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validate a program. Returns all diagnostics found.
    ///
    /// A program with any `Error`-level diagnostics will fault if the
    /// offending instruction is reached.
    pub fn validate(&self, program: &Program) -> Vec<Diagnostic> {
        let mut diags = Vec::new();

        // Undecodable slots stay None; later passes skip them
        let decoded = self.decode(program, &mut diags);

        if self.config.check_registers {
            check_encoding(program, &decoded, &mut diags);
        }
        if self.config.check_control_flow {
            check_control_flow(program, &decoded, &mut diags);
        }
        if self.config.check_gates {
            check_gates(&decoded, &mut diags);
        }
        if self.config.check_termination {
            check_termination(program, &decoded, &mut diags);
        }

        for d in diags.iter().filter(|d| d.level != DiagnosticLevel::Info) {
            log::warn!("{}", d);
        }
        diags
    }

    // =====================================================================
    // Phase 1: Decoding
    // =====================================================================

    fn decode(&self, program: &Program, diags: &mut Vec<Diagnostic>) -> Vec<Option<Instruction>> {
        (0..program.len())
            .map(|idx| {
                let raw = program.raw(idx)?;
                if Opcode::from_u8(raw[0]).is_none() {
                    diags.push(Diagnostic::at(
                        DiagnosticLevel::Error,
                        idx,
                        format!("Unknown opcode 0x{:02X}", raw[0]),
                    ));
                    return None;
                }
                match Instruction::from_bytes(&raw) {
                    Ok(instr) => Some(instr),
                    Err(_) => {
                        if self.config.check_registers {
                            let bad = raw[1..4]
                                .iter()
                                .find(|&&r| r as usize >= REGISTER_COUNT)
                                .copied()
                                .unwrap_or(0);
                            diags.push(Diagnostic::at(
                                DiagnosticLevel::Error,
                                idx,
                                format!(
                                    "Register index {} out of range (max {})",
                                    bad,
                                    REGISTER_COUNT - 1
                                ),
                            ));
                        }
                        None
                    }
                }
            })
            .collect()
    }

    /// Check if validation passed (no errors).
    pub fn is_valid(diagnostics: &[Diagnostic]) -> bool {
        !diagnostics.iter().any(|d| d.level == DiagnosticLevel::Error)
    }

    /// Count errors in diagnostics.
    pub fn error_count(diagnostics: &[Diagnostic]) -> usize {
        diagnostics.iter().filter(|d| d.level == DiagnosticLevel::Error).count()
    }

    /// Count warnings in diagnostics.
    pub fn warning_count(diagnostics: &[Diagnostic]) -> usize {
        diagnostics.iter().filter(|d| d.level == DiagnosticLevel::Warning).count()
    }
}

impl Default for ProgramValidator {
    fn default() -> Self {
        Self::new(ValidationConfig::default())
    }
}

/// Validate with the given config.
pub fn validate(program: &Program, config: &ValidationConfig) -> Vec<Diagnostic> {
    ProgramValidator::new(config.clone()).validate(program)
}

// =====================================================================
// Phase 2: Register and encoding checks
// =====================================================================

/// Flag operand fields the opcode ignores. They survive execution but not
/// disassembly.
fn check_encoding(program: &Program, decoded: &[Option<Instruction>], diags: &mut Vec<Diagnostic>) {
    for (idx, instr) in decoded.iter().enumerate() {
        let Some(instr) = instr else { continue };
        if let Some(raw) = program.raw(idx) {
            if raw[6] != 0 || raw[7] != 0 {
                diags.push(Diagnostic::at(
                    DiagnosticLevel::Warning,
                    idx,
                    "Reserved bytes are non-zero".to_string(),
                ));
            }
        }

        let (rd, rs1, rs2, imm) = used_fields(instr.opcode.operands());
        let stray = (!rd && instr.rd != Reg::R0)
            || (!rs1 && instr.rs1 != Reg::R0)
            || (!rs2 && instr.rs2 != Reg::R0)
            || (!imm && instr.imm != 0);
        if stray {
            diags.push(Diagnostic::at(
                DiagnosticLevel::Info,
                idx,
                format!("{} carries unused operand fields", instr.opcode),
            ));
        }
    }
}

/// Which of (rd, rs1, rs2, imm) an operand pattern uses
fn used_fields(pattern: OperandPattern) -> (bool, bool, bool, bool) {
    match pattern {
        OperandPattern::None => (false, false, false, false),
        OperandPattern::Rd => (true, false, false, false),
        OperandPattern::Rs1 => (false, true, false, false),
        OperandPattern::RdRs1 => (true, true, false, false),
        OperandPattern::RdImm => (true, false, false, true),
        OperandPattern::RdRs1Rs2 => (true, true, true, false),
        OperandPattern::RdRs1Rs2Imm => (true, true, true, true),
        OperandPattern::RdRs1Imm => (true, true, false, true),
        OperandPattern::Rs2Rs1Imm => (false, true, true, true),
        OperandPattern::Imm => (false, false, false, true),
        OperandPattern::Rs1Imm => (false, true, false, true),
    }
}

// =====================================================================
// Phase 3: Control flow
// =====================================================================

fn check_control_flow(
    program: &Program,
    decoded: &[Option<Instruction>],
    diags: &mut Vec<Diagnostic>,
) {
    let len = decoded.len();
    if len == 0 {
        diags.push(Diagnostic::global(
            DiagnosticLevel::Warning,
            "Empty program halts immediately".to_string(),
        ));
        return;
    }
    if program.entry >= len {
        diags.push(Diagnostic::global(
            DiagnosticLevel::Error,
            format!("Entry {} out of bounds (program has {} instructions)", program.entry, len),
        ));
    }

    let targets: BTreeSet<usize> = decoded
        .iter()
        .enumerate()
        .filter_map(|(idx, i)| {
            let i = i.as_ref()?;
            i.opcode.is_branch().then(|| i.branch_target(idx))
        })
        .filter_map(|t| usize::try_from(t).ok())
        .collect();

    for (idx, instr) in decoded.iter().enumerate() {
        let Some(instr) = instr else { continue };

        if instr.opcode.is_branch() {
            let target = instr.branch_target(idx);
            if target < 0 || target >= len as i64 {
                diags.push(Diagnostic::at(
                    DiagnosticLevel::Error,
                    idx,
                    format!(
                        "{} target {} out of bounds (program has {} instructions)",
                        instr.opcode, target, len
                    ),
                ));
            } else if target == idx as i64 && instr.opcode == Opcode::Jmp {
                diags.push(Diagnostic::at(
                    DiagnosticLevel::Warning,
                    idx,
                    "JMP to itself never terminates".to_string(),
                ));
            }
        }

        // Dead code after an unconditional transfer
        let next = idx + 1;
        if instr.opcode.is_terminator()
            && next < len
            && !targets.contains(&next)
            && next != program.entry
            && program.label_at(next).is_none()
        {
            diags.push(Diagnostic::at(
                DiagnosticLevel::Info,
                next,
                format!("Unreachable instruction after {}", instr.opcode),
            ));
        }
    }
}

// =====================================================================
// Phase 4: Gates
// =====================================================================

fn check_gates(decoded: &[Option<Instruction>], diags: &mut Vec<Diagnostic>) {
    for (idx, instr) in decoded.iter().enumerate() {
        let Some(instr) = instr else { continue };
        if instr.opcode == Opcode::Gate && instr.gate_index() >= DYADIC_COUNT {
            diags.push(Diagnostic::at(
                DiagnosticLevel::Error,
                idx,
                format!(
                    "Gate index {} out of range (max {})",
                    instr.gate_index(),
                    DYADIC_COUNT - 1
                ),
            ));
        }
    }
}

// =====================================================================
// Phase 5: Termination
// =====================================================================

/// Walk the control-flow graph from the entry and look for a way out.
fn check_termination(
    program: &Program,
    decoded: &[Option<Instruction>],
    diags: &mut Vec<Diagnostic>,
) {
    let len = decoded.len();
    if len == 0 || program.entry >= len {
        return;
    }

    let mut seen = vec![false; len];
    let mut work = vec![program.entry];
    let mut exits = false;
    let mut calls = 0usize;
    let mut rets = 0usize;

    while let Some(idx) = work.pop() {
        if idx >= len || seen[idx] {
            continue;
        }
        seen[idx] = true;
        let Some(instr) = decoded[idx] else {
            // Faults when reached, which also ends execution
            exits = true;
            continue;
        };

        match instr.opcode {
            Opcode::Halt | Opcode::Syscall => exits = true,
            Opcode::Call => calls += 1,
            Opcode::Ret => rets += 1,
            _ => {}
        }
        if instr.opcode.is_branch() {
            if let Ok(target) = usize::try_from(instr.branch_target(idx)) {
                work.push(target);
            }
        }
        if !instr.opcode.is_terminator() {
            // Running off the end halts too
            if idx + 1 == len {
                exits = true;
            }
            work.push(idx + 1);
        }
    }

    if !exits {
        diags.push(Diagnostic::global(
            DiagnosticLevel::Warning,
            "No HALT or exit syscall reachable from entry".to_string(),
        ));
    }
    if rets > 0 && calls == 0 {
        diags.push(Diagnostic::global(
            DiagnosticLevel::Warning,
            "RET reachable without any CALL".to_string(),
        ));
    }
    if calls > 0 && rets == 0 {
        diags.push(Diagnostic::global(
            DiagnosticLevel::Warning,
            "CALL reachable but no RET".to_string(),
        ));
    }

    let dead = seen.iter().filter(|s| !**s).count();
    if dead > 0 {
        diags.push(Diagnostic::global(
            DiagnosticLevel::Info,
            format!("{} instructions unreachable from entry", dead),
        ));
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::assembler::assemble_program;
    use crate::vm::register::Reg;

    fn check(source: &str) -> Vec<Diagnostic> {
        validate(&assemble_program(source).unwrap(), &ValidationConfig::full())
    }

    fn has(diags: &[Diagnostic], level: DiagnosticLevel, needle: &str) -> bool {
        diags.iter().any(|d| d.level == level && d.message.contains(needle))
    }

    #[test]
    fn test_empty_program() {
        let diags = validate(&Program::new(&[]), &ValidationConfig::full());
        assert!(ProgramValidator::is_valid(&diags));
        assert_eq!(ProgramValidator::warning_count(&diags), 1);
    }

    #[test]
    fn test_clean_program() {
        let diags = check("LI R0, 1\nLI R1, 1\nADD R2, R0, R1\nHALT");
        assert!(ProgramValidator::is_valid(&diags));
        assert_eq!(ProgramValidator::warning_count(&diags), 0);
    }

    #[test]
    fn test_bad_opcode_and_register() {
        let mut code = Instruction::to_bytes_all(&[Instruction::nop(), Instruction::halt()]);
        code[0] = 0xEE;
        code[9] = 20;
        let program = Program::from_code_bytes(code).unwrap();
        let diags = ProgramValidator::default().validate(&program);
        assert_eq!(ProgramValidator::error_count(&diags), 2);
        assert!(has(&diags, DiagnosticLevel::Error, "0xEE"));
        assert!(has(&diags, DiagnosticLevel::Error, "Register index 20"));
    }

    #[test]
    fn test_jump_out_of_bounds() {
        let diags = check("JMP 5\nHALT");
        assert!(!ProgramValidator::is_valid(&diags));
        assert!(has(&diags, DiagnosticLevel::Error, "JMP target 5"));

        let diags = check("NOP\nCALL -2\nHALT");
        assert!(has(&diags, DiagnosticLevel::Error, "CALL target -1"));
    }

    #[test]
    fn test_gate_index() {
        let consensus = crate::gate::DyadicGate::CONSENSUS;
        let mut bad = Instruction::gate(Reg::R1, Reg::R2, Reg::R3, consensus);
        bad.imm = -1;
        let program = Program::new(&[bad, Instruction::halt()]);
        let diags = validate(&program, &ValidationConfig::quick());
        assert!(has(&diags, DiagnosticLevel::Error, "Gate index 65535"));
    }

    #[test]
    fn test_no_exit_reachable() {
        let diags = check("loop: INC R1\nJMP loop\nHALT");
        assert!(has(&diags, DiagnosticLevel::Warning, "No HALT"));
        assert!(has(&diags, DiagnosticLevel::Info, "Unreachable instruction after JMP"));

        // Running off the end counts as halting
        let diags = check("LI R1, 2\nINC R1");
        assert!(!has(&diags, DiagnosticLevel::Warning, "No HALT"));
    }

    #[test]
    fn test_call_ret_balance() {
        let diags = check("NOP\nRET");
        assert!(has(&diags, DiagnosticLevel::Warning, "RET reachable without any CALL"));

        let diags = check("CALL f\nHALT\nf: RET");
        assert!(ProgramValidator::is_valid(&diags));
        assert_eq!(ProgramValidator::warning_count(&diags), 0);
    }

    #[test]
    fn test_stray_fields_and_reserved_bytes() {
        let mut code = Instruction::to_bytes_all(&[Instruction::halt()]);
        code[1] = 3;
        code[7] = 1;
        let program = Program::from_code_bytes(code).unwrap();
        let diags = ProgramValidator::default().validate(&program);
        assert!(has(&diags, DiagnosticLevel::Warning, "Reserved bytes"));
        assert!(has(&diags, DiagnosticLevel::Info, "unused operand fields"));
    }

    #[test]
    fn test_entry_out_of_bounds() {
        let program = Program::new(&[Instruction::halt()]).with_entry(4);
        let diags = validate(&program, &ValidationConfig::quick());
        assert!(has(&diags, DiagnosticLevel::Error, "Entry 4"));
    }

    #[test]
    fn test_config_presets() {
        let quick = ValidationConfig::quick();
        assert!(quick.check_control_flow);
        assert!(!quick.check_termination);
        let full = ValidationConfig::full();
        assert!(full.check_termination && full.check_gates && full.check_registers);

        let diags = validate(&assemble_program("loop: JMP loop").unwrap(), &quick);
        assert!(!has(&diags, DiagnosticLevel::Warning, "No HALT"));
        assert!(has(&diags, DiagnosticLevel::Warning, "never terminates"));
    }

    #[test]
    fn test_diagnostic_display() {
        let d = Diagnostic::at(DiagnosticLevel::Error, 3, "boom".to_string());
        assert_eq!(d.to_string(), "[ERROR] instruction 3: boom");
        let d = Diagnostic::global(DiagnosticLevel::Info, "fine".to_string());
        assert_eq!(d.to_string(), "[INFO] fine");
    }
}
