//! Disassembler - Renders a [`Program`] back to canonical assembly
//!
//! Output reassembles to the same program: every instruction is written in
//! canonical operand order with numeric immediates, data becomes `.bytes`
//! lines, and a non-zero entry point is marked with a global `main` label.

use super::linker::ENTRY_SYMBOL;
use super::program::Program;
use crate::error::Result;
use std::fmt::Write;

/// Data bytes per `.bytes` line
const BYTES_PER_LINE: usize = 16;

/// Disassemble a program to canonical text
pub fn disassemble(program: &Program) -> Result<String> {
    let instructions = program.instructions()?;
    let mut out = String::new();

    out.push_str(".code\n");
    let mark_entry = program.entry != 0;
    if mark_entry {
        let _ = writeln!(out, ".global {}", ENTRY_SYMBOL);
    }
    for (idx, instr) in instructions.iter().enumerate() {
        if mark_entry && idx == program.entry {
            let _ = writeln!(out, "{}:", ENTRY_SYMBOL);
        }
        let _ = writeln!(out, "    {}", instr);
    }
    // Entry past the last instruction still needs its label
    if mark_entry && program.entry >= instructions.len() {
        let _ = writeln!(out, "{}:", ENTRY_SYMBOL);
    }

    if !program.data.is_empty() {
        out.push_str(".data\n");
        for chunk in program.data.chunks(BYTES_PER_LINE) {
            let _ = writeln!(out, "    .bytes \"{}\"", escape_bytes(chunk));
        }
    }

    Ok(out)
}

/// Escape bytes for a `.bytes` string literal
fn escape_bytes(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(bytes.len());
    for &b in bytes {
        match b {
            b'"' => s.push_str("\\\""),
            b'\\' => s.push_str("\\\\"),
            0x20..=0x7E => s.push(b as char),
            _ => {
                let _ = write!(s, "\\x{:02X}", b);
            }
        }
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::assembler::assemble_program;
    use crate::vm::instruction::Instruction;
    use crate::vm::opcode::{OperandPattern, Opcode};
    use crate::trit_array::TritArray;
    use crate::vm::register::{Reg, REGISTER_COUNT, WORD_TRITS};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_disassemble_text() {
        let program = Program::new(&[
            Instruction::li(Reg::R1, -7),
            Instruction::store(Reg::R1, Reg::R2, 3),
            Instruction::halt(),
        ]);
        let text = disassemble(&program).unwrap();
        assert_eq!(text, ".code\n    LI R1, -7\n    STORE R1, R2, 3\n    HALT\n");
    }

    #[test]
    fn test_entry_and_data_survive() {
        let program = Program::new(&[
            Instruction::nop(),
            Instruction::li(Reg::R0, 1),
            Instruction::jmp(-1),
        ])
        .with_data(vec![b'a', b'"', b'\\', 0, 0xFF, b';', b'\n'])
        .with_entry(1);

        let text = disassemble(&program).unwrap();
        assert!(text.contains("main:\n    LI R0, 1"));
        assert!(text.contains(r#".bytes "a\"\\\x00\xFF;\x0A""#));

        let back = assemble_program(&text).unwrap();
        assert_eq!(back, program);
    }

    #[test]
    fn test_free_form_source_canonicalizes() {
        let source = r#"
; counts down from 0x0A
.data
greeting:  .bytes "hi"
answer:    .word 0t+-0
pad:       .zero 2

.code
.global main
start:  nop
main:   li   r1,0x0A          ; ten
        LOAD r4 , R0 , answer
loop:   dec R1
        GATE r5,R4,r4,consensus
        store R5, r2, -0x3
        JNZ R1,loop
        call done
        HALT
done:   RET
"#;
        let program = assemble_program(source).unwrap();
        let text = disassemble(&program).unwrap();

        let word = TritArray::from_int_width(6, WORD_TRITS).unwrap();
        let data = [b"hi".as_slice(), word.to_packed_bytes(), &[0u8, 0][..]].concat();
        let expected = format!(
            ".code
.global main
    NOP
main:
    LI R1, 10
    LOAD R4, R0, 2
    DEC R1
    GATE R5, R4, R4, {}
    STORE R5, R2, -3
    JNZ R1, -3
    CALL 2
    HALT
    RET
.data
    .bytes \"{}\"
",
            crate::gate::CONSENSUS,
            escape_bytes(&data)
        );
        assert_eq!(text, expected);

        // Canonical text is a fixed point
        let again = assemble_program(&text).unwrap();
        assert_eq!(again, program);
        assert_eq!(disassemble(&again).unwrap(), text);
    }

    #[test]
    fn test_entry_past_end() {
        let program = Program::new(&[Instruction::nop()]).with_entry(1);
        let back = assemble_program(&disassemble(&program).unwrap()).unwrap();
        assert_eq!(back.entry, 1);
    }

    fn random_instruction(rng: &mut StdRng) -> Instruction {
        let opcode = Opcode::ALL[rng.gen_range(0..Opcode::ALL.len())];
        let mut reg = || Reg::new(rng.gen_range(0..REGISTER_COUNT as u8)).unwrap();
        let (a, b, c) = (reg(), reg(), reg());
        let imm: i16 = rng.gen();
        let mut instr = Instruction::system(opcode);
        match opcode.operands() {
            OperandPattern::None => {}
            OperandPattern::Rd => instr.rd = a,
            OperandPattern::Rs1 => instr.rs1 = a,
            OperandPattern::RdRs1 => (instr.rd, instr.rs1) = (a, b),
            OperandPattern::RdImm => (instr.rd, instr.imm) = (a, imm),
            OperandPattern::RdRs1Rs2 => (instr.rd, instr.rs1, instr.rs2) = (a, b, c),
            OperandPattern::RdRs1Rs2Imm => {
                let index = rng.gen_range(0..crate::gate::DYADIC_COUNT) as u16;
                (instr.rd, instr.rs1, instr.rs2, instr.imm) = (a, b, c, index as i16);
            }
            OperandPattern::RdRs1Imm => (instr.rd, instr.rs1, instr.imm) = (a, b, imm),
            OperandPattern::Rs2Rs1Imm => (instr.rs2, instr.rs1, instr.imm) = (a, b, imm),
            OperandPattern::Imm => instr.imm = imm,
            OperandPattern::Rs1Imm => (instr.rs1, instr.imm) = (a, imm),
        }
        instr
    }

    #[test]
    fn test_random_programs_reassemble() {
        let mut rng = StdRng::seed_from_u64(0x7E05);
        for _ in 0..50 {
            let len = rng.gen_range(1..40);
            let code: Vec<Instruction> = (0..len).map(|_| random_instruction(&mut rng)).collect();
            let data: Vec<u8> = (0..rng.gen_range(0..40)).map(|_| rng.gen()).collect();
            let entry = rng.gen_range(0..len);
            let program = Program::new(&code).with_data(data).with_entry(entry);

            let text = disassemble(&program).unwrap();
            let back = assemble_program(&text).unwrap();
            assert_eq!(back, program, "round trip failed for:\n{}", text);
        }
    }
}
