//! Control flow operation implementations for the TVM
//!
//! Offsets are relative to the jumping instruction. Targets are range-checked
//! by `step` before they are taken.

use super::{Exec, Flow, Instruction, Tvm};
use crate::error::Fault;
use crate::vm::host::Host;
use crate::vm::opcode::Opcode;
use crate::vm::register::{word_from, word_value};

impl<H: Host> Tvm<H> {
    pub(super) fn execute_branch(&mut self, instr: Instruction, pc: usize) -> Exec {
        let value = self.regs.read(instr.rs1);
        let taken = match instr.opcode {
            Opcode::Jz => value == 0,
            Opcode::Jnz => value != 0,
            Opcode::Jpos => value > 0,
            Opcode::Jneg => value < 0,
            _ => false,
        };
        if taken {
            Ok(Flow::Goto(instr.branch_target(pc)))
        } else {
            Ok(Flow::Next)
        }
    }

    /// Push the return address and jump
    pub(super) fn execute_call(&mut self, instr: Instruction, pc: usize) -> Exec {
        let target = instr.branch_target(pc);
        if target < 0 || target as usize >= self.program_len() {
            return Err(Fault::BadPC);
        }
        let (ret, _) = word_from(pc as i128 + 1);
        self.push_word(&ret)?;
        Ok(Flow::Goto(target))
    }

    pub(super) fn execute_ret(&mut self) -> Exec {
        let ret = self.pop_word()?;
        Ok(Flow::Goto(word_value(&ret)))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::boot;
    use super::super::RunOutcome;
    use crate::error::Fault;
    use crate::vm::instruction::Instruction;
    use crate::vm::opcode::Opcode;
    use crate::vm::register::Reg;

    #[test]
    fn test_conditional_branches() {
        // R2 counts which branches were taken
        let mut tvm = boot(&[
            Instruction::li(Reg::R1, -3),
            Instruction::branch(Opcode::Jneg, Reg::R1, 2),
            Instruction::halt(),
            Instruction::inc(Reg::R2),
            Instruction::branch(Opcode::Jpos, Reg::R1, 2),
            Instruction::inc(Reg::R2),
            Instruction::branch(Opcode::Jz, Reg::R1, 2),
            Instruction::inc(Reg::R2),
            Instruction::halt(),
        ]);
        assert_eq!(tvm.run(100), RunOutcome::Halted);
        assert_eq!(tvm.registers().read(Reg::R2), 3);
    }

    #[test]
    fn test_call_ret() {
        let mut tvm = boot(&[
            Instruction::call(3),
            Instruction::inc(Reg::R1),
            Instruction::halt(),
            Instruction::li(Reg::R1, 10),
            Instruction::ret(),
        ]);
        assert_eq!(tvm.run(100), RunOutcome::Halted);
        assert_eq!(tvm.registers().read(Reg::R1), 11);
        assert_eq!(tvm.registers().sp(), tvm.config().memory_bytes as i64);
    }

    #[test]
    fn test_jump_outside_program() {
        let mut tvm = boot(&[Instruction::jmp(-1)]);
        assert_eq!(
            tvm.run(10),
            RunOutcome::Faulted {
                kind: Fault::BadPC,
                pc: 0
            }
        );

        let mut tvm = boot(&[Instruction::nop(), Instruction::call(5)]);
        assert_eq!(
            tvm.run(10),
            RunOutcome::Faulted {
                kind: Fault::BadPC,
                pc: 1
            }
        );
    }

    #[test]
    fn test_ret_on_empty_stack() {
        let mut tvm = boot(&[Instruction::ret()]);
        assert_eq!(
            tvm.run(10),
            RunOutcome::Faulted {
                kind: Fault::StackBound,
                pc: 0
            }
        );
    }

    #[test]
    fn test_unbounded_recursion_hits_stack_bound() {
        let mut tvm = boot(&[Instruction::call(0)]);
        assert!(matches!(
            tvm.run(10_000),
            RunOutcome::Faulted {
                kind: Fault::StackBound,
                ..
            }
        ));
    }
}
