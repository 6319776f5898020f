//! Data movement and stack operation implementations for the TVM

use super::{Exec, Flow, Instruction, Tvm};
use crate::error::Fault;
use crate::vm::host::Host;
use crate::vm::memory::WORD_BYTES;
use crate::vm::register::{word_from, Word};

impl<H: Host> Tvm<H> {
    fn effective_address(&self, instr: &Instruction) -> i64 {
        self.regs.read(instr.rs1) + instr.imm as i64
    }

    pub(super) fn execute_load(&mut self, instr: Instruction) -> Exec {
        let word = self.memory.load_word(self.effective_address(&instr))?;
        self.regs.set(instr.rd, word);
        Ok(Flow::Next)
    }

    pub(super) fn execute_store(&mut self, instr: Instruction) -> Exec {
        let addr = self.effective_address(&instr);
        let word = self.regs.get(instr.rs2).clone();
        self.memory.store_word(addr, &word)?;
        Ok(Flow::Next)
    }

    pub(super) fn execute_mov(&mut self, instr: Instruction) -> Exec {
        let word = self.regs.get(instr.rs1).clone();
        self.regs.set(instr.rd, word);
        Ok(Flow::Next)
    }

    pub(super) fn execute_li(&mut self, instr: Instruction) -> Exec {
        self.regs.set(instr.rd, word_from(instr.imm as i128).0);
        Ok(Flow::Next)
    }

    pub(super) fn execute_push(&mut self, instr: Instruction) -> Exec {
        let word = self.regs.get(instr.rs1).clone();
        self.push_word(&word)?;
        Ok(Flow::Next)
    }

    pub(super) fn execute_pop(&mut self, instr: Instruction) -> Exec {
        let word = self.pop_word()?;
        self.regs.set(instr.rd, word);
        Ok(Flow::Next)
    }

    /// Grow the stack by one word
    pub(super) fn push_word(&mut self, word: &Word) -> Result<(), Fault> {
        let sp = self.regs.sp() - WORD_BYTES as i64;
        if sp < self.stack_base() as i64 {
            return Err(Fault::StackBound);
        }
        self.memory.store_word(sp, word)?;
        self.regs.set_sp(sp);
        Ok(())
    }

    /// Shrink the stack by one word
    pub(super) fn pop_word(&mut self) -> Result<Word, Fault> {
        let sp = self.regs.sp();
        if sp + WORD_BYTES as i64 > self.config.memory_bytes as i64 {
            return Err(Fault::StackBound);
        }
        let word = self.memory.load_word(sp)?;
        self.regs.set_sp(sp + WORD_BYTES as i64);
        Ok(word)
    }
}
