//! Trit-wise logic operation implementations for the TVM

use super::{zip_word, Exec, Flow, Instruction, Tvm};
use crate::error::Fault;
use crate::gate::DyadicGate;
use crate::trit::Trit;
use crate::vm::host::Host;

impl<H: Host> Tvm<H> {
    pub(super) fn execute_trit_logic(
        &mut self,
        instr: Instruction,
        op: fn(Trit, Trit) -> Trit,
    ) -> Exec {
        let word = zip_word(self.regs.get(instr.rs1), self.regs.get(instr.rs2), op);
        self.regs.set_result_flags(&word);
        self.regs.set(instr.rd, word);
        Ok(Flow::Next)
    }

    pub(super) fn execute_not(&mut self, instr: Instruction) -> Exec {
        let word = self.regs.get(instr.rs1).not();
        self.regs.set_result_flags(&word);
        self.regs.set(instr.rd, word);
        Ok(Flow::Next)
    }

    /// An index past the dyadic table is an undecodable instruction
    pub(super) fn execute_gate(&mut self, instr: Instruction) -> Exec {
        let gate = DyadicGate::new(instr.gate_index()).map_err(|_| Fault::BadOpcode)?;
        let word = zip_word(
            self.regs.get(instr.rs1),
            self.regs.get(instr.rs2),
            |a, b| gate.apply(a, b),
        );
        self.regs.set_result_flags(&word);
        self.regs.set(instr.rd, word);
        Ok(Flow::Next)
    }
}
