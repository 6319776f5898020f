//! Arithmetic operation implementations for the TVM
//!
//! Results wrap modulo 3^27 into the balanced range and set every flag.

use super::{Exec, Flow, Instruction, Tvm};
use crate::error::Fault;
use crate::trit::Trit;
use crate::vm::host::Host;
use crate::vm::register::{word_from, Reg};

impl<H: Host> Tvm<H> {
    /// Write `value` to `rd` with overflow, and carry from trit position 0
    fn write_arith(&mut self, rd: Reg, value: i128, carry: Trit) -> Exec {
        let (word, overflow) = word_from(value);
        self.regs.set_arith_flags(&word, overflow, carry);
        self.regs.set(rd, word);
        Ok(Flow::Next)
    }

    /// Carry out of trit 0 for `a + b`
    fn low_carry(&self, a: Reg, b: Trit) -> Trit {
        self.regs.get(a).trit(0).add(b).1
    }

    pub(super) fn execute_add(&mut self, instr: Instruction) -> Exec {
        let a = self.regs.read(instr.rs1) as i128;
        let b = self.regs.read(instr.rs2) as i128;
        let carry = self.low_carry(instr.rs1, self.regs.get(instr.rs2).trit(0));
        self.write_arith(instr.rd, a + b, carry)
    }

    pub(super) fn execute_sub(&mut self, instr: Instruction) -> Exec {
        let a = self.regs.read(instr.rs1) as i128;
        let b = self.regs.read(instr.rs2) as i128;
        let carry = self.low_carry(instr.rs1, self.regs.get(instr.rs2).trit(0).neg());
        self.write_arith(instr.rd, a - b, carry)
    }

    pub(super) fn execute_inc(&mut self, instr: Instruction) -> Exec {
        let a = self.regs.read(instr.rd) as i128;
        let carry = self.low_carry(instr.rd, Trit::Pos);
        self.write_arith(instr.rd, a + 1, carry)
    }

    pub(super) fn execute_dec(&mut self, instr: Instruction) -> Exec {
        let a = self.regs.read(instr.rd) as i128;
        let carry = self.low_carry(instr.rd, Trit::Neg);
        self.write_arith(instr.rd, a - 1, carry)
    }

    pub(super) fn execute_mul(&mut self, instr: Instruction) -> Exec {
        let a = self.regs.read(instr.rs1) as i128;
        let b = self.regs.read(instr.rs2) as i128;
        self.write_arith(instr.rd, a * b, Trit::Zero)
    }

    /// Truncating division
    pub(super) fn execute_div(&mut self, instr: Instruction) -> Exec {
        let a = self.regs.read(instr.rs1) as i128;
        let b = self.regs.read(instr.rs2) as i128;
        if b == 0 {
            return Err(Fault::DivZero);
        }
        self.write_arith(instr.rd, a / b, Trit::Zero)
    }

    pub(super) fn execute_neg(&mut self, instr: Instruction) -> Exec {
        let word = self.regs.get(instr.rs1).neg();
        self.regs.set_arith_flags(&word, Trit::Zero, Trit::Zero);
        self.regs.set(instr.rd, word);
        Ok(Flow::Next)
    }
}
