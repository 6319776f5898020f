//! Interpreter - The TVM execution engine
//!
//! Executes linked T3 programs against a 27-trit register file and a flat
//! byte memory. One [`Tvm::step`] is one fetch → decode → execute cycle:
//!
//! ```text
//! Halted ──load──▶ Running ──HALT / exit──▶ Halted
//!                     │
//!                     └──fault──▶ Faulted(kind, pc)
//! ```
//!
//! Budgeted [`Tvm::run`] calls return [`RunOutcome::Suspended`] when the
//! budget runs out; calling `run` again resumes exactly where it stopped.

mod ops_arith;
mod ops_control;
mod ops_logic;
mod ops_memory;
mod ops_system;

use super::host::{Host, StdHost};
use super::instruction::Instruction;
use super::memory::Memory;
use super::opcode::Opcode;
use super::profiler::{ProfileEvent, Profiler};
use super::program::Program;
use super::register::{RegisterFile, Word};
use crate::error::{Fault, Result, TernaryError};
use crate::lambda::TermStore;
use crate::trit::Trit;
use crate::trit_array::TritArray;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// TVM sizing and budget defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TvmConfig {
    /// Total memory in bytes
    pub memory_bytes: usize,
    /// Bytes reserved for the stack at the top of memory
    pub stack_bytes: usize,
    /// Instruction budget used by [`Tvm::run_default`]
    pub default_budget: u64,
}

impl TvmConfig {
    /// First byte of the stack region; everything below is data and heap
    pub fn stack_base(&self) -> usize {
        self.memory_bytes.saturating_sub(self.stack_bytes)
    }

    /// Compact machine for tests and embedding
    pub fn small() -> Self {
        Self {
            memory_bytes: 4 * 1024,
            stack_bytes: 512,
            default_budget: 10_000,
        }
    }
}

impl Default for TvmConfig {
    fn default() -> Self {
        Self {
            memory_bytes: 64 * 1024,
            stack_bytes: 4 * 1024,
            default_budget: 1_000_000,
        }
    }
}

/// Machine state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Status {
    Halted,
    Running,
    Faulted { kind: Fault, pc: usize },
}

/// Result of a single [`Tvm::step`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepResult {
    /// One instruction executed, machine still running
    Continue,
    Halted,
    Faulted { kind: Fault, pc: usize },
}

/// Result of a budgeted [`Tvm::run`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Halted,
    Faulted { kind: Fault, pc: usize },
    /// Budget exhausted while still running; `run` again to resume
    Suspended { executed: u64 },
}

/// Full machine state, for determinism checks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TvmSnapshot {
    pub registers: RegisterFile,
    pub memory: Vec<u8>,
    pub steps: u64,
    pub status: Status,
    pub exit_status: Option<i64>,
}

/// Control decision of one executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Next,
    /// Absolute instruction index (validated before it is taken)
    Goto(i64),
    Halt,
}

type Exec = std::result::Result<Flow, Fault>;

/// Ternary virtual machine
pub struct Tvm<H: Host = StdHost> {
    config: TvmConfig,
    host: H,
    regs: RegisterFile,
    memory: Memory,
    code: Vec<u8>,
    status: Status,
    steps: u64,
    exit_status: Option<i64>,
    terms: TermStore,
    profiler: Option<Box<dyn Profiler>>,
}

impl Tvm<StdHost> {
    /// TVM on the process's standard streams
    pub fn with_std_host(config: TvmConfig) -> Self {
        Self::new(config, StdHost::new())
    }
}

impl<H: Host> Tvm<H> {
    pub fn new(config: TvmConfig, host: H) -> Self {
        Self {
            config,
            host,
            regs: RegisterFile::new(),
            memory: Memory::new(config.memory_bytes),
            code: Vec::new(),
            status: Status::Halted,
            steps: 0,
            exit_status: None,
            terms: TermStore::new(),
            profiler: None,
        }
    }

    /// Reset registers and memory, copy in the program and start running
    pub fn load(&mut self, program: &Program) -> Result<()> {
        let stack_base = self.stack_base();
        if self.config.stack_bytes > self.config.memory_bytes {
            return Err(TernaryError::overflow(format!(
                "stack of {} bytes in {} bytes of memory",
                self.config.stack_bytes, self.config.memory_bytes
            )));
        }
        if program.data.len() > stack_base {
            return Err(TernaryError::overflow(format!(
                "data section of {} bytes below stack at {}",
                program.data.len(),
                stack_base
            )));
        }

        self.regs.clear();
        self.memory.clear();
        self.memory
            .write(0, &program.data)
            .map_err(|kind| TernaryError::Fault { kind, pc: 0 })?;
        self.code = program.code_bytes().to_vec();
        self.regs.set_pc(program.entry);
        self.regs.set_sp(self.config.memory_bytes as i64);
        self.steps = 0;
        self.exit_status = None;
        self.status = Status::Running;

        log::debug!(
            "Loaded program: {} instructions, {} data bytes, entry {}",
            self.program_len(),
            program.data.len(),
            program.entry
        );
        Ok(())
    }

    /// Execute one instruction, or report the terminal state
    pub fn step(&mut self) -> StepResult {
        match self.status {
            Status::Halted => return StepResult::Halted,
            Status::Faulted { kind, pc } => return StepResult::Faulted { kind, pc },
            Status::Running => {}
        }

        let pc = self.regs.pc();
        let flow = self.execute_at(pc).and_then(|flow| match flow {
            Flow::Goto(target) if target < 0 || target as usize >= self.program_len() => {
                Err(Fault::BadPC)
            }
            other => Ok(other),
        });

        match flow {
            Ok(Flow::Next) => {
                self.regs.set_pc(pc + 1);
                StepResult::Continue
            }
            Ok(Flow::Goto(target)) => {
                self.regs.set_pc(target as usize);
                StepResult::Continue
            }
            Ok(Flow::Halt) => {
                log::debug!("Halted at pc {} after {} steps", pc, self.steps);
                self.status = Status::Halted;
                StepResult::Halted
            }
            Err(kind) => {
                log::debug!("Fault at pc {}: {}", pc, kind);
                self.status = Status::Faulted { kind, pc };
                StepResult::Faulted { kind, pc }
            }
        }
    }

    /// Run at most `budget` instructions
    pub fn run(&mut self, budget: u64) -> RunOutcome {
        let mut executed = 0;
        while executed < budget {
            match self.step() {
                StepResult::Continue => executed += 1,
                StepResult::Halted => return RunOutcome::Halted,
                StepResult::Faulted { kind, pc } => return RunOutcome::Faulted { kind, pc },
            }
        }
        match self.status {
            Status::Running => RunOutcome::Suspended { executed },
            Status::Halted => RunOutcome::Halted,
            Status::Faulted { kind, pc } => RunOutcome::Faulted { kind, pc },
        }
    }

    /// Run with the configured default budget
    pub fn run_default(&mut self) -> RunOutcome {
        self.run(self.config.default_budget)
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn snapshot(&self) -> TvmSnapshot {
        TvmSnapshot {
            registers: self.regs.clone(),
            memory: self.memory.as_bytes().to_vec(),
            steps: self.steps,
            status: self.status,
            exit_status: self.exit_status,
        }
    }

    pub fn attach_profiler(&mut self, profiler: impl Profiler + 'static) {
        self.profiler = Some(Box::new(profiler));
    }

    pub fn detach_profiler(&mut self) -> Option<Box<dyn Profiler>> {
        self.profiler.take()
    }

    // === Accessors ===

    pub fn config(&self) -> &TvmConfig {
        &self.config
    }

    pub fn registers(&self) -> &RegisterFile {
        &self.regs
    }

    pub fn registers_mut(&mut self) -> &mut RegisterFile {
        &mut self.regs
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn terms(&self) -> &TermStore {
        &self.terms
    }

    pub fn terms_mut(&mut self) -> &mut TermStore {
        &mut self.terms
    }

    /// Instructions executed since load
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Status passed to the exit syscall, if it ran
    pub fn exit_status(&self) -> Option<i64> {
        self.exit_status
    }

    pub fn program_len(&self) -> usize {
        self.code.len() / Instruction::SIZE
    }

    /// Lowest address the stack may grow to
    pub fn stack_base(&self) -> usize {
        self.config.stack_base()
    }

    // === Execution ===

    fn fetch(&self, pc: usize) -> std::result::Result<Instruction, Fault> {
        let start = pc.checked_mul(Instruction::SIZE).ok_or(Fault::BadPC)?;
        let chunk = self
            .code
            .get(start..start + Instruction::SIZE)
            .ok_or(Fault::BadPC)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        Instruction::from_bytes(&raw).map_err(|e| match e {
            TernaryError::BadRegister(_) => Fault::BadRegister,
            _ => Fault::BadOpcode,
        })
    }

    fn execute_at(&mut self, pc: usize) -> Exec {
        let instr = self.fetch(pc)?;

        if let Some(profiler) = self.profiler.as_mut() {
            let event = ProfileEvent {
                step: self.steps,
                pc,
                opcode: instr.opcode,
                tick: self.host.now(),
            };
            profiler.record(&event);
        }
        log::trace!("{:>6} pc={:<5} {}", self.steps, pc, instr);
        self.steps += 1;

        match instr.opcode {
            // System (ops_system.rs)
            Opcode::Nop => Ok(Flow::Next),
            Opcode::Halt => Ok(Flow::Halt),
            Opcode::Syscall => self.execute_syscall(),

            // Data movement (ops_memory.rs)
            Opcode::Load => self.execute_load(instr),
            Opcode::Store => self.execute_store(instr),
            Opcode::Mov => self.execute_mov(instr),
            Opcode::Li => self.execute_li(instr),

            // Arithmetic (ops_arith.rs)
            Opcode::Add => self.execute_add(instr),
            Opcode::Sub => self.execute_sub(instr),
            Opcode::Mul => self.execute_mul(instr),
            Opcode::Div => self.execute_div(instr),
            Opcode::Neg => self.execute_neg(instr),
            Opcode::Inc => self.execute_inc(instr),
            Opcode::Dec => self.execute_dec(instr),

            // Logic (ops_logic.rs)
            Opcode::And => self.execute_trit_logic(instr, Trit::and),
            Opcode::Or => self.execute_trit_logic(instr, Trit::or),
            Opcode::Xor => self.execute_trit_logic(instr, Trit::xor),
            Opcode::Not => self.execute_not(instr),
            Opcode::Gate => self.execute_gate(instr),

            // Control flow (ops_control.rs)
            Opcode::Jmp => Ok(Flow::Goto(instr.branch_target(pc))),
            Opcode::Jz | Opcode::Jnz | Opcode::Jpos | Opcode::Jneg => {
                self.execute_branch(instr, pc)
            }
            Opcode::Call => self.execute_call(instr, pc),
            Opcode::Ret => self.execute_ret(),

            // Stack (ops_memory.rs)
            Opcode::Push => self.execute_push(instr),
            Opcode::Pop => self.execute_pop(instr),
        }
    }
}

/// Combine two words trit by trit
pub(crate) fn zip_word(a: &Word, b: &Word, f: impl Fn(Trit, Trit) -> Trit) -> Word {
    let trits: Vec<Trit> = a.iter().zip(b.iter()).map(|(x, y)| f(x, y)).collect();
    TritArray::from_trits(&trits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vm::host::BufferHost;
    use crate::vm::profiler::OpcodeHistogram;
    use crate::vm::register::{Flag, Reg};
    use std::cell::RefCell;
    use std::rc::Rc;

    pub(super) fn boot(instructions: &[Instruction]) -> Tvm<BufferHost> {
        let mut tvm = Tvm::new(TvmConfig::small(), BufferHost::new());
        tvm.load(&Program::new(instructions)).unwrap();
        tvm
    }

    #[test]
    fn test_starts_halted() {
        let mut tvm = Tvm::new(TvmConfig::small(), BufferHost::new());
        assert_eq!(tvm.status(), Status::Halted);
        assert_eq!(tvm.step(), StepResult::Halted);
    }

    #[test]
    fn test_add_sets_carry() {
        let mut tvm = boot(&[
            Instruction::li(Reg::R0, 1),
            Instruction::li(Reg::R1, 1),
            Instruction::add(Reg::R2, Reg::R0, Reg::R1),
            Instruction::halt(),
        ]);
        assert_eq!(tvm.run(100), RunOutcome::Halted);

        let regs = tvm.registers();
        assert_eq!(regs.get(Reg::R2).trit(0), Trit::Neg);
        assert_eq!(regs.get(Reg::R2).trit(1), Trit::Pos);
        assert_eq!(regs.read(Reg::R2), 2);
        assert_eq!(regs.flag(Flag::Carry), Trit::Pos);
        assert_eq!(regs.flag(Flag::Sign), Trit::Pos);
    }

    #[test]
    fn test_push_pop() {
        let mut tvm = boot(&[
            Instruction::li(Reg::R0, 1),
            Instruction::push(Reg::R0),
            Instruction::li(Reg::R0, 0),
            Instruction::pop(Reg::R1),
            Instruction::halt(),
        ]);
        assert_eq!(tvm.run(100), RunOutcome::Halted);
        assert_eq!(tvm.registers().read(Reg::R1), 1);
        assert_eq!(tvm.registers().read(Reg::R0), 0);
        assert_eq!(tvm.registers().sp(), tvm.config().memory_bytes as i64);
    }

    #[test]
    fn test_run_off_end_faults() {
        let mut tvm = boot(&[Instruction::nop()]);
        assert_eq!(
            tvm.run(10),
            RunOutcome::Faulted {
                kind: Fault::BadPC,
                pc: 1
            }
        );
        assert_eq!(
            tvm.status(),
            Status::Faulted {
                kind: Fault::BadPC,
                pc: 1
            }
        );
    }

    #[test]
    fn test_bad_opcode_and_register() {
        let mut tvm = Tvm::new(TvmConfig::small(), BufferHost::new());
        let program = Program::from_code_bytes(vec![0xEE, 0, 0, 0, 0, 0, 0, 0]).unwrap();
        tvm.load(&program).unwrap();
        assert_eq!(
            tvm.step(),
            StepResult::Faulted {
                kind: Fault::BadOpcode,
                pc: 0
            }
        );

        let program = Program::from_code_bytes(vec![0x12, 1, 99, 0, 0, 0, 0, 0]).unwrap();
        tvm.load(&program).unwrap();
        assert!(matches!(
            tvm.step(),
            StepResult::Faulted {
                kind: Fault::BadRegister,
                ..
            }
        ));
    }

    #[test]
    fn test_suspend_and_resume() {
        // Count R1 down from 5
        let mut tvm = boot(&[
            Instruction::li(Reg::R1, 5),
            Instruction::dec(Reg::R1),
            Instruction::branch(Opcode::Jnz, Reg::R1, -1),
            Instruction::halt(),
        ]);
        assert_eq!(tvm.run(4), RunOutcome::Suspended { executed: 4 });
        assert_eq!(tvm.status(), Status::Running);
        assert_eq!(tvm.run(100), RunOutcome::Halted);
        assert_eq!(tvm.registers().read(Reg::R1), 0);
        assert_eq!(tvm.steps(), 1 + 5 * 2 + 1);
    }

    #[test]
    fn test_determinism() {
        let program = [
            Instruction::li(Reg::R1, 7),
            Instruction::li(Reg::R2, -3),
            Instruction::binary(Opcode::Mul, Reg::R3, Reg::R1, Reg::R2),
            Instruction::push(Reg::R3),
            Instruction::store(Reg::R3, Reg::R0, 16),
            Instruction::halt(),
        ];
        let mut a = boot(&program);
        let mut b = boot(&program);
        a.run(100);
        b.run(100);
        assert_eq!(a.snapshot(), b.snapshot());
        assert_eq!(a.registers().read(Reg::R3), -21);
    }

    #[test]
    fn test_profiler_sees_every_instruction() {
        let hist = Rc::new(RefCell::new(OpcodeHistogram::new()));
        let mut tvm = boot(&[
            Instruction::li(Reg::R0, 1),
            Instruction::li(Reg::R1, 2),
            Instruction::halt(),
        ]);
        tvm.attach_profiler(Rc::clone(&hist));
        tvm.run(10);

        let hist = hist.borrow();
        assert_eq!(hist.count(Opcode::Li), 2);
        assert_eq!(hist.count(Opcode::Halt), 1);
        assert_eq!(hist.first_tick(), Some(1));
        assert_eq!(hist.last_tick(), Some(3));
    }

    #[test]
    fn test_load_rejects_oversized_data() {
        let mut tvm = Tvm::new(TvmConfig::small(), BufferHost::new());
        let program = Program::new(&[Instruction::halt()]).with_data(vec![0u8; 4000]);
        assert!(tvm.load(&program).is_err());
        assert_eq!(tvm.status(), Status::Halted);
    }
}
