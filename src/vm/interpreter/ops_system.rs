//! Syscall dispatch for the TVM
//!
//! The host sees every syscall first. Anything it declines is handled here;
//! the result lands in R0.

use super::{Exec, Flow, Tvm};
use crate::lambda::{Exhaustion, ReductionContext, TermId};
use crate::vm::host::{
    Host, SYS_EXIT, SYS_LAMBDA_EVAL, SYS_LAMBDA_RELEASE, SYS_LAMBDA_REDUCE, SYS_READ, SYS_WRITE,
};
use crate::vm::register::Reg;

/// Argument registers, in order
const SYSCALL_ARGS: [Reg; 5] = [Reg::R1, Reg::R2, Reg::R3, Reg::R4, Reg::R5];

/// Budget for `lambda_eval`, which has no step argument
pub const EVAL_STEP_LIMIT: u64 = 1_000_000;

impl<H: Host> Tvm<H> {
    pub(super) fn execute_syscall(&mut self) -> Exec {
        let number = self.regs.read(Reg::R0);
        let args = SYSCALL_ARGS.map(|reg| self.regs.read(reg));

        if let Some(result) = self.host.syscall(number, &args, &mut self.memory) {
            self.regs.write(Reg::R0, result);
            return Ok(Flow::Next);
        }

        let result = match number {
            SYS_EXIT => {
                log::debug!("exit({})", args[0]);
                self.exit_status = Some(args[0]);
                return Ok(Flow::Halt);
            }
            SYS_WRITE => self.sys_write(args[0], args[1], args[2]),
            SYS_READ => self.sys_read(args[0], args[1], args[2]),
            SYS_LAMBDA_REDUCE => self.sys_lambda_reduce(args[0], args[1].max(0) as u64),
            SYS_LAMBDA_EVAL => self.sys_lambda_reduce(args[0], EVAL_STEP_LIMIT),
            SYS_LAMBDA_RELEASE => self.sys_lambda_release(args[0]),
            other => {
                log::warn!("Unknown syscall {} at pc {}", other, self.regs.pc());
                -1
            }
        };
        self.regs.write(Reg::R0, result);
        Ok(Flow::Next)
    }

    fn sys_write(&mut self, fd: i64, buf: i64, len: i64) -> i64 {
        let Ok(len) = usize::try_from(len) else {
            return -1;
        };
        let bytes = match self.memory.read(buf, len) {
            Ok(bytes) => bytes,
            Err(_) => {
                log::warn!("write: buffer {}+{} outside memory", buf, len);
                return -1;
            }
        };
        match self.host.write(fd, bytes) {
            Ok(n) => n as i64,
            Err(e) => {
                log::warn!("write(fd {}): {}", fd, e);
                -1
            }
        }
    }

    fn sys_read(&mut self, fd: i64, buf: i64, len: i64) -> i64 {
        let Ok(len) = usize::try_from(len) else {
            return -1;
        };
        let target = match self.memory.read_mut(buf, len) {
            Ok(target) => target,
            Err(_) => {
                log::warn!("read: buffer {}+{} outside memory", buf, len);
                return -1;
            }
        };
        match self.host.read(fd, target) {
            Ok(n) => n as i64,
            Err(e) => {
                log::warn!("read(fd {}): {}", fd, e);
                -1
            }
        }
    }

    /// Live term named by a register value; stale generations are rejected
    fn term_handle(&self, handle: i64) -> Option<TermId> {
        let raw = u64::try_from(handle).ok()?;
        let id = TermId::from_raw(raw);
        self.terms.contains(id).then_some(id)
    }

    /// Reduce under normal order; the result is a new handle owned by the program
    fn sys_lambda_reduce(&mut self, handle: i64, max_steps: u64) -> i64 {
        let Some(term) = self.term_handle(handle) else {
            log::warn!("lambda syscall on unknown handle {}", handle);
            return -1;
        };
        let mut ctx = ReductionContext::new(max_steps).on_exhaustion(Exhaustion::Error);
        match self.terms.reduce(term, &mut ctx) {
            Ok(reduction) => reduction.term.raw() as i64,
            Err(e) => {
                log::debug!("lambda reduction of {} failed: {}", handle, e);
                -1
            }
        }
    }

    fn sys_lambda_release(&mut self, handle: i64) -> i64 {
        let Some(term) = self.term_handle(handle) else {
            return -1;
        };
        match self.terms.release(term) {
            Ok(()) => 0,
            Err(e) => {
                log::warn!("lambda_release({}): {}", handle, e);
                -1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::boot;
    use super::super::{RunOutcome, Status, Tvm, TvmConfig};
    use crate::lambda::TermStore;
    use crate::vm::host::{BufferHost, Host, SYS_EXIT, SYS_WRITE};
    use crate::vm::instruction::Instruction;
    use crate::vm::memory::Memory;
    use crate::vm::program::Program;
    use crate::vm::register::Reg;
    use std::io;

    #[test]
    fn test_write_syscall() {
        let program = Program::new(&[
            Instruction::li(Reg::R0, SYS_WRITE as i16),
            Instruction::li(Reg::R1, 1),
            Instruction::li(Reg::R2, 0),
            Instruction::li(Reg::R3, 6),
            Instruction::syscall(),
            Instruction::halt(),
        ])
        .with_data(b"hello\n".to_vec());

        let mut tvm = Tvm::new(TvmConfig::small(), BufferHost::new());
        tvm.load(&program).unwrap();
        assert_eq!(tvm.run(100), RunOutcome::Halted);
        assert_eq!(tvm.host().stdout_str(), "hello\n");
        assert_eq!(tvm.registers().read(Reg::R0), 6);
    }

    #[test]
    fn test_read_syscall() {
        let program = Program::new(&[
            Instruction::li(Reg::R0, 2),
            Instruction::li(Reg::R1, 0),
            Instruction::li(Reg::R2, 100),
            Instruction::li(Reg::R3, 8),
            Instruction::syscall(),
            Instruction::halt(),
        ]);
        let mut tvm = Tvm::new(TvmConfig::small(), BufferHost::with_input("abc"));
        tvm.load(&program).unwrap();
        tvm.run(100);
        assert_eq!(tvm.registers().read(Reg::R0), 3);
        assert_eq!(tvm.memory().read(100, 3).unwrap(), b"abc");
    }

    #[test]
    fn test_exit_records_status() {
        let mut tvm = boot(&[
            Instruction::li(Reg::R0, SYS_EXIT as i16),
            Instruction::li(Reg::R1, 42),
            Instruction::syscall(),
            Instruction::inc(Reg::R5),
        ]);
        assert_eq!(tvm.run(100), RunOutcome::Halted);
        assert_eq!(tvm.exit_status(), Some(42));
        assert_eq!(tvm.registers().read(Reg::R5), 0);
        assert_eq!(tvm.status(), Status::Halted);
    }

    #[test]
    fn test_unknown_syscall_returns_minus_one() {
        let mut tvm = boot(&[
            Instruction::li(Reg::R0, 777),
            Instruction::syscall(),
            Instruction::halt(),
        ]);
        assert_eq!(tvm.run(100), RunOutcome::Halted);
        assert_eq!(tvm.registers().read(Reg::R0), -1);
    }

    #[test]
    fn test_bad_write_buffer_returns_minus_one() {
        let mut tvm = boot(&[
            Instruction::li(Reg::R0, SYS_WRITE as i16),
            Instruction::li(Reg::R1, 1),
            Instruction::li(Reg::R2, -5),
            Instruction::li(Reg::R3, 3),
            Instruction::syscall(),
            Instruction::halt(),
        ]);
        assert_eq!(tvm.run(100), RunOutcome::Halted);
        assert_eq!(tvm.registers().read(Reg::R0), -1);
        assert!(tvm.host().stdout().is_empty());
    }

    struct Intercepting;

    impl Host for Intercepting {
        fn write(&mut self, _fd: i64, _bytes: &[u8]) -> io::Result<usize> {
            Ok(0)
        }
        fn read(&mut self, _fd: i64, _buf: &mut [u8]) -> io::Result<usize> {
            Ok(0)
        }
        fn now(&mut self) -> u64 {
            0
        }
        fn syscall(&mut self, number: i64, args: &[i64; 5], _memory: &mut Memory) -> Option<i64> {
            (number == 500).then(|| args[0] * 2)
        }
    }

    #[test]
    fn test_host_interception() {
        let mut tvm = Tvm::new(TvmConfig::small(), Intercepting);
        tvm.load(&Program::new(&[
            Instruction::li(Reg::R0, 500),
            Instruction::li(Reg::R1, 21),
            Instruction::syscall(),
            Instruction::halt(),
        ]))
        .unwrap();
        tvm.run(10);
        assert_eq!(tvm.registers().read(Reg::R0), 42);
    }

    #[test]
    fn test_lambda_syscalls() {
        let mut tvm = Tvm::new(TvmConfig::small(), BufferHost::new());
        let store: &mut TermStore = tvm.terms_mut();
        let x = store.intern("x");
        let y = store.intern("y");
        let id = {
            let body = store.var(x);
            store.lam(x, body)
        };
        let arg = store.var(y);
        let redex = store.app(id, arg);
        let expected = store.make_var(y);

        tvm.load(&Program::new(&[
            Instruction::li(Reg::R0, 100),
            Instruction::li(Reg::R1, redex.raw() as i16),
            Instruction::li(Reg::R2, 10),
            Instruction::syscall(),
            Instruction::halt(),
        ]))
        .unwrap();
        assert_eq!(tvm.run(10), RunOutcome::Halted);

        let result = tvm.registers().read(Reg::R0);
        assert!(result >= 0);
        let store = tvm.terms();
        let result = crate::lambda::TermId::from_raw(result as u64);
        assert!(store.alpha_eq(result, expected));
    }

    #[test]
    fn test_lambda_release_rejects_stale_handle() {
        let mut tvm = Tvm::new(TvmConfig::small(), BufferHost::new());
        let store = tvm.terms_mut();
        let (x, y) = (store.intern("x"), store.intern("y"));
        let stale = store.var(x);
        store.release(stale).unwrap();
        let reused = store.var(y);
        assert_eq!(stale.raw() & 0xFF_FFFF, reused.raw() & 0xFF_FFFF);

        tvm.load(&Program::new(&[
            Instruction::li(Reg::R0, 102),
            Instruction::li(Reg::R1, stale.raw() as i16),
            Instruction::syscall(),
            Instruction::halt(),
        ]))
        .unwrap();
        assert_eq!(tvm.run(10), RunOutcome::Halted);
        assert_eq!(tvm.registers().read(Reg::R0), -1);

        let store = tvm.terms();
        assert!(store.contains(reused));
        assert_eq!(store.refcount(reused), 1);
    }

    #[test]
    fn test_lambda_unknown_handle() {
        let mut tvm = boot(&[
            Instruction::li(Reg::R0, 101),
            Instruction::li(Reg::R1, 999),
            Instruction::syscall(),
            Instruction::halt(),
        ]);
        tvm.run(10);
        assert_eq!(tvm.registers().read(Reg::R0), -1);
    }
}
