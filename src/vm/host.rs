//! Host - The environment a TVM runs inside
//!
//! The core never touches the outside world directly. Byte I/O and the clock
//! come from a [`Host`], and a host may intercept any syscall before the core
//! handles it.
//!
//! ## Syscall ABI
//!
//! ```text
//! R0        syscall number (result on return)
//! R1..R5    arguments
//! ```
//!
//! | Num | Name            | Args             | R0                         |
//! |----:|-----------------|------------------|----------------------------|
//! |   0 | exit            | status           | halts                      |
//! |   1 | write           | fd, buf, len     | bytes written or -1        |
//! |   2 | read            | fd, buf, len     | bytes read or -1           |
//! | 100 | lambda_reduce   | handle, steps    | new handle or -1           |
//! | 101 | lambda_eval     | handle           | normal form handle or -1   |
//! | 102 | lambda_release  | handle           | 0 or -1                    |

use super::memory::Memory;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Instant;

pub const SYS_EXIT: i64 = 0;
pub const SYS_WRITE: i64 = 1;
pub const SYS_READ: i64 = 2;
pub const SYS_LAMBDA_REDUCE: i64 = 100;
pub const SYS_LAMBDA_EVAL: i64 = 101;
pub const SYS_LAMBDA_RELEASE: i64 = 102;

/// Standard file descriptors
pub const FD_STDIN: i64 = 0;
pub const FD_STDOUT: i64 = 1;
pub const FD_STDERR: i64 = 2;

/// Services the environment provides to a running TVM
pub trait Host {
    /// Write bytes to a descriptor, returning how many were written
    fn write(&mut self, fd: i64, bytes: &[u8]) -> io::Result<usize>;

    /// Read into `buf`, returning how many bytes were filled
    fn read(&mut self, fd: i64, buf: &mut [u8]) -> io::Result<usize>;

    /// Monotonic tick counter
    fn now(&mut self) -> u64;

    /// Intercept a syscall before the core sees it.
    ///
    /// Returning `Some(value)` stores `value` in R0 and skips the built-in
    /// handler.
    fn syscall(&mut self, _number: i64, _args: &[i64; 5], _memory: &mut Memory) -> Option<i64> {
        None
    }
}

fn bad_fd(fd: i64) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, format!("bad file descriptor {}", fd))
}

/// Host backed by the process's standard streams
#[derive(Debug)]
pub struct StdHost {
    started: Instant,
}

impl StdHost {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for StdHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for StdHost {
    fn write(&mut self, fd: i64, bytes: &[u8]) -> io::Result<usize> {
        match fd {
            FD_STDOUT => {
                let mut out = io::stdout().lock();
                out.write_all(bytes)?;
                out.flush()?;
            }
            FD_STDERR => io::stderr().lock().write_all(bytes)?,
            other => return Err(bad_fd(other)),
        }
        Ok(bytes.len())
    }

    fn read(&mut self, fd: i64, buf: &mut [u8]) -> io::Result<usize> {
        match fd {
            FD_STDIN => io::stdin().lock().read(buf),
            other => Err(bad_fd(other)),
        }
    }

    /// Nanoseconds since the host was created
    fn now(&mut self) -> u64 {
        self.started.elapsed().as_nanos() as u64
    }
}

/// In-memory host: captures output, serves scripted input and counts ticks
#[derive(Debug, Default, Clone)]
pub struct BufferHost {
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    input: VecDeque<u8>,
    ticks: u64,
}

impl BufferHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host whose stdin yields `input`
    pub fn with_input(input: impl AsRef<[u8]>) -> Self {
        Self {
            input: input.as_ref().iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn push_input(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn stdout(&self) -> &[u8] {
        &self.stdout
    }

    pub fn stdout_str(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr(&self) -> &[u8] {
        &self.stderr
    }

    pub fn take_stdout(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.stdout)
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Host for BufferHost {
    fn write(&mut self, fd: i64, bytes: &[u8]) -> io::Result<usize> {
        match fd {
            FD_STDOUT => self.stdout.extend_from_slice(bytes),
            FD_STDERR => self.stderr.extend_from_slice(bytes),
            other => return Err(bad_fd(other)),
        }
        Ok(bytes.len())
    }

    fn read(&mut self, fd: i64, buf: &mut [u8]) -> io::Result<usize> {
        if fd != FD_STDIN {
            return Err(bad_fd(fd));
        }
        let n = buf.len().min(self.input.len());
        for (slot, byte) in buf.iter_mut().zip(self.input.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }

    fn now(&mut self) -> u64 {
        self.ticks += 1;
        self.ticks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_host_io() {
        let mut host = BufferHost::with_input("abc");
        assert_eq!(host.write(FD_STDOUT, b"hi").unwrap(), 2);
        assert_eq!(host.write(FD_STDERR, b"!").unwrap(), 1);
        assert!(host.write(7, b"x").is_err());
        assert_eq!(host.stdout_str(), "hi");
        assert_eq!(host.stderr(), b"!");

        let mut buf = [0u8; 2];
        assert_eq!(host.read(FD_STDIN, &mut buf).unwrap(), 2);
        assert_eq!(&buf, b"ab");
        assert_eq!(host.read(FD_STDIN, &mut buf).unwrap(), 1);
        assert_eq!(host.read(FD_STDIN, &mut buf).unwrap(), 0);
    }

    #[test]
    fn test_buffer_host_ticks_monotonic() {
        let mut host = BufferHost::new();
        let a = host.now();
        let b = host.now();
        assert!(b > a);
        assert_eq!(host.ticks(), 2);
    }

    #[test]
    fn test_default_syscall_hook_declines() {
        let mut host = BufferHost::new();
        let mut mem = Memory::new(8);
        assert_eq!(host.syscall(SYS_WRITE, &[0; 5], &mut mem), None);
    }
}
