//! Profiler hook for the interpreter
//!
//! When a profiler is attached, the TVM emits one [`ProfileEvent`] per
//! executed instruction.

use super::opcode::Opcode;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// One executed instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileEvent {
    /// Instructions executed before this one since load
    pub step: u64,
    pub pc: usize,
    pub opcode: Opcode,
    /// Host clock at execution
    pub tick: u64,
}

pub trait Profiler {
    fn record(&mut self, event: &ProfileEvent);
}

/// Shared profiler, so the caller can keep a handle while the TVM records
impl<P: Profiler> Profiler for Rc<RefCell<P>> {
    fn record(&mut self, event: &ProfileEvent) {
        self.borrow_mut().record(event);
    }
}

/// Counts executed opcodes and remembers the tick window
#[derive(Debug, Clone, Default)]
pub struct OpcodeHistogram {
    counts: BTreeMap<Opcode, u64>,
    first_tick: Option<u64>,
    last_tick: Option<u64>,
}

impl OpcodeHistogram {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, opcode: Opcode) -> u64 {
        self.counts.get(&opcode).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    /// (opcode, count) pairs in opcode order
    pub fn iter(&self) -> impl Iterator<Item = (Opcode, u64)> + '_ {
        self.counts.iter().map(|(op, n)| (*op, *n))
    }

    pub fn first_tick(&self) -> Option<u64> {
        self.first_tick
    }

    pub fn last_tick(&self) -> Option<u64> {
        self.last_tick
    }
}

impl Profiler for OpcodeHistogram {
    fn record(&mut self, event: &ProfileEvent) {
        *self.counts.entry(event.opcode).or_insert(0) += 1;
        self.first_tick.get_or_insert(event.tick);
        self.last_tick = Some(event.tick);
    }
}
