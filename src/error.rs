//! Error types for teros

use thiserror::Error;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Runtime fault kinds the TVM can stop on.
///
/// A faulted machine stays faulted until a new program is loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Fault {
    /// Decoder saw an unknown opcode byte
    #[error("bad opcode")]
    BadOpcode,
    /// Register operand outside R0..R15
    #[error("bad register")]
    BadRegister,
    /// Control flow left the program
    #[error("bad program counter")]
    BadPC,
    /// DIV with a zero divisor
    #[error("division by zero")]
    DivZero,
    /// PUSH/CALL past the stack limit or POP/RET on an empty stack
    #[error("stack bound exceeded")]
    StackBound,
    /// Memory access out of range or undecodable memory cell
    #[error("bad memory address")]
    BadAddress,
}

/// Teros error type
#[derive(Debug, Error)]
pub enum TernaryError {
    /// Binary trit-array operation on arrays of different lengths
    #[error("Length mismatch: {left} vs {right}")]
    LengthMismatch { left: usize, right: usize },

    /// Value does not fit the destination width
    #[error("Overflow: value does not fit in {width}")]
    Overflow { width: String },

    /// Byte-level input that is not a valid trit
    #[error("Invalid trit encoding: {0}")]
    InvalidTrit(i16),

    /// Gate index outside the canonical range
    #[error("Invalid gate index: {0}")]
    BadGate(u32),

    /// Unknown opcode byte
    #[error("Unknown opcode: 0x{0:02X}")]
    BadOpcode(u8),

    /// Register index out of range
    #[error("Invalid register: {0}")]
    BadRegister(u8),

    /// Runtime fault surfaced from the TVM
    #[error("Fault at pc {pc}: {kind}")]
    Fault { kind: Fault, pc: usize },

    /// Reduction or execution budget exhausted
    #[error("Budget exceeded after {steps} steps")]
    BudgetExceeded { steps: u64 },

    /// Linker could not bind a symbol
    #[error("Unresolved symbol: {0}")]
    UnresolvedSymbol(String),

    /// Two objects export the same global symbol
    #[error("Duplicate symbol: {0}")]
    DuplicateSymbol(String),

    /// Relocated value does not fit the 16-bit immediate field
    #[error("Relocation overflow for {symbol}: {value}")]
    RelocationOverflow { symbol: String, value: i64 },

    /// Release of a node whose refcount is already zero
    #[error("Refcount invariant violated for term {0}")]
    RefcountInvariant(u64),

    /// Handle does not name a live term
    #[error("Unknown term handle: {0}")]
    UnknownTerm(u64),

    /// Compiler input has a free variable
    #[error("Term is not closed: free variable {0}")]
    OpenTerm(String),

    /// Assembly or lambda-term parse error
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl TernaryError {
    pub(crate) fn overflow(width: impl Into<String>) -> Self {
        Self::Overflow { width: width.into() }
    }
}

pub type Result<T> = std::result::Result<T, TernaryError>;
