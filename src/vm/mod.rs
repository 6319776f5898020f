//! T3 VM - Balanced-ternary register machine
//!
//! The TVM executes T3-ISA programs over 27-trit words: sixteen general
//! registers, PC, SP, a FLAGS word and a byte-addressed memory holding packed
//! words.
//!
//! ## Format: 8-byte instructions
//!
//! ```text
//! [OPCODE:1][RD:1][RS1:1][RS2:1][IMM:2][RESERVED:2]
//! ```
//!
//! - OPCODE: One of 28 operations (0x00-0x51, grouped by high nibble)
//! - RD/RS1/RS2: Register indices 0-15
//! - IMM: Signed 16-bit immediate, little-endian (GATE reads it unsigned)
//!
//! ## Memory Layout
//!
//! ```text
//! 0                    stack_base            memory_bytes
//! [ .data | free ... ][ stack (grows down) <- SP ]
//! ```
//!
//! ## Toolchain
//!
//! ```text
//! .t3s --assembler--> Object --linker--> Program --Tvm::load--> run
//!                       |                   |
//!                   object codec       disassembler
//! ```
//!
//! ## Example Assembly
//!
//! ```text
//! ; count down from 3
//! .global main
//! main:
//!     LI   R1, 3
//! loop:
//!     DEC  R1
//!     JNZ  R1, loop
//!     HALT
//! ```

pub mod assembler;
pub mod disassembler;
pub mod host;
pub mod instruction;
pub mod interpreter;
pub mod linker;
pub mod memory;
pub mod object;
pub mod opcode;
pub mod profiler;
pub mod program;
pub mod register;
pub mod validator;

pub use assembler::{assemble, assemble_program, Assembler};
pub use disassembler::disassemble;
pub use host::{BufferHost, Host, StdHost};
pub use instruction::Instruction;
pub use interpreter::{RunOutcome, Status, StepResult, Tvm, TvmConfig, TvmSnapshot};
pub use linker::{link, Linker};
pub use memory::{Memory, WORD_BYTES};
pub use object::{
    deserialize, is_object, load_from_file, save_to_file, serialize, Binding, Object, RelocKind,
    Relocation, Symbol,
};
pub use opcode::{OperandPattern, Opcode};
pub use profiler::{OpcodeHistogram, ProfileEvent, Profiler};
pub use program::{Program, ProgramSymbol, SymbolSpace};
pub use register::{Flag, Reg, RegisterFile, Word, REGISTER_COUNT, WORD_TRITS};
pub use validator::{Diagnostic, DiagnosticLevel, ProgramValidator, ValidationConfig};
