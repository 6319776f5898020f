//! # Teros - Balanced-ternary compute core
//!
//! A ternary virtual machine and a λ-calculus engine that compiles down to it.
//! Everything is built on the trit: a digit in {-1, 0, +1}.
//!
//! ## Core Components
//!
//! - **Trit / TritArray**: Kleene logic and balanced arithmetic, packed four
//!   trits per byte
//! - **Gates**: all 27 monadic and 19 683 dyadic trit functions by index
//! - **TVM**: 27-trit register machine running T3-ISA programs (.t3s/.t3o)
//! - **λ-engine**: refcounted term arena, budgeted β-reduction, Church
//!   encodings and a compiler to T3
//!
//! ## Pipeline
//!
//! ```text
//! λ-term --compile--> .t3s --assemble--> Object --link--> Program --> TVM
//! ```
//!
//! ## Example
//!
//! ```
//! use teros::vm::{assemble_program, Reg, RunOutcome, Tvm, TvmConfig};
//!
//! let program = assemble_program("LI R1, 20\nLI R2, 22\nADD R1, R1, R2\nHALT").unwrap();
//! let mut tvm = Tvm::with_std_host(TvmConfig::small());
//! tvm.load(&program).unwrap();
//! assert_eq!(tvm.run(100), RunOutcome::Halted);
//! assert_eq!(tvm.registers().read(Reg::R1), 42);
//! ```

// Trit algebra and packed arrays
pub mod trit;
pub mod trit_array;
pub use trit::Trit;
pub use trit_array::TritArray;

// Canonical gate tables
pub mod gate;
pub use gate::{DyadicGate, GateProperties, MonadicGate};

// T3-ISA, TVM and toolchain
pub mod vm;
pub use vm::{
    // Execution
    Instruction, Opcode, Program, RunOutcome, Status, Tvm, TvmConfig,
    // Toolchain
    assemble, assemble_program, disassemble, link, Object,
    // Object codec
    deserialize, load_from_file, save_to_file, serialize,
};

// λ-calculus engine
pub mod lambda;
pub use lambda::{compile, parse_term, ReductionContext, TermId, TermStore};

// Error types
mod error;
pub use error::{Fault, Result, TernaryError};

// Program loader - sources and objects by content
pub mod loader;
pub use loader::{load_path, load_paths, load_string, ProgramLoader};

// Validation utilities
pub mod validate;
pub use validate::{
    validate_directory, validate_file, ValidationError, ValidationResult, ValidationSummary,
};
