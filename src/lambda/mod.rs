//! λ-calculus engine
//!
//! A refcounted term arena with capture-avoiding substitution, budgeted
//! β-reduction, Church encodings, a small text syntax and a compiler that
//! lowers closed terms to T3 programs.
//!
//! ## Example
//!
//! ```
//! use teros::lambda::{church, parse_term, ReductionContext, TermStore};
//!
//! let mut store = TermStore::new();
//! let term = parse_term(&mut store, "(\\m n f x. m f (n f x)) 2 1").unwrap();
//! let result = store.reduce(term, &mut ReductionContext::new(100)).unwrap();
//! assert_eq!(church::as_numeral(&store, result.term), Some(3));
//! store.release(term).unwrap();
//! store.release(result.term).unwrap();
//! assert_eq!(store.live_nodes(), 0);
//! ```

pub mod church;
pub mod compile;
pub mod parse;
pub mod reduce;
mod subst;
pub mod term;

pub use compile::{compile, CompileOptions, Compiled, Readback, HEAP_EXHAUSTED_STATUS};
pub use parse::parse_term;
pub use reduce::{Exhaustion, Outcome, Reduction, ReductionContext, Strategy};
pub use term::{Node, TermDisplay, TermId, TermStore, VarId};
