//! λ → T3 compiler
//!
//! Closure conversion with defunctionalised dispatch. Every abstraction gets
//! a numeric tag and a code block; a closure is a two-word heap record
//! `[tag, env]` and an environment is a chain of `[value, next]` cells.
//! Application goes through one shared `apply` routine that conses the
//! argument onto the closure's environment and branches to the block for its
//! tag. Evaluation is call-by-value.
//!
//! Register conventions:
//!
//! ```text
//! R1   accumulator (result of the last expression)
//! R2   current environment (0 = empty)
//! R3   argument on entry to apply
//! R4-6 scratch
//! R13  readback counter
//! R14  heap limit, loaded from the data word at address 0
//! R15  heap pointer (bump allocated upward from address 7)
//! ```
//!
//! Every allocation reserves its cell, compares R15 against R14 and only
//! then writes. A program whose heap would cross the limit exits with
//! [`HEAP_EXHAUSTED_STATUS`] instead of running into the stack.
//!
//! The generated text goes through the assembler and linker, so every label
//! is resolved there.

use super::reduce::{Exhaustion, ReductionContext};
use super::term::{Node, TermId, TermStore, VarId};
use crate::error::{Result, TernaryError};
use crate::vm::assembler::assemble_program;
use crate::vm::host::SYS_EXIT;
use crate::vm::interpreter::TvmConfig;
use crate::vm::memory::WORD_BYTES;
use crate::vm::program::Program;
use std::collections::VecDeque;
use std::fmt::Write;

/// Primitive that increments R13 and returns its argument
const TAG_COUNTER: u32 = 0;
/// Primitives returned by the boolean readback
const TAG_MARK_TRUE: u32 = 1;
const TAG_MARK_FALSE: u32 = 2;
/// First tag handed to user abstractions
const FIRST_USER_TAG: u32 = 3;

/// Heap starts after the limit word, so address 0 never names a cell and
/// can mean "empty environment"
const HEAP_START: usize = WORD_BYTES;
/// Size of a closure record or environment cell
const CELL_BYTES: usize = 2 * WORD_BYTES;

/// Exit status of a compiled program that ran out of heap
pub const HEAP_EXHAUSTED_STATUS: i64 = 12;

/// How the compiled program reports its result in R1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readback {
    /// R1 holds the address of the result closure
    #[default]
    Closure,
    /// Apply the result to a counter; R1 holds the numeral's value
    ChurchNumeral,
    /// Apply the result to two markers; R1 is 1 for TRUE and 0 for FALSE
    ChurchBool,
}

#[derive(Debug, Clone)]
pub struct CompileOptions {
    pub readback: Readback,
    /// β-reduce the term (normal order, this many steps) before lowering
    pub normalize_first: Option<u64>,
    /// Highest address the heap may reach (exclusive). Defaults to the
    /// stack base of [`TvmConfig::default`].
    pub heap_limit: usize,
}

impl CompileOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn readback(mut self, readback: Readback) -> Self {
        self.readback = readback;
        self
    }

    pub fn normalize_first(mut self, budget: u64) -> Self {
        self.normalize_first = Some(budget);
        self
    }

    /// Size the heap for a machine other than the default one
    pub fn heap_limit(mut self, bytes: usize) -> Self {
        self.heap_limit = bytes;
        self
    }
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            readback: Readback::default(),
            normalize_first: None,
            heap_limit: TvmConfig::default().stack_base(),
        }
    }
}

/// Compiler output: the generated assembly and the linked program
#[derive(Debug, Clone)]
pub struct Compiled {
    pub source: String,
    pub program: Program,
}

/// Lowered node with de Bruijn indices and abstraction tags. Children are
/// indices into the owning [`Ir`].
#[derive(Debug, Clone, Copy)]
enum IrNode {
    Var(usize),
    Lam(u32, usize),
    App(usize, usize),
    Prim(u32),
}

/// Flat arena of lowered nodes
#[derive(Debug, Default)]
struct Ir {
    nodes: Vec<IrNode>,
}

impl Ir {
    fn push(&mut self, node: IrNode) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    /// `root a b` on two primitives
    fn harness(&mut self, root: usize, a: u32, b: u32) -> usize {
        let a = self.push(IrNode::Prim(a));
        let b = self.push(IrNode::Prim(b));
        let applied = self.push(IrNode::App(root, a));
        self.push(IrNode::App(applied, b))
    }
}

/// Where a lowered node gets linked into its parent
#[derive(Debug, Clone, Copy)]
enum Slot {
    Root,
    Body(usize),
    Func(usize),
    Arg(usize),
}

struct Lowering<'a> {
    store: &'a TermStore,
    scope: Vec<VarId>,
    next_tag: u32,
    ir: Ir,
}

impl Lowering<'_> {
    /// Pre-order walk; each node is pushed first and its children patched in
    /// once they exist. Tags follow source order, function side first.
    fn lower(&mut self, t: TermId) -> Result<usize> {
        enum Task {
            Enter(TermId, Slot),
            Unbind,
        }

        let mut root = 0;
        let mut pending = vec![Task::Enter(t, Slot::Root)];
        while let Some(task) = pending.pop() {
            let (id, slot) = match task {
                Task::Unbind => {
                    self.scope.pop();
                    continue;
                }
                Task::Enter(id, slot) => (id, slot),
            };
            let index = match self.store.node(id) {
                Node::Var(v) => match self.scope.iter().rposition(|b| *b == v) {
                    Some(pos) => self.ir.push(IrNode::Var(self.scope.len() - 1 - pos)),
                    None => return Err(TernaryError::OpenTerm(self.store.var_name(v))),
                },
                Node::Abs(p, body) => {
                    let tag = self.next_tag;
                    self.next_tag += 1;
                    let index = self.ir.push(IrNode::Lam(tag, 0));
                    self.scope.push(p);
                    pending.push(Task::Unbind);
                    pending.push(Task::Enter(body, Slot::Body(index)));
                    index
                }
                Node::App(f, a) => {
                    let index = self.ir.push(IrNode::App(0, 0));
                    pending.push(Task::Enter(a, Slot::Arg(index)));
                    pending.push(Task::Enter(f, Slot::Func(index)));
                    index
                }
            };
            self.link(slot, index);
            if let Slot::Root = slot {
                root = index;
            }
        }
        Ok(root)
    }

    fn link(&mut self, slot: Slot, child: usize) {
        match slot {
            Slot::Root => {}
            Slot::Body(parent) => {
                if let IrNode::Lam(_, body) = &mut self.ir.nodes[parent] {
                    *body = child;
                }
            }
            Slot::Func(parent) => {
                if let IrNode::App(func, _) = &mut self.ir.nodes[parent] {
                    *func = child;
                }
            }
            Slot::Arg(parent) => {
                if let IrNode::App(_, arg) = &mut self.ir.nodes[parent] {
                    *arg = child;
                }
            }
        }
    }
}

/// Assembly text builder
struct Emitter<'a> {
    ir: &'a Ir,
    out: String,
    blocks: VecDeque<(u32, usize)>,
}

impl Emitter<'_> {
    fn op(&mut self, text: impl AsRef<str>) {
        let _ = writeln!(self.out, "    {}", text.as_ref());
    }

    fn label(&mut self, name: impl AsRef<str>) {
        let _ = writeln!(self.out, "{}:", name.as_ref());
    }

    /// Advance R15 by one cell, leaving through `heap_full` past R14
    fn reserve_cell(&mut self, scratch: &str) {
        self.op(format!("LI {}, {}", scratch, CELL_BYTES));
        self.op(format!("ADD R15, R15, {}", scratch));
        self.op("SUB R6, R15, R14");
        self.op("JPOS R6, heap_full");
    }

    /// Leave the closure `[tag, R2]` in R1
    fn closure(&mut self, tag: u32) {
        self.op("MOV R1, R15");
        self.reserve_cell("R3");
        self.op(format!("LI R3, {}", tag));
        self.op("STORE R3, R1, 0");
        self.op(format!("STORE R2, R1, {}", WORD_BYTES));
    }

    /// Code that leaves the value of `root` in R1. Nested applications are
    /// emitted inline, so the walk keeps its own stack.
    fn expr(&mut self, root: usize) {
        enum Emit {
            Node(usize),
            Op(&'static str),
        }

        let mut pending = vec![Emit::Node(root)];
        while let Some(item) = pending.pop() {
            let index = match item {
                Emit::Op(text) => {
                    self.op(text);
                    continue;
                }
                Emit::Node(index) => index,
            };
            match self.ir.nodes[index] {
                IrNode::Var(depth) => {
                    self.op("MOV R4, R2");
                    for _ in 0..depth {
                        self.op(format!("LOAD R4, R4, {}", WORD_BYTES));
                    }
                    self.op("LOAD R1, R4, 0");
                }
                IrNode::Lam(tag, body) => {
                    self.closure(tag);
                    self.blocks.push_back((tag, body));
                }
                IrNode::Prim(tag) => self.closure(tag),
                // Argument first, then the function; pushed in reverse
                IrNode::App(f, a) => pending.extend([
                    Emit::Op("POP R2"),
                    Emit::Op("CALL apply"),
                    Emit::Op("PUSH R2"),
                    Emit::Op("POP R3"),
                    Emit::Node(f),
                    Emit::Op("PUSH R1"),
                    Emit::Node(a),
                ]),
            }
        }
    }

    fn apply_routine(&mut self, tags: u32) {
        self.label("apply");
        // env' = [arg, closure.env]
        self.op(format!("LOAD R5, R1, {}", WORD_BYTES));
        self.op("MOV R2, R15");
        self.reserve_cell("R6");
        self.op("STORE R3, R2, 0");
        self.op(format!("STORE R5, R2, {}", WORD_BYTES));
        self.op("LOAD R4, R1, 0");
        for tag in 0..tags {
            self.op(format!("LI R5, {}", tag));
            self.op("SUB R6, R4, R5");
            self.op(format!("JZ R6, {}", block_label(tag)));
        }
        // Unknown tag
        self.op("HALT");
    }

    fn heap_full(&mut self) {
        self.label("heap_full");
        self.op(format!("LI R0, {}", SYS_EXIT));
        self.op(format!("LI R1, {}", HEAP_EXHAUSTED_STATUS));
        self.op("SYSCALL");
        self.op("HALT");
    }

    fn primitives(&mut self) {
        self.label(block_label(TAG_COUNTER));
        self.op("INC R13");
        self.op("MOV R1, R3");
        self.op("RET");
        for tag in [TAG_MARK_TRUE, TAG_MARK_FALSE] {
            self.label(block_label(tag));
            self.op("MOV R1, R3");
            self.op("RET");
        }
    }

    fn bodies(&mut self) {
        while let Some((tag, body)) = self.blocks.pop_front() {
            self.label(block_label(tag));
            self.expr(body);
            self.op("RET");
        }
    }
}

fn block_label(tag: u32) -> String {
    format!("lam_{}", tag)
}

/// Compile a closed term to a T3 program
pub fn compile(store: &mut TermStore, term: TermId, options: &CompileOptions) -> Result<Compiled> {
    let root = match options.normalize_first {
        Some(budget) => {
            let mut ctx = ReductionContext::new(budget).on_exhaustion(Exhaustion::Partial);
            let r = store.reduce(term, &mut ctx)?;
            log::debug!("normalised before compiling in {} steps ({:?})", r.steps, r.outcome);
            r.term
        }
        None => {
            store.retain(term)?;
            term
        }
    };

    let mut lowering = Lowering {
        store,
        scope: Vec::new(),
        next_tag: FIRST_USER_TAG,
        ir: Ir::default(),
    };
    let lowered = lowering.lower(root);
    let Lowering {
        next_tag: tags,
        ir: mut ir,
        ..
    } = lowering;
    store.decref(root);
    let lowered = lowered?;

    let entry = match options.readback {
        Readback::Closure => lowered,
        Readback::ChurchNumeral => ir.harness(lowered, TAG_COUNTER, TAG_COUNTER),
        Readback::ChurchBool => ir.harness(lowered, TAG_MARK_TRUE, TAG_MARK_FALSE),
    };

    let mut emit = Emitter {
        ir: &ir,
        out: String::new(),
        blocks: VecDeque::new(),
    };
    emit.out.push_str("; generated from a λ-term\n.data\n");
    emit.label("heap_limit");
    emit.op(format!(".word {}", options.heap_limit));
    emit.out.push_str(".code\n.global main\n");
    emit.label("main");
    emit.op(format!("LI R15, {}", HEAP_START));
    emit.op("LI R14, heap_limit");
    emit.op("LOAD R14, R14, 0");
    emit.op("LI R2, 0");
    emit.op("LI R13, 0");
    emit.expr(entry);
    match options.readback {
        Readback::Closure => {}
        Readback::ChurchNumeral => emit.op("MOV R1, R13"),
        Readback::ChurchBool => {
            emit.op("LOAD R4, R1, 0");
            emit.op(format!("LI R5, {}", TAG_MARK_FALSE));
            emit.op("SUB R1, R5, R4");
        }
    }
    emit.op("HALT");
    emit.apply_routine(tags);
    emit.heap_full();
    emit.primitives();
    emit.bodies();

    let source = emit.out;
    let program = assemble_program(&source)?;
    log::debug!(
        "compiled λ-term: {} closures, {} instructions, heap limit {}",
        tags - FIRST_USER_TAG,
        program.len(),
        options.heap_limit
    );
    Ok(Compiled { source, program })
}
