//! Term arena - refcounted λ-term graph
//!
//! Nodes live in a slot vector and are addressed by [`TermId`]. Every handle
//! a caller receives from a constructor or reducer carries one reference and
//! must be balanced by exactly one [`TermStore::release`]. Children are
//! shared freely; the graph is acyclic because nodes are immutable once
//! allocated.
//!
//! A handle pairs a slot index with the slot's generation. Freeing a slot
//! bumps its generation, so a handle kept past its release no longer matches
//! the node that later reuses the slot.
//!
//! Traversals walk the graph with explicit work stacks; a Church numeral of
//! [`MAX_NUMERAL`](super::parse::MAX_NUMERAL) is a spine of that depth.

use crate::error::{Result, TernaryError};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Bits of a raw handle that hold the slot index
const INDEX_BITS: u32 = 24;

/// Slots an arena may grow to; raw handles stay within 40 bits, which a
/// 27-trit register holds
pub const MAX_SLOTS: usize = 1 << INDEX_BITS;

/// Handle to a node in a [`TermStore`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TermId {
    index: u32,
    generation: u16,
}

impl TermId {
    /// Unpack a handle produced by [`raw`](Self::raw). Values wider than a
    /// handle decode to an index no arena hands out.
    pub const fn from_raw(raw: u64) -> Self {
        let index = if raw >> (INDEX_BITS + 16) == 0 {
            (raw & (MAX_SLOTS as u64 - 1)) as u32
        } else {
            u32::MAX
        };
        Self {
            index,
            generation: (raw >> INDEX_BITS) as u16,
        }
    }

    /// `generation << 24 | index`
    pub const fn raw(self) -> u64 {
        ((self.generation as u64) << INDEX_BITS) | self.index as u64
    }

    pub const fn generation(self) -> u16 {
        self.generation
    }

    fn index(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for TermId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.index)?;
        if self.generation > 0 {
            write!(f, "@{}", self.generation)?;
        }
        Ok(())
    }
}

/// Variable identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(pub u32);

impl fmt::Display for VarId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "x#{}", self.0)
    }
}

/// One λ-term node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Node {
    Var(VarId),
    /// `λparam. body`
    Abs(VarId, TermId),
    /// `func arg`
    App(TermId, TermId),
}

#[derive(Debug, Clone)]
struct Entry {
    node: Node,
    refcount: u32,
}

#[derive(Debug, Clone)]
struct Slot {
    generation: u16,
    entry: Option<Entry>,
}

/// Arena of refcounted λ-terms
#[derive(Debug, Default)]
pub struct TermStore {
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
    names: HashMap<String, VarId>,
    labels: HashMap<VarId, String>,
    next_var: u32,
}

impl TermStore {
    pub fn new() -> Self {
        Self::default()
    }

    // =====================================================================
    // Variables
    // =====================================================================

    /// Variable id for `name`, allocating one on first use
    pub fn intern(&mut self, name: &str) -> VarId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = self.fresh_var();
        self.names.insert(name.to_string(), id);
        self.labels.insert(id, name.to_string());
        id
    }

    /// A variable id larger than any id handed out so far
    pub fn fresh_var(&mut self) -> VarId {
        let id = VarId(self.next_var);
        self.next_var += 1;
        id
    }

    /// Interned name of `var`, if it has one
    pub fn name(&self, var: VarId) -> Option<&str> {
        self.labels.get(&var).map(String::as_str)
    }

    /// Printable name: the interned name or `x#id`
    pub fn var_name(&self, var: VarId) -> String {
        match self.name(var) {
            Some(name) => name.to_string(),
            None => var.to_string(),
        }
    }

    // =====================================================================
    // Construction
    // =====================================================================

    /// # Panics
    ///
    /// Panics when the arena already holds [`MAX_SLOTS`] slots, none free.
    fn alloc(&mut self, node: Node) -> TermId {
        let entry = Some(Entry { node, refcount: 1 });
        self.live += 1;
        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                assert!(self.slots.len() < MAX_SLOTS, "term arena exhausted");
                self.slots.push(Slot {
                    generation: 0,
                    entry: None,
                });
                self.slots.len() as u32 - 1
            }
        };
        let slot = &mut self.slots[index as usize];
        slot.entry = entry;
        TermId {
            index,
            generation: slot.generation,
        }
    }

    fn entry(&self, t: TermId) -> Option<&Entry> {
        self.slots
            .get(t.index())
            .filter(|slot| slot.generation == t.generation)?
            .entry
            .as_ref()
    }

    fn entry_mut(&mut self, t: TermId) -> Option<&mut Entry> {
        self.slots
            .get_mut(t.index())
            .filter(|slot| slot.generation == t.generation)?
            .entry
            .as_mut()
    }

    /// Increment the count of a handle the caller knows to be live.
    ///
    /// # Panics
    ///
    /// Panics if `t` is not live.
    pub(crate) fn bump(&mut self, t: TermId) {
        match self.entry_mut(t) {
            Some(entry) => entry.refcount += 1,
            None => panic!("term {} is not live", t),
        }
    }

    /// New variable node
    pub fn make_var(&mut self, var: VarId) -> TermId {
        if var.0 >= self.next_var {
            self.next_var = var.0 + 1;
        }
        self.alloc(Node::Var(var))
    }

    /// New abstraction; retains `body`
    pub fn make_abs(&mut self, param: VarId, body: TermId) -> TermId {
        self.bump(body);
        self.lam(param, body)
    }

    /// New application; retains `func` and `arg`
    pub fn make_app(&mut self, func: TermId, arg: TermId) -> TermId {
        self.bump(func);
        self.bump(arg);
        self.app(func, arg)
    }

    /// Same as [`make_var`](Self::make_var)
    pub fn var(&mut self, var: VarId) -> TermId {
        self.make_var(var)
    }

    /// Abstraction that takes over the caller's reference to `body`
    pub fn lam(&mut self, param: VarId, body: TermId) -> TermId {
        if param.0 >= self.next_var {
            self.next_var = param.0 + 1;
        }
        self.alloc(Node::Abs(param, body))
    }

    /// Application that takes over the caller's references to both sides
    pub fn app(&mut self, func: TermId, arg: TermId) -> TermId {
        self.alloc(Node::App(func, arg))
    }

    // =====================================================================
    // Refcounting
    // =====================================================================

    /// Whether `t` names a live node of its own generation
    pub fn contains(&self, t: TermId) -> bool {
        self.entry(t).is_some()
    }

    /// Current count of `t` (0 when freed or stale)
    pub fn refcount(&self, t: TermId) -> u32 {
        self.entry(t).map_or(0, |entry| entry.refcount)
    }

    /// Number of allocated nodes
    pub fn live_nodes(&self) -> usize {
        self.live
    }

    pub fn retain(&mut self, t: TermId) -> Result<()> {
        self.check(t)?;
        self.bump(t);
        Ok(())
    }

    /// Drop one reference, freeing the node and any children it kept alive
    pub fn release(&mut self, t: TermId) -> Result<()> {
        self.check(t)?;
        self.decref(t);
        Ok(())
    }

    /// A freed or reused slot is a refcount violation; an index past the
    /// arena is unknown
    fn check(&self, t: TermId) -> Result<()> {
        if self.contains(t) {
            Ok(())
        } else if t.index() < self.slots.len() {
            Err(TernaryError::RefcountInvariant(t.raw()))
        } else {
            Err(TernaryError::UnknownTerm(t.raw()))
        }
    }

    /// Release without the liveness check; iterative so long spines do not
    /// exhaust the native stack.
    pub(crate) fn decref(&mut self, t: TermId) {
        let mut pending = vec![t];
        while let Some(id) = pending.pop() {
            let Some(entry) = self.entry_mut(id) else {
                log::error!("refcount underflow on term {}", id);
                continue;
            };
            entry.refcount -= 1;
            if entry.refcount > 0 {
                continue;
            }
            let node = entry.node;
            let slot = &mut self.slots[id.index()];
            slot.entry = None;
            slot.generation = slot.generation.wrapping_add(1);
            self.free.push(id.index);
            self.live -= 1;
            match node {
                Node::Var(_) => {}
                Node::Abs(_, body) => pending.push(body),
                Node::App(f, a) => {
                    pending.push(a);
                    pending.push(f);
                }
            }
        }
    }

    // =====================================================================
    // Inspection
    // =====================================================================

    /// Node behind a live handle.
    ///
    /// # Panics
    ///
    /// Panics if `t` has been freed.
    pub fn node(&self, t: TermId) -> Node {
        match self.entry(t) {
            Some(entry) => entry.node,
            None => panic!("term {} is not live", t),
        }
    }

    /// Node behind `t`, or `None` when the handle is dead
    pub fn get(&self, t: TermId) -> Option<Node> {
        self.entry(t).map(|entry| entry.node)
    }

    /// Number of nodes reachable from `t`, counting shared nodes per use
    pub fn size(&self, t: TermId) -> usize {
        let mut count = 0;
        let mut pending = vec![t];
        while let Some(id) = pending.pop() {
            count += 1;
            match self.node(id) {
                Node::Var(_) => {}
                Node::Abs(_, body) => pending.push(body),
                Node::App(f, a) => {
                    pending.push(a);
                    pending.push(f);
                }
            }
        }
        count
    }

    pub fn free_vars(&self, t: TermId) -> BTreeSet<VarId> {
        enum Walk {
            Term(TermId),
            Unbind(VarId),
        }

        let mut out = BTreeSet::new();
        let mut bound: HashMap<VarId, usize> = HashMap::new();
        let mut pending = vec![Walk::Term(t)];
        while let Some(walk) = pending.pop() {
            match walk {
                Walk::Unbind(p) => {
                    if let Some(depth) = bound.get_mut(&p) {
                        *depth -= 1;
                        if *depth == 0 {
                            bound.remove(&p);
                        }
                    }
                }
                Walk::Term(id) => match self.node(id) {
                    Node::Var(v) => {
                        if !bound.contains_key(&v) {
                            out.insert(v);
                        }
                    }
                    Node::Abs(p, body) => {
                        *bound.entry(p).or_default() += 1;
                        pending.push(Walk::Unbind(p));
                        pending.push(Walk::Term(body));
                    }
                    Node::App(f, a) => {
                        pending.push(Walk::Term(a));
                        pending.push(Walk::Term(f));
                    }
                },
            }
        }
        out
    }

    /// Structural equality up to renaming of bound variables
    pub fn alpha_eq(&self, a: TermId, b: TermId) -> bool {
        enum Cmp {
            Pair(TermId, TermId),
            Unbind,
        }

        let mut env_a: Vec<VarId> = Vec::new();
        let mut env_b: Vec<VarId> = Vec::new();
        let mut pending = vec![Cmp::Pair(a, b)];
        while let Some(cmp) = pending.pop() {
            let (a, b) = match cmp {
                Cmp::Unbind => {
                    env_a.pop();
                    env_b.pop();
                    continue;
                }
                Cmp::Pair(a, b) => (a, b),
            };
            if a == b && env_a.is_empty() && env_b.is_empty() {
                continue;
            }
            match (self.node(a), self.node(b)) {
                (Node::Var(x), Node::Var(y)) => {
                    let dx = env_a.iter().rposition(|v| *v == x).map(|i| env_a.len() - i);
                    let dy = env_b.iter().rposition(|v| *v == y).map(|i| env_b.len() - i);
                    let eq = match (dx, dy) {
                        (Some(i), Some(j)) => i == j,
                        (None, None) => x == y,
                        _ => false,
                    };
                    if !eq {
                        return false;
                    }
                }
                (Node::Abs(x, bx), Node::Abs(y, by)) => {
                    env_a.push(x);
                    env_b.push(y);
                    pending.push(Cmp::Unbind);
                    pending.push(Cmp::Pair(bx, by));
                }
                (Node::App(f, x), Node::App(g, y)) => {
                    pending.push(Cmp::Pair(x, y));
                    pending.push(Cmp::Pair(f, g));
                }
                _ => return false,
            }
        }
        true
    }

    /// Printable form of `t`
    pub fn display(&self, t: TermId) -> TermDisplay<'_> {
        TermDisplay { store: self, term: t }
    }

    fn fmt_term(&self, t: TermId, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        enum Piece {
            Term(TermId),
            Text(&'static str),
        }

        let mut pending = vec![Piece::Term(t)];
        while let Some(piece) = pending.pop() {
            let id = match piece {
                Piece::Text(text) => {
                    f.write_str(text)?;
                    continue;
                }
                Piece::Term(id) => id,
            };
            match self.node(id) {
                Node::Var(v) => write!(f, "{}", self.var_name(v))?,
                Node::Abs(p, body) => {
                    write!(f, "λ{}. ", self.var_name(p))?;
                    pending.push(Piece::Term(body));
                }
                Node::App(func, arg) => {
                    // Pushed in reverse: func, space, arg
                    if matches!(self.node(arg), Node::Var(_)) {
                        pending.push(Piece::Term(arg));
                    } else {
                        pending.extend([Piece::Text(")"), Piece::Term(arg), Piece::Text("(")]);
                    }
                    pending.push(Piece::Text(" "));
                    if matches!(self.node(func), Node::Abs(..)) {
                        pending.extend([Piece::Text(")"), Piece::Term(func), Piece::Text("(")]);
                    } else {
                        pending.push(Piece::Term(func));
                    }
                }
            }
        }
        Ok(())
    }
}

/// [`fmt::Display`] adapter returned by [`TermStore::display`]
pub struct TermDisplay<'a> {
    store: &'a TermStore,
    term: TermId,
}

impl fmt::Display for TermDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.store.fmt_term(self.term, f)
    }
}
