//! β-reduction with step budgets
//!
//! A budgeted [`TermStore::reduce`] either reaches a normal form or stops
//! with the partially reduced term, which can be fed back in with a new
//! budget. The term itself is the suspension state.

use super::term::{Node, TermId, TermStore, VarId};
use crate::error::{Result, TernaryError};

/// Which redex a single step contracts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Strategy {
    /// Leftmost-outermost; finds a normal form whenever one exists
    #[default]
    NormalOrder,
    /// Leftmost-innermost; arguments are normalised before contraction
    Applicative,
}

/// What happens when the budget runs out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Exhaustion {
    /// Return the partial term with [`Outcome::BudgetExceeded`]
    #[default]
    Partial,
    /// Fail with [`TernaryError::BudgetExceeded`]
    Error,
}

/// Reduction settings plus a running step total
#[derive(Debug, Clone)]
pub struct ReductionContext {
    /// Step limit for each `reduce` call
    pub max_steps: u64,
    /// Steps taken across every call that used this context
    pub steps: u64,
    pub strategy: Strategy,
    pub exhaustion: Exhaustion,
}

impl ReductionContext {
    pub fn new(max_steps: u64) -> Self {
        Self {
            max_steps,
            steps: 0,
            strategy: Strategy::default(),
            exhaustion: Exhaustion::default(),
        }
    }

    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn on_exhaustion(mut self, exhaustion: Exhaustion) -> Self {
        self.exhaustion = exhaustion;
        self
    }
}

impl Default for ReductionContext {
    fn default() -> Self {
        Self::new(10_000)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NormalForm,
    BudgetExceeded,
}

/// One edge on the way from a root down to a redex
#[derive(Debug, Clone, Copy)]
enum Step {
    /// Into the body of `λp`
    Body(VarId),
    /// Into the function side; the argument is kept
    Func(TermId),
    /// Into the argument side; the function is kept
    Arg(TermId),
}

/// Result of [`TermStore::reduce`]; the caller owns `term`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reduction {
    pub term: TermId,
    pub steps: u64,
    pub outcome: Outcome,
}

impl Reduction {
    pub fn is_normal(&self) -> bool {
        self.outcome == Outcome::NormalForm
    }
}

impl TermStore {
    /// Contract one redex. Returns the (owned) rewritten term, or `None`
    /// when `t` is already in normal form.
    pub fn reduce_step(&mut self, t: TermId, strategy: Strategy) -> Option<TermId> {
        match strategy {
            Strategy::NormalOrder => self.step_normal(t),
            Strategy::Applicative => self.step_applicative(t),
        }
    }

    /// Leftmost-outermost: pre-order search for the first `App(Abs, _)`
    fn step_normal(&mut self, t: TermId) -> Option<TermId> {
        let mut path: Vec<Step> = Vec::new();
        let mut pending = vec![(t, 0, None)];
        while let Some((id, depth, step)) = pending.pop() {
            path.truncate(depth);
            path.extend(step);
            match self.node(id) {
                Node::Var(_) => {}
                Node::Abs(p, body) => pending.push((body, path.len(), Some(Step::Body(p)))),
                Node::App(f, a) => {
                    if let Node::Abs(x, body) = self.node(f) {
                        let contracted = self.subst(body, x, a);
                        return Some(self.rebuild(&path, contracted));
                    }
                    pending.push((a, path.len(), Some(Step::Arg(f))));
                    pending.push((f, path.len(), Some(Step::Func(a))));
                }
            }
        }
        None
    }

    /// Leftmost-innermost: an application is contracted only after both of
    /// its sides were searched without finding a redex
    fn step_applicative(&mut self, t: TermId) -> Option<TermId> {
        enum Visit {
            Enter(TermId, usize, Option<Step>),
            Contract(TermId, usize),
        }

        let mut path: Vec<Step> = Vec::new();
        let mut pending = vec![Visit::Enter(t, 0, None)];
        while let Some(visit) = pending.pop() {
            match visit {
                Visit::Enter(id, depth, step) => {
                    path.truncate(depth);
                    path.extend(step);
                    match self.node(id) {
                        Node::Var(_) => {}
                        Node::Abs(p, body) => {
                            pending.push(Visit::Enter(body, path.len(), Some(Step::Body(p))))
                        }
                        Node::App(f, a) => {
                            pending.push(Visit::Contract(id, path.len()));
                            pending.push(Visit::Enter(a, path.len(), Some(Step::Arg(f))));
                            pending.push(Visit::Enter(f, path.len(), Some(Step::Func(a))));
                        }
                    }
                }
                Visit::Contract(id, depth) => {
                    path.truncate(depth);
                    if let Node::App(f, a) = self.node(id) {
                        if let Node::Abs(x, body) = self.node(f) {
                            let contracted = self.subst(body, x, a);
                            return Some(self.rebuild(&path, contracted));
                        }
                    }
                }
            }
        }
        None
    }

    /// Wrap an owned `inner` back up the path from the root to the redex,
    /// sharing every untouched sibling
    fn rebuild(&mut self, path: &[Step], inner: TermId) -> TermId {
        path.iter().rev().fold(inner, |acc, step| match *step {
            Step::Body(p) => self.lam(p, acc),
            Step::Func(arg) => {
                self.bump(arg);
                self.app(acc, arg)
            }
            Step::Arg(func) => {
                self.bump(func);
                self.app(func, acc)
            }
        })
    }

    /// Reduce toward normal form within `ctx.max_steps`.
    ///
    /// `t` is borrowed; the returned term is a new reference the caller must
    /// release. A term already in normal form comes back as the same handle
    /// with zero steps.
    pub fn reduce(&mut self, t: TermId, ctx: &mut ReductionContext) -> Result<Reduction> {
        self.retain(t)?;
        let mut current = t;
        let mut steps = 0u64;

        loop {
            let Some(next) = self.reduce_step(current, ctx.strategy) else {
                log::trace!("normal form after {} steps", steps);
                return Ok(Reduction {
                    term: current,
                    steps,
                    outcome: Outcome::NormalForm,
                });
            };

            if steps >= ctx.max_steps {
                self.decref(next);
                log::debug!("reduction budget of {} steps exhausted", ctx.max_steps);
                return match ctx.exhaustion {
                    Exhaustion::Partial => Ok(Reduction {
                        term: current,
                        steps,
                        outcome: Outcome::BudgetExceeded,
                    }),
                    Exhaustion::Error => {
                        self.decref(current);
                        Err(TernaryError::BudgetExceeded { steps })
                    }
                };
            }

            self.decref(current);
            current = next;
            steps += 1;
            ctx.steps += 1;
            log::trace!("step {}: {}", steps, self.display(current));
        }
    }

    /// Normal-order reduction with a partial result on exhaustion
    pub fn normalize(&mut self, t: TermId, max_steps: u64) -> Result<Reduction> {
        self.reduce(t, &mut ReductionContext::new(max_steps))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lambda::church;
    use crate::lambda::parse::parse_term;

    #[test]
    fn test_identity_redex() {
        let mut store = TermStore::new();
        let t = parse_term(&mut store, "(\\x. x) y").unwrap();
        let y = store.intern("y");

        let mut ctx = ReductionContext::new(10);
        let r = store.reduce(t, &mut ctx).unwrap();
        assert_eq!(r.steps, 1);
        assert_eq!(r.outcome, Outcome::NormalForm);
        assert_eq!(store.node(r.term), Node::Var(y));
        assert_eq!(ctx.steps, 1);

        store.release(t).unwrap();
        store.release(r.term).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_k_combinator() {
        let mut store = TermStore::new();
        let t = parse_term(&mut store, "(λx. λy. x) a b").unwrap();
        let a = store.intern("a");
        let r = store.normalize(t, 100).unwrap();
        assert_eq!(r.steps, 2);
        assert_eq!(store.node(r.term), Node::Var(a));
        store.release(t).unwrap();
        store.release(r.term).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_normal_form_is_returned_unchanged() {
        let mut store = TermStore::new();
        let t = parse_term(&mut store, "\\f x. f (f x)").unwrap();
        let r = store.normalize(t, 10).unwrap();
        assert_eq!(r.term, t);
        assert_eq!(r.steps, 0);
        assert_eq!(store.refcount(t), 2);
        store.release(t).unwrap();
        store.release(r.term).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_church_addition() {
        let mut store = TermStore::new();
        let plus = church::plus(&mut store);
        let two = church::numeral(&mut store, 2);
        let one = church::numeral(&mut store, 1);
        let p2 = store.app(plus, two);
        let t = store.app(p2, one);

        let r = store.normalize(t, 1000).unwrap();
        assert!(r.is_normal());
        let three = church::numeral(&mut store, 3);
        assert!(store.alpha_eq(r.term, three));
        assert_eq!(church::as_numeral(&store, r.term), Some(3));

        for h in [t, r.term, three] {
            store.release(h).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_successor_property() {
        let mut store = TermStore::new();
        for n in 0..8 {
            let succ = church::succ(&mut store);
            let num = church::numeral(&mut store, n);
            let t = store.app(succ, num);
            let r = store.normalize(t, 1000).unwrap();
            let expected = church::numeral(&mut store, n + 1);
            assert!(store.alpha_eq(r.term, expected), "succ {} failed", n);
            for h in [t, r.term, expected] {
                store.release(h).unwrap();
            }
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_budget_partial_and_resume() {
        let mut store = TermStore::new();
        // Ω never terminates
        let omega = parse_term(&mut store, "(\\x. x x) (\\x. x x)").unwrap();
        let mut ctx = ReductionContext::new(5);
        let r = store.reduce(omega, &mut ctx).unwrap();
        assert_eq!(r.outcome, Outcome::BudgetExceeded);
        assert_eq!(r.steps, 5);
        assert!(store.alpha_eq(r.term, omega));
        store.release(r.term).unwrap();

        // Resume a terminating term in small slices
        let t = parse_term(&mut store, "(\\a b c. c b a) p q r").unwrap();
        let mut ctx = ReductionContext::new(1);
        let first = store.reduce(t, &mut ctx).unwrap();
        assert_eq!(first.outcome, Outcome::BudgetExceeded);
        let second = store.reduce(first.term, &mut ctx).unwrap();
        let third = store.reduce(second.term, &mut ctx).unwrap();
        assert!(third.is_normal());
        assert_eq!(ctx.steps, 3);
        assert_eq!(store.display(third.term).to_string(), "r q p");

        for h in [omega, t, first.term, second.term, third.term] {
            store.release(h).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_budget_error_policy() {
        let mut store = TermStore::new();
        let omega = parse_term(&mut store, "(\\x. x x) (\\x. x x)").unwrap();
        let mut ctx = ReductionContext::new(3).on_exhaustion(Exhaustion::Error);
        assert!(matches!(
            store.reduce(omega, &mut ctx),
            Err(TernaryError::BudgetExceeded { steps: 3 })
        ));
        store.release(omega).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_strategies_differ_on_divergent_argument() {
        let mut store = TermStore::new();
        // K z Ω: normal order discards Ω, applicative loops on it
        let t = parse_term(&mut store, "(\\x y. x) z ((\\x. x x) (\\x. x x))").unwrap();
        let z = store.intern("z");

        let mut ctx = ReductionContext::new(50);
        let r = store.reduce(t, &mut ctx).unwrap();
        assert_eq!(store.node(r.term), Node::Var(z));
        store.release(r.term).unwrap();

        let mut ctx = ReductionContext::new(50).strategy(Strategy::Applicative);
        let r = store.reduce(t, &mut ctx).unwrap();
        assert_eq!(r.outcome, Outcome::BudgetExceeded);
        store.release(r.term).unwrap();

        store.release(t).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_applicative_reduces_argument_first() {
        let mut store = TermStore::new();
        let t = parse_term(&mut store, "(\\x. f x x) ((\\y. y) a)").unwrap();
        let step = store.reduce_step(t, Strategy::Applicative).unwrap();
        assert_eq!(store.display(step).to_string(), "(λx. f x x) a");
        let step2 = store.reduce_step(t, Strategy::NormalOrder).unwrap();
        assert_eq!(store.display(step2).to_string(), "f ((λy. y) a) ((λy. y) a)");
        for h in [t, step, step2] {
            store.release(h).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_deep_numeral_successor() {
        let mut store = TermStore::new();
        let n = 30_000;
        let t = parse_term(&mut store, &format!("(\\n f x. f (n f x)) {}", n)).unwrap();
        for strategy in [Strategy::NormalOrder, Strategy::Applicative] {
            let mut ctx = ReductionContext::new(100).strategy(strategy);
            let r = store.reduce(t, &mut ctx).unwrap();
            assert!(r.is_normal());
            assert_eq!(church::as_numeral(&store, r.term), Some(n + 1));
            assert!(store.free_vars(r.term).is_empty());
            store.release(r.term).unwrap();
        }
        store.release(t).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }
}
