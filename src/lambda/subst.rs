//! Capture-avoiding substitution and α-renaming

use super::term::{Node, TermId, TermStore, VarId};
use std::collections::BTreeSet;

impl TermStore {
    /// `t[x := s]`. Returns an owned handle; subtrees without a free `x` are
    /// shared with `t`, and `t` itself is returned retained when nothing
    /// changes.
    pub fn subst(&mut self, t: TermId, x: VarId, s: TermId) -> TermId {
        let s_free = self.free_vars(s);
        match self.subst_in(t, x, s, &s_free) {
            Some(new) => new,
            None => {
                self.bump(t);
                t
            }
        }
    }

    /// Rename free occurrences of `from` in `t` to `to`
    pub fn alpha_rename(&mut self, t: TermId, from: VarId, to: VarId) -> TermId {
        let replacement = self.make_var(to);
        let renamed = self.subst(t, from, replacement);
        self.decref(replacement);
        renamed
    }

    /// `None` means `t` is unchanged. Post-order over an explicit stack:
    /// each visited subterm leaves one entry on `done`.
    fn subst_in(
        &mut self,
        t: TermId,
        x: VarId,
        s: TermId,
        s_free: &BTreeSet<VarId>,
    ) -> Option<TermId> {
        enum Task {
            Visit(TermId),
            /// Rebuild `App(f, a)` from the two results on top of `done`
            App(TermId, TermId),
            /// Wrap the body result in `λp`
            Abs(VarId),
            /// Wrap the result for an α-renamed body in `λfresh`
            Renamed(VarId, TermId),
        }

        let mut tasks = vec![Task::Visit(t)];
        let mut done: Vec<Option<TermId>> = Vec::new();
        while let Some(task) = tasks.pop() {
            match task {
                Task::Visit(id) => match self.node(id) {
                    Node::Var(v) if v == x => {
                        self.bump(s);
                        done.push(Some(s));
                    }
                    Node::Var(_) => done.push(None),
                    Node::App(f, a) => {
                        tasks.push(Task::App(f, a));
                        tasks.push(Task::Visit(a));
                        tasks.push(Task::Visit(f));
                    }
                    Node::Abs(p, _) if p == x => done.push(None),
                    Node::Abs(p, body) if s_free.contains(&p) => {
                        if !self.free_vars(body).contains(&x) {
                            done.push(None);
                            continue;
                        }
                        // Binder would capture a free variable of `s`
                        let fresh = self.fresh_var();
                        log::trace!("renaming binder {} to {}", self.var_name(p), fresh);
                        let renamed = self.alpha_rename(body, p, fresh);
                        tasks.push(Task::Renamed(fresh, renamed));
                        tasks.push(Task::Visit(renamed));
                    }
                    Node::Abs(p, body) => {
                        tasks.push(Task::Abs(p));
                        tasks.push(Task::Visit(body));
                    }
                },
                Task::App(f, a) => {
                    let new_a = done.pop().flatten();
                    let new_f = done.pop().flatten();
                    if new_f.is_none() && new_a.is_none() {
                        done.push(None);
                        continue;
                    }
                    let f = self.owned_or_shared(new_f, f);
                    let a = self.owned_or_shared(new_a, a);
                    done.push(Some(self.app(f, a)));
                }
                Task::Abs(p) => {
                    let new_body = done.pop().flatten();
                    done.push(new_body.map(|body| self.lam(p, body)));
                }
                Task::Renamed(fresh, renamed) => {
                    let new_body = match done.pop().flatten() {
                        Some(b) => {
                            self.decref(renamed);
                            b
                        }
                        None => renamed,
                    };
                    done.push(Some(self.lam(fresh, new_body)));
                }
            }
        }
        done.pop().flatten()
    }

    fn owned_or_shared(&mut self, new: Option<TermId>, old: TermId) -> TermId {
        match new {
            Some(t) => t,
            None => {
                self.bump(old);
                old
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subst_var() {
        let mut store = TermStore::new();
        let (x, y) = (store.intern("x"), store.intern("y"));
        let t = store.var(x);
        let s = store.var(y);
        let r = store.subst(t, x, s);
        assert_eq!(r, s);
        assert_eq!(store.refcount(s), 2);

        for h in [t, s, r] {
            store.release(h).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_subst_shares_unchanged() {
        let mut store = TermStore::new();
        let (x, y, z) = (store.intern("x"), store.intern("y"), store.intern("z"));
        // (y z) x
        let yv = store.var(y);
        let zv = store.var(z);
        let left = store.app(yv, zv);
        let xv = store.var(x);
        let t = store.make_app(left, xv);
        let s = store.var(z);

        let r = store.subst(t, x, s);
        match store.node(r) {
            Node::App(f, a) => {
                assert_eq!(f, left);
                assert_eq!(a, s);
            }
            other => panic!("expected App, got {:?}", other),
        }

        // No free x: same node back
        let r2 = store.subst(left, x, s);
        assert_eq!(r2, left);

        for h in [left, xv, t, s, r, r2] {
            store.release(h).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_subst_stops_at_shadowing_binder() {
        let mut store = TermStore::new();
        let (x, y) = (store.intern("x"), store.intern("y"));
        let xv = store.var(x);
        let t = store.lam(x, xv);
        let s = store.var(y);
        let r = store.subst(t, x, s);
        assert_eq!(r, t);
        for h in [t, s, r] {
            store.release(h).unwrap();
        }
    }

    #[test]
    fn test_subst_avoids_capture() {
        let mut store = TermStore::new();
        let (x, y) = (store.intern("x"), store.intern("y"));
        // (λy. x y)[x := y] must not become λy. y y
        let xv = store.var(x);
        let yv = store.var(y);
        let body = store.app(xv, yv);
        let t = store.lam(y, body);
        let s = store.var(y);

        let r = store.subst(t, x, s);
        let Node::Abs(p, body) = store.node(r) else {
            panic!("expected abstraction");
        };
        assert_ne!(p, y);
        let Node::App(f, a) = store.node(body) else {
            panic!("expected application");
        };
        assert_eq!(store.node(f), Node::Var(y));
        assert_eq!(store.node(a), Node::Var(p));
        assert_eq!(store.free_vars(r).into_iter().collect::<Vec<_>>(), vec![y]);

        for h in [t, s, r] {
            store.release(h).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_alpha_rename() {
        let mut store = TermStore::new();
        let (x, y, z) = (store.intern("x"), store.intern("y"), store.intern("z"));
        // x (λx. x) renamed x -> z gives z (λx. x)
        let xv = store.var(x);
        let inner_x = store.var(x);
        let inner = store.lam(x, inner_x);
        let t = store.app(xv, inner);

        let r = store.alpha_rename(t, x, z);
        let zv = store.var(z);
        let inner_y = store.var(y);
        let inner2 = store.lam(y, inner_y);
        let expected = store.app(zv, inner2);
        assert!(store.alpha_eq(r, expected));

        for h in [t, r, expected] {
            store.release(h).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_subst_through_deep_spine() {
        let mut store = TermStore::new();
        let (x, y) = (store.intern("x"), store.intern("y"));
        // x (x (x ... y)) with 50 000 applications
        let mut t = store.var(y);
        for _ in 0..50_000 {
            let xv = store.var(x);
            t = store.app(xv, t);
        }
        let s = store.var(y);

        let r = store.subst(t, x, s);
        assert_eq!(store.free_vars(r).into_iter().collect::<Vec<_>>(), vec![y]);
        assert_eq!(store.size(r), store.size(t));
        assert_eq!(store.refcount(s), 50_001);

        for h in [t, s, r] {
            store.release(h).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }
}
