//! Church encodings
//!
//! Every constructor returns a fresh owned term. Binders use the interned
//! names `f`, `x`, `n`, `m` and so on, so the terms print readably; capture is
//! handled by substitution, not by unique naming.

use super::term::{Node, TermId, TermStore};

fn v(store: &mut TermStore, name: &str) -> TermId {
    let id = store.intern(name);
    store.var(id)
}

/// `λp1. λp2. ... body`, consuming `body`
fn lams(store: &mut TermStore, params: &[&str], body: TermId) -> TermId {
    params.iter().rev().fold(body, |acc, p| {
        let id = store.intern(p);
        store.lam(id, acc)
    })
}

/// Left-nested application of owned terms: `head a1 a2 ...`
fn apps(store: &mut TermStore, head: TermId, args: &[TermId]) -> TermId {
    args.iter().fold(head, |acc, &a| store.app(acc, a))
}

/// Application of named variables: `a b c`
fn vapps(store: &mut TermStore, head: &str, args: &[&str]) -> TermId {
    let head = v(store, head);
    let args: Vec<TermId> = args.iter().map(|n| v(store, n)).collect();
    apps(store, head, &args)
}

/// `λf. λx. fⁿ x`
pub fn numeral(store: &mut TermStore, n: u64) -> TermId {
    let mut body = v(store, "x");
    for _ in 0..n {
        let f = v(store, "f");
        body = store.app(f, body);
    }
    lams(store, &["f", "x"], body)
}

/// `λx. λy. x`
pub fn church_true(store: &mut TermStore) -> TermId {
    let body = v(store, "x");
    lams(store, &["x", "y"], body)
}

/// `λx. λy. y`
pub fn church_false(store: &mut TermStore) -> TermId {
    let body = v(store, "y");
    lams(store, &["x", "y"], body)
}

pub fn church_bool(store: &mut TermStore, b: bool) -> TermId {
    if b {
        church_true(store)
    } else {
        church_false(store)
    }
}

/// `λs. s a b`; retains `a` and `b`
pub fn pair(store: &mut TermStore, a: TermId, b: TermId) -> TermId {
    let s = store.fresh_var();
    let sv = store.var(s);
    let sa = store.make_app(sv, a);
    store.bump(b);
    let body = store.app(sa, b);
    store.lam(s, body)
}

/// `λp. p TRUE`
pub fn fst(store: &mut TermStore) -> TermId {
    let p = v(store, "p");
    let t = church_true(store);
    let body = store.app(p, t);
    lams(store, &["p"], body)
}

/// `λp. p FALSE`
pub fn snd(store: &mut TermStore) -> TermId {
    let p = v(store, "p");
    let f = church_false(store);
    let body = store.app(p, f);
    lams(store, &["p"], body)
}

/// `λn. λf. λx. f (n f x)`
pub fn succ(store: &mut TermStore) -> TermId {
    let f = v(store, "f");
    let nfx = vapps(store, "n", &["f", "x"]);
    let body = store.app(f, nfx);
    lams(store, &["n", "f", "x"], body)
}

/// `λn. λf. λx. n (λg. λh. h (g f)) (λu. x) (λu. u)`
pub fn pred(store: &mut TermStore) -> TermId {
    let h = v(store, "h");
    let gf = vapps(store, "g", &["f"]);
    let hgf = store.app(h, gf);
    let shift = lams(store, &["g", "h"], hgf);

    let x = v(store, "x");
    let konst = lams(store, &["u"], x);

    let u = v(store, "u");
    let id = lams(store, &["u"], u);

    let n = v(store, "n");
    let body = apps(store, n, &[shift, konst, id]);
    lams(store, &["n", "f", "x"], body)
}

/// `λm. λn. λf. λx. m f (n f x)`
pub fn plus(store: &mut TermStore) -> TermId {
    let mf = vapps(store, "m", &["f"]);
    let nfx = vapps(store, "n", &["f", "x"]);
    let body = store.app(mf, nfx);
    lams(store, &["m", "n", "f", "x"], body)
}

/// `λm. λn. λf. m (n f)`
pub fn mult(store: &mut TermStore) -> TermId {
    let m = v(store, "m");
    let nf = vapps(store, "n", &["f"]);
    let body = store.app(m, nf);
    lams(store, &["m", "n", "f"], body)
}

/// `λp. λq. p q p`
pub fn and(store: &mut TermStore) -> TermId {
    let body = vapps(store, "p", &["q", "p"]);
    lams(store, &["p", "q"], body)
}

/// `λp. λq. p p q`
pub fn or(store: &mut TermStore) -> TermId {
    let body = vapps(store, "p", &["p", "q"]);
    lams(store, &["p", "q"], body)
}

/// `λp. λa. λb. p b a`
pub fn not(store: &mut TermStore) -> TermId {
    let body = vapps(store, "p", &["b", "a"]);
    lams(store, &["p", "a", "b"], body)
}

/// `λn. n (λx. FALSE) TRUE`
pub fn is_zero(store: &mut TermStore) -> TermId {
    let n = v(store, "n");
    let f = church_false(store);
    let always_false = lams(store, &["z"], f);
    let t = church_true(store);
    let body = apps(store, n, &[always_false, t]);
    lams(store, &["n"], body)
}

/// Decode a numeral in normal form
pub fn as_numeral(store: &TermStore, t: TermId) -> Option<u64> {
    let Node::Abs(f, inner) = store.get(t)? else {
        return None;
    };
    let Node::Abs(x, mut body) = store.get(inner)? else {
        return None;
    };
    let mut count = 0;
    loop {
        match store.get(body)? {
            Node::Var(v) if v == x => return Some(count),
            // The inner binder shadows `f` when both share an id
            Node::App(head, rest) if f != x && store.get(head)? == Node::Var(f) => {
                count += 1;
                body = rest;
            }
            _ => return None,
        }
    }
}

/// Decode a boolean in normal form
pub fn as_bool(store: &TermStore, t: TermId) -> Option<bool> {
    let Node::Abs(a, inner) = store.get(t)? else {
        return None;
    };
    let Node::Abs(b, body) = store.get(inner)? else {
        return None;
    };
    match store.get(body)? {
        Node::Var(v) if v == b => Some(false),
        Node::Var(v) if v == a => Some(true),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lambda::reduce::Outcome;

    /// Apply `op` to `args`, normalise, release everything but the result
    fn eval(store: &mut TermStore, op: TermId, args: &[TermId]) -> TermId {
        let mut t = op;
        for &a in args {
            t = store.app(t, a);
        }
        let r = store.normalize(t, 10_000).unwrap();
        assert_eq!(r.outcome, Outcome::NormalForm);
        store.release(t).unwrap();
        r.term
    }

    #[test]
    fn test_numeral_shape() {
        let mut store = TermStore::new();
        let three = numeral(&mut store, 3);
        assert_eq!(store.display(three).to_string(), "λf. λx. f (f (f x))");
        assert_eq!(as_numeral(&store, three), Some(3));
        let zero = numeral(&mut store, 0);
        assert_eq!(as_numeral(&store, zero), Some(0));
        assert_eq!(as_bool(&store, zero), Some(false));
        store.release(three).unwrap();
        store.release(zero).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_decoders_respect_shadowing() {
        let mut store = TermStore::new();
        // λx. λx. x is FALSE, and only numeral 0
        let x = store.intern("x");
        let xv = store.var(x);
        let inner = store.lam(x, xv);
        let t = store.lam(x, inner);
        assert_eq!(as_bool(&store, t), Some(false));
        assert_eq!(as_numeral(&store, t), Some(0));
        store.release(t).unwrap();
    }

    #[test]
    fn test_arithmetic() {
        let mut store = TermStore::new();
        let cases: [(fn(&mut TermStore) -> TermId, &[u64], u64); 4] = [
            (plus, &[2, 3], 5),
            (mult, &[2, 3], 6),
            (succ, &[4], 5),
            (pred, &[4], 3),
        ];
        for (op, args, expected) in cases {
            let op = op(&mut store);
            let args: Vec<TermId> = args.iter().map(|&n| numeral(&mut store, n)).collect();
            let r = eval(&mut store, op, &args);
            assert_eq!(as_numeral(&store, r), Some(expected));
            store.release(r).unwrap();
        }

        let p = pred(&mut store);
        let zero = numeral(&mut store, 0);
        let r = eval(&mut store, p, &[zero]);
        assert_eq!(as_numeral(&store, r), Some(0));
        store.release(r).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_boolean_logic() {
        let mut store = TermStore::new();
        for a in [false, true] {
            for b in [false, true] {
                let ops: [(fn(&mut TermStore) -> TermId, bool); 2] = [(and, a && b), (or, a || b)];
                for (op, expected) in ops {
                    let op = op(&mut store);
                    let ta = church_bool(&mut store, a);
                    let tb = church_bool(&mut store, b);
                    let r = eval(&mut store, op, &[ta, tb]);
                    assert_eq!(as_bool(&store, r), Some(expected), "{} op {}", a, b);
                    store.release(r).unwrap();
                }
            }
            let n = not(&mut store);
            let ta = church_bool(&mut store, a);
            let r = eval(&mut store, n, &[ta]);
            assert_eq!(as_bool(&store, r), Some(!a));
            store.release(r).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_is_zero() {
        let mut store = TermStore::new();
        for (n, expected) in [(0, true), (1, false), (4, false)] {
            let z = is_zero(&mut store);
            let num = numeral(&mut store, n);
            let r = eval(&mut store, z, &[num]);
            assert_eq!(as_bool(&store, r), Some(expected));
            store.release(r).unwrap();
        }
        assert_eq!(store.live_nodes(), 0);
    }

    #[test]
    fn test_pairs() {
        let mut store = TermStore::new();
        let a = numeral(&mut store, 1);
        let b = numeral(&mut store, 2);
        let p = pair(&mut store, a, b);

        let first = fst(&mut store);
        store.retain(p).unwrap();
        let r = eval(&mut store, first, &[p]);
        assert_eq!(as_numeral(&store, r), Some(1));
        store.release(r).unwrap();

        let second = snd(&mut store);
        let r = eval(&mut store, second, &[p]);
        assert_eq!(as_numeral(&store, r), Some(2));
        store.release(r).unwrap();

        store.release(a).unwrap();
        store.release(b).unwrap();
        assert_eq!(store.live_nodes(), 0);
    }
}
