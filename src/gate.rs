//! Gate tables - every monadic and dyadic function over {-1, 0, +1}
//!
//! ## Canonical index
//!
//! A gate is named by its output vector read as a base-3 number. Outputs map
//! to digits `-1 → 0`, `0 → 1`, `+1 → 2`, and the k-th input tuple carries
//! weight `3^k`. Dyadic tuples are enumerated lexicographically:
//!
//! ```text
//! k:      0       1      2       3      4     5      6       7      8
//! (a,b): (-,-)   (-,0)  (-,+)   (0,-)  (0,0) (0,+)  (+,-)   (+,0)  (+,+)
//! ```
//!
//! Monadic gates enumerate inputs `-1, 0, +1` (index 0..27); dyadic gates
//! have 19 683 indices. Both tables are built once and never change.

use crate::error::{Result, TernaryError};
use crate::trit::Trit;
use std::fmt;
use std::sync::OnceLock;

/// Number of monadic gates (3^3)
pub const MONADIC_COUNT: u32 = 27;

/// Number of dyadic gates (3^9)
pub const DYADIC_COUNT: u32 = 19_683;

/// Kleene AND (min)
pub const KLEENE_AND: u32 = 15_633;
/// Kleene OR (max)
pub const KLEENE_OR: u32 = 19_569;
/// Consensus
pub const CONSENSUS: u32 = 16_371;
/// Minority
pub const MINORITY: u32 = 3_311;
/// Sum digit of balanced addition (a + b mod 3)
pub const PLUS: u32 = 5_681;
/// Product
pub const TIMES: u32 = 15_665;

/// Monadic negation
pub const NEGATE: u32 = 5;
/// Monadic identity
pub const IDENTITY: u32 = 21;

/// Named dyadic gates accepted by the assembler
pub const NAMED_GATES: &[(&str, u32)] = &[
    ("KLEENE_AND", KLEENE_AND),
    ("KLEENE_OR", KLEENE_OR),
    ("CONSENSUS", CONSENSUS),
    ("MINORITY", MINORITY),
    ("PLUS", PLUS),
    ("TIMES", TIMES),
];

/// Look up a named gate (case-insensitive)
pub fn named_gate(name: &str) -> Option<u32> {
    NAMED_GATES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, idx)| idx)
}

fn monadic_table() -> &'static [[Trit; 3]] {
    static TABLE: OnceLock<Vec<[Trit; 3]>> = OnceLock::new();
    TABLE.get_or_init(|| (0..MONADIC_COUNT).map(|i| decode::<3>(i)).collect())
}

fn dyadic_table() -> &'static [[Trit; 9]] {
    static TABLE: OnceLock<Vec<[Trit; 9]>> = OnceLock::new();
    TABLE.get_or_init(|| {
        log::debug!("building dyadic gate table ({} entries)", DYADIC_COUNT);
        (0..DYADIC_COUNT).map(|i| decode::<9>(i)).collect()
    })
}

/// Output vector of gate `index`, k-th output from the k-th base-3 digit
fn decode<const N: usize>(mut index: u32) -> [Trit; N] {
    let mut out = [Trit::Zero; N];
    for slot in out.iter_mut() {
        *slot = Trit::from_digit((index % 3) as u8).unwrap_or(Trit::Zero);
        index /= 3;
    }
    out
}

fn encode(outputs: &[Trit]) -> u32 {
    outputs
        .iter()
        .rev()
        .fold(0u32, |acc, t| acc * 3 + t.digit() as u32)
}

#[inline]
fn pair_slot(a: Trit, b: Trit) -> usize {
    a.digit() as usize * 3 + b.digit() as usize
}

/// Apply monadic gate `index` to `input`
pub fn monadic(index: u32, input: Trit) -> Result<Trit> {
    Ok(MonadicGate::new(index)?.apply(input))
}

/// Apply dyadic gate `index` to `(a, b)`
pub fn dyadic(index: u32, a: Trit, b: Trit) -> Result<Trit> {
    Ok(DyadicGate::new(index)?.apply(a, b))
}

/// A validated monadic gate index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonadicGate(u32);

impl MonadicGate {
    pub const NEGATE: Self = Self(NEGATE);
    pub const IDENTITY: Self = Self(IDENTITY);

    pub fn new(index: u32) -> Result<Self> {
        if index >= MONADIC_COUNT {
            return Err(TernaryError::BadGate(index));
        }
        Ok(Self(index))
    }

    /// Gate computing `f`
    pub fn from_fn(f: impl Fn(Trit) -> Trit) -> Self {
        let outputs: Vec<Trit> = Trit::ALL.iter().map(|&t| f(t)).collect();
        Self(encode(&outputs))
    }

    pub fn index(self) -> u32 {
        self.0
    }

    pub fn table(self) -> [Trit; 3] {
        monadic_table()[self.0 as usize]
    }

    #[inline]
    pub fn apply(self, input: Trit) -> Trit {
        monadic_table()[self.0 as usize][input.digit() as usize]
    }
}

/// A validated dyadic gate index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DyadicGate(u32);

impl DyadicGate {
    pub const KLEENE_AND: Self = Self(KLEENE_AND);
    pub const KLEENE_OR: Self = Self(KLEENE_OR);
    pub const CONSENSUS: Self = Self(CONSENSUS);
    pub const MINORITY: Self = Self(MINORITY);
    pub const PLUS: Self = Self(PLUS);
    pub const TIMES: Self = Self(TIMES);

    pub fn new(index: u32) -> Result<Self> {
        if index >= DYADIC_COUNT {
            return Err(TernaryError::BadGate(index));
        }
        Ok(Self(index))
    }

    /// Gate computing `f`
    pub fn from_fn(f: impl Fn(Trit, Trit) -> Trit) -> Self {
        let mut outputs = Vec::with_capacity(9);
        for a in Trit::ALL {
            for b in Trit::ALL {
                outputs.push(f(a, b));
            }
        }
        Self(encode(&outputs))
    }

    pub fn index(self) -> u32 {
        self.0
    }

    /// Outputs in lexicographic input order
    pub fn table(self) -> [Trit; 9] {
        dyadic_table()[self.0 as usize]
    }

    #[inline]
    pub fn apply(self, a: Trit, b: Trit) -> Trit {
        dyadic_table()[self.0 as usize][pair_slot(a, b)]
    }

    /// Structural properties of this gate
    pub fn properties(self) -> GateProperties {
        GateProperties::analyze(self)
    }
}

impl fmt::Display for DyadicGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match NAMED_GATES.iter().find(|(_, idx)| *idx == self.0) {
            Some((name, _)) => write!(f, "{}", name),
            None => write!(f, "GATE#{}", self.0),
        }
    }
}

// =========================================================================
// Properties analyzer
// =========================================================================

/// Algebraic classification of a dyadic gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateProperties {
    pub commutative: bool,
    pub associative: bool,
    pub idempotent: bool,
    /// e with f(e, x) = f(x, e) = x for all x
    pub identity: Option<Trit>,
    /// z with f(z, x) = f(x, z) = z for all x
    pub absorbing: Option<Trit>,
    /// For each input (in `Trit::ALL` order), y with f(x, y) = f(y, x) = identity
    pub inverses: [Option<Trit>; 3],
}

impl GateProperties {
    pub fn analyze(gate: DyadicGate) -> Self {
        let f = |a, b| gate.apply(a, b);
        let all = Trit::ALL;

        let commutative = all.iter().all(|&a| all.iter().all(|&b| f(a, b) == f(b, a)));
        let associative = all.iter().all(|&a| {
            all.iter()
                .all(|&b| all.iter().all(|&c| f(f(a, b), c) == f(a, f(b, c))))
        });
        let idempotent = all.iter().all(|&a| f(a, a) == a);
        let identity = all
            .iter()
            .copied()
            .find(|&e| all.iter().all(|&x| f(e, x) == x && f(x, e) == x));
        let absorbing = all
            .iter()
            .copied()
            .find(|&z| all.iter().all(|&x| f(z, x) == z && f(x, z) == z));

        let mut inverses = [None; 3];
        if let Some(e) = identity {
            for (slot, &x) in inverses.iter_mut().zip(all.iter()) {
                *slot = all.iter().copied().find(|&y| f(x, y) == e && f(y, x) == e);
            }
        }

        Self {
            commutative,
            associative,
            idempotent,
            identity,
            absorbing,
            inverses,
        }
    }

    /// Inverse of `x` under this gate, if one exists
    pub fn inverse(&self, x: Trit) -> Option<Trit> {
        self.inverses[x.digit() as usize]
    }

    /// Commutative and associative with an identity: a commutative monoid
    pub fn is_monoid(&self) -> bool {
        self.commutative && self.associative && self.identity.is_some()
    }
}
