//! Satisfiability oracle interface and the built-in ground fast path.
//!
//! All pure-constraint queries flow through [`PureOracle`]. The engine never
//! inspects an oracle's internals; it only consumes `Sat`/`Unsat`/`Unknown`.
//! The driver wires in the subprocess SMT backend; [`GroundOracle`] decides
//! the *equality-with-offset* fragment entirely in-process and answers
//! `Unknown` outside it, so it doubles as the SMT backend's fast path and as
//! the deterministic oracle the test suite runs against.
//!
//! The ground fragment: conjunctions whose atoms relate terms of the shape
//! `variable + constant` (after folding `nil` to `0` and constant
//! multiplication). Equalities feed a union-find with integer offsets;
//! disequalities and order atoms are then evaluated per equivalence class.
//! Both answers are definite: `Unsat` only on a derived contradiction,
//! `Sat` only when a model provably exists (distinct classes can always be
//! spread far enough apart in ℤ to satisfy the remaining disequalities —
//! any cross-class *order* atom instead degrades to `Unknown`).

use std::collections::BTreeMap;

use crate::error::EngineError;
use crate::formula::{PureAtom, PureSet, SymExpr, SymVar};

/// Answer of a satisfiability query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatVerdict {
    Sat,
    Unsat,
    /// Could not decide; the reason is diagnostic only.
    Unknown(String),
}

/// The satisfiability oracle interface.
///
/// `check` asks whether the conjunction is satisfiable. Implementations
/// must be definite: answer `Sat`/`Unsat` only when certain, `Unknown`
/// otherwise — the engine prunes on `Unsat` and accepts branches on `Sat`,
/// so a wrong answer in either direction breaks soundness.
pub trait PureOracle: Send + Sync {
    fn check(&self, pure: &PureSet) -> Result<SatVerdict, EngineError>;
}

/// In-process decision procedure for the equality-with-offset fragment.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroundOracle;

impl PureOracle for GroundOracle {
    fn check(&self, pure: &PureSet) -> Result<SatVerdict, EngineError> {
        Ok(decide(pure))
    }
}

/// One linearized side: `var + constant`, or a plain constant.
type Side = (Option<SymVar>, i64);

fn decide(pure: &PureSet) -> SatVerdict {
    let mut uf = OffsetUnionFind::new();
    let mut ids: BTreeMap<SymVar, usize> = BTreeMap::new();
    let mut out_of_fragment = false;

    // First pass: merge equalities into the union-find.
    for atom in pure.iter() {
        if let PureAtom::Eq(a, b) = atom {
            match (linearize(a), linearize(b)) {
                (Some((va, ca)), Some((vb, cb))) => {
                    let na = node(&mut uf, &mut ids, va);
                    let nb = node(&mut uf, &mut ids, vb);
                    // val(na) + ca = val(nb) + cb
                    match cb.checked_sub(ca) {
                        Some(d) => match uf.union(na, nb, d) {
                            Some(true) => {}
                            Some(false) => return SatVerdict::Unsat,
                            None => out_of_fragment = true,
                        },
                        None => out_of_fragment = true,
                    }
                }
                _ => out_of_fragment = true,
            }
        }
    }

    // Second pass: evaluate the remaining atoms per equivalence class.
    let mut cross_class_order = false;
    for atom in pure.iter() {
        if matches!(atom, PureAtom::Eq(_, _)) {
            continue;
        }
        let (a, b) = atom.sides();
        let (Some((va, ca)), Some((vb, cb))) = (linearize(a), linearize(b)) else {
            out_of_fragment = true;
            continue;
        };
        let na = node(&mut uf, &mut ids, va);
        let nb = node(&mut uf, &mut ids, vb);
        let (Some((ra, oa)), Some((rb, ob))) = (uf.find(na), uf.find(nb)) else {
            out_of_fragment = true;
            continue;
        };
        if ra == rb {
            // Exact value difference, computed wide to dodge overflow.
            let diff = (oa as i128 + ca as i128) - (ob as i128 + cb as i128);
            let holds = match atom {
                PureAtom::Ne(_, _) => diff != 0,
                PureAtom::Lt(_, _) => diff < 0,
                PureAtom::Le(_, _) => diff <= 0,
                PureAtom::Gt(_, _) => diff > 0,
                PureAtom::Ge(_, _) => diff >= 0,
                PureAtom::Eq(_, _) => unreachable!("equalities handled in the first pass"),
            };
            if !holds {
                return SatVerdict::Unsat;
            }
        } else if !matches!(atom, PureAtom::Ne(_, _)) {
            // A disequality across classes is always satisfiable (spread the
            // classes); an order atom across classes is not decidable here.
            cross_class_order = true;
        }
    }

    if out_of_fragment {
        return SatVerdict::Unknown("constraint outside the ground fragment".to_string());
    }
    if cross_class_order {
        return SatVerdict::Unknown("order constraint between unrelated terms".to_string());
    }
    SatVerdict::Sat
}

/// Normalize a term to `var + constant` where possible.
fn linearize(expr: &SymExpr) -> Option<Side> {
    match expr {
        SymExpr::Int(c) => Some((None, *c)),
        SymExpr::Nil => Some((None, 0)),
        SymExpr::Var(v) => Some((Some(v.clone()), 0)),
        SymExpr::Add(a, b) => {
            let (va, ca) = linearize(a)?;
            let (vb, cb) = linearize(b)?;
            let c = ca.checked_add(cb)?;
            match (va, vb) {
                (Some(v), None) | (None, Some(v)) => Some((Some(v), c)),
                (None, None) => Some((None, c)),
                (Some(_), Some(_)) => None,
            }
        }
        SymExpr::Sub(a, b) => {
            let (va, ca) = linearize(a)?;
            let (vb, cb) = linearize(b)?;
            let c = ca.checked_sub(cb)?;
            match (va, vb) {
                (Some(v), None) => Some((Some(v), c)),
                (None, None) => Some((None, c)),
                // `c - x` and `x - y` have a negative variable coefficient
                _ => None,
            }
        }
        SymExpr::Mul(a, b) => {
            let (va, ca) = linearize(a)?;
            let (vb, cb) = linearize(b)?;
            match (va, vb) {
                (None, None) => Some((None, ca.checked_mul(cb)?)),
                _ => None,
            }
        }
    }
}

fn node(uf: &mut OffsetUnionFind, ids: &mut BTreeMap<SymVar, usize>, var: Option<SymVar>) -> usize {
    match var {
        // Node 0 anchors all constants at value 0.
        None => 0,
        Some(v) => *ids.entry(v).or_insert_with(|| uf.add()),
    }
}

/// Union-find where each node carries an integer offset to its parent:
/// `val(node) = val(parent) + offset`.
struct OffsetUnionFind {
    parent: Vec<usize>,
    offset: Vec<i64>,
}

impl OffsetUnionFind {
    fn new() -> Self {
        // Node 0 is the constant anchor with value 0.
        Self {
            parent: vec![0],
            offset: vec![0],
        }
    }

    fn add(&mut self) -> usize {
        let id = self.parent.len();
        self.parent.push(id);
        self.offset.push(0);
        id
    }

    /// Root and cumulative offset of `start`; `None` on offset overflow.
    fn find(&mut self, start: usize) -> Option<(usize, i64)> {
        let mut path = Vec::new();
        let mut i = start;
        while self.parent[i] != i {
            path.push(i);
            i = self.parent[i];
        }
        let root = i;
        let mut cum = 0i64;
        for &n in path.iter().rev() {
            cum = cum.checked_add(self.offset[n])?;
            self.parent[n] = root;
            self.offset[n] = cum;
        }
        let total = if path.is_empty() {
            0
        } else {
            self.offset[start]
        };
        Some((root, total))
    }

    /// Record `val(a) = val(b) + d`.
    ///
    /// Returns `Some(false)` on contradiction, `None` on offset overflow.
    fn union(&mut self, a: usize, b: usize, d: i64) -> Option<bool> {
        let (ra, oa) = self.find(a)?;
        let (rb, ob) = self.find(b)?;
        if ra == rb {
            return Some(oa == ob.checked_add(d)?);
        }
        // val(ra) = val(a) - oa = val(rb) + ob + d - oa
        self.parent[ra] = rb;
        self.offset[ra] = ob.checked_add(d)?.checked_sub(oa)?;
        Some(true)
    }
}
