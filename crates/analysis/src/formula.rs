//! Symbolic-heap formula model.
//!
//! A symbolic heap is a separating conjunction of spatial atoms (points-to
//! facts and predicate applications) plus a pure constraint set over symbolic
//! variables. This module defines the formula vocabulary shared by
//! contracts, loop invariants, predicate definitions and execution states:
//!
//! - [`SymVar`] / [`SymExpr`]: symbolic variables and the terms over them
//! - [`PureAtom`] / [`PureSet`]: equality/disequality/order constraints
//! - [`SpatialAtom`] / [`SymbolicHeap`]: the spatial part
//! - [`HeapFormula`]: existentials + heap + pure, the assertion-language unit
//!
//! Addresses and data values share one sort (mathematical integers, `nil`
//! being `0`), mirroring the single-node-sort shape of the input language.
//!
//! Disjointness is enforced in two layers: syntactically identical points-to
//! addresses are rejected at construction time (an internal-engine error),
//! and semantic overlap is surfaced to the pure layer by
//! [`SymbolicHeap::separation_closure`], which makes aliased unfoldings
//! unsatisfiable rather than silently admitted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::error::EngineError;

/// A symbolic variable: a name denoting one unknown value.
///
/// Contract and invariant formulas use program-variable names directly;
/// the engine mints fresh variables as `base@N` (see [`FreshGen`]), so
/// front-end names must not contain `@`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SymVar(String);

impl SymVar {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymVar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SymVar {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Fresh symbolic-variable generator.
///
/// Each symbolic state owns one; child states inherit a copy, so two sibling
/// branches may mint the same name independently — harmless, because states
/// on different branches never exchange variables.
#[derive(Debug, Clone, Default)]
pub struct FreshGen {
    next: u32,
}

impl FreshGen {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh variable derived from `base`.
    ///
    /// An existing `@N` suffix on `base` is stripped first so re-freshened
    /// variables stay readable (`x@3` freshens to `x@7`, not `x@3@7`).
    pub fn fresh(&mut self, base: &str) -> SymVar {
        let stem = base.split('@').next().unwrap_or(base);
        let var = SymVar(format!("{stem}@{}", self.next));
        self.next += 1;
        var
    }
}

/// A term over symbolic variables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymExpr {
    /// Integer literal.
    Int(i64),
    /// The null address.
    Nil,
    /// Symbolic variable reference.
    Var(SymVar),
    Add(Box<SymExpr>, Box<SymExpr>),
    Sub(Box<SymExpr>, Box<SymExpr>),
    Mul(Box<SymExpr>, Box<SymExpr>),
}

impl SymExpr {
    /// Shorthand for a variable reference.
    pub fn var(name: impl Into<String>) -> SymExpr {
        SymExpr::Var(SymVar::new(name))
    }

    /// Apply a substitution to this term.
    pub fn subst(&self, map: &BTreeMap<SymVar, SymExpr>) -> SymExpr {
        match self {
            SymExpr::Int(_) | SymExpr::Nil => self.clone(),
            SymExpr::Var(v) => map.get(v).cloned().unwrap_or_else(|| self.clone()),
            SymExpr::Add(a, b) => {
                SymExpr::Add(Box::new(a.subst(map)), Box::new(b.subst(map)))
            }
            SymExpr::Sub(a, b) => {
                SymExpr::Sub(Box::new(a.subst(map)), Box::new(b.subst(map)))
            }
            SymExpr::Mul(a, b) => {
                SymExpr::Mul(Box::new(a.subst(map)), Box::new(b.subst(map)))
            }
        }
    }

    /// Collect the variables occurring in this term.
    pub fn vars_into(&self, out: &mut BTreeSet<SymVar>) {
        match self {
            SymExpr::Int(_) | SymExpr::Nil => {}
            SymExpr::Var(v) => {
                out.insert(v.clone());
            }
            SymExpr::Add(a, b) | SymExpr::Sub(a, b) | SymExpr::Mul(a, b) => {
                a.vars_into(out);
                b.vars_into(out);
            }
        }
    }

    /// True if any variable of `vars` occurs in this term.
    pub fn mentions_any(&self, vars: &BTreeSet<SymVar>) -> bool {
        match self {
            SymExpr::Int(_) | SymExpr::Nil => false,
            SymExpr::Var(v) => vars.contains(v),
            SymExpr::Add(a, b) | SymExpr::Sub(a, b) | SymExpr::Mul(a, b) => {
                a.mentions_any(vars) || b.mentions_any(vars)
            }
        }
    }
}

impl fmt::Display for SymExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SymExpr::Int(n) => write!(f, "{n}"),
            SymExpr::Nil => write!(f, "nil"),
            SymExpr::Var(v) => write!(f, "{v}"),
            SymExpr::Add(a, b) => write!(f, "({a} + {b})"),
            SymExpr::Sub(a, b) => write!(f, "({a} - {b})"),
            SymExpr::Mul(a, b) => write!(f, "({a} * {b})"),
        }
    }
}

/// One pure constraint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PureAtom {
    Eq(SymExpr, SymExpr),
    Ne(SymExpr, SymExpr),
    Lt(SymExpr, SymExpr),
    Le(SymExpr, SymExpr),
    Gt(SymExpr, SymExpr),
    Ge(SymExpr, SymExpr),
}

impl PureAtom {
    /// The logical negation, kept atom-shaped.
    pub fn negated(&self) -> PureAtom {
        match self {
            PureAtom::Eq(a, b) => PureAtom::Ne(a.clone(), b.clone()),
            PureAtom::Ne(a, b) => PureAtom::Eq(a.clone(), b.clone()),
            PureAtom::Lt(a, b) => PureAtom::Ge(a.clone(), b.clone()),
            PureAtom::Le(a, b) => PureAtom::Gt(a.clone(), b.clone()),
            PureAtom::Gt(a, b) => PureAtom::Le(a.clone(), b.clone()),
            PureAtom::Ge(a, b) => PureAtom::Lt(a.clone(), b.clone()),
        }
    }

    pub fn subst(&self, map: &BTreeMap<SymVar, SymExpr>) -> PureAtom {
        match self {
            PureAtom::Eq(a, b) => PureAtom::Eq(a.subst(map), b.subst(map)),
            PureAtom::Ne(a, b) => PureAtom::Ne(a.subst(map), b.subst(map)),
            PureAtom::Lt(a, b) => PureAtom::Lt(a.subst(map), b.subst(map)),
            PureAtom::Le(a, b) => PureAtom::Le(a.subst(map), b.subst(map)),
            PureAtom::Gt(a, b) => PureAtom::Gt(a.subst(map), b.subst(map)),
            PureAtom::Ge(a, b) => PureAtom::Ge(a.subst(map), b.subst(map)),
        }
    }

    pub fn vars_into(&self, out: &mut BTreeSet<SymVar>) {
        let (a, b) = self.sides();
        a.vars_into(out);
        b.vars_into(out);
    }

    /// Both sides of the relation.
    pub fn sides(&self) -> (&SymExpr, &SymExpr) {
        match self {
            PureAtom::Eq(a, b)
            | PureAtom::Ne(a, b)
            | PureAtom::Lt(a, b)
            | PureAtom::Le(a, b)
            | PureAtom::Gt(a, b)
            | PureAtom::Ge(a, b) => (a, b),
        }
    }

    /// True if any variable of `vars` occurs in this atom.
    pub fn mentions_any(&self, vars: &BTreeSet<SymVar>) -> bool {
        let (a, b) = self.sides();
        a.mentions_any(vars) || b.mentions_any(vars)
    }
}

impl fmt::Display for PureAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PureAtom::Eq(a, b) => write!(f, "{a} == {b}"),
            PureAtom::Ne(a, b) => write!(f, "{a} != {b}"),
            PureAtom::Lt(a, b) => write!(f, "{a} < {b}"),
            PureAtom::Le(a, b) => write!(f, "{a} <= {b}"),
            PureAtom::Gt(a, b) => write!(f, "{a} > {b}"),
            PureAtom::Ge(a, b) => write!(f, "{a} >= {b}"),
        }
    }
}

/// A conjunction of pure constraints.
///
/// Must stay satisfiable for the owning state to be feasible; an
/// unsatisfiable set makes the state infeasible, which is pruned by the
/// execution engine, never reported.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PureSet {
    atoms: Vec<PureAtom>,
}

impl PureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(atoms: Vec<PureAtom>) -> Self {
        let mut set = Self::new();
        for atom in atoms {
            set.push(atom);
        }
        set
    }

    /// Conjoin one atom (deduplicated syntactically).
    pub fn push(&mut self, atom: PureAtom) {
        if !self.atoms.contains(&atom) {
            self.atoms.push(atom);
        }
    }

    pub fn extend(&mut self, other: impl IntoIterator<Item = PureAtom>) {
        for atom in other {
            self.push(atom);
        }
    }

    /// Conjunction of two sets.
    pub fn conjoin(&self, other: &PureSet) -> PureSet {
        let mut out = self.clone();
        out.extend(other.atoms.iter().cloned());
        out
    }

    pub fn atoms(&self) -> &[PureAtom] {
        &self.atoms
    }

    pub fn iter(&self) -> impl Iterator<Item = &PureAtom> {
        self.atoms.iter()
    }

    pub fn subst(&self, map: &BTreeMap<SymVar, SymExpr>) -> PureSet {
        PureSet::with(self.atoms.iter().map(|a| a.subst(map)).collect())
    }

    pub fn vars_into(&self, out: &mut BTreeSet<SymVar>) {
        for atom in &self.atoms {
            atom.vars_into(out);
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

impl fmt::Display for PureSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.atoms.is_empty() {
            return write!(f, "true");
        }
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                write!(f, " && ")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}

/// One spatial atom of a symbolic heap.
#[derive(Debug, Clone, PartialEq)]
pub enum SpatialAtom {
    /// A concrete cell: `addr |-> {f1: v1, ...}`.
    PointsTo {
        addr: SymExpr,
        fields: BTreeMap<String, SymExpr>,
    },
    /// An instantiated predicate application: `P(a1, ...)`.
    Pred { name: String, args: Vec<SymExpr> },
}

impl SpatialAtom {
    /// Build a points-to atom from field pairs.
    pub fn points_to(addr: SymExpr, fields: impl IntoIterator<Item = (&'static str, SymExpr)>) -> SpatialAtom {
        SpatialAtom::PointsTo {
            addr,
            fields: fields
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect(),
        }
    }

    /// Build a predicate application atom.
    pub fn pred(name: impl Into<String>, args: Vec<SymExpr>) -> SpatialAtom {
        SpatialAtom::Pred {
            name: name.into(),
            args,
        }
    }

    /// The root address of the atom: the cell address for points-to, the
    /// first argument for a predicate application (by convention the first
    /// formal of every predicate is the structure's root pointer).
    pub fn root(&self) -> Option<&SymExpr> {
        match self {
            SpatialAtom::PointsTo { addr, .. } => Some(addr),
            SpatialAtom::Pred { args, .. } => args.first(),
        }
    }

    pub fn subst(&self, map: &BTreeMap<SymVar, SymExpr>) -> SpatialAtom {
        match self {
            SpatialAtom::PointsTo { addr, fields } => SpatialAtom::PointsTo {
                addr: addr.subst(map),
                fields: fields
                    .iter()
                    .map(|(k, v)| (k.clone(), v.subst(map)))
                    .collect(),
            },
            SpatialAtom::Pred { name, args } => SpatialAtom::Pred {
                name: name.clone(),
                args: args.iter().map(|a| a.subst(map)).collect(),
            },
        }
    }

    pub fn vars_into(&self, out: &mut BTreeSet<SymVar>) {
        match self {
            SpatialAtom::PointsTo { addr, fields } => {
                addr.vars_into(out);
                for v in fields.values() {
                    v.vars_into(out);
                }
            }
            SpatialAtom::Pred { args, .. } => {
                for a in args {
                    a.vars_into(out);
                }
            }
        }
    }

    /// True if any variable of `vars` occurs in this atom.
    pub fn mentions_any(&self, vars: &BTreeSet<SymVar>) -> bool {
        match self {
            SpatialAtom::PointsTo { addr, fields } => {
                addr.mentions_any(vars) || fields.values().any(|v| v.mentions_any(vars))
            }
            SpatialAtom::Pred { args, .. } => args.iter().any(|a| a.mentions_any(vars)),
        }
    }
}

impl fmt::Display for SpatialAtom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpatialAtom::PointsTo { addr, fields } => {
                write!(f, "{addr} |-> {{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{name}: {value}")?;
                }
                write!(f, "}}")
            }
            SpatialAtom::Pred { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Pure consequences of separation over a set of spatial atoms: every
/// points-to address is non-nil, and any two points-to addresses are
/// distinct. Predicate applications contribute nothing here — their cells
/// surface once unfolded.
pub fn separation_closure_of(atoms: &[SpatialAtom]) -> PureSet {
    let mut out = PureSet::new();
    let addrs: Vec<&SymExpr> = atoms
        .iter()
        .filter_map(|a| match a {
            SpatialAtom::PointsTo { addr, .. } => Some(addr),
            SpatialAtom::Pred { .. } => None,
        })
        .collect();
    for addr in &addrs {
        out.push(PureAtom::Ne((*addr).clone(), SymExpr::Nil));
    }
    for (i, a) in addrs.iter().enumerate() {
        for b in addrs.iter().skip(i + 1) {
            out.push(PureAtom::Ne((*a).clone(), (*b).clone()));
        }
    }
    out
}

/// A separating conjunction of spatial atoms.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SymbolicHeap {
    atoms: Vec<SpatialAtom>,
}

impl SymbolicHeap {
    /// The empty heap (`emp`).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a heap from atoms, enforcing the disjointness invariant.
    pub fn with_atoms(atoms: Vec<SpatialAtom>) -> Result<Self, EngineError> {
        let mut heap = Self::empty();
        for atom in atoms {
            heap.push(atom)?;
        }
        Ok(heap)
    }

    /// Build a heap from atoms without the construction-time check.
    ///
    /// For engine-internal rewrites only (frame assembly, unfold splicing)
    /// where overlap is either impossible by construction or deliberately
    /// left to the separation closure to rule out as infeasible.
    pub(crate) fn from_atoms_unchecked(atoms: Vec<SpatialAtom>) -> SymbolicHeap {
        SymbolicHeap { atoms }
    }

    /// Conjoin one atom without the construction-time check (see
    /// [`SymbolicHeap::from_atoms_unchecked`]).
    pub(crate) fn push_unchecked(&mut self, atom: SpatialAtom) {
        self.atoms.push(atom);
    }

    /// Conjoin one atom.
    ///
    /// A points-to atom whose address is syntactically identical to an
    /// existing points-to address breaks the disjointness invariant; that is
    /// an internal-engine error, not a verification failure. (Semantic
    /// overlap between distinct expressions is handled by the separation
    /// closure making the pure set unsatisfiable.)
    pub fn push(&mut self, atom: SpatialAtom) -> Result<(), EngineError> {
        if let SpatialAtom::PointsTo { addr, .. } = &atom {
            let duplicate = self.atoms.iter().any(|existing| {
                matches!(existing, SpatialAtom::PointsTo { addr: a, .. } if a == addr)
            });
            if duplicate {
                return Err(EngineError::DisjointHeapViolation {
                    addr: addr.to_string(),
                });
            }
        }
        self.atoms.push(atom);
        Ok(())
    }

    /// Separating conjunction of two heaps.
    pub fn star(&self, other: &SymbolicHeap) -> Result<SymbolicHeap, EngineError> {
        let mut out = self.clone();
        for atom in &other.atoms {
            out.push(atom.clone())?;
        }
        Ok(out)
    }

    pub fn atoms(&self) -> &[SpatialAtom] {
        &self.atoms
    }

    pub fn get(&self, idx: usize) -> Option<&SpatialAtom> {
        self.atoms.get(idx)
    }

    /// Remove and return the atom at `idx`.
    ///
    /// Callers index into `atoms()`; an out-of-range index is a caller bug
    /// surfaced as `None`.
    pub fn remove(&mut self, idx: usize) -> Option<SpatialAtom> {
        if idx < self.atoms.len() {
            Some(self.atoms.remove(idx))
        } else {
            None
        }
    }

    /// Replace the value of `field` in the points-to atom at `idx`.
    ///
    /// Returns `false` when the atom is not a points-to or lacks the field;
    /// the cell's field set is never extended by a write.
    pub fn set_field(&mut self, idx: usize, field: &str, value: SymExpr) -> bool {
        match self.atoms.get_mut(idx) {
            Some(SpatialAtom::PointsTo { fields, .. }) => match fields.get_mut(field) {
                Some(slot) => {
                    *slot = value;
                    true
                }
                None => false,
            },
            _ => false,
        }
    }

    /// Pure consequences of separation (see [`separation_closure_of`]).
    pub fn separation_closure(&self) -> PureSet {
        separation_closure_of(&self.atoms)
    }

    pub fn subst(&self, map: &BTreeMap<SymVar, SymExpr>) -> Result<SymbolicHeap, EngineError> {
        SymbolicHeap::with_atoms(self.atoms.iter().map(|a| a.subst(map)).collect())
    }

    pub fn vars_into(&self, out: &mut BTreeSet<SymVar>) {
        for atom in &self.atoms {
            atom.vars_into(out);
        }
    }

    pub fn len(&self) -> usize {
        self.atoms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.atoms.is_empty()
    }
}

impl fmt::Display for SymbolicHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.atoms.is_empty() {
            return write!(f, "emp");
        }
        for (i, atom) in self.atoms.iter().enumerate() {
            if i > 0 {
                write!(f, " * ")?;
            }
            write!(f, "{atom}")?;
        }
        Ok(())
    }
}

/// An assertion-language formula: existentials + spatial part + pure part.
///
/// This is the unit contracts, loop invariants and predicate rules are
/// written in. Free variables are program-variable names (for contracts) or
/// predicate formals (for rules); `exists` binds the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct HeapFormula {
    pub exists: Vec<SymVar>,
    pub heap: SymbolicHeap,
    pub pure: PureSet,
}

impl HeapFormula {
    /// The trivial formula: `emp` with no constraints.
    pub fn emp() -> Self {
        Self {
            exists: Vec::new(),
            heap: SymbolicHeap::empty(),
            pure: PureSet::new(),
        }
    }

    pub fn new(heap: SymbolicHeap, pure: PureSet) -> Self {
        Self {
            exists: Vec::new(),
            heap,
            pure,
        }
    }

    pub fn with_exists(exists: Vec<SymVar>, heap: SymbolicHeap, pure: PureSet) -> Self {
        Self { exists, heap, pure }
    }

    /// Substitute free variables, leaving `exists` binders in place.
    ///
    /// Bound variables shadow the substitution (capture-avoiding in the only
    /// direction that matters here, since replacement terms never mention
    /// bound names — the engine renames binders before instantiating).
    pub fn subst_free(&self, map: &BTreeMap<SymVar, SymExpr>) -> Result<HeapFormula, EngineError> {
        let mut map = map.clone();
        for bound in &self.exists {
            map.remove(bound);
        }
        Ok(HeapFormula {
            exists: self.exists.clone(),
            heap: self.heap.subst(&map)?,
            pure: self.pure.subst(&map),
        })
    }

    /// Instantiate the formula: substitute free variables per `map` and
    /// skolemize the existentials with fresh variables. Returns the opened
    /// heap and pure parts.
    pub fn instantiate(
        &self,
        map: &BTreeMap<SymVar, SymExpr>,
        fresh: &mut FreshGen,
    ) -> Result<(SymbolicHeap, PureSet), EngineError> {
        let mut map = map.clone();
        for bound in &self.exists {
            let skolem = fresh.fresh(bound.as_str());
            map.insert(bound.clone(), SymExpr::Var(skolem));
        }
        Ok((self.heap.subst(&map)?, self.pure.subst(&map)))
    }

    /// Free variables: everything mentioned minus the existentials.
    pub fn free_vars(&self) -> BTreeSet<SymVar> {
        let mut vars = BTreeSet::new();
        self.heap.vars_into(&mut vars);
        self.pure.vars_into(&mut vars);
        for bound in &self.exists {
            vars.remove(bound);
        }
        vars
    }
}

impl fmt::Display for HeapFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.exists.is_empty() {
            write!(f, "exists ")?;
            for (i, v) in self.exists.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{v}")?;
            }
            write!(f, ". ")?;
        }
        write!(f, "{}", self.heap)?;
        if !self.pure.is_empty() {
            write!(f, " && {}", self.pure)?;
        }
        Ok(())
    }
}
