//! Symbolic execution state.
//!
//! A [`SymbolicState`] is one point in the execution search tree: a stack
//! mapping program variables to symbolic variables, a symbolic heap, a pure
//! constraint set, the fresh-variable counter, and the trace of executed
//! statements (the witness path reported with violations). States are owned
//! exclusively by one branch; children are independent clones.

use std::collections::BTreeMap;
use std::fmt;

use crate::formula::{FreshGen, PureAtom, PureSet, SymVar, SymbolicHeap};

/// One entry of the executed-path trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    /// Source-like rendering of the executed statement or assumed branch.
    pub statement: String,
}

impl PathStep {
    pub fn new(statement: impl Into<String>) -> Self {
        Self {
            statement: statement.into(),
        }
    }
}

impl fmt::Display for PathStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.statement)
    }
}

/// One symbolic execution state.
#[derive(Debug, Clone, Default)]
pub struct SymbolicState {
    /// Program variable -> symbolic variable.
    pub stack: BTreeMap<String, SymVar>,
    /// Spatial part.
    pub heap: SymbolicHeap,
    /// Pure part.
    pub pure: PureSet,
    /// Fresh-variable counter, branch-local.
    pub fresh: FreshGen,
    /// Executed statements, oldest first.
    pub path: Vec<PathStep>,
}

impl SymbolicState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a fresh symbolic variable derived from `base`.
    pub fn fresh_var(&mut self, base: &str) -> SymVar {
        self.fresh.fresh(base)
    }

    /// Bind a program variable to a symbolic variable.
    pub fn bind(&mut self, var: impl Into<String>, sym: SymVar) {
        self.stack.insert(var.into(), sym);
    }

    /// Look up the symbolic variable a program variable denotes.
    pub fn lookup(&self, var: &str) -> Option<&SymVar> {
        self.stack.get(var)
    }

    /// Conjoin one pure constraint.
    pub fn assume_atom(&mut self, atom: PureAtom) {
        self.pure.push(atom);
    }

    /// Append one step to the witness path.
    pub fn record(&mut self, step: impl Into<String>) {
        self.path.push(PathStep::new(step));
    }

    /// The pure set saturated with the heap's separation closure — what
    /// oracle queries about this state must be issued against.
    pub fn saturated_pure(&self) -> PureSet {
        self.pure.conjoin(&self.heap.separation_closure())
    }
}

impl fmt::Display for SymbolicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} && {}", self.heap, self.pure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{SpatialAtom, SymExpr};

    #[test]
    fn bind_and_lookup() {
        let mut state = SymbolicState::new();
        let v = state.fresh_var("x");
        state.bind("x", v.clone());
        assert_eq!(state.lookup("x"), Some(&v));
        assert_eq!(state.lookup("y"), None);
    }

    #[test]
    fn children_are_independent() {
        let mut parent = SymbolicState::new();
        let v = parent.fresh_var("x");
        parent.bind("x", v);

        let mut child = parent.clone();
        let w = child.fresh_var("y");
        child.bind("y", w);
        child.assume_atom(PureAtom::Eq(SymExpr::var("a"), SymExpr::Nil));

        assert_eq!(parent.lookup("y"), None);
        assert!(parent.pure.is_empty());
    }

    #[test]
    fn saturated_pure_includes_closure() {
        let mut state = SymbolicState::new();
        state
            .heap
            .push(SpatialAtom::points_to(
                SymExpr::var("p"),
                [("val", SymExpr::Int(0))],
            ))
            .unwrap();
        let sat = state.saturated_pure();
        assert!(sat
            .atoms()
            .contains(&PureAtom::Ne(SymExpr::var("p"), SymExpr::Nil)));
    }

    #[test]
    fn path_records_in_order() {
        let mut state = SymbolicState::new();
        state.record("x := nil");
        state.record("free x");
        assert_eq!(state.path.len(), 2);
        assert_eq!(state.path[0].statement, "x := nil");
        assert_eq!(state.path[1].statement, "free x");
    }
}
