//! Inductive spatial predicate library.
//!
//! Predicates are defined by an ordered set of disjunctive unfolding rules,
//! base case(s) first. The library is loaded once (built-ins plus the
//! program's own definitions), validated on insert, and shared read-only by
//! every verification task — resolution is by name lookup, never dynamic
//! dispatch, and unfolding recursion is bounded by the explicit depth
//! counter the entailment search carries.
//!
//! Built-ins:
//!
//! ```text
//! list(x)    := x == nil && emp
//!             | exists v, n. x |-> {val: v, next: n} * list(n)
//! lseg(x, y) := x == y && emp
//!             | exists v, n. x |-> {val: v, next: n} * lseg(n, y) && x != y
//! tree(x)    := x == nil && emp
//!             | exists v, l, r. x |-> {val: v, left: l, right: r}
//!                               * tree(l) * tree(r)
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::EngineError;
use crate::formula::{
    FreshGen, PureAtom, PureSet, SpatialAtom, SymExpr, SymVar, SymbolicHeap,
};

/// One unfolding rule (disjunct) of a predicate definition.
#[derive(Debug, Clone, PartialEq)]
pub struct PredRule {
    /// Existentials introduced by this case; freshly renamed at each unfold.
    pub exists: Vec<SymVar>,
    /// Spatial content of the case.
    pub heap: SymbolicHeap,
    /// Pure constraints of the case.
    pub pure: PureSet,
}

impl PredRule {
    /// True for base cases: no spatial content.
    pub fn is_base(&self) -> bool {
        self.heap.is_empty()
    }
}

/// An inductively defined spatial predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct PredicateDef {
    pub name: String,
    /// Formal parameters; the first is the structure's root pointer.
    pub params: Vec<SymVar>,
    /// Ordered unfolding rules, base case(s) first.
    pub rules: Vec<PredRule>,
}

/// Name-keyed registry of predicate definitions.
///
/// Loaded once at start and shared read-only process-wide (the driver wraps
/// it in an `Arc`); no interior mutability, no locking.
#[derive(Debug, Clone, Default)]
pub struct PredicateLibrary {
    defs: HashMap<String, PredicateDef>,
}

impl PredicateLibrary {
    /// An empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// A library seeded with the built-in `list`, `lseg` and `tree`
    /// definitions.
    pub fn with_builtins() -> Self {
        let mut lib = Self::new();
        for def in [list_def(), lseg_def(), tree_def()] {
            // Built-ins are wellformed by construction.
            if let Err(err) = lib.insert(def) {
                unreachable!("built-in predicate failed validation: {err}");
            }
        }
        lib
    }

    /// Register a definition, validating it first.
    pub fn insert(&mut self, def: PredicateDef) -> Result<(), EngineError> {
        self.validate(&def)?;
        self.defs.insert(def.name.clone(), def);
        Ok(())
    }

    /// Look up a definition by name.
    pub fn get(&self, name: &str) -> Option<&PredicateDef> {
        self.defs.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.defs.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Unfold one predicate application with the chosen rule.
    ///
    /// Replaces the formals by `args` and freshly renames the rule's
    /// existentials, returning the case's spatial atoms and pure
    /// constraints. The caller splices these in place of the predicate atom;
    /// nothing outside the rewritten region is touched.
    pub fn unfold(
        &self,
        name: &str,
        args: &[SymExpr],
        rule_idx: usize,
        fresh: &mut FreshGen,
    ) -> Result<(Vec<SpatialAtom>, PureSet), EngineError> {
        let def = self.get(name).ok_or_else(|| EngineError::MalformedPredicate {
            name: name.to_string(),
            reason: "application of an unregistered predicate".to_string(),
        })?;
        if args.len() != def.params.len() {
            return Err(EngineError::MalformedPredicate {
                name: name.to_string(),
                reason: format!(
                    "applied to {} argument(s), expected {}",
                    args.len(),
                    def.params.len()
                ),
            });
        }
        let rule = def.rules.get(rule_idx).ok_or_else(|| {
            EngineError::MalformedPredicate {
                name: name.to_string(),
                reason: format!("no rule with index {rule_idx}"),
            }
        })?;

        let mut map: BTreeMap<SymVar, SymExpr> = def
            .params
            .iter()
            .cloned()
            .zip(args.iter().cloned())
            .collect();
        for bound in &rule.exists {
            map.insert(bound.clone(), SymExpr::Var(fresh.fresh(bound.as_str())));
        }

        let atoms = rule.heap.atoms().iter().map(|a| a.subst(&map)).collect();
        let pure = rule.pure.subst(&map);
        Ok((atoms, pure))
    }

    /// Definition validation: distinct formals, rule variables drawn from
    /// formals plus existentials, nested applications arity-correct against
    /// already-registered definitions (self-reference included).
    fn validate(&self, def: &PredicateDef) -> Result<(), EngineError> {
        let fail = |reason: String| EngineError::MalformedPredicate {
            name: def.name.clone(),
            reason,
        };

        if self.defs.contains_key(&def.name) {
            return Err(fail("duplicate definition".to_string()));
        }
        if def.params.is_empty() {
            return Err(fail("no parameters".to_string()));
        }
        if def.rules.is_empty() {
            return Err(fail("no unfolding rules".to_string()));
        }
        let params: BTreeSet<&SymVar> = def.params.iter().collect();
        if params.len() != def.params.len() {
            return Err(fail("duplicate formal parameter".to_string()));
        }

        for (idx, rule) in def.rules.iter().enumerate() {
            let mut scope: BTreeSet<SymVar> = def.params.iter().cloned().collect();
            for bound in &rule.exists {
                if !scope.insert(bound.clone()) {
                    return Err(fail(format!(
                        "rule {idx}: existential `{bound}` shadows another variable"
                    )));
                }
            }
            let mut used = BTreeSet::new();
            rule.heap.vars_into(&mut used);
            rule.pure.vars_into(&mut used);
            for var in used {
                if !scope.contains(&var) {
                    return Err(fail(format!("rule {idx}: unbound variable `{var}`")));
                }
            }
            for atom in rule.heap.atoms() {
                if let SpatialAtom::Pred { name, args } = atom {
                    let arity = if name == &def.name {
                        Some(def.params.len())
                    } else {
                        self.defs.get(name).map(|d| d.params.len())
                    };
                    match arity {
                        Some(expected) if expected != args.len() => {
                            return Err(fail(format!(
                                "rule {idx}: `{name}` applied to {} argument(s), expected {expected}",
                                args.len()
                            )));
                        }
                        None => {
                            return Err(fail(format!(
                                "rule {idx}: reference to unknown predicate `{name}`"
                            )));
                        }
                        Some(_) => {}
                    }
                }
            }
        }
        Ok(())
    }
}

fn sv(name: &str) -> SymVar {
    SymVar::new(name)
}

fn var(name: &str) -> SymExpr {
    SymExpr::var(name)
}

/// `list(x)`: a nil-terminated singly linked list rooted at `x`.
fn list_def() -> PredicateDef {
    let base = PredRule {
        exists: vec![],
        heap: SymbolicHeap::empty(),
        pure: PureSet::with(vec![PureAtom::Eq(var("x"), SymExpr::Nil)]),
    };
    let step = PredRule {
        exists: vec![sv("v"), sv("n")],
        heap: SymbolicHeap::from_atoms_unchecked(vec![
            SpatialAtom::points_to(var("x"), [("val", var("v")), ("next", var("n"))]),
            SpatialAtom::pred("list", vec![var("n")]),
        ]),
        pure: PureSet::new(),
    };
    PredicateDef {
        name: "list".to_string(),
        params: vec![sv("x")],
        rules: vec![base, step],
    }
}

/// `lseg(x, y)`: a list segment from `x` up to (excluding) `y`.
fn lseg_def() -> PredicateDef {
    let base = PredRule {
        exists: vec![],
        heap: SymbolicHeap::empty(),
        pure: PureSet::with(vec![PureAtom::Eq(var("x"), var("y"))]),
    };
    let step = PredRule {
        exists: vec![sv("v"), sv("n")],
        heap: SymbolicHeap::from_atoms_unchecked(vec![
            SpatialAtom::points_to(var("x"), [("val", var("v")), ("next", var("n"))]),
            SpatialAtom::pred("lseg", vec![var("n"), var("y")]),
        ]),
        pure: PureSet::with(vec![PureAtom::Ne(var("x"), var("y"))]),
    };
    PredicateDef {
        name: "lseg".to_string(),
        params: vec![sv("x"), sv("y")],
        rules: vec![base, step],
    }
}

/// `tree(x)`: a binary tree rooted at `x`.
fn tree_def() -> PredicateDef {
    let base = PredRule {
        exists: vec![],
        heap: SymbolicHeap::empty(),
        pure: PureSet::with(vec![PureAtom::Eq(var("x"), SymExpr::Nil)]),
    };
    let step = PredRule {
        exists: vec![sv("v"), sv("l"), sv("r")],
        heap: SymbolicHeap::from_atoms_unchecked(vec![
            SpatialAtom::points_to(
                var("x"),
                [("val", var("v")), ("left", var("l")), ("right", var("r"))],
            ),
            SpatialAtom::pred("tree", vec![var("l")]),
            SpatialAtom::pred("tree", vec![var("r")]),
        ]),
        pure: PureSet::new(),
    };
    PredicateDef {
        name: "tree".to_string(),
        params: vec![sv("x")],
        rules: vec![base, step],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_are_registered() {
        let lib = PredicateLibrary::with_builtins();
        assert!(lib.contains("list"));
        assert!(lib.contains("lseg"));
        assert!(lib.contains("tree"));
        assert_eq!(lib.len(), 3);
    }

    #[test]
    fn list_rules_are_base_then_step() {
        let lib = PredicateLibrary::with_builtins();
        let def = lib.get("list").unwrap();
        assert_eq!(def.rules.len(), 2);
        assert!(def.rules[0].is_base());
        assert!(!def.rules[1].is_base());
    }

    #[test]
    fn unfold_base_case_yields_nil_constraint() {
        let lib = PredicateLibrary::with_builtins();
        let mut fresh = FreshGen::new();
        let (atoms, pure) = lib
            .unfold("list", &[SymExpr::var("p")], 0, &mut fresh)
            .unwrap();
        assert!(atoms.is_empty());
        assert_eq!(
            pure.atoms(),
            &[PureAtom::Eq(SymExpr::var("p"), SymExpr::Nil)]
        );
    }

    #[test]
    fn unfold_step_case_renames_existentials() {
        let lib = PredicateLibrary::with_builtins();
        let mut fresh = FreshGen::new();
        let (atoms, pure) = lib
            .unfold("list", &[SymExpr::var("p")], 1, &mut fresh)
            .unwrap();
        assert!(pure.is_empty());
        assert_eq!(atoms.len(), 2);
        match &atoms[0] {
            SpatialAtom::PointsTo { addr, fields } => {
                assert_eq!(addr, &SymExpr::var("p"));
                let next = fields.get("next").unwrap();
                assert!(matches!(next, SymExpr::Var(v) if v.as_str().starts_with("n@")));
            }
            other => panic!("expected points-to, got {other:?}"),
        }
        match &atoms[1] {
            SpatialAtom::Pred { name, args } => {
                assert_eq!(name, "list");
                assert!(matches!(&args[0], SymExpr::Var(v) if v.as_str().starts_with("n@")));
            }
            other => panic!("expected predicate, got {other:?}"),
        }
    }

    #[test]
    fn consecutive_unfolds_do_not_collide() {
        let lib = PredicateLibrary::with_builtins();
        let mut fresh = FreshGen::new();
        let (a1, _) = lib
            .unfold("list", &[SymExpr::var("p")], 1, &mut fresh)
            .unwrap();
        let (a2, _) = lib
            .unfold("list", &[SymExpr::var("q")], 1, &mut fresh)
            .unwrap();
        let mut vars = BTreeSet::new();
        for atom in a1.iter().chain(a2.iter()) {
            atom.vars_into(&mut vars);
        }
        // p, q, plus four distinct fresh existentials
        assert_eq!(vars.len(), 6);
    }

    #[test]
    fn unfold_checks_arity() {
        let lib = PredicateLibrary::with_builtins();
        let mut fresh = FreshGen::new();
        let err = lib
            .unfold("lseg", &[SymExpr::var("p")], 0, &mut fresh)
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedPredicate { .. }));
    }

    #[test]
    fn unfold_unknown_predicate_is_error() {
        let lib = PredicateLibrary::with_builtins();
        let mut fresh = FreshGen::new();
        let err = lib
            .unfold("dag", &[SymExpr::var("p")], 0, &mut fresh)
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedPredicate { .. }));
    }

    #[test]
    fn insert_rejects_duplicate_name() {
        let mut lib = PredicateLibrary::with_builtins();
        let err = lib.insert(list_def()).unwrap_err();
        assert!(err.to_string().contains("duplicate definition"));
    }

    #[test]
    fn insert_rejects_unbound_rule_variable() {
        let mut lib = PredicateLibrary::new();
        let def = PredicateDef {
            name: "bad".to_string(),
            params: vec![sv("x")],
            rules: vec![PredRule {
                exists: vec![],
                heap: SymbolicHeap::empty(),
                pure: PureSet::with(vec![PureAtom::Eq(var("x"), var("stray"))]),
            }],
        };
        let err = lib.insert(def).unwrap_err();
        assert!(err.to_string().contains("unbound variable"));
    }

    #[test]
    fn insert_rejects_bad_recursive_arity() {
        let mut lib = PredicateLibrary::new();
        let def = PredicateDef {
            name: "bad".to_string(),
            params: vec![sv("x")],
            rules: vec![PredRule {
                exists: vec![sv("n")],
                heap: SymbolicHeap::with_atoms(vec![SpatialAtom::pred(
                    "bad",
                    vec![var("x"), var("n")],
                )])
                .unwrap(),
                pure: PureSet::new(),
            }],
        };
        let err = lib.insert(def).unwrap_err();
        assert!(err.to_string().contains("expected 1"));
    }

    #[test]
    fn insert_rejects_unknown_reference() {
        let mut lib = PredicateLibrary::new();
        let def = PredicateDef {
            name: "wrapper".to_string(),
            params: vec![sv("x")],
            rules: vec![PredRule {
                exists: vec![],
                heap: SymbolicHeap::with_atoms(vec![SpatialAtom::pred("ghost", vec![var("x")])])
                    .unwrap(),
                pure: PureSet::new(),
            }],
        };
        let err = lib.insert(def).unwrap_err();
        assert!(err.to_string().contains("unknown predicate"));
    }
}
