//! Entailment and frame inference.
//!
//! Decides `antecedent |- consequent * Frame` by structural subtraction:
//! consequent atoms are matched against antecedent atoms (up to pure-set-
//! implied address equality), predicate atoms are proved by bounded
//! unfolding, and whatever antecedent is left over becomes the inferred
//! frame. The procedure is sound but incomplete — it may answer `Fails` or
//! `Unknown` on entailments a complete (undecidable) procedure would
//! accept; that trade-off is deliberate.
//!
//! Proof search shape:
//!
//! 1. Pick a consequent spatial atom (preferring one whose root address
//!    contains no unification variables).
//! 2. Points-to goals match a points-to antecedent with a provably equal
//!    address, field by field; consequent existentials unify against the
//!    antecedent's field values. With no direct match, an antecedent
//!    predicate whose head equals the address is unfolded — a *demonic*
//!    case split: every feasible case must entail, infeasible cases prune
//!    silently, and the per-case frames must agree.
//! 3. Predicate goals match an identical antecedent application, or are
//!    proved by unfolding the *consequent* predicate — an *angelic* choice:
//!    the first rule that works wins.
//! 4. With the spatial consequent exhausted, each consequent pure atom must
//!    be implied by the saturated antecedent pure set (`unsat(ante ∧ ¬atom)`
//!    via the oracle); the remaining antecedent atoms plus its pure set
//!    form the frame.
//!
//! Every unfold in either direction decrements one explicit depth counter;
//! exhaustion is a `Fails` with the unmatched goal atom and the antecedent
//! heap shape as the minimal counterexample. Wall-clock deadlines and
//! oracle `unknown`s surface as `Unknown`, never as a verdict in either
//! definite direction.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::error::EngineError;
use crate::formula::{
    separation_closure_of, FreshGen, HeapFormula, PureAtom, PureSet, SpatialAtom, SymExpr,
    SymVar, SymbolicHeap,
};
use crate::oracle::{PureOracle, SatVerdict};
use crate::pred::PredicateLibrary;
use crate::verdict::UnknownReason;

use std::fmt;

/// Default unfolding-depth ceiling for the proof search.
pub const DEFAULT_UNFOLD_DEPTH: u32 = 6;

/// The residual antecedent left after proving a consequent.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub heap: SymbolicHeap,
    pub pure: PureSet,
}

impl Frame {
    /// An empty frame over the given pure set.
    pub fn emp(pure: PureSet) -> Self {
        Self {
            heap: SymbolicHeap::empty(),
            pure,
        }
    }
}

impl fmt::Display for Frame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} && {}", self.heap, self.pure)
    }
}

/// The goal atom an entailment got stuck on.
#[derive(Debug, Clone, PartialEq)]
pub enum UnmatchedGoal {
    Spatial(SpatialAtom),
    Pure(PureAtom),
}

impl fmt::Display for UnmatchedGoal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnmatchedGoal::Spatial(atom) => write!(f, "{atom}"),
            UnmatchedGoal::Pure(atom) => write!(f, "{atom}"),
        }
    }
}

/// Minimal counterexample for a failed entailment: the unmatched consequent
/// atom and the antecedent heap shape at the point of failure.
#[derive(Debug, Clone, PartialEq)]
pub struct EntailFailure {
    pub unmatched: UnmatchedGoal,
    pub antecedent: SymbolicHeap,
}

impl fmt::Display for EntailFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot derive `{}` from `{}`",
            self.unmatched, self.antecedent
        )
    }
}

/// Outcome of an entailment query.
#[derive(Debug, Clone, PartialEq)]
pub enum Entailment {
    /// The entailment holds; the frame is the unconsumed antecedent.
    Holds(Frame),
    /// The entailment does not go through; carries the counterexample.
    Fails(EntailFailure),
    /// Undecided: oracle unknown, deadline, or a procedure incompleteness.
    Unknown(UnknownReason),
}

/// Three-valued answer for a provable-equality query.
enum Proof {
    Proven,
    NotProven,
    Unknown,
}

/// Entailment engine over one predicate library and oracle.
pub struct Entailer<'a> {
    lib: &'a PredicateLibrary,
    oracle: &'a dyn PureOracle,
    max_depth: u32,
    deadline: Option<Instant>,
}

impl<'a> Entailer<'a> {
    pub fn new(lib: &'a PredicateLibrary, oracle: &'a dyn PureOracle) -> Self {
        Self {
            lib,
            oracle,
            max_depth: DEFAULT_UNFOLD_DEPTH,
            deadline: None,
        }
    }

    /// Override the unfolding-depth ceiling.
    pub fn with_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Give the proof search a wall-clock deadline.
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Decide `antecedent |- consequent * Frame`.
    ///
    /// The antecedent is a state's heap and pure set (existential-free; the
    /// engine skolemizes on instantiation). The consequent's existentials
    /// become unification variables solved during matching.
    pub fn entails(
        &self,
        ante_heap: &SymbolicHeap,
        ante_pure: &PureSet,
        cons: &HeapFormula,
        fresh: &mut FreshGen,
    ) -> Result<Entailment, EngineError> {
        // An unsatisfiable antecedent entails anything.
        let sat = ante_pure.conjoin(&ante_heap.separation_closure());
        if let SatVerdict::Unsat = self.oracle.check(&sat)? {
            tracing::debug!("entailment holds vacuously: antecedent unsatisfiable");
            return Ok(Entailment::Holds(Frame {
                heap: ante_heap.clone(),
                pure: ante_pure.clone(),
            }));
        }

        // Open the consequent: existentials become unification variables.
        let mut evars = BTreeSet::new();
        let mut map = BTreeMap::new();
        for bound in &cons.exists {
            let ev = fresh.fresh(bound.as_str());
            map.insert(bound.clone(), SymExpr::Var(ev.clone()));
            evars.insert(ev);
        }
        let goal: Vec<SpatialAtom> = cons.heap.atoms().iter().map(|a| a.subst(&map)).collect();
        let goal_pure: Vec<PureAtom> = cons.pure.atoms().iter().map(|a| a.subst(&map)).collect();

        self.prove(
            ante_heap.atoms().to_vec(),
            ante_pure.clone(),
            goal,
            goal_pure,
            evars,
            self.max_depth,
            fresh,
        )
    }

    /// Check a residual frame for leaked heap at a specification boundary.
    ///
    /// Returns the first atom that denotes actually-owned cells: any
    /// points-to, or a predicate application that cannot be discharged as
    /// empty (no existential-free base case whose pure part is implied).
    pub fn find_leaked_atom(
        &self,
        frame: &Frame,
        fresh: &mut FreshGen,
    ) -> Result<Option<SpatialAtom>, EngineError> {
        let sat = saturated(frame.heap.atoms(), &frame.pure);
        for atom in frame.heap.atoms() {
            match atom {
                SpatialAtom::PointsTo { .. } => return Ok(Some(atom.clone())),
                SpatialAtom::Pred { name, args } => {
                    let def =
                        self.lib
                            .get(name)
                            .ok_or_else(|| EngineError::MalformedPredicate {
                                name: name.clone(),
                                reason: "application of an unregistered predicate".to_string(),
                            })?;
                    let mut discharged = false;
                    for (rule_idx, rule) in def.rules.iter().enumerate() {
                        if !rule.heap.is_empty() || !rule.exists.is_empty() {
                            continue;
                        }
                        let (_, rule_pure) = self.lib.unfold(name, args, rule_idx, fresh)?;
                        if self.all_implied(&sat, rule_pure.atoms())? {
                            discharged = true;
                            break;
                        }
                    }
                    if !discharged {
                        return Ok(Some(atom.clone()));
                    }
                }
            }
        }
        Ok(None)
    }

    fn out_of_time(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// One step of the subtraction search.
    #[allow(clippy::too_many_arguments)]
    fn prove(
        &self,
        ante: Vec<SpatialAtom>,
        ante_pure: PureSet,
        goal: Vec<SpatialAtom>,
        goal_pure: Vec<PureAtom>,
        evars: BTreeSet<SymVar>,
        depth: u32,
        fresh: &mut FreshGen,
    ) -> Result<Entailment, EngineError> {
        if self.out_of_time() {
            return Ok(Entailment::Unknown(UnknownReason::Timeout));
        }
        if goal.is_empty() {
            return self.finish(ante, ante_pure, goal_pure, evars);
        }

        // Prefer a goal atom whose root is free of unification variables.
        let idx = goal
            .iter()
            .position(|a| {
                a.root()
                    .map(|r| !r.mentions_any(&evars))
                    .unwrap_or(false)
            })
            .unwrap_or(0);

        match goal[idx].clone() {
            SpatialAtom::PointsTo { addr, fields } => self.prove_points_to(
                ante, ante_pure, idx, addr, fields, goal, goal_pure, evars, depth, fresh,
            ),
            SpatialAtom::Pred { name, args } => self.prove_pred(
                ante, ante_pure, idx, name, args, goal, goal_pure, evars, depth, fresh,
            ),
        }
    }

    /// Prove a points-to goal: direct cell match, else antecedent unfold.
    #[allow(clippy::too_many_arguments)]
    fn prove_points_to(
        &self,
        ante: Vec<SpatialAtom>,
        ante_pure: PureSet,
        idx: usize,
        addr: SymExpr,
        fields: BTreeMap<String, SymExpr>,
        goal: Vec<SpatialAtom>,
        goal_pure: Vec<PureAtom>,
        evars: BTreeSet<SymVar>,
        depth: u32,
        fresh: &mut FreshGen,
    ) -> Result<Entailment, EngineError> {
        let sat = saturated(&ante, &ante_pure);
        let mut saw_unknown = false;

        // An unbound existential address unifies with a candidate's address
        // instead of requiring provable equality.
        let addr_evar = match &addr {
            SymExpr::Var(v) if evars.contains(v) => Some(v.clone()),
            _ => None,
        };

        // Direct candidates: an antecedent cell at a provably equal (or
        // unifiable) address.
        for (i, atom) in ante.iter().enumerate() {
            let SpatialAtom::PointsTo {
                addr: ante_addr,
                fields: ante_fields,
            } = atom
            else {
                continue;
            };
            let mut bindings: BTreeMap<SymVar, SymExpr> = BTreeMap::new();
            match &addr_evar {
                Some(ev) => {
                    bindings.insert(ev.clone(), ante_addr.clone());
                }
                None => match self.prove_eq(&sat, ante_addr, &addr)? {
                    Proof::Proven => {}
                    Proof::NotProven => continue,
                    Proof::Unknown => {
                        saw_unknown = true;
                        continue;
                    }
                },
            }

            // Field-by-field: prove equal, or bind a consequent existential.
            let mut fields_ok = true;
            for (fname, cons_value) in &fields {
                let Some(ante_value) = ante_fields.get(fname) else {
                    fields_ok = false;
                    break;
                };
                let cons_value = cons_value.subst(&bindings);
                if let SymExpr::Var(v) = &cons_value {
                    if evars.contains(v) && !bindings.contains_key(v) {
                        bindings.insert(v.clone(), ante_value.clone());
                        continue;
                    }
                }
                match self.prove_eq(&sat, ante_value, &cons_value)? {
                    Proof::Proven => {}
                    Proof::NotProven => {
                        fields_ok = false;
                        break;
                    }
                    Proof::Unknown => {
                        saw_unknown = true;
                        fields_ok = false;
                        break;
                    }
                }
            }
            if !fields_ok {
                continue;
            }

            // Commit to this candidate; backtrack on a failed subproof.
            let mut next_ante = ante.clone();
            next_ante.remove(i);
            let mut next_goal = goal.clone();
            next_goal.remove(idx);
            let mut next_goal_pure = goal_pure.clone();
            let mut next_evars = evars.clone();
            apply_bindings(
                &mut next_goal,
                &mut next_goal_pure,
                &mut next_evars,
                &bindings,
            );
            match self.prove(
                next_ante,
                ante_pure.clone(),
                next_goal,
                next_goal_pure,
                next_evars,
                depth,
                fresh,
            )? {
                Entailment::Holds(frame) => return Ok(Entailment::Holds(frame)),
                Entailment::Fails(_) => {}
                Entailment::Unknown(_) => saw_unknown = true,
            }
        }

        // No direct cell: unfold an antecedent predicate covering the
        // address. Meaningless for a still-unbound existential address.
        if addr_evar.is_some() {
            if saw_unknown {
                return Ok(Entailment::Unknown(UnknownReason::OracleUnknown(
                    "address equality undecided during matching".to_string(),
                )));
            }
            return Ok(Entailment::Fails(EntailFailure {
                unmatched: UnmatchedGoal::Spatial(SpatialAtom::PointsTo { addr, fields }),
                antecedent: SymbolicHeap::from_atoms_unchecked(ante),
            }));
        }
        for (i, atom) in ante.iter().enumerate() {
            let SpatialAtom::Pred { name, args } = atom else {
                continue;
            };
            let Some(head) = args.first() else {
                continue;
            };
            match self.prove_eq(&sat, head, &addr)? {
                Proof::Proven => {}
                Proof::NotProven => continue,
                Proof::Unknown => {
                    saw_unknown = true;
                    continue;
                }
            }
            let target = SpatialAtom::PointsTo {
                addr: addr.clone(),
                fields: fields.clone(),
            };
            return self.unfold_antecedent(
                &ante,
                &ante_pure,
                i,
                &name.clone(),
                &args.clone(),
                &goal,
                &goal_pure,
                &evars,
                depth,
                fresh,
                &target,
            );
        }

        if saw_unknown {
            return Ok(Entailment::Unknown(UnknownReason::OracleUnknown(
                "address equality undecided during matching".to_string(),
            )));
        }
        Ok(Entailment::Fails(EntailFailure {
            unmatched: UnmatchedGoal::Spatial(SpatialAtom::PointsTo { addr, fields }),
            antecedent: SymbolicHeap::from_atoms_unchecked(ante),
        }))
    }

    /// Prove a predicate goal: direct application match, else unfold the
    /// consequent predicate (angelic rule choice).
    #[allow(clippy::too_many_arguments)]
    fn prove_pred(
        &self,
        ante: Vec<SpatialAtom>,
        ante_pure: PureSet,
        idx: usize,
        name: String,
        args: Vec<SymExpr>,
        goal: Vec<SpatialAtom>,
        goal_pure: Vec<PureAtom>,
        evars: BTreeSet<SymVar>,
        depth: u32,
        fresh: &mut FreshGen,
    ) -> Result<Entailment, EngineError> {
        let sat = saturated(&ante, &ante_pure);
        let mut saw_unknown = false;

        // Direct candidates: same predicate, pairwise provably equal args.
        for (i, atom) in ante.iter().enumerate() {
            let SpatialAtom::Pred {
                name: ante_name,
                args: ante_args,
            } = atom
            else {
                continue;
            };
            if ante_name != &name || ante_args.len() != args.len() {
                continue;
            }
            let mut bindings: BTreeMap<SymVar, SymExpr> = BTreeMap::new();
            let mut args_ok = true;
            for (ante_arg, cons_arg) in ante_args.iter().zip(args.iter()) {
                let cons_arg = cons_arg.subst(&bindings);
                if let SymExpr::Var(v) = &cons_arg {
                    if evars.contains(v) && !bindings.contains_key(v) {
                        bindings.insert(v.clone(), ante_arg.clone());
                        continue;
                    }
                }
                match self.prove_eq(&sat, ante_arg, &cons_arg)? {
                    Proof::Proven => {}
                    Proof::NotProven => {
                        args_ok = false;
                        break;
                    }
                    Proof::Unknown => {
                        saw_unknown = true;
                        args_ok = false;
                        break;
                    }
                }
            }
            if !args_ok {
                continue;
            }

            let mut next_ante = ante.clone();
            next_ante.remove(i);
            let mut next_goal = goal.clone();
            next_goal.remove(idx);
            let mut next_goal_pure = goal_pure.clone();
            let mut next_evars = evars.clone();
            apply_bindings(
                &mut next_goal,
                &mut next_goal_pure,
                &mut next_evars,
                &bindings,
            );
            match self.prove(
                next_ante,
                ante_pure.clone(),
                next_goal,
                next_goal_pure,
                next_evars,
                depth,
                fresh,
            )? {
                Entailment::Holds(frame) => return Ok(Entailment::Holds(frame)),
                Entailment::Fails(_) => {}
                Entailment::Unknown(_) => saw_unknown = true,
            }
        }

        // Fold by proof search: unfold the consequent predicate and try each
        // rule in order until one goes through.
        if depth == 0 {
            return Ok(Entailment::Fails(EntailFailure {
                unmatched: UnmatchedGoal::Spatial(SpatialAtom::Pred { name, args }),
                antecedent: SymbolicHeap::from_atoms_unchecked(ante),
            }));
        }
        let rule_count = self
            .lib
            .get(&name)
            .ok_or_else(|| EngineError::MalformedPredicate {
                name: name.clone(),
                reason: "application of an unregistered predicate".to_string(),
            })?
            .rules
            .len();

        let mut arg_vars = BTreeSet::new();
        for arg in &args {
            arg.vars_into(&mut arg_vars);
        }

        for rule_idx in 0..rule_count {
            let (rule_atoms, rule_pure) = self.lib.unfold(&name, &args, rule_idx, fresh)?;

            // The rule's freshly minted existentials become unification
            // variables of the subgoal.
            let mut introduced = BTreeSet::new();
            for atom in &rule_atoms {
                atom.vars_into(&mut introduced);
            }
            rule_pure.vars_into(&mut introduced);
            let mut next_evars = evars.clone();
            for v in introduced.difference(&arg_vars) {
                next_evars.insert(v.clone());
            }

            let mut next_goal = rule_atoms;
            let mut rest_goal = goal.clone();
            rest_goal.remove(idx);
            next_goal.extend(rest_goal);

            let mut next_goal_pure = rule_pure.atoms().to_vec();
            next_goal_pure.extend(goal_pure.iter().cloned());

            match self.prove(
                ante.clone(),
                ante_pure.clone(),
                next_goal,
                next_goal_pure,
                next_evars,
                depth - 1,
                fresh,
            )? {
                Entailment::Holds(frame) => return Ok(Entailment::Holds(frame)),
                Entailment::Fails(_) => {}
                Entailment::Unknown(_) => saw_unknown = true,
            }
        }

        if saw_unknown {
            return Ok(Entailment::Unknown(UnknownReason::OracleUnknown(
                "predicate matching undecided".to_string(),
            )));
        }
        Ok(Entailment::Fails(EntailFailure {
            unmatched: UnmatchedGoal::Spatial(SpatialAtom::Pred { name, args }),
            antecedent: SymbolicHeap::from_atoms_unchecked(ante),
        }))
    }

    /// Demonic case split: unfold the antecedent predicate at `i` and
    /// require every feasible case to entail the whole goal.
    #[allow(clippy::too_many_arguments)]
    fn unfold_antecedent(
        &self,
        ante: &[SpatialAtom],
        ante_pure: &PureSet,
        i: usize,
        name: &str,
        args: &[SymExpr],
        goal: &[SpatialAtom],
        goal_pure: &[PureAtom],
        evars: &BTreeSet<SymVar>,
        depth: u32,
        fresh: &mut FreshGen,
        target: &SpatialAtom,
    ) -> Result<Entailment, EngineError> {
        if depth == 0 {
            tracing::debug!(predicate = name, "unfold depth ceiling reached");
            return Ok(Entailment::Fails(EntailFailure {
                unmatched: UnmatchedGoal::Spatial(target.clone()),
                antecedent: SymbolicHeap::from_atoms_unchecked(ante.to_vec()),
            }));
        }
        let rule_count = self
            .lib
            .get(name)
            .ok_or_else(|| EngineError::MalformedPredicate {
                name: name.to_string(),
                reason: "application of an unregistered predicate".to_string(),
            })?
            .rules
            .len();

        let mut frames: Vec<Frame> = Vec::new();
        for rule_idx in 0..rule_count {
            let (rule_atoms, rule_pure) = self.lib.unfold(name, args, rule_idx, fresh)?;
            let mut case_ante = ante.to_vec();
            case_ante.remove(i);
            case_ante.extend(rule_atoms);
            let case_pure = ante_pure.conjoin(&rule_pure);

            // Infeasible cases prune silently.
            if let SatVerdict::Unsat = self.oracle.check(&saturated(&case_ante, &case_pure))? {
                continue;
            }

            match self.prove(
                case_ante,
                case_pure,
                goal.to_vec(),
                goal_pure.to_vec(),
                evars.clone(),
                depth - 1,
                fresh,
            )? {
                Entailment::Holds(frame) => frames.push(frame),
                other => return Ok(other),
            }
        }

        match frames.len() {
            // Every case infeasible: the antecedent itself is unsatisfiable.
            0 => {
                let mut rest = ante.to_vec();
                rest.remove(i);
                Ok(Entailment::Holds(Frame {
                    heap: SymbolicHeap::from_atoms_unchecked(rest),
                    pure: ante_pure.clone(),
                }))
            }
            1 => Ok(Entailment::Holds(frames.swap_remove(0))),
            _ => {
                if frames.iter().all(|f| f == &frames[0]) {
                    Ok(Entailment::Holds(frames.swap_remove(0)))
                } else {
                    Ok(Entailment::Unknown(UnknownReason::Incomplete(
                        "case analysis produced diverging frames".to_string(),
                    )))
                }
            }
        }
    }

    /// Spatial goal exhausted: solve leftover unification variables from
    /// equalities, then discharge each pure goal atom through the oracle.
    fn finish(
        &self,
        ante: Vec<SpatialAtom>,
        ante_pure: PureSet,
        mut goal_pure: Vec<PureAtom>,
        mut evars: BTreeSet<SymVar>,
    ) -> Result<Entailment, EngineError> {
        let sat = saturated(&ante, &ante_pure);

        // Bind unification variables appearing alone on one side of an
        // equality, to fixpoint.
        loop {
            let mut binding: Option<(SymVar, SymExpr)> = None;
            for atom in &goal_pure {
                if let PureAtom::Eq(l, r) = atom {
                    if let SymExpr::Var(v) = l {
                        if evars.contains(v) && !r.mentions_any(&evars) {
                            binding = Some((v.clone(), r.clone()));
                            break;
                        }
                    }
                    if let SymExpr::Var(v) = r {
                        if evars.contains(v) && !l.mentions_any(&evars) {
                            binding = Some((v.clone(), l.clone()));
                            break;
                        }
                    }
                }
            }
            let Some((v, expr)) = binding else { break };
            let mut map = BTreeMap::new();
            map.insert(v.clone(), expr);
            for atom in goal_pure.iter_mut() {
                *atom = atom.subst(&map);
            }
            evars.remove(&v);
        }

        for atom in &goal_pure {
            if atom.mentions_any(&evars) {
                // An existential we could not solve for.
                return Ok(Entailment::Fails(EntailFailure {
                    unmatched: UnmatchedGoal::Pure(atom.clone()),
                    antecedent: SymbolicHeap::from_atoms_unchecked(ante),
                }));
            }
            let mut query = sat.clone();
            query.push(atom.negated());
            match self.oracle.check(&query)? {
                SatVerdict::Unsat => {}
                SatVerdict::Sat => {
                    return Ok(Entailment::Fails(EntailFailure {
                        unmatched: UnmatchedGoal::Pure(atom.clone()),
                        antecedent: SymbolicHeap::from_atoms_unchecked(ante),
                    }));
                }
                SatVerdict::Unknown(reason) => {
                    return Ok(Entailment::Unknown(UnknownReason::OracleUnknown(reason)));
                }
            }
        }

        Ok(Entailment::Holds(Frame {
            heap: SymbolicHeap::from_atoms_unchecked(ante),
            pure: ante_pure,
        }))
    }

    /// Is `a == b` implied by the saturated antecedent pure set?
    fn prove_eq(
        &self,
        sat_pure: &PureSet,
        a: &SymExpr,
        b: &SymExpr,
    ) -> Result<Proof, EngineError> {
        if a == b {
            return Ok(Proof::Proven);
        }
        let mut query = sat_pure.clone();
        query.push(PureAtom::Ne(a.clone(), b.clone()));
        match self.oracle.check(&query)? {
            SatVerdict::Unsat => Ok(Proof::Proven),
            SatVerdict::Sat => Ok(Proof::NotProven),
            SatVerdict::Unknown(_) => Ok(Proof::Unknown),
        }
    }

    /// Are all `atoms` implied by `sat_pure`?
    fn all_implied(&self, sat_pure: &PureSet, atoms: &[PureAtom]) -> Result<bool, EngineError> {
        for atom in atoms {
            let mut query = sat_pure.clone();
            query.push(atom.negated());
            match self.oracle.check(&query)? {
                SatVerdict::Unsat => {}
                _ => return Ok(false),
            }
        }
        Ok(true)
    }
}

/// A pure set saturated with the separation closure of the heap atoms.
fn saturated(atoms: &[SpatialAtom], pure: &PureSet) -> PureSet {
    pure.conjoin(&separation_closure_of(atoms))
}

/// Apply unification bindings across the remaining goal.
fn apply_bindings(
    goal: &mut [SpatialAtom],
    goal_pure: &mut [PureAtom],
    evars: &mut BTreeSet<SymVar>,
    bindings: &BTreeMap<SymVar, SymExpr>,
) {
    if bindings.is_empty() {
        return;
    }
    for atom in goal.iter_mut() {
        *atom = atom.subst(bindings);
    }
    for atom in goal_pure.iter_mut() {
        *atom = atom.subst(bindings);
    }
    for bound in bindings.keys() {
        evars.remove(bound);
    }
}
