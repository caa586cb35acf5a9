//! Symbolic execution over symbolic heaps.
//!
//! One statement times one state yields a finite set of successor states or
//! a terminal violation. Heap accesses are proof obligations: the target
//! cell must be *rearranged* into a materialized points-to — directly when
//! an antecedent cell's address is provably equal, otherwise by bounded
//! unfolding of a covering predicate (which case-splits the state). A state
//! that cannot justify an access is a violation with the witness path
//! ending at the access; a state whose pure set goes unsatisfiable is
//! infeasible and pruned silently, never reported.
//!
//! Loops and calls are not unrolled: both delegate to specification
//! matching (invariant entailment and the frame rule over callee
//! contracts), so the only fixpoints are the ones the annotations denote.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;

use crate::contract_db::ContractDatabase;
use crate::entail::{Entailer, Entailment};
use crate::error::EngineError;
use crate::formula::{HeapFormula, PureAtom, PureSet, SpatialAtom, SymExpr, SymVar};
use crate::ir::{Expr, Statement};
use crate::oracle::{PureOracle, SatVerdict};
use crate::pred::PredicateLibrary;
use crate::state::SymbolicState;
use crate::verdict::{UnknownReason, Violation, ViolationKind};
use crate::verify::Limits;

/// Result of executing a statement (or block) along one path.
#[derive(Debug)]
pub(crate) enum Outcome {
    /// Fell through; execution continues with this state.
    Done(SymbolicState),
    /// Explicit `return`, with the returned value if any.
    Returned(SymbolicState, Option<SymExpr>),
    /// A proven-reachable unsafe behavior on this path.
    Violated(Violation),
    /// This path could not be decided.
    Unknown(UnknownReason),
}

/// One rearrangement branch: the access target either materialized as the
/// points-to atom at the given index, or could not be justified.
enum Rearranged {
    Found(SymbolicState, usize),
    Missing(SymbolicState),
}

/// Symbolic execution engine for one function body.
pub(crate) struct Executor<'a> {
    lib: &'a PredicateLibrary,
    oracle: &'a dyn PureOracle,
    contracts: &'a ContractDatabase,
    limits: &'a Limits,
    deadline: Option<Instant>,
    states_used: usize,
}

impl<'a> Executor<'a> {
    pub(crate) fn new(
        lib: &'a PredicateLibrary,
        oracle: &'a dyn PureOracle,
        contracts: &'a ContractDatabase,
        limits: &'a Limits,
        deadline: Option<Instant>,
    ) -> Self {
        Self {
            lib,
            oracle,
            contracts,
            limits,
            deadline,
            states_used: 0,
        }
    }

    fn entailer(&self) -> Entailer<'a> {
        Entailer::new(self.lib, self.oracle)
            .with_depth(self.limits.max_unfold_depth)
            .with_deadline(crate::verify::obligation_deadline(
                self.limits,
                self.deadline,
            ))
    }

    fn out_of_time(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Execute a statement block from one state, collecting every path's
    /// terminal outcome. `Done` means the block fell through.
    pub(crate) fn run_block(
        &mut self,
        state: SymbolicState,
        stmts: &[Statement],
    ) -> Result<Vec<Outcome>, EngineError> {
        let mut live = vec![state];
        let mut finished = Vec::new();
        for stmt in stmts {
            let mut next = Vec::new();
            for state in live {
                if self.out_of_time() {
                    finished.push(Outcome::Unknown(UnknownReason::Timeout));
                    continue;
                }
                self.states_used += 1;
                if self.states_used > self.limits.max_states {
                    finished.push(Outcome::Unknown(UnknownReason::SearchBudgetExhausted));
                    continue;
                }
                for out in self.step(state, stmt)? {
                    match out {
                        Outcome::Done(s) => next.push(s),
                        other => finished.push(other),
                    }
                }
            }
            live = next;
            if live.is_empty() {
                break;
            }
        }
        finished.extend(live.into_iter().map(Outcome::Done));
        Ok(finished)
    }

    /// Execute one statement from one state.
    fn step(
        &mut self,
        mut state: SymbolicState,
        stmt: &Statement,
    ) -> Result<Vec<Outcome>, EngineError> {
        match stmt {
            Statement::Skip => {
                state.record(stmt.to_string());
                Ok(vec![Outcome::Done(state)])
            }

            Statement::Assign { dest, value } => {
                state.record(stmt.to_string());
                let value = self.eval(&state, value)?;
                let fresh = state.fresh_var(dest);
                state.assume_atom(PureAtom::Eq(SymExpr::Var(fresh.clone()), value));
                state.bind(dest.clone(), fresh);
                Ok(vec![Outcome::Done(state)])
            }

            Statement::Load { dest, src, field } => {
                state.record(stmt.to_string());
                let addr = self.lookup_var(&state, src)?;
                let mut outcomes = Vec::new();
                for branch in self.rearrange(state, &addr, self.limits.max_unfold_depth)? {
                    match branch {
                        Rearranged::Found(mut s, idx) => {
                            let value = match s.heap.get(idx) {
                                Some(SpatialAtom::PointsTo { fields, .. }) => {
                                    fields.get(field).cloned()
                                }
                                _ => None,
                            };
                            match value {
                                Some(value) => {
                                    let fresh = s.fresh_var(dest);
                                    s.assume_atom(PureAtom::Eq(
                                        SymExpr::Var(fresh.clone()),
                                        value,
                                    ));
                                    s.bind(dest.clone(), fresh);
                                    outcomes.push(Outcome::Done(s));
                                }
                                None => outcomes.push(Outcome::Violated(Violation {
                                    kind: ViolationKind::MissingField(field.clone()),
                                    obligation: None,
                                    path: s.path,
                                })),
                            }
                        }
                        Rearranged::Missing(s) => {
                            outcomes.push(Outcome::Violated(Violation {
                                kind: ViolationKind::NullOrDanglingDereference,
                                obligation: None,
                                path: s.path,
                            }));
                        }
                    }
                }
                Ok(outcomes)
            }

            Statement::Store { dest, field, value } => {
                state.record(stmt.to_string());
                let value = self.eval(&state, value)?;
                let addr = self.lookup_var(&state, dest)?;
                let mut outcomes = Vec::new();
                for branch in self.rearrange(state, &addr, self.limits.max_unfold_depth)? {
                    match branch {
                        Rearranged::Found(mut s, idx) => {
                            if s.heap.set_field(idx, field, value.clone()) {
                                outcomes.push(Outcome::Done(s));
                            } else {
                                outcomes.push(Outcome::Violated(Violation {
                                    kind: ViolationKind::MissingField(field.clone()),
                                    obligation: None,
                                    path: s.path,
                                }));
                            }
                        }
                        Rearranged::Missing(s) => {
                            outcomes.push(Outcome::Violated(Violation {
                                kind: ViolationKind::NullOrDanglingDereference,
                                obligation: None,
                                path: s.path,
                            }));
                        }
                    }
                }
                Ok(outcomes)
            }

            Statement::Alloc { dest, fields } => {
                state.record(stmt.to_string());
                let addr = state.fresh_var(dest);
                let mut cell_fields = BTreeMap::new();
                for field in fields {
                    let value = state.fresh_var(field);
                    cell_fields.insert(field.clone(), SymExpr::Var(value));
                }
                // The fresh address is non-nil and distinct from every
                // already-materialized cell.
                state.assume_atom(PureAtom::Ne(SymExpr::Var(addr.clone()), SymExpr::Nil));
                let existing: Vec<SymExpr> = state
                    .heap
                    .atoms()
                    .iter()
                    .filter_map(|atom| match atom {
                        SpatialAtom::PointsTo { addr, .. } => Some(addr.clone()),
                        SpatialAtom::Pred { .. } => None,
                    })
                    .collect();
                for other in existing {
                    state.assume_atom(PureAtom::Ne(SymExpr::Var(addr.clone()), other));
                }
                state.heap.push(SpatialAtom::PointsTo {
                    addr: SymExpr::Var(addr.clone()),
                    fields: cell_fields,
                })?;
                state.bind(dest.clone(), addr);
                Ok(vec![Outcome::Done(state)])
            }

            Statement::Free { target } => {
                state.record(stmt.to_string());
                let addr = self.lookup_var(&state, target)?;
                let mut outcomes = Vec::new();
                for branch in self.rearrange(state, &addr, self.limits.max_unfold_depth)? {
                    match branch {
                        Rearranged::Found(mut s, idx) => {
                            s.heap.remove(idx);
                            outcomes.push(Outcome::Done(s));
                        }
                        Rearranged::Missing(s) => {
                            outcomes.push(Outcome::Violated(Violation {
                                kind: ViolationKind::NullOrDanglingDereference,
                                obligation: None,
                                path: s.path,
                            }));
                        }
                    }
                }
                Ok(outcomes)
            }

            Statement::If {
                cond,
                then_body,
                else_body,
            } => {
                let mut outcomes = Vec::new();
                for s in self.assume(state.clone(), cond, true)? {
                    outcomes.extend(self.run_block(s, then_body)?);
                }
                for s in self.assume(state, cond, false)? {
                    outcomes.extend(self.run_block(s, else_body)?);
                }
                Ok(outcomes)
            }

            Statement::While {
                cond,
                invariant,
                body,
            } => self.while_loop(state, cond, invariant.as_ref(), body),

            Statement::Call { dest, callee, args } => {
                self.call(state, dest.as_deref(), callee, args)
            }

            Statement::Return { value } => {
                state.record(stmt.to_string());
                let value = match value {
                    Some(expr) => Some(self.eval(&state, expr)?),
                    None => None,
                };
                Ok(vec![Outcome::Returned(state, value)])
            }
        }
    }

    /// Call-site protocol (frame rule): prove the callee precondition,
    /// carry the inferred frame, continue from the postcondition with
    /// `result` bound to a fresh variable.
    fn call(
        &mut self,
        mut state: SymbolicState,
        dest: Option<&str>,
        callee: &str,
        args: &[Expr],
    ) -> Result<Vec<Outcome>, EngineError> {
        state.record(
            Statement::Call {
                dest: dest.map(str::to_string),
                callee: callee.to_string(),
                args: args.to_vec(),
            }
            .to_string(),
        );
        let Some(summary) = self.contracts.get(callee) else {
            return Ok(vec![Outcome::Unknown(UnknownReason::MissingContract(
                callee.to_string(),
            ))]);
        };
        if summary.params.len() != args.len() {
            return Err(EngineError::InvalidProgram(format!(
                "call to `{callee}` with {} argument(s), expected {}",
                args.len(),
                summary.params.len()
            )));
        }

        let mut map = BTreeMap::new();
        for (param, arg) in summary.params.iter().zip(args.iter()) {
            map.insert(SymVar::new(param.clone()), self.eval(&state, arg)?);
        }
        let pre = summary.requires.subst_free(&map)?;
        tracing::debug!(callee, "call site: proving precondition");
        match self
            .entailer()
            .entails(&state.heap, &state.pure, &pre, &mut state.fresh)?
        {
            Entailment::Fails(failure) => Ok(vec![Outcome::Violated(Violation {
                kind: ViolationKind::PreconditionFailed(callee.to_string()),
                obligation: Some(failure.to_string()),
                path: state.path,
            })]),
            Entailment::Unknown(reason) => Ok(vec![Outcome::Unknown(reason)]),
            Entailment::Holds(frame) => {
                state.heap = frame.heap;
                let ret_var = state.fresh_var(&format!("{callee}_ret"));
                let mut post_map = map;
                if summary.returns_value {
                    post_map.insert(SymVar::new("result"), SymExpr::Var(ret_var.clone()));
                }
                let (post_heap, post_pure) =
                    summary.ensures.instantiate(&post_map, &mut state.fresh)?;
                state.heap = state.heap.star(&post_heap)?;
                state.pure.extend(post_pure.atoms().iter().cloned());
                if let Some(dest) = dest {
                    state.bind(dest.to_string(), ret_var);
                }
                Ok(vec![Outcome::Done(state)])
            }
        }
    }

    /// Loop protocol: invariant entailment on entry (base case), one
    /// iteration from a fresh invariant instance (inductive step), then
    /// continue from invariant-and-negated-condition composed with the
    /// entry frame. No unbounded unrolling.
    fn while_loop(
        &mut self,
        mut state: SymbolicState,
        cond: &Expr,
        invariant: Option<&HeapFormula>,
        body: &[Statement],
    ) -> Result<Vec<Outcome>, EngineError> {
        state.record(format!("while ({cond})"));
        let Some(inv) = invariant else {
            return Ok(vec![Outcome::Unknown(UnknownReason::MissingLoopInvariant)]);
        };

        // Base case: the incoming state establishes the invariant.
        let entry_map = stack_map(&state);
        let inv_entry = inv.subst_free(&entry_map)?;
        let frame = match self
            .entailer()
            .entails(&state.heap, &state.pure, &inv_entry, &mut state.fresh)?
        {
            Entailment::Fails(failure) => {
                return Ok(vec![Outcome::Violated(Violation {
                    kind: ViolationKind::LoopInvariantEntry,
                    obligation: Some(failure.to_string()),
                    path: state.path,
                })]);
            }
            Entailment::Unknown(reason) => return Ok(vec![Outcome::Unknown(reason)]),
            Entailment::Holds(frame) => frame,
        };

        let mods = modified_vars(body);
        let mut outcomes = Vec::new();

        // Inductive step: execute one iteration from a fresh instance of
        // the invariant with the loop-modified variables havocked.
        {
            let mut iter_state = state.clone();
            for name in &mods {
                if iter_state.stack.contains_key(name) {
                    let fresh = iter_state.fresh_var(name);
                    iter_state.bind(name.clone(), fresh);
                }
            }
            let iter_map = stack_map(&iter_state);
            let inv_iter = inv.subst_free(&iter_map)?;
            let (inv_heap, inv_pure) =
                inv_iter.instantiate(&BTreeMap::new(), &mut iter_state.fresh)?;
            iter_state.heap = inv_heap;
            iter_state.pure.extend(inv_pure.atoms().iter().cloned());
            iter_state.record("loop: arbitrary iteration");

            for s in self.assume(iter_state, cond, true)? {
                for out in self.run_block(s, body)? {
                    match out {
                        Outcome::Done(mut end) => {
                            // Back edge: the iteration re-establishes the
                            // invariant, consuming the whole loop footprint.
                            let back_map = stack_map(&end);
                            let inv_back = inv.subst_free(&back_map)?;
                            match self.entailer().entails(
                                &end.heap,
                                &end.pure,
                                &inv_back,
                                &mut end.fresh,
                            )? {
                                Entailment::Fails(failure) => {
                                    outcomes.push(Outcome::Violated(Violation {
                                        kind: ViolationKind::LoopInvariantPreservation,
                                        obligation: Some(failure.to_string()),
                                        path: end.path,
                                    }));
                                }
                                Entailment::Unknown(reason) => {
                                    outcomes.push(Outcome::Unknown(reason));
                                }
                                Entailment::Holds(residue) => {
                                    if let Some(atom) = self
                                        .entailer()
                                        .find_leaked_atom(&residue, &mut end.fresh)?
                                    {
                                        outcomes.push(Outcome::Violated(Violation {
                                            kind: ViolationKind::LeakedCells(atom.to_string()),
                                            obligation: None,
                                            path: end.path,
                                        }));
                                    }
                                    // Invariant preserved: this branch closes.
                                }
                            }
                        }
                        other => outcomes.push(other),
                    }
                }
            }
        }

        // Exit: a fresh invariant instance composed with the entry frame,
        // under the negated condition.
        {
            let mut exit_state = state;
            for name in &mods {
                if exit_state.stack.contains_key(name) {
                    let fresh = exit_state.fresh_var(name);
                    exit_state.bind(name.clone(), fresh);
                }
            }
            let exit_map = stack_map(&exit_state);
            let inv_exit = inv.subst_free(&exit_map)?;
            let (inv_heap, inv_pure) =
                inv_exit.instantiate(&BTreeMap::new(), &mut exit_state.fresh)?;
            exit_state.heap = inv_heap.star(&frame.heap)?;
            exit_state.pure.extend(inv_pure.atoms().iter().cloned());
            exit_state.record("loop: exit");
            for s in self.assume(exit_state, cond, false)? {
                outcomes.push(Outcome::Done(s));
            }
        }

        Ok(outcomes)
    }

    /// Materialize the cell at `addr`: direct hit on a provably equal
    /// points-to, else bounded unfolding of a covering predicate (each
    /// unfold case-splits the state; infeasible cases prune silently).
    fn rearrange(
        &self,
        state: SymbolicState,
        addr: &SymExpr,
        depth: u32,
    ) -> Result<Vec<Rearranged>, EngineError> {
        let sat = state.saturated_pure();

        let mut hit = None;
        for (i, atom) in state.heap.atoms().iter().enumerate() {
            if let SpatialAtom::PointsTo { addr: cell_addr, .. } = atom {
                if self.prove_eq(&sat, cell_addr, addr)? {
                    hit = Some(i);
                    break;
                }
            }
        }
        if let Some(i) = hit {
            return Ok(vec![Rearranged::Found(state, i)]);
        }

        let mut covering = None;
        for (i, atom) in state.heap.atoms().iter().enumerate() {
            if let SpatialAtom::Pred { name, args } = atom {
                if let Some(head) = args.first() {
                    if self.prove_eq(&sat, head, addr)? {
                        covering = Some((i, name.clone(), args.clone()));
                        break;
                    }
                }
            }
        }
        let Some((i, name, args)) = covering else {
            return Ok(vec![Rearranged::Missing(state)]);
        };
        if depth == 0 {
            tracing::debug!(predicate = %name, "rearrangement hit the unfold depth ceiling");
            return Ok(vec![Rearranged::Missing(state)]);
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
        let mut out = Vec::new();
        for rule_idx in 0..rule_count {
            let mut child = state.clone();
            let (atoms, pure) = self.lib.unfold(&name, &args, rule_idx, &mut child.fresh)?;
            child.heap.remove(i);
            for atom in atoms {
                child.heap.push_unchecked(atom);
            }
            child.pure.extend(pure.atoms().iter().cloned());
            if let SatVerdict::Unsat = self.oracle.check(&child.saturated_pure())? {
                continue;
            }
            out.extend(self.rearrange(child, addr, depth - 1)?);
        }
        Ok(out)
    }

    /// Extend a state's pure set with a condition (or its negation),
    /// branching on disjunctions and pruning infeasible results silently.
    fn assume(
        &self,
        state: SymbolicState,
        expr: &Expr,
        want: bool,
    ) -> Result<Vec<SymbolicState>, EngineError> {
        match expr {
            Expr::Bool(b) => Ok(if *b == want { vec![state] } else { vec![] }),
            Expr::Not(inner) => self.assume(state, inner, !want),
            Expr::And(l, r) if want => {
                let mut out = Vec::new();
                for s in self.assume(state, l, true)? {
                    out.extend(self.assume(s, r, true)?);
                }
                Ok(out)
            }
            Expr::And(l, r) => {
                // !(l && r) == !l || (l && !r): disjoint split
                let mut out = self.assume(state.clone(), l, false)?;
                for s in self.assume(state, l, true)? {
                    out.extend(self.assume(s, r, false)?);
                }
                Ok(out)
            }
            Expr::Or(l, r) if want => {
                // l || r == l || (!l && r): disjoint split
                let mut out = self.assume(state.clone(), l, true)?;
                for s in self.assume(state, l, false)? {
                    out.extend(self.assume(s, r, true)?);
                }
                Ok(out)
            }
            Expr::Or(l, r) => {
                let mut out = Vec::new();
                for s in self.assume(state, l, false)? {
                    out.extend(self.assume(s, r, false)?);
                }
                Ok(out)
            }
            Expr::Eq(_, _)
            | Expr::Ne(_, _)
            | Expr::Lt(_, _)
            | Expr::Le(_, _)
            | Expr::Gt(_, _)
            | Expr::Ge(_, _) => {
                let atom = self.comparison_atom(&state, expr)?;
                let atom = if want { atom } else { atom.negated() };
                let mut s = state;
                s.record(format!("assume {atom}"));
                s.assume_atom(atom);
                match self.oracle.check(&s.saturated_pure())? {
                    SatVerdict::Unsat => {
                        tracing::debug!("infeasible branch pruned");
                        Ok(vec![])
                    }
                    _ => Ok(vec![s]),
                }
            }
            _ => Err(EngineError::InvalidProgram(format!(
                "non-boolean condition `{expr}`"
            ))),
        }
    }

    fn comparison_atom(
        &self,
        state: &SymbolicState,
        expr: &Expr,
    ) -> Result<PureAtom, EngineError> {
        match expr {
            Expr::Eq(a, b) => Ok(PureAtom::Eq(self.eval(state, a)?, self.eval(state, b)?)),
            Expr::Ne(a, b) => Ok(PureAtom::Ne(self.eval(state, a)?, self.eval(state, b)?)),
            Expr::Lt(a, b) => Ok(PureAtom::Lt(self.eval(state, a)?, self.eval(state, b)?)),
            Expr::Le(a, b) => Ok(PureAtom::Le(self.eval(state, a)?, self.eval(state, b)?)),
            Expr::Gt(a, b) => Ok(PureAtom::Gt(self.eval(state, a)?, self.eval(state, b)?)),
            Expr::Ge(a, b) => Ok(PureAtom::Ge(self.eval(state, a)?, self.eval(state, b)?)),
            _ => Err(EngineError::InvalidProgram(format!(
                "`{expr}` is not a comparison"
            ))),
        }
    }

    /// Evaluate a data expression to a symbolic term.
    fn eval(&self, state: &SymbolicState, expr: &Expr) -> Result<SymExpr, EngineError> {
        match expr {
            Expr::Int(n) => Ok(SymExpr::Int(*n)),
            Expr::Nil => Ok(SymExpr::Nil),
            Expr::Var(name) => self.lookup_var(state, name),
            Expr::Add(a, b) => Ok(SymExpr::Add(
                Box::new(self.eval(state, a)?),
                Box::new(self.eval(state, b)?),
            )),
            Expr::Sub(a, b) => Ok(SymExpr::Sub(
                Box::new(self.eval(state, a)?),
                Box::new(self.eval(state, b)?),
            )),
            Expr::Mul(a, b) => Ok(SymExpr::Mul(
                Box::new(self.eval(state, a)?),
                Box::new(self.eval(state, b)?),
            )),
            _ => Err(EngineError::InvalidProgram(format!(
                "boolean expression `{expr}` in value position"
            ))),
        }
    }

    fn lookup_var(&self, state: &SymbolicState, name: &str) -> Result<SymExpr, EngineError> {
        state
            .lookup(name)
            .map(|v| SymExpr::Var(v.clone()))
            .ok_or_else(|| {
                EngineError::InvalidProgram(format!("variable `{name}` is not declared"))
            })
    }

    /// Is `a == b` implied by the saturated pure set? `unknown` counts as
    /// not proven — an access justified only by an undecided equality is a
    /// violation, never silently accepted.
    fn prove_eq(
        &self,
        sat_pure: &PureSet,
        a: &SymExpr,
        b: &SymExpr,
    ) -> Result<bool, EngineError> {
        if a == b {
            return Ok(true);
        }
        let mut query = sat_pure.clone();
        query.push(PureAtom::Ne(a.clone(), b.clone()));
        Ok(matches!(self.oracle.check(&query)?, SatVerdict::Unsat))
    }
}

/// Program-variable-to-symbolic-term map of a state's current stack.
fn stack_map(state: &SymbolicState) -> BTreeMap<SymVar, SymExpr> {
    state
        .stack
        .iter()
        .map(|(name, sym)| (SymVar::new(name.clone()), SymExpr::Var(sym.clone())))
        .collect()
}

/// Variables a block may rebind (assignment targets, load/alloc
/// destinations, call results) — the ones a loop havocks.
fn modified_vars(block: &[Statement]) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    collect_modified(block, &mut out);
    out
}

fn collect_modified(block: &[Statement], out: &mut BTreeSet<String>) {
    for stmt in block {
        match stmt {
            Statement::Assign { dest, .. }
            | Statement::Load { dest, .. }
            | Statement::Alloc { dest, .. } => {
                out.insert(dest.clone());
            }
            Statement::Call {
                dest: Some(dest), ..
            } => {
                out.insert(dest.clone());
            }
            Statement::If {
                then_body,
                else_body,
                ..
            } => {
                collect_modified(then_body, out);
                collect_modified(else_body, out);
            }
            Statement::While { body, .. } => collect_modified(body, out),
            _ => {}
        }
    }
}
