//! Per-function specification matching.
//!
//! For each function: build the initial state from its precondition,
//! symbolically execute the body (loops and calls handled by invariant
//! entailment and the frame rule inside the execution engine), then require
//! every surviving path to entail the postcondition. A residual frame that
//! still owns cells at return is a memory leak.
//!
//! Outcome precedence when paths disagree: internal error > violation >
//! unknown > verified. A function with no feasible path and no failure is
//! verified — infeasibility is pruned, never reported.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::contract_db::ContractDatabase;
use crate::entail::{Entailer, Entailment, DEFAULT_UNFOLD_DEPTH};
use crate::error::EngineError;
use crate::exec::{Executor, Outcome};
use crate::formula::{SymExpr, SymVar};
use crate::ir::{Function, Program};
use crate::oracle::PureOracle;
use crate::pred::PredicateLibrary;
use crate::state::SymbolicState;
use crate::verdict::{UnknownReason, Verdict, Violation, ViolationKind};

/// Resource bounds for one function's verification.
#[derive(Debug, Clone)]
pub struct Limits {
    /// Unfolding-depth ceiling for every entailment and rearrangement.
    pub max_unfold_depth: u32,
    /// Wall-clock bound per proof obligation.
    pub obligation_timeout: Option<Duration>,
    /// Wall-clock bound for the whole function.
    pub function_timeout: Option<Duration>,
    /// Bound on symbolic states explored per function.
    pub max_states: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_unfold_depth: DEFAULT_UNFOLD_DEPTH,
            obligation_timeout: None,
            function_timeout: None,
            max_states: 10_000,
        }
    }
}

/// Per-obligation deadline: the obligation timeout from now, clipped to the
/// function deadline.
pub(crate) fn obligation_deadline(
    limits: &Limits,
    function_deadline: Option<Instant>,
) -> Option<Instant> {
    let per_obligation = limits.obligation_timeout.map(|d| Instant::now() + d);
    match (per_obligation, function_deadline) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

/// Verify one function against its contract.
///
/// Engine errors abort this function only and surface as
/// `Verdict::InternalError`; they are logged, never swallowed.
pub fn verify_function(
    func: &Function,
    lib: &PredicateLibrary,
    contracts: &ContractDatabase,
    oracle: &dyn PureOracle,
    limits: &Limits,
) -> Verdict {
    match verify_function_inner(func, lib, contracts, oracle, limits) {
        Ok(verdict) => {
            tracing::info!(function = %func.name, verdict = %verdict, "verified function");
            verdict
        }
        Err(err) => {
            tracing::error!(function = %func.name, error = %err, "internal error during verification");
            Verdict::InternalError(err.to_string())
        }
    }
}

fn verify_function_inner(
    func: &Function,
    lib: &PredicateLibrary,
    contracts: &ContractDatabase,
    oracle: &dyn PureOracle,
    limits: &Limits,
) -> Result<Verdict, EngineError> {
    func.validate()?;
    let deadline = limits.function_timeout.map(|d| Instant::now() + d);

    // Initial state: formals and locals bound to fresh symbolic variables,
    // the precondition loaded with its existentials skolemized.
    let mut state = SymbolicState::new();
    for name in func.params.iter().chain(func.locals.iter()) {
        let v = state.fresh_var(name);
        state.bind(name.clone(), v);
    }
    let mut param_map = BTreeMap::new();
    for name in &func.params {
        if let Some(sym) = state.lookup(name) {
            param_map.insert(SymVar::new(name.clone()), SymExpr::Var(sym.clone()));
        }
    }
    let (pre_heap, pre_pure) = func
        .contract
        .requires
        .instantiate(&param_map, &mut state.fresh)?;
    state.heap = pre_heap;
    state.pure = pre_pure;

    let mut executor = Executor::new(lib, oracle, contracts, limits, deadline);
    let outcomes = executor.run_block(state, &func.body)?;

    let mut violations = Vec::new();
    let mut unknowns = Vec::new();
    for outcome in outcomes {
        match outcome {
            Outcome::Violated(v) => violations.push(v),
            Outcome::Unknown(r) => unknowns.push(r),
            Outcome::Done(s) => {
                match check_post(func, lib, oracle, limits, deadline, s, None)? {
                    PathVerdict::Pass => {}
                    PathVerdict::Violated(v) => violations.push(v),
                    PathVerdict::Unknown(r) => unknowns.push(r),
                }
            }
            Outcome::Returned(s, value) => {
                match check_post(func, lib, oracle, limits, deadline, s, value)? {
                    PathVerdict::Pass => {}
                    PathVerdict::Violated(v) => violations.push(v),
                    PathVerdict::Unknown(r) => unknowns.push(r),
                }
            }
        }
    }

    if let Some(violation) = violations.into_iter().next() {
        return Ok(Verdict::Violated(violation));
    }
    if let Some(reason) = unknowns.into_iter().next() {
        return Ok(Verdict::Unknown(reason));
    }
    Ok(Verdict::Verified)
}

enum PathVerdict {
    Pass,
    Violated(Violation),
    Unknown(UnknownReason),
}

/// Return-site obligation: the final state entails the postcondition, and
/// the residual frame owns no cells (else the function leaks them).
fn check_post(
    func: &Function,
    lib: &PredicateLibrary,
    oracle: &dyn PureOracle,
    limits: &Limits,
    deadline: Option<Instant>,
    mut state: SymbolicState,
    result: Option<SymExpr>,
) -> Result<PathVerdict, EngineError> {
    let mut map = BTreeMap::new();
    for name in &func.params {
        if let Some(sym) = state.lookup(name) {
            map.insert(SymVar::new(name.clone()), SymExpr::Var(sym.clone()));
        }
    }
    if let Some(result) = result {
        map.insert(SymVar::new("result"), result);
    }
    let post = func.contract.ensures.subst_free(&map)?;

    let entailer = Entailer::new(lib, oracle)
        .with_depth(limits.max_unfold_depth)
        .with_deadline(obligation_deadline(limits, deadline));
    match entailer.entails(&state.heap, &state.pure, &post, &mut state.fresh)? {
        Entailment::Fails(failure) => Ok(PathVerdict::Violated(Violation {
            kind: ViolationKind::PostconditionFailed,
            obligation: Some(failure.to_string()),
            path: state.path,
        })),
        Entailment::Unknown(reason) => Ok(PathVerdict::Unknown(reason)),
        Entailment::Holds(frame) => {
            match entailer.find_leaked_atom(&frame, &mut state.fresh)? {
                Some(atom) => Ok(PathVerdict::Violated(Violation {
                    kind: ViolationKind::LeakedCells(atom.to_string()),
                    obligation: None,
                    path: state.path,
                })),
                None => Ok(PathVerdict::Pass),
            }
        }
    }
}

/// Verify every function of a program unit, serially, in input order.
///
/// The driver crate provides the parallel version; this one backs it and
/// the test suites. Validation failures of the unit itself are returned as
/// an error since no per-function verdict is meaningful.
pub fn verify_program(
    program: &Program,
    lib: &PredicateLibrary,
    oracle: &dyn PureOracle,
    limits: &Limits,
) -> Result<Vec<(String, Verdict)>, EngineError> {
    program.validate()?;
    let mut lib = lib.clone();
    for def in &program.predicates {
        lib.insert(def.clone())?;
    }
    let contracts = ContractDatabase::from_program(program);
    Ok(program
        .functions
        .iter()
        .map(|func| {
            (
                func.name.clone(),
                verify_function(func, &lib, &contracts, oracle, limits),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formula::{HeapFormula, PureAtom, PureSet, SpatialAtom, SymbolicHeap};
    use crate::ir::{Contract, Expr, Statement};
    use crate::oracle::GroundOracle;

    fn v(name: &str) -> SymExpr {
        SymExpr::var(name)
    }

    fn verify(func: Function) -> Verdict {
        let lib = PredicateLibrary::with_builtins();
        let oracle = GroundOracle;
        let program = Program {
            functions: vec![func],
            predicates: vec![],
        };
        let contracts = ContractDatabase::from_program(&program);
        verify_function(
            &program.functions[0],
            &lib,
            &contracts,
            &oracle,
            &Limits::default(),
        )
    }

    #[test]
    fn trivial_function_is_verified() {
        let func = Function {
            name: "noop".into(),
            params: vec![],
            locals: vec![],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![Statement::Skip],
        };
        assert_eq!(verify(func), Verdict::Verified);
    }

    #[test]
    fn write_without_footprint_is_violated() {
        // emp precondition, body writes through the parameter
        let func = Function {
            name: "blind_write".into(),
            params: vec!["p".into()],
            locals: vec![],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![Statement::Store {
                dest: "p".into(),
                field: "val".into(),
                value: Expr::Int(1),
            }],
        };
        match verify(func) {
            Verdict::Violated(violation) => {
                assert_eq!(violation.kind, ViolationKind::NullOrDanglingDereference);
            }
            other => panic!("expected violation, got {other:?}"),
        }
    }

    #[test]
    fn allocation_without_free_or_postcondition_is_a_leak() {
        let func = Function {
            name: "leaky".into(),
            params: vec![],
            locals: vec!["p".into()],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![Statement::Alloc {
                dest: "p".into(),
                fields: vec!["val".into()],
            }],
        };
        match verify(func) {
            Verdict::Violated(violation) => {
                assert!(matches!(violation.kind, ViolationKind::LeakedCells(_)));
            }
            other => panic!("expected leak violation, got {other:?}"),
        }
    }

    #[test]
    fn alloc_then_free_is_verified() {
        let func = Function {
            name: "balanced".into(),
            params: vec![],
            locals: vec!["p".into()],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![
                Statement::Alloc {
                    dest: "p".into(),
                    fields: vec!["val".into()],
                },
                Statement::Free {
                    target: "p".into(),
                },
            ],
        };
        assert_eq!(verify(func), Verdict::Verified);
    }

    #[test]
    fn postcondition_mismatch_is_violated() {
        // requires emp, ensures a cell that was never allocated
        let func = Function {
            name: "wrong_post".into(),
            params: vec!["p".into()],
            locals: vec![],
            returns_value: false,
            contract: Contract {
                requires: HeapFormula::emp(),
                ensures: HeapFormula::with_exists(
                    vec![SymVar::new("w")],
                    SymbolicHeap::with_atoms(vec![SpatialAtom::points_to(
                        v("p"),
                        [("val", v("w"))],
                    )])
                    .unwrap(),
                    PureSet::new(),
                ),
            },
            body: vec![Statement::Skip],
        };
        match verify(func) {
            Verdict::Violated(violation) => {
                assert_eq!(violation.kind, ViolationKind::PostconditionFailed);
                assert!(violation.obligation.is_some());
            }
            other => panic!("expected violation, got {other:?}"),
        }
    }

    #[test]
    fn function_deadline_yields_unknown() {
        let lib = PredicateLibrary::with_builtins();
        let oracle = GroundOracle;
        let func = Function {
            name: "slow".into(),
            params: vec![],
            locals: vec!["x".into()],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![Statement::Assign {
                dest: "x".into(),
                value: Expr::Int(0),
            }],
        };
        let program = Program {
            functions: vec![func],
            predicates: vec![],
        };
        let contracts = ContractDatabase::from_program(&program);
        let limits = Limits {
            function_timeout: Some(Duration::ZERO),
            ..Limits::default()
        };
        let verdict = verify_function(&program.functions[0], &lib, &contracts, &oracle, &limits);
        assert_eq!(verdict, Verdict::Unknown(UnknownReason::Timeout));
    }

    #[test]
    fn state_budget_yields_unknown() {
        let lib = PredicateLibrary::with_builtins();
        let oracle = GroundOracle;
        let func = Function {
            name: "wide".into(),
            params: vec![],
            locals: vec!["x".into()],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![
                Statement::Assign {
                    dest: "x".into(),
                    value: Expr::Int(0),
                },
                Statement::Assign {
                    dest: "x".into(),
                    value: Expr::Int(1),
                },
            ],
        };
        let program = Program {
            functions: vec![func],
            predicates: vec![],
        };
        let contracts = ContractDatabase::from_program(&program);
        let limits = Limits {
            max_states: 1,
            ..Limits::default()
        };
        let verdict = verify_function(&program.functions[0], &lib, &contracts, &oracle, &limits);
        assert_eq!(
            verdict,
            Verdict::Unknown(UnknownReason::SearchBudgetExhausted)
        );
    }

    #[test]
    fn invalid_function_is_an_internal_error() {
        let func = Function {
            name: "broken".into(),
            params: vec![],
            locals: vec![],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![Statement::Assign {
                dest: "ghost".into(),
                value: Expr::Int(0),
            }],
        };
        match verify(func) {
            Verdict::InternalError(msg) => assert!(msg.contains("not declared")),
            other => panic!("expected internal error, got {other:?}"),
        }
    }

    #[test]
    fn verify_program_reports_each_function_independently() {
        let lib = PredicateLibrary::with_builtins();
        let oracle = GroundOracle;
        let good = Function {
            name: "good".into(),
            params: vec![],
            locals: vec![],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![],
        };
        let bad = Function {
            name: "bad".into(),
            params: vec!["p".into()],
            locals: vec![],
            returns_value: false,
            contract: Contract::trivial(),
            body: vec![Statement::Free {
                target: "p".into(),
            }],
        };
        let program = Program {
            functions: vec![bad, good],
            predicates: vec![],
        };
        let results = verify_program(&program, &lib, &oracle, &Limits::default()).unwrap();
        assert_eq!(results.len(), 2);
        assert!(matches!(results[0].1, Verdict::Violated(_)));
        assert_eq!(results[1].1, Verdict::Verified);
    }
}
