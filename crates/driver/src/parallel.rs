//! Parallel verification using Rayon.
//!
//! Per-function parallelism: independent functions have no data dependency,
//! so each verification task owns its search tree exclusively and shares
//! only the read-only program, predicate library and contract database.
//! Each task gets its own oracle (the SMT backend spawns a fresh solver
//! process per query, so tasks never contend on solver state).
//!
//! A panic inside one task is caught at the task boundary and recorded as
//! that function's internal error; the rest of the run is unaffected.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;

use heap_fv_analysis::contract_db::ContractDatabase;
use heap_fv_analysis::ir::{Function, Program};
use heap_fv_analysis::oracle::{GroundOracle, PureOracle};
use heap_fv_analysis::pred::PredicateLibrary;
use heap_fv_analysis::{verify_function, EngineError, Limits, Verdict};

use crate::oracle::SmtOracle;
use crate::report::{FunctionReport, Report};

/// Which satisfiability oracle backs the run.
#[derive(Debug, Clone)]
pub enum OracleChoice {
    /// In-process ground decision procedure only. Deterministic and
    /// dependency-free; queries outside its fragment come back unknown.
    Ground,
    /// Ground fast path plus a subprocess SMT solver, each query bounded
    /// by the given timeout. Falls back to `Ground` (with a warning) when
    /// no solver binary can be found.
    Smt { timeout_ms: u64 },
}

/// Options for one verification run.
#[derive(Debug, Clone)]
pub struct VerifyOptions {
    /// Worker threads; 0 uses the global rayon pool's default.
    pub jobs: usize,
    /// Per-function resource bounds.
    pub limits: Limits,
    pub oracle: OracleChoice,
}

impl Default for VerifyOptions {
    fn default() -> Self {
        Self {
            jobs: 0,
            limits: Limits::default(),
            oracle: OracleChoice::Smt { timeout_ms: 5_000 },
        }
    }
}

/// Verify every function of a program unit in parallel.
///
/// Fails early only on unit-level problems (invalid program structure,
/// malformed predicate definitions) where no per-function verdict is
/// meaningful; per-function failures of any kind land in the report.
pub fn verify_program(program: &Program, opts: &VerifyOptions) -> Result<Report, EngineError> {
    program.validate()?;
    let mut lib = PredicateLibrary::with_builtins();
    for def in &program.predicates {
        lib.insert(def.clone())?;
    }
    let lib = Arc::new(lib);
    let contracts = Arc::new(ContractDatabase::from_program(program));

    tracing::info!(
        functions = program.functions.len(),
        jobs = opts.jobs,
        "starting verification run"
    );

    let run = || -> Vec<FunctionReport> {
        program
            .functions
            .par_iter()
            .map(|func| verify_one(func, &lib, &contracts, opts))
            .collect()
    };

    let functions = if opts.jobs == 0 {
        run()
    } else {
        match rayon::ThreadPoolBuilder::new()
            .num_threads(opts.jobs)
            .build()
        {
            Ok(pool) => pool.install(run),
            Err(err) => {
                tracing::warn!(error = %err, "could not build thread pool; using the global one");
                run()
            }
        }
    };

    Ok(Report { functions })
}

/// Verify a single function, isolating panics to this task.
fn verify_one(
    func: &Function,
    lib: &Arc<PredicateLibrary>,
    contracts: &Arc<ContractDatabase>,
    opts: &VerifyOptions,
) -> FunctionReport {
    tracing::debug!(function = %func.name, "verifying");
    let start = Instant::now();

    let verdict = match catch_unwind(AssertUnwindSafe(|| {
        let oracle = build_oracle(&opts.oracle);
        verify_function(func, lib, contracts, oracle.as_ref(), &opts.limits)
    })) {
        Ok(verdict) => verdict,
        Err(payload) => {
            let msg = panic_message(payload.as_ref());
            tracing::error!(function = %func.name, "verification worker panicked: {msg}");
            Verdict::InternalError(format!("verification worker panicked: {msg}"))
        }
    };

    FunctionReport {
        name: func.name.clone(),
        verdict,
        duration_ms: start.elapsed().as_millis() as u64,
    }
}

fn build_oracle(choice: &OracleChoice) -> Box<dyn PureOracle> {
    match choice {
        OracleChoice::Ground => Box::new(GroundOracle),
        OracleChoice::Smt { timeout_ms } => match SmtOracle::with_default_solver(*timeout_ms) {
            Ok(oracle) => Box::new(oracle),
            Err(err) => {
                tracing::warn!(
                    "no SMT solver available ({err}); falling back to the ground oracle"
                );
                Box::new(GroundOracle)
            }
        },
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
