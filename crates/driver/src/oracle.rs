//! SMT-backed satisfiability oracle.
//!
//! Implements the core's `PureOracle` interface over the subprocess solver:
//! every query first runs through the in-process ground decision procedure
//! (most separation-closure and matching queries are in its fragment and
//! never leave the process), and only the remainder is lowered to SMT-LIB
//! and shipped to the external solver. Solver timeouts surface as the
//! oracle answering `unknown`; protocol breakage (process death, garbage
//! output) is an internal-engine error, not a verdict.

use heap_fv_analysis::encode;
use heap_fv_analysis::error::EngineError;
use heap_fv_analysis::formula::PureSet;
use heap_fv_analysis::oracle::{GroundOracle, PureOracle, SatVerdict};
use heap_fv_solver::{SmtSolver, SolverConfig, SolverError, SolverResult};

/// `PureOracle` over a subprocess SMT solver with a ground fast path.
pub struct SmtOracle {
    solver: SmtSolver,
    ground: GroundOracle,
}

impl SmtOracle {
    pub fn new(solver: SmtSolver) -> Self {
        Self {
            solver,
            ground: GroundOracle,
        }
    }

    /// Auto-detect a solver backend and bound each query by `timeout_ms`.
    pub fn with_default_solver(timeout_ms: u64) -> Result<Self, SolverError> {
        let config = SolverConfig::auto_detect()?.with_timeout(timeout_ms);
        Ok(Self::new(SmtSolver::new(config)))
    }
}

impl PureOracle for SmtOracle {
    fn check(&self, pure: &PureSet) -> Result<SatVerdict, EngineError> {
        // Fast path: the ground fragment needs no subprocess.
        match self.ground.check(pure)? {
            SatVerdict::Unknown(_) => {}
            definite => return Ok(definite),
        }

        let script = encode::pure_script(pure);
        tracing::debug!(atoms = pure.len(), "delegating query to the SMT solver");
        match self.solver.check_sat(&script) {
            Ok(SolverResult::Sat(_)) => Ok(SatVerdict::Sat),
            Ok(SolverResult::Unsat) => Ok(SatVerdict::Unsat),
            Ok(SolverResult::Unknown(reason)) => Ok(SatVerdict::Unknown(reason)),
            Err(SolverError::Timeout) => Ok(SatVerdict::Unknown("timeout".to_string())),
            Err(err) => Err(EngineError::OracleProtocol(err.to_string())),
        }
    }
}
