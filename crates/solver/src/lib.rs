//! # heap-fv-solver
//!
//! The external satisfiability oracle boundary of heap-fv.
//!
//! Pure-constraint queries are discharged by spawning an SMT solver as a
//! subprocess and piping SMT-LIB2 text to it. The engine never inspects the
//! solver's internals: the whole interface is "here is a script, tell me
//! `sat`, `unsat` or `unknown`". Z3, CVC5 and Yices are supported; each
//! invocation carries its own timeout so one stuck obligation cannot stall a
//! verification run.
//!
//! ## Usage
//!
//! ```no_run
//! use heap_fv_solver::{SmtSolver, SolverResult};
//!
//! let solver = SmtSolver::with_default_config().unwrap();
//! let result = solver.check_sat_raw(
//!     "(set-logic QF_LIA)
//!      (declare-const x Int)
//!      (assert (> x 0))
//!      (assert (< x 10))
//!      (check-sat)
//!      (get-model)",
//! ).unwrap();
//!
//! match result {
//!     SolverResult::Sat(model) => println!("sat: {model:?}"),
//!     SolverResult::Unsat => println!("unsat (implication proved)"),
//!     SolverResult::Unknown(reason) => println!("unknown: {reason}"),
//! }
//! ```

pub mod config;
pub mod error;
pub mod model;
mod parser;
pub mod result;
pub mod solver;

// Re-export primary types for ergonomic use
pub use config::{SolverConfig, SolverKind};
pub use error::SolverError;
pub use model::Model;
pub use result::SolverResult;
pub use solver::SmtSolver;
