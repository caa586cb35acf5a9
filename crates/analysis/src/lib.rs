//! # heap-fv-analysis
//!
//! The symbolic-heap verification core: proves programs that mutate
//! heap-allocated, pointer-based structures free of null/dangling
//! dereferences and leaks, and faithful to their declared contracts.
//!
//! Layering, leaf first:
//!
//! - [`formula`]: symbolic variables, pure constraints, spatial atoms,
//!   symbolic heaps — the assertion language
//! - [`pred`]: the inductive predicate library (`list`, `lseg`, `tree`,
//!   plus program-supplied definitions) with bounded unfolding
//! - [`oracle`]: the satisfiability oracle interface and the in-process
//!   ground decision procedure
//! - [`entail`]: entailment and frame inference by structural subtraction
//! - [`ir`] / [`contract_db`]: the program representation handed over by
//!   the external front end, and callee summaries for modular calls
//! - symbolic execution (internal) and [`verify`]: the per-function
//!   specification matcher
//!
//! The driver crate adds parallel scheduling, the SMT-backed oracle and
//! report rendering on top.

pub mod contract_db;
pub mod encode;
pub mod entail;
pub mod error;
mod exec;
pub mod formula;
pub mod ir;
pub mod oracle;
pub mod pred;
pub mod state;
pub mod verdict;
pub mod verify;

pub use error::EngineError;
pub use verdict::{UnknownReason, Verdict, Violation, ViolationKind};
pub use verify::{verify_function, verify_program, Limits};
