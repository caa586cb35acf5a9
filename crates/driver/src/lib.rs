//! # heap-fv-driver
//!
//! The verification driver: takes a program unit from the front end, fans
//! the functions out over a rayon pool (their verifications share nothing
//! but the read-only program, predicate library and contract database),
//! wires the satisfiability oracle (ground fast path + subprocess SMT
//! fallback), and aggregates per-function verdicts into a report with
//! colored terminal and JSON renderings.
//!
//! One function's failure — violation, unknown, even an engine panic —
//! never aborts the verification of the others.

pub mod json_output;
pub mod oracle;
pub mod output;
pub mod parallel;
pub mod report;

pub use oracle::SmtOracle;
pub use parallel::{verify_program, OracleChoice, VerifyOptions};
pub use report::{FunctionReport, Report};
