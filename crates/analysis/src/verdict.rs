//! Verification verdicts and the failure taxonomy.
//!
//! Four-way outcome per function, kept strictly apart so "could not decide"
//! is never mistaken for "proven unsafe" (or worse, "proven safe"):
//!
//! - `Verified` — every feasible path discharged every obligation
//! - `Violated` — a concrete unsafe behavior was proven reachable; carries
//!   the witness path and the failing obligation
//! - `Unknown` — incompleteness or resource exhaustion, with the reason
//! - `InternalError` — the engine itself failed; diagnostic only
//!
//! Infeasible paths are *not* represented here: they are pruned inside the
//! execution engine and never escape it.

use std::fmt;

use crate::state::PathStep;

/// Why a function's verdict is `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnknownReason {
    /// A wall-clock deadline expired.
    Timeout,
    /// A loop head had no invariant annotation.
    MissingLoopInvariant,
    /// A call site's callee has no registered contract.
    MissingContract(String),
    /// The satisfiability oracle answered `unknown`.
    OracleUnknown(String),
    /// The proof search hit an incompleteness of the procedure itself.
    Incomplete(String),
    /// The state budget for one function was exhausted.
    SearchBudgetExhausted,
}

impl fmt::Display for UnknownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnknownReason::Timeout => write!(f, "timeout"),
            UnknownReason::MissingLoopInvariant => write!(f, "missing loop invariant"),
            UnknownReason::MissingContract(callee) => {
                write!(f, "missing contract for `{callee}`")
            }
            UnknownReason::OracleUnknown(reason) => {
                write!(f, "oracle returned unknown: {reason}")
            }
            UnknownReason::Incomplete(what) => write!(f, "incomplete: {what}"),
            UnknownReason::SearchBudgetExhausted => write!(f, "search budget exhausted"),
        }
    }
}

/// What kind of unsafe behavior a violation proves reachable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// A heap access whose target cell could not be proven present.
    NullOrDanglingDereference,
    /// A heap access to a field the cell does not carry.
    MissingField(String),
    /// Heap left over that the surrounding specification does not account
    /// for (at function return or a loop back edge).
    LeakedCells(String),
    /// A call site failed to establish the callee's precondition.
    PreconditionFailed(String),
    /// The final state failed to establish the postcondition.
    PostconditionFailed,
    /// The state entering a loop failed to establish its invariant.
    LoopInvariantEntry,
    /// A loop iteration failed to re-establish the invariant.
    LoopInvariantPreservation,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::NullOrDanglingDereference => {
                write!(f, "possible null or dangling dereference")
            }
            ViolationKind::MissingField(field) => {
                write!(f, "cell has no field `{field}`")
            }
            ViolationKind::LeakedCells(what) => write!(f, "leaked cell: {what}"),
            ViolationKind::PreconditionFailed(callee) => {
                write!(f, "precondition of `{callee}` not established")
            }
            ViolationKind::PostconditionFailed => write!(f, "postcondition not established"),
            ViolationKind::LoopInvariantEntry => {
                write!(f, "loop invariant not established on entry")
            }
            ViolationKind::LoopInvariantPreservation => {
                write!(f, "loop invariant not preserved by the loop body")
            }
        }
    }
}

/// A proven-reachable unsafe behavior: the witness execution path plus the
/// specific failing obligation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Rendered failing proof obligation, when one exists (entailment
    /// failures carry the unmatched goal and the heap shape).
    pub obligation: Option<String>,
    /// Executed statements up to and including the failing one.
    pub path: Vec<PathStep>,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(obligation) = &self.obligation {
            write!(f, " ({obligation})")?;
        }
        if let Some(last) = self.path.last() {
            write!(f, " at `{last}`")?;
        }
        Ok(())
    }
}

/// Per-function verification verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    Verified,
    Violated(Violation),
    Unknown(UnknownReason),
    InternalError(String),
}

impl Verdict {
    pub fn is_verified(&self) -> bool {
        matches!(self, Verdict::Verified)
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Verified => write!(f, "verified"),
            Verdict::Violated(violation) => write!(f, "violated: {violation}"),
            Verdict::Unknown(reason) => write!(f, "unknown: {reason}"),
            Verdict::InternalError(msg) => write!(f, "internal error: {msg}"),
        }
    }
}
