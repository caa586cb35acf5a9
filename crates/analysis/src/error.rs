use std::fmt;

/// Internal-engine errors.
///
/// These are *not* verification verdicts: they signal that the engine itself
/// (or the front end feeding it) broke an invariant. The driver reports them
/// as `InternalError` for the affected function and moves on; they are never
/// silently swallowed and never conflated with `Violated`/`Unknown`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Two spatial atoms claim the same cell at construction time.
    DisjointHeapViolation {
        /// Rendered address expression of the duplicated cell.
        addr: String,
    },
    /// A predicate definition failed validation (duplicate name, unbound
    /// rule variable, arity mismatch, ...).
    MalformedPredicate { name: String, reason: String },
    /// The program handed over by the front end is structurally invalid.
    InvalidProgram(String),
    /// The satisfiability oracle broke protocol (process died, unparseable
    /// output, ...). Distinct from the oracle *answering* `unknown`.
    OracleProtocol(String),
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineError::DisjointHeapViolation { addr } => {
                write!(f, "disjointness violation: two atoms claim cell {addr}")
            }
            EngineError::MalformedPredicate { name, reason } => {
                write!(f, "malformed predicate `{name}`: {reason}")
            }
            EngineError::InvalidProgram(msg) => write!(f, "invalid program: {msg}"),
            EngineError::OracleProtocol(msg) => write!(f, "oracle protocol error: {msg}"),
        }
    }
}

impl std::error::Error for EngineError {}
