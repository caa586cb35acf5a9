//! Database of function contracts for modular call-site reasoning.
//!
//! When verifying a function `foo` that calls `bar`, the execution engine
//! looks up `bar`'s summary here and applies the frame rule: prove `bar`'s
//! precondition from the current state, carry the inferred frame, and
//! continue from `bar`'s postcondition. Each function is thereby checked
//! independently against callee *contracts*, never callee bodies.
//!
//! The database is populated once from the program and shared read-only by
//! all verification tasks.

use std::collections::HashMap;

use crate::formula::HeapFormula;
use crate::ir::Program;

/// A callee summary: its contract plus the signature data needed to
/// instantiate it at a call site.
#[derive(Debug, Clone)]
pub struct FunctionSummary {
    /// Formal parameter names, in declaration order.
    pub params: Vec<String>,
    /// Precondition over the formals.
    pub requires: HeapFormula,
    /// Postcondition over the formals and `result`.
    pub ensures: HeapFormula,
    /// Whether the function returns a value (binds `result`).
    pub returns_value: bool,
}

/// Maps function names to their summaries.
#[derive(Debug, Clone, Default)]
pub struct ContractDatabase {
    contracts: HashMap<String, FunctionSummary>,
}

impl ContractDatabase {
    /// Create an empty contract database.
    pub fn new() -> Self {
        Self {
            contracts: HashMap::new(),
        }
    }

    /// Build the database for a whole program unit.
    pub fn from_program(program: &Program) -> Self {
        let mut db = Self::new();
        for func in &program.functions {
            db.insert(
                func.name.clone(),
                FunctionSummary {
                    params: func.params.clone(),
                    requires: func.contract.requires.clone(),
                    ensures: func.contract.ensures.clone(),
                    returns_value: func.returns_value,
                },
            );
        }
        db
    }

    /// Register a function's summary.
    pub fn insert(&mut self, name: String, summary: FunctionSummary) {
        self.contracts.insert(name, summary);
    }

    /// Look up a callee's summary by function name.
    pub fn get(&self, name: &str) -> Option<&FunctionSummary> {
        self.contracts.get(name)
    }

    /// Check if a function has a summary in the database.
    pub fn contains(&self, name: &str) -> bool {
        self.contracts.contains_key(name)
    }

    /// Return the number of entries in the database.
    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    /// Check if the database is empty.
    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Contract, Function};

    #[test]
    fn empty_database() {
        let db = ContractDatabase::new();
        assert!(db.is_empty());
        assert_eq!(db.len(), 0);
        assert!(!db.contains("foo"));
        assert!(db.get("foo").is_none());
    }

    #[test]
    fn insert_and_get() {
        let mut db = ContractDatabase::new();
        db.insert(
            "push".to_string(),
            FunctionSummary {
                params: vec!["x".to_string(), "v".to_string()],
                requires: HeapFormula::emp(),
                ensures: HeapFormula::emp(),
                returns_value: true,
            },
        );

        assert!(!db.is_empty());
        assert_eq!(db.len(), 1);
        assert!(db.contains("push"));
        assert!(!db.contains("pop"));

        let summary = db.get("push").unwrap();
        assert_eq!(summary.params, vec!["x", "v"]);
        assert!(summary.returns_value);
    }

    #[test]
    fn from_program_covers_all_functions() {
        let mk = |name: &str, returns_value: bool| Function {
            name: name.to_string(),
            params: vec!["p".to_string()],
            locals: vec![],
            returns_value,
            contract: Contract::trivial(),
            body: vec![],
        };
        let program = Program {
            functions: vec![mk("f", false), mk("g", true)],
            predicates: vec![],
        };
        let db = ContractDatabase::from_program(&program);
        assert_eq!(db.len(), 2);
        assert!(!db.get("f").unwrap().returns_value);
        assert!(db.get("g").unwrap().returns_value);
    }
}
