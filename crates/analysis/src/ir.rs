//! Program intermediate representation.
//!
//! The external front end lowers source programs into this IR: functions
//! with declared parameters/locals, structured statements, and contracts
//! written as symbolic-heap formulas. The core references the IR read-only
//! and never mutates it.
//!
//! Heap access is deliberately statement-level only (`Load`/`Store`), never
//! expression-level: every dereference is an explicit proof obligation site.
//! Parameters are immutable, so a postcondition mentioning a formal always
//! denotes its entry value.

use std::collections::BTreeSet;
use std::fmt;

use crate::error::EngineError;
use crate::formula::HeapFormula;
use crate::pred::PredicateDef;

/// A pure program expression.
///
/// Boolean-shaped expressions (`Bool`, comparisons, connectives) may only
/// appear in branch and loop conditions; data expressions everywhere else.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Bool(bool),
    /// The null pointer literal.
    Nil,
    Var(String),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
    Lt(Box<Expr>, Box<Expr>),
    Le(Box<Expr>, Box<Expr>),
    Gt(Box<Expr>, Box<Expr>),
    Ge(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Expr {
        Expr::Var(name.into())
    }

    /// Pointer/integer equality test.
    pub fn eq(a: Expr, b: Expr) -> Expr {
        Expr::Eq(Box::new(a), Box::new(b))
    }

    /// Pointer/integer disequality test.
    pub fn ne(a: Expr, b: Expr) -> Expr {
        Expr::Ne(Box::new(a), Box::new(b))
    }

    /// True for expressions that denote a truth value.
    pub fn is_boolean(&self) -> bool {
        matches!(
            self,
            Expr::Bool(_)
                | Expr::Eq(_, _)
                | Expr::Ne(_, _)
                | Expr::Lt(_, _)
                | Expr::Le(_, _)
                | Expr::Gt(_, _)
                | Expr::Ge(_, _)
                | Expr::And(_, _)
                | Expr::Or(_, _)
                | Expr::Not(_)
        )
    }

    fn vars_into(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Int(_) | Expr::Bool(_) | Expr::Nil => {}
            Expr::Var(name) => {
                out.insert(name.clone());
            }
            Expr::Add(a, b)
            | Expr::Sub(a, b)
            | Expr::Mul(a, b)
            | Expr::Eq(a, b)
            | Expr::Ne(a, b)
            | Expr::Lt(a, b)
            | Expr::Le(a, b)
            | Expr::Gt(a, b)
            | Expr::Ge(a, b)
            | Expr::And(a, b)
            | Expr::Or(a, b) => {
                a.vars_into(out);
                b.vars_into(out);
            }
            Expr::Not(a) => a.vars_into(out),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Nil => write!(f, "nil"),
            Expr::Var(name) => write!(f, "{name}"),
            Expr::Add(a, b) => write!(f, "({a} + {b})"),
            Expr::Sub(a, b) => write!(f, "({a} - {b})"),
            Expr::Mul(a, b) => write!(f, "({a} * {b})"),
            Expr::Eq(a, b) => write!(f, "{a} == {b}"),
            Expr::Ne(a, b) => write!(f, "{a} != {b}"),
            Expr::Lt(a, b) => write!(f, "{a} < {b}"),
            Expr::Le(a, b) => write!(f, "{a} <= {b}"),
            Expr::Gt(a, b) => write!(f, "{a} > {b}"),
            Expr::Ge(a, b) => write!(f, "{a} >= {b}"),
            Expr::And(a, b) => write!(f, "({a} && {b})"),
            Expr::Or(a, b) => write!(f, "({a} || {b})"),
            Expr::Not(a) => write!(f, "!({a})"),
        }
    }
}

/// One program statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `dest := value` — pure assignment.
    Assign { dest: String, value: Expr },
    /// `dest := src.field` — heap read.
    Load {
        dest: String,
        src: String,
        field: String,
    },
    /// `dest.field := value` — heap write.
    Store {
        dest: String,
        field: String,
        value: Expr,
    },
    /// `dest := new(f1, ..., fn)` — allocate a cell with the given fields.
    Alloc { dest: String, fields: Vec<String> },
    /// `free target` — deallocate the cell `target` points to.
    Free { target: String },
    /// Conditional branch.
    If {
        cond: Expr,
        then_body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    /// Loop, optionally annotated with an invariant formula over the
    /// program variables in scope.
    While {
        cond: Expr,
        invariant: Option<HeapFormula>,
        body: Vec<Statement>,
    },
    /// `dest := callee(args)` / `callee(args)`.
    Call {
        dest: Option<String>,
        callee: String,
        args: Vec<Expr>,
    },
    /// `return value?`.
    Return { value: Option<Expr> },
    /// No-op.
    Skip,
}

impl fmt::Display for Statement {
    /// One source-like line per statement. Compound statements render their
    /// head only; the bodies show up step by step in execution traces.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Statement::Assign { dest, value } => write!(f, "{dest} := {value}"),
            Statement::Load { dest, src, field } => write!(f, "{dest} := {src}.{field}"),
            Statement::Store { dest, field, value } => write!(f, "{dest}.{field} := {value}"),
            Statement::Alloc { dest, fields } => {
                write!(f, "{dest} := new({})", fields.join(", "))
            }
            Statement::Free { target } => write!(f, "free {target}"),
            Statement::If { cond, .. } => write!(f, "if ({cond})"),
            Statement::While { cond, .. } => write!(f, "while ({cond})"),
            Statement::Call { dest, callee, args } => {
                if let Some(dest) = dest {
                    write!(f, "{dest} := ")?;
                }
                write!(f, "{callee}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                write!(f, ")")
            }
            Statement::Return { value: Some(value) } => write!(f, "return {value}"),
            Statement::Return { value: None } => write!(f, "return"),
            Statement::Skip => write!(f, "skip"),
        }
    }
}

/// A function's declared contract.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    /// Precondition over the formal parameters.
    pub requires: HeapFormula,
    /// Postcondition over the formal parameters and `result`.
    pub ensures: HeapFormula,
}

impl Contract {
    /// `emp`/`emp` — the contract of a function that neither needs nor
    /// returns any heap.
    pub fn trivial() -> Self {
        Self {
            requires: HeapFormula::emp(),
            ensures: HeapFormula::emp(),
        }
    }
}

/// A function to be verified.
#[derive(Debug, Clone)]
pub struct Function {
    pub name: String,
    pub params: Vec<String>,
    pub locals: Vec<String>,
    /// Whether `return` statements carry a value (and `result` is bound in
    /// the postcondition).
    pub returns_value: bool,
    pub contract: Contract,
    pub body: Vec<Statement>,
}

impl Function {
    /// Structural validation: declared variables, immutable parameters,
    /// boolean-shaped conditions, return-value consistency.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut declared: BTreeSet<&str> = BTreeSet::new();
        for name in self.params.iter().chain(self.locals.iter()) {
            if !declared.insert(name.as_str()) {
                return Err(EngineError::InvalidProgram(format!(
                    "function `{}`: duplicate variable `{name}`",
                    self.name
                )));
            }
            if name.contains('@') {
                return Err(EngineError::InvalidProgram(format!(
                    "function `{}`: variable name `{name}` uses the reserved character `@`",
                    self.name
                )));
            }
        }
        let params: BTreeSet<&str> = self.params.iter().map(String::as_str).collect();
        self.validate_block(&self.body, &declared, &params)
    }

    fn validate_block(
        &self,
        block: &[Statement],
        declared: &BTreeSet<&str>,
        params: &BTreeSet<&str>,
    ) -> Result<(), EngineError> {
        for stmt in block {
            self.validate_stmt(stmt, declared, params)?;
        }
        Ok(())
    }

    fn validate_stmt(
        &self,
        stmt: &Statement,
        declared: &BTreeSet<&str>,
        params: &BTreeSet<&str>,
    ) -> Result<(), EngineError> {
        let check_declared = |name: &str| -> Result<(), EngineError> {
            if declared.contains(name) {
                Ok(())
            } else {
                Err(EngineError::InvalidProgram(format!(
                    "function `{}`: variable `{name}` is not declared",
                    self.name
                )))
            }
        };
        let check_dest = |name: &str| -> Result<(), EngineError> {
            check_declared(name)?;
            if params.contains(name) {
                return Err(EngineError::InvalidProgram(format!(
                    "function `{}`: parameter `{name}` is immutable",
                    self.name
                )));
            }
            Ok(())
        };
        let check_expr = |expr: &Expr| -> Result<(), EngineError> {
            let mut used = BTreeSet::new();
            expr.vars_into(&mut used);
            for name in used {
                check_declared(&name)?;
            }
            Ok(())
        };
        let check_cond = |cond: &Expr| -> Result<(), EngineError> {
            check_expr(cond)?;
            if !cond.is_boolean() {
                return Err(EngineError::InvalidProgram(format!(
                    "function `{}`: condition `{cond}` is not boolean",
                    self.name
                )));
            }
            Ok(())
        };

        match stmt {
            Statement::Assign { dest, value } => {
                check_dest(dest)?;
                check_expr(value)?;
                if value.is_boolean() {
                    return Err(EngineError::InvalidProgram(format!(
                        "function `{}`: boolean expression `{value}` in value position",
                        self.name
                    )));
                }
            }
            Statement::Load { dest, src, .. } => {
                check_dest(dest)?;
                check_declared(src)?;
            }
            Statement::Store { dest, value, .. } => {
                check_declared(dest)?;
                check_expr(value)?;
            }
            Statement::Alloc { dest, fields } => {
                check_dest(dest)?;
                if fields.is_empty() {
                    return Err(EngineError::InvalidProgram(format!(
                        "function `{}`: allocation with no fields",
                        self.name
                    )));
                }
            }
            Statement::Free { target } => check_declared(target)?,
            Statement::If {
                cond,
                then_body,
                else_body,
            } => {
                check_cond(cond)?;
                self.validate_block(then_body, declared, params)?;
                self.validate_block(else_body, declared, params)?;
            }
            Statement::While { cond, body, .. } => {
                check_cond(cond)?;
                self.validate_block(body, declared, params)?;
            }
            Statement::Call { dest, args, .. } => {
                if let Some(dest) = dest {
                    check_dest(dest)?;
                }
                for arg in args {
                    check_expr(arg)?;
                }
            }
            Statement::Return { value } => match (value, self.returns_value) {
                (Some(value), true) => check_expr(value)?,
                (None, false) => {}
                (Some(_), false) => {
                    return Err(EngineError::InvalidProgram(format!(
                        "function `{}` returns a value but is declared unit",
                        self.name
                    )));
                }
                (None, true) => {
                    return Err(EngineError::InvalidProgram(format!(
                        "function `{}` is declared value-returning but returns unit",
                        self.name
                    )));
                }
            },
            Statement::Skip => {}
        }
        Ok(())
    }
}

/// One program unit: functions plus user predicate definitions.
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: Vec<Function>,
    pub predicates: Vec<PredicateDef>,
}

impl Program {
    /// Validate the whole unit: per-function structure plus cross-function
    /// call targets and arities.
    pub fn validate(&self) -> Result<(), EngineError> {
        let mut names = BTreeSet::new();
        for func in &self.functions {
            if !names.insert(func.name.as_str()) {
                return Err(EngineError::InvalidProgram(format!(
                    "duplicate function `{}`",
                    func.name
                )));
            }
        }
        for func in &self.functions {
            func.validate()?;
            self.validate_calls(&func.body, &func.name)?;
        }
        Ok(())
    }

    pub fn find(&self, name: &str) -> Option<&Function> {
        self.functions.iter().find(|f| f.name == name)
    }

    fn validate_calls(&self, block: &[Statement], caller: &str) -> Result<(), EngineError> {
        for stmt in block {
            match stmt {
                Statement::Call {
                    dest, callee, args, ..
                } => {
                    let Some(target) = self.find(callee) else {
                        return Err(EngineError::InvalidProgram(format!(
                            "function `{caller}` calls unknown function `{callee}`"
                        )));
                    };
                    if target.params.len() != args.len() {
                        return Err(EngineError::InvalidProgram(format!(
                            "function `{caller}` calls `{callee}` with {} argument(s), expected {}",
                            args.len(),
                            target.params.len()
                        )));
                    }
                    if dest.is_some() && !target.returns_value {
                        return Err(EngineError::InvalidProgram(format!(
                            "function `{caller}` binds the unit result of `{callee}`"
                        )));
                    }
                }
                Statement::If {
                    then_body,
                    else_body,
                    ..
                } => {
                    self.validate_calls(then_body, caller)?;
                    self.validate_calls(else_body, caller)?;
                }
                Statement::While { body, .. } => self.validate_calls(body, caller)?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_fn(name: &str, params: &[&str], locals: &[&str], body: Vec<Statement>) -> Function {
        Function {
            name: name.to_string(),
            params: params.iter().map(|s| s.to_string()).collect(),
            locals: locals.iter().map(|s| s.to_string()).collect(),
            returns_value: false,
            contract: Contract::trivial(),
            body,
        }
    }

    #[test]
    fn display_statements() {
        assert_eq!(
            Statement::Assign {
                dest: "x".into(),
                value: Expr::Nil
            }
            .to_string(),
            "x := nil"
        );
        assert_eq!(
            Statement::Load {
                dest: "t".into(),
                src: "p".into(),
                field: "next".into()
            }
            .to_string(),
            "t := p.next"
        );
        assert_eq!(
            Statement::Store {
                dest: "p".into(),
                field: "val".into(),
                value: Expr::Int(3)
            }
            .to_string(),
            "p.val := 3"
        );
        assert_eq!(
            Statement::Alloc {
                dest: "n".into(),
                fields: vec!["val".into(), "next".into()]
            }
            .to_string(),
            "n := new(val, next)"
        );
        assert_eq!(
            Statement::Free {
                target: "p".into()
            }
            .to_string(),
            "free p"
        );
        assert_eq!(Statement::Return { value: None }.to_string(), "return");
        assert_eq!(
            Statement::Call {
                dest: Some("r".into()),
                callee: "mk".into(),
                args: vec![Expr::Int(1)]
            }
            .to_string(),
            "r := mk(1)"
        );
    }

    #[test]
    fn validate_accepts_wellformed() {
        let func = unit_fn(
            "f",
            &["p"],
            &["t"],
            vec![
                Statement::Assign {
                    dest: "t".into(),
                    value: Expr::var("p"),
                },
                Statement::Return { value: None },
            ],
        );
        assert!(func.validate().is_ok());
    }

    #[test]
    fn validate_rejects_undeclared_variable() {
        let func = unit_fn(
            "f",
            &[],
            &[],
            vec![Statement::Assign {
                dest: "x".into(),
                value: Expr::Int(0),
            }],
        );
        let err = func.validate().unwrap_err();
        assert!(err.to_string().contains("not declared"));
    }

    #[test]
    fn validate_rejects_parameter_assignment() {
        let func = unit_fn(
            "f",
            &["p"],
            &[],
            vec![Statement::Assign {
                dest: "p".into(),
                value: Expr::Nil,
            }],
        );
        let err = func.validate().unwrap_err();
        assert!(err.to_string().contains("immutable"));
    }

    #[test]
    fn validate_rejects_non_boolean_condition() {
        let func = unit_fn(
            "f",
            &["p"],
            &[],
            vec![Statement::If {
                cond: Expr::var("p"),
                then_body: vec![],
                else_body: vec![],
            }],
        );
        let err = func.validate().unwrap_err();
        assert!(err.to_string().contains("not boolean"));
    }

    #[test]
    fn validate_rejects_unit_mismatch() {
        let func = unit_fn(
            "f",
            &[],
            &[],
            vec![Statement::Return {
                value: Some(Expr::Int(1)),
            }],
        );
        let err = func.validate().unwrap_err();
        assert!(err.to_string().contains("declared unit"));
    }

    #[test]
    fn program_rejects_unknown_callee() {
        let program = Program {
            functions: vec![unit_fn(
                "main",
                &[],
                &[],
                vec![Statement::Call {
                    dest: None,
                    callee: "missing".into(),
                    args: vec![],
                }],
            )],
            predicates: vec![],
        };
        let err = program.validate().unwrap_err();
        assert!(err.to_string().contains("unknown function"));
    }

    #[test]
    fn program_rejects_arity_mismatch() {
        let callee = unit_fn("g", &["a"], &[], vec![]);
        let caller = unit_fn(
            "main",
            &[],
            &[],
            vec![Statement::Call {
                dest: None,
                callee: "g".into(),
                args: vec![],
            }],
        );
        let program = Program {
            functions: vec![caller, callee],
            predicates: vec![],
        };
        let err = program.validate().unwrap_err();
        assert!(err.to_string().contains("expected 1"));
    }

    #[test]
    fn program_rejects_binding_unit_result() {
        let callee = unit_fn("g", &[], &[], vec![]);
        let caller = unit_fn(
            "main",
            &[],
            &["r"],
            vec![Statement::Call {
                dest: Some("r".into()),
                callee: "g".into(),
                args: vec![],
            }],
        );
        let program = Program {
            functions: vec![caller, callee],
            predicates: vec![],
        };
        let err = program.validate().unwrap_err();
        assert!(err.to_string().contains("unit result"));
    }
}
