//! Lowering pure constraint sets to SMT-LIB scripts.
//!
//! This is the only bridge between the formula model and the external
//! oracle's wire language: every symbolic variable becomes an `Int`
//! constant, `nil` becomes the literal `0`, and each pure atom becomes one
//! assertion under `QF_LIA`.

use std::collections::BTreeSet;

use heap_fv_smtlib::{Command, Script, Sort, Term};

use crate::formula::{PureAtom, PureSet, SymExpr};

/// Build a complete satisfiability script for a pure constraint set.
pub fn pure_script(pure: &PureSet) -> Script {
    let mut script = Script::new();
    script.push(Command::SetLogic("QF_LIA".to_string()));

    let mut vars = BTreeSet::new();
    pure.vars_into(&mut vars);
    for var in &vars {
        script.push(Command::DeclareConst(var.as_str().to_string(), Sort::Int));
    }

    for atom in pure.iter() {
        script.push(Command::Assert(atom_term(atom)));
    }
    script.push(Command::CheckSat);
    script
}

/// Lower one pure atom to an SMT term.
pub fn atom_term(atom: &PureAtom) -> Term {
    let bin = |a: &SymExpr, b: &SymExpr| (Box::new(expr_term(a)), Box::new(expr_term(b)));
    match atom {
        PureAtom::Eq(a, b) => {
            let (a, b) = bin(a, b);
            Term::Eq(a, b)
        }
        PureAtom::Ne(a, b) => Term::not(Term::Eq(Box::new(expr_term(a)), Box::new(expr_term(b)))),
        PureAtom::Lt(a, b) => {
            let (a, b) = bin(a, b);
            Term::IntLt(a, b)
        }
        PureAtom::Le(a, b) => {
            let (a, b) = bin(a, b);
            Term::IntLe(a, b)
        }
        PureAtom::Gt(a, b) => {
            let (a, b) = bin(a, b);
            Term::IntGt(a, b)
        }
        PureAtom::Ge(a, b) => {
            let (a, b) = bin(a, b);
            Term::IntGe(a, b)
        }
    }
}

/// Lower one symbolic expression to an SMT term.
pub fn expr_term(expr: &SymExpr) -> Term {
    match expr {
        SymExpr::Int(n) => Term::IntLit(*n),
        SymExpr::Nil => Term::IntLit(0),
        SymExpr::Var(v) => Term::Const(v.as_str().to_string()),
        SymExpr::Add(a, b) => Term::IntAdd(Box::new(expr_term(a)), Box::new(expr_term(b))),
        SymExpr::Sub(a, b) => Term::IntSub(Box::new(expr_term(a)), Box::new(expr_term(b))),
        SymExpr::Mul(a, b) => Term::IntMul(Box::new(expr_term(a)), Box::new(expr_term(b))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(name: &str) -> SymExpr {
        SymExpr::var(name)
    }

    #[test]
    fn nil_encodes_as_zero() {
        assert_eq!(expr_term(&SymExpr::Nil), Term::IntLit(0));
    }

    #[test]
    fn disequality_encodes_as_negated_equality() {
        let t = atom_term(&PureAtom::Ne(v("x"), SymExpr::Nil));
        assert_eq!(t.to_string(), "(not (= x 0))");
    }

    #[test]
    fn arithmetic_encodes_structurally() {
        let t = atom_term(&PureAtom::Lt(
            SymExpr::Add(Box::new(v("x")), Box::new(SymExpr::Int(1))),
            v("y"),
        ));
        assert_eq!(t.to_string(), "(< (+ x 1) y)");
    }

    #[test]
    fn script_declares_each_variable_once() {
        let pure = PureSet::with(vec![
            PureAtom::Eq(v("x"), v("y")),
            PureAtom::Ne(v("x"), SymExpr::Nil),
        ]);
        let script = pure_script(&pure);
        let text = script.to_string();

        assert!(text.contains("(set-logic QF_LIA)"));
        assert_eq!(text.matches("(declare-const x Int)").count(), 1);
        assert_eq!(text.matches("(declare-const y Int)").count(), 1);
        assert!(text.contains("(assert (= x y))"));
        assert!(text.contains("(assert (not (= x 0)))"));
        assert!(script.has_check_sat());
    }

    #[test]
    fn fresh_variable_names_are_legal_symbols() {
        // `@` is legal in SMT-LIB simple symbols; make sure it survives
        let pure = PureSet::with(vec![PureAtom::Eq(v("x@3"), SymExpr::Int(1))]);
        let text = pure_script(&pure).to_string();
        assert!(text.contains("(declare-const x@3 Int)"));
    }
}
