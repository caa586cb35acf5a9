//! SMT-LIB2 text formatting.
//!
//! `Display` impls for [`Sort`], [`Term`], [`Command`] and [`Script`], so a
//! script can be piped to a solver with `to_string()`. One command per line;
//! terms render in fully parenthesized prefix form.

use std::fmt;

use crate::command::Command;
use crate::script::Script;
use crate::sort::Sort;
use crate::term::Term;

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sort::Bool => write!(f, "Bool"),
            Sort::Int => write!(f, "Int"),
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::BoolLit(true) => write!(f, "true"),
            Term::BoolLit(false) => write!(f, "false"),
            Term::IntLit(n) => {
                if *n < 0 {
                    // SMT-LIB has no negative literals; render as unary minus
                    write!(f, "(- {})", n.unsigned_abs())
                } else {
                    write!(f, "{n}")
                }
            }
            Term::Const(name) => write!(f, "{name}"),
            Term::Not(t) => write!(f, "(not {t})"),
            Term::And(terms) => write_nary(f, "and", terms),
            Term::Or(terms) => write_nary(f, "or", terms),
            Term::Implies(a, b) => write!(f, "(=> {a} {b})"),
            Term::Eq(a, b) => write!(f, "(= {a} {b})"),
            Term::Distinct(terms) => write_nary(f, "distinct", terms),
            Term::Ite(c, t, e) => write!(f, "(ite {c} {t} {e})"),
            Term::IntAdd(a, b) => write!(f, "(+ {a} {b})"),
            Term::IntSub(a, b) => write!(f, "(- {a} {b})"),
            Term::IntMul(a, b) => write!(f, "(* {a} {b})"),
            Term::IntNeg(a) => write!(f, "(- {a})"),
            Term::IntLt(a, b) => write!(f, "(< {a} {b})"),
            Term::IntLe(a, b) => write!(f, "(<= {a} {b})"),
            Term::IntGt(a, b) => write!(f, "(> {a} {b})"),
            Term::IntGe(a, b) => write!(f, "(>= {a} {b})"),
            Term::App(func, args) => {
                write!(f, "({func}")?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                write!(f, ")")
            }
        }
    }
}

fn write_nary(f: &mut fmt::Formatter<'_>, op: &str, terms: &[Term]) -> fmt::Result {
    write!(f, "({op}")?;
    for t in terms {
        write!(f, " {t}")?;
    }
    write!(f, ")")
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::SetLogic(logic) => write!(f, "(set-logic {logic})"),
            Command::SetOption(key, value) => write!(f, "(set-option :{key} {value})"),
            Command::DeclareConst(name, sort) => write!(f, "(declare-const {name} {sort})"),
            Command::DeclareFun(name, params, ret) => {
                write!(f, "(declare-fun {name} (")?;
                for (i, s) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{s}")?;
                }
                write!(f, ") {ret})")
            }
            Command::Assert(term) => write!(f, "(assert {term})"),
            Command::CheckSat => write!(f, "(check-sat)"),
            Command::GetModel => write!(f, "(get-model)"),
            Command::Push(n) => write!(f, "(push {n})"),
            Command::Pop(n) => write!(f, "(pop {n})"),
            Command::Echo(msg) => write!(f, "(echo \"{msg}\")"),
            Command::Comment(text) => write!(f, ";; {text}"),
            Command::Exit => write!(f, "(exit)"),
        }
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for cmd in self.commands() {
            writeln!(f, "{cmd}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_sorts() {
        assert_eq!(Sort::Bool.to_string(), "Bool");
        assert_eq!(Sort::Int.to_string(), "Int");
    }

    #[test]
    fn format_int_lit() {
        assert_eq!(Term::IntLit(42).to_string(), "42");
    }

    #[test]
    fn format_negative_int_lit() {
        assert_eq!(Term::IntLit(-5).to_string(), "(- 5)");
    }

    #[test]
    fn format_min_int_lit() {
        // i64::MIN has no positive counterpart; unsigned_abs avoids overflow
        assert_eq!(
            Term::IntLit(i64::MIN).to_string(),
            format!("(- {})", 1u64 << 63)
        );
    }

    #[test]
    fn format_and() {
        let t = Term::And(vec![Term::var("a"), Term::var("b")]);
        assert_eq!(t.to_string(), "(and a b)");
    }

    #[test]
    fn format_distinct() {
        let t = Term::Distinct(vec![Term::var("x"), Term::var("y"), Term::IntLit(0)]);
        assert_eq!(t.to_string(), "(distinct x y 0)");
    }

    #[test]
    fn format_arith_nested() {
        let t = Term::IntLt(
            Box::new(Term::IntAdd(
                Box::new(Term::var("x")),
                Box::new(Term::IntLit(1)),
            )),
            Box::new(Term::var("y")),
        );
        assert_eq!(t.to_string(), "(< (+ x 1) y)");
    }

    #[test]
    fn format_ite() {
        let t = Term::Ite(
            Box::new(Term::var("c")),
            Box::new(Term::IntLit(1)),
            Box::new(Term::IntLit(2)),
        );
        assert_eq!(t.to_string(), "(ite c 1 2)");
    }

    #[test]
    fn format_declare_const() {
        let c = Command::DeclareConst("x".to_string(), Sort::Int);
        assert_eq!(c.to_string(), "(declare-const x Int)");
    }

    #[test]
    fn format_declare_fun() {
        let c = Command::DeclareFun("f".to_string(), vec![Sort::Int, Sort::Int], Sort::Bool);
        assert_eq!(c.to_string(), "(declare-fun f (Int Int) Bool)");
    }

    #[test]
    fn format_assert() {
        let c = Command::Assert(Term::eq(Term::var("x"), Term::IntLit(5)));
        assert_eq!(c.to_string(), "(assert (= x 5))");
    }

    #[test]
    fn format_comment() {
        let c = Command::Comment("obligation 3".to_string());
        assert_eq!(c.to_string(), ";; obligation 3");
    }

    #[test]
    fn format_full_script() {
        let mut script = Script::new();
        script.push(Command::SetLogic("QF_LIA".to_string()));
        script.push(Command::DeclareConst("x".to_string(), Sort::Int));
        script.push(Command::Assert(Term::IntGt(
            Box::new(Term::var("x")),
            Box::new(Term::IntLit(0)),
        )));
        script.push(Command::CheckSat);

        let text = script.to_string();
        assert!(text.contains("(set-logic QF_LIA)"));
        assert!(text.contains("(declare-const x Int)"));
        assert!(text.contains("(assert (> x 0))"));
        assert!(text.ends_with("(check-sat)\n"));
    }
}
