//! Driver end-to-end: program in, parallel run, report out.
//!
//! Runs over the ground oracle so the suite is deterministic and needs no
//! solver binary installed.

use heap_fv_analysis::formula::{HeapFormula, SpatialAtom, SymExpr, SymVar, SymbolicHeap};
use heap_fv_analysis::ir::{Contract, Expr, Function, Program, Statement};
use heap_fv_analysis::{Limits, Verdict, ViolationKind};
use heap_fv_driver::json_output::render_json;
use heap_fv_driver::output::print_report;
use heap_fv_driver::{verify_program, OracleChoice, VerifyOptions};

fn opts() -> VerifyOptions {
    VerifyOptions {
        jobs: 2,
        limits: Limits::default(),
        oracle: OracleChoice::Ground,
    }
}

fn list_of(name: &str) -> HeapFormula {
    HeapFormula::new(
        SymbolicHeap::with_atoms(vec![SpatialAtom::pred("list", vec![SymExpr::var(name)])])
            .unwrap(),
        heap_fv_analysis::formula::PureSet::new(),
    )
}

/// A little program unit exercising all verdict classes at once.
fn mixed_program() -> Program {
    let prepend = Function {
        name: "prepend".into(),
        params: vec!["x".into(), "d".into()],
        locals: vec!["n".into()],
        returns_value: true,
        contract: Contract {
            requires: list_of("x"),
            ensures: list_of("result"),
        },
        body: vec![
            Statement::Alloc {
                dest: "n".into(),
                fields: vec!["val".into(), "next".into()],
            },
            Statement::Store {
                dest: "n".into(),
                field: "val".into(),
                value: Expr::var("d"),
            },
            Statement::Store {
                dest: "n".into(),
                field: "next".into(),
                value: Expr::var("x"),
            },
            Statement::Return {
                value: Some(Expr::var("n")),
            },
        ],
    };
    let double_free = Function {
        name: "double_free".into(),
        params: vec!["p".into()],
        locals: vec![],
        returns_value: false,
        contract: Contract {
            requires: HeapFormula::with_exists(
                vec![SymVar::new("w")],
                SymbolicHeap::with_atoms(vec![SpatialAtom::points_to(
                    SymExpr::var("p"),
                    [("val", SymExpr::var("w"))],
                )])
                .unwrap(),
                heap_fv_analysis::formula::PureSet::new(),
            ),
            ensures: HeapFormula::emp(),
        },
        body: vec![
            Statement::Free {
                target: "p".into(),
            },
            Statement::Free {
                target: "p".into(),
            },
        ],
    };
    let unannotated_loop = Function {
        name: "unannotated_loop".into(),
        params: vec!["x".into()],
        locals: vec!["c".into()],
        returns_value: false,
        contract: Contract {
            requires: list_of("x"),
            ensures: list_of("x"),
        },
        body: vec![
            Statement::Assign {
                dest: "c".into(),
                value: Expr::var("x"),
            },
            Statement::While {
                cond: Expr::ne(Expr::var("c"), Expr::Nil),
                invariant: None,
                body: vec![Statement::Skip],
            },
        ],
    };
    Program {
        functions: vec![prepend, double_free, unannotated_loop],
        predicates: vec![],
    }
}

#[test]
fn mixed_program_produces_the_expected_verdicts() {
    let report = verify_program(&mixed_program(), &opts()).unwrap();
    assert_eq!(report.functions.len(), 3);

    assert_eq!(report.functions[0].name, "prepend");
    assert_eq!(report.functions[0].verdict, Verdict::Verified);

    assert_eq!(report.functions[1].name, "double_free");
    match &report.functions[1].verdict {
        Verdict::Violated(violation) => {
            assert_eq!(violation.kind, ViolationKind::NullOrDanglingDereference);
            assert_eq!(violation.path.last().unwrap().statement, "free p");
        }
        other => panic!("expected violation, got {other:?}"),
    }

    assert_eq!(report.functions[2].name, "unannotated_loop");
    assert!(matches!(
        report.functions[2].verdict,
        Verdict::Unknown(_)
    ));

    assert!(!report.all_verified());
    assert_eq!(report.counts(), (1, 1, 1, 0));
}

#[test]
fn parallel_and_serial_runs_agree() {
    let program = mixed_program();
    let serial = verify_program(
        &program,
        &VerifyOptions {
            jobs: 1,
            ..opts()
        },
    )
    .unwrap();
    let parallel = verify_program(
        &program,
        &VerifyOptions {
            jobs: 4,
            ..opts()
        },
    )
    .unwrap();
    let verdicts = |r: &heap_fv_driver::Report| -> Vec<Verdict> {
        r.functions.iter().map(|f| f.verdict.clone()).collect()
    };
    assert_eq!(verdicts(&serial), verdicts(&parallel));
}

#[test]
fn json_rendering_matches_the_report() {
    let report = verify_program(&mixed_program(), &opts()).unwrap();
    let json = render_json(&report).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["summary"]["total"], 3);
    assert_eq!(value["summary"]["verified"], 1);
    assert_eq!(value["functions"][0]["status"], "verified");
    assert_eq!(value["functions"][1]["status"], "violated");
    assert_eq!(
        value["functions"][1]["witness_path"]
            .as_array()
            .unwrap()
            .last()
            .unwrap(),
        "free p"
    );
    assert_eq!(value["functions"][2]["status"], "unknown");
}

#[test]
fn text_rendering_does_not_panic() {
    let report = verify_program(&mixed_program(), &opts()).unwrap();
    print_report(&report, true);
}
