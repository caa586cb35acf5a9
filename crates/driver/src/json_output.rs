//! Structured JSON output for verification results.
//!
//! Machine-readable mirror of the report for editor/CI integration. JSON
//! goes to stdout only; progress and warnings stay on stderr.

use serde::{Deserialize, Serialize};

use heap_fv_analysis::Verdict;

use crate::report::Report;

/// Complete verification report in JSON format.
#[derive(Serialize, Deserialize)]
pub struct JsonReport {
    pub functions: Vec<JsonFunctionReport>,
    pub summary: JsonSummary,
}

/// Per-function verification result in JSON format.
#[derive(Serialize, Deserialize)]
pub struct JsonFunctionReport {
    pub name: String,
    /// "verified", "violated", "unknown", or "internal-error"
    pub status: String,
    /// Human-readable detail: violation kind, unknown reason, or error.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Witness execution path for violations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub witness_path: Option<Vec<String>>,
    /// The failing proof obligation for violations, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failing_obligation: Option<String>,
    pub duration_ms: u64,
}

/// Summary of all verification results.
#[derive(Serialize, Deserialize)]
pub struct JsonSummary {
    pub total: usize,
    pub verified: usize,
    pub violated: usize,
    pub unknown: usize,
    pub internal_errors: usize,
}

/// Convert a report into its JSON form.
pub fn json_report(report: &Report) -> JsonReport {
    let functions = report
        .functions
        .iter()
        .map(|func| {
            let (status, detail, witness_path, failing_obligation) = match &func.verdict {
                Verdict::Verified => ("verified", None, None, None),
                Verdict::Violated(violation) => (
                    "violated",
                    Some(violation.kind.to_string()),
                    Some(
                        violation
                            .path
                            .iter()
                            .map(|step| step.statement.clone())
                            .collect(),
                    ),
                    violation.obligation.clone(),
                ),
                Verdict::Unknown(reason) => ("unknown", Some(reason.to_string()), None, None),
                Verdict::InternalError(msg) => {
                    ("internal-error", Some(msg.clone()), None, None)
                }
            };
            JsonFunctionReport {
                name: func.name.clone(),
                status: status.to_string(),
                detail,
                witness_path,
                failing_obligation,
                duration_ms: func.duration_ms,
            }
        })
        .collect();

    let (verified, violated, unknown, internal_errors) = report.counts();
    JsonReport {
        functions,
        summary: JsonSummary {
            total: report.functions.len(),
            verified,
            violated,
            unknown,
            internal_errors,
        },
    }
}

/// Render a report as pretty-printed JSON.
pub fn render_json(report: &Report) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(&json_report(report))
}

/// Print a JSON verification report to stdout.
pub fn print_json_report(report: &Report) {
    match render_json(report) {
        Ok(json) => println!("{json}"),
        Err(err) => {
            eprintln!("[heap-fv] error serializing JSON report: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FunctionReport;
    use heap_fv_analysis::state::PathStep;
    use heap_fv_analysis::{UnknownReason, Violation, ViolationKind};

    fn sample_report() -> Report {
        Report {
            functions: vec![
                FunctionReport {
                    name: "good".into(),
                    verdict: Verdict::Verified,
                    duration_ms: 2,
                },
                FunctionReport {
                    name: "bad".into(),
                    verdict: Verdict::Violated(Violation {
                        kind: ViolationKind::NullOrDanglingDereference,
                        obligation: Some("cannot derive `p |-> {val: v}` from `emp`".into()),
                        path: vec![PathStep::new("free p"), PathStep::new("t := p.val")],
                    }),
                    duration_ms: 5,
                },
                FunctionReport {
                    name: "stuck".into(),
                    verdict: Verdict::Unknown(UnknownReason::MissingLoopInvariant),
                    duration_ms: 1,
                },
            ],
        }
    }

    #[test]
    fn summary_counts_round_trip() {
        let json = render_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["summary"]["total"], 3);
        assert_eq!(value["summary"]["verified"], 1);
        assert_eq!(value["summary"]["violated"], 1);
        assert_eq!(value["summary"]["unknown"], 1);
        assert_eq!(value["summary"]["internal_errors"], 0);
    }

    #[test]
    fn violation_carries_path_and_obligation() {
        let json = render_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let bad = &value["functions"][1];
        assert_eq!(bad["status"], "violated");
        assert_eq!(bad["witness_path"][1], "t := p.val");
        assert!(bad["failing_obligation"]
            .as_str()
            .unwrap()
            .contains("cannot derive"));
    }

    #[test]
    fn verified_entry_omits_optional_fields() {
        let json = render_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let good = &value["functions"][0];
        assert_eq!(good["status"], "verified");
        assert!(good.get("detail").is_none());
        assert!(good.get("witness_path").is_none());
    }

    #[test]
    fn unknown_entry_has_reason_detail() {
        let json = render_json(&sample_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let stuck = &value["functions"][2];
        assert_eq!(stuck["status"], "unknown");
        assert_eq!(stuck["detail"], "missing loop invariant");
    }
}
