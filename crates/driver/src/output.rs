//! Colored verification output formatter.
//!
//! Produces per-function results with color-coded status:
//!
//! ```text
//!   [OK]        insert_after_head (3ms)
//!   [VIOLATION] use_after_free (possible null or dangling dereference at `t := p.val`)
//!   [UNKNOWN]   walk (missing loop invariant)
//!   [ERROR]     broken (invalid program: variable `ghost` is not declared)
//!
//! Summary: 1 OK, 1 VIOLATION, 1 UNKNOWN, 1 ERROR (total: 12ms)
//! ```
use colored::Colorize;

use heap_fv_analysis::Verdict;

use crate::report::Report;

/// Print verification results to stderr with colored status tags.
///
/// # Arguments
/// * `report` - Aggregated verification results
/// * `verbose` - If true, show per-function timing and witness paths
pub fn print_report(report: &Report, verbose: bool) {
    if report.functions.is_empty() {
        eprintln!("{}", "No functions to verify.".dimmed());
        return;
    }

    eprintln!();
    for func in &report.functions {
        match &func.verdict {
            Verdict::Verified => {
                let mut line = format!("  {}        {}", "[OK]".green().bold(), func.name);
                if verbose {
                    line.push_str(&format!(" ({}ms)", func.duration_ms));
                }
                eprintln!("{line}");
            }
            Verdict::Violated(violation) => {
                eprintln!(
                    "  {} {} ({violation})",
                    "[VIOLATION]".red().bold(),
                    func.name,
                );
                if verbose {
                    for step in &violation.path {
                        eprintln!("              | {step}");
                    }
                }
            }
            Verdict::Unknown(reason) => {
                eprintln!(
                    "  {}   {} ({reason})",
                    "[UNKNOWN]".yellow().bold(),
                    func.name,
                );
            }
            Verdict::InternalError(msg) => {
                eprintln!("  {}     {} ({msg})", "[ERROR]".red().bold(), func.name);
            }
        }
    }

    let (verified, violated, unknown, internal) = report.counts();
    let total_ms: u64 = report.functions.iter().map(|f| f.duration_ms).sum();

    eprintln!();
    let mut parts = Vec::new();
    if verified > 0 {
        parts.push(format!("{verified} {}", "OK".green()));
    }
    if violated > 0 {
        parts.push(format!("{violated} {}", "VIOLATION".red()));
    }
    if unknown > 0 {
        parts.push(format!("{unknown} {}", "UNKNOWN".yellow()));
    }
    if internal > 0 {
        parts.push(format!("{internal} {}", "ERROR".red()));
    }
    eprintln!("Summary: {} (total: {total_ms}ms)", parts.join(", "));
    eprintln!();
}

/// Print a header for the verification run.
pub fn print_header(unit_name: &str) {
    eprintln!("{}", format!("Verifying {unit_name}").bold());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::FunctionReport;
    use heap_fv_analysis::state::PathStep;
    use heap_fv_analysis::{UnknownReason, Violation, ViolationKind};

    fn entry(name: &str, verdict: Verdict) -> FunctionReport {
        FunctionReport {
            name: name.to_string(),
            verdict,
            duration_ms: 3,
        }
    }

    #[test]
    fn print_empty_report_does_not_panic() {
        print_report(&Report::default(), false);
    }

    #[test]
    fn print_mixed_report_does_not_panic() {
        let report = Report {
            functions: vec![
                entry("good", Verdict::Verified),
                entry(
                    "bad",
                    Verdict::Violated(Violation {
                        kind: ViolationKind::NullOrDanglingDereference,
                        obligation: None,
                        path: vec![PathStep::new("free p"), PathStep::new("t := p.val")],
                    }),
                ),
                entry("stuck", Verdict::Unknown(UnknownReason::Timeout)),
                entry("broken", Verdict::InternalError("oops".into())),
            ],
        };
        print_report(&report, false);
        print_report(&report, true);
    }

    #[test]
    fn print_header_does_not_panic() {
        print_header("demo_unit");
    }
}
