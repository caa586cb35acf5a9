//! Aggregated verification report.

use heap_fv_analysis::Verdict;

/// Verdict for one function, with timing.
#[derive(Debug, Clone)]
pub struct FunctionReport {
    pub name: String,
    pub verdict: Verdict,
    pub duration_ms: u64,
}

/// One record per function, in input order.
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub functions: Vec<FunctionReport>,
}

impl Report {
    /// True only if every function's verdict is `Verified` — what the
    /// (external) CLI layer turns into the process exit status.
    pub fn all_verified(&self) -> bool {
        self.functions.iter().all(|f| f.verdict.is_verified())
    }

    /// Counts of (verified, violated, unknown, internal errors).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let mut verified = 0;
        let mut violated = 0;
        let mut unknown = 0;
        let mut internal = 0;
        for f in &self.functions {
            match f.verdict {
                Verdict::Verified => verified += 1,
                Verdict::Violated(_) => violated += 1,
                Verdict::Unknown(_) => unknown += 1,
                Verdict::InternalError(_) => internal += 1,
            }
        }
        (verified, violated, unknown, internal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use heap_fv_analysis::UnknownReason;

    fn entry(name: &str, verdict: Verdict) -> FunctionReport {
        FunctionReport {
            name: name.to_string(),
            verdict,
            duration_ms: 1,
        }
    }

    #[test]
    fn empty_report_is_all_verified() {
        assert!(Report::default().all_verified());
    }

    #[test]
    fn counts_partition_the_verdicts() {
        let report = Report {
            functions: vec![
                entry("a", Verdict::Verified),
                entry("b", Verdict::Unknown(UnknownReason::Timeout)),
                entry("c", Verdict::Verified),
                entry("d", Verdict::InternalError("x".into())),
            ],
        };
        assert_eq!(report.counts(), (2, 0, 1, 1));
        assert!(!report.all_verified());
    }
}
