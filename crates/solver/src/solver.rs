use std::io::Write;
use std::process::{Command, Stdio};

use heap_fv_smtlib::script::Script;

use crate::config::SolverConfig;
use crate::error::SolverError;
use crate::parser::parse_solver_output;
use crate::result::SolverResult;

/// Subprocess SMT solver interface.
///
/// Communicates with the configured solver by spawning it as a subprocess
/// and piping SMT-LIB2 text to stdin. Each `check_sat` call is a fresh
/// process, so concurrent verification tasks never share solver state.
#[derive(Debug)]
pub struct SmtSolver {
    config: SolverConfig,
}

impl SmtSolver {
    /// Create a new `SmtSolver` with the given configuration.
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    /// Create an `SmtSolver` with an auto-detected backend and default settings.
    pub fn with_default_config() -> Result<Self, SolverError> {
        let config = SolverConfig::auto_detect()?;
        Ok(Self { config })
    }

    /// Get a reference to the solver configuration.
    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Check satisfiability of a `Script`.
    ///
    /// Renders the script to SMT-LIB2 text, appends `(check-sat)` if the
    /// script lacks one, and runs the solver.
    pub fn check_sat(&self, script: &Script) -> Result<SolverResult, SolverError> {
        let mut smtlib = script.to_string();
        if !script.has_check_sat() {
            smtlib.push_str("(check-sat)\n");
        }
        self.check_sat_raw(&smtlib)
    }

    /// Check satisfiability from a raw SMT-LIB2 string.
    pub fn check_sat_raw(&self, smtlib: &str) -> Result<SolverResult, SolverError> {
        self.config.validate()?;

        let args = self.config.build_args();

        let mut child = Command::new(&self.config.solver_path)
            .args(&args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| SolverError::ProcessError(format!("Failed to start solver: {e}")))?;

        // Write SMT-LIB to stdin
        {
            let stdin = child.stdin.as_mut().ok_or_else(|| {
                SolverError::ProcessError("Failed to open solver stdin".to_string())
            })?;
            stdin.write_all(smtlib.as_bytes()).map_err(|e| {
                SolverError::ProcessError(format!("Failed to write to solver stdin: {e}"))
            })?;
        }

        // Wait for the solver to finish and collect output
        let output = child
            .wait_with_output()
            .map_err(|e| SolverError::ProcessError(format!("Failed to wait for solver: {e}")))?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);

        // Solvers report timeouts in several shapes; normalize here
        if stderr.contains("timeout") || stdout.trim() == "timeout" {
            return Ok(SolverResult::Unknown("timeout".to_string()));
        }

        parse_solver_output(&stdout, &stderr)
    }
}
