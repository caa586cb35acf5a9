use crate::error::SolverError;
use crate::model::Model;
use crate::result::SolverResult;

/// Parse the solver's stdout into a `SolverResult`.
///
/// Expected output format:
/// - First non-empty line: `sat`, `unsat`, or `unknown`
/// - If `sat`: subsequent lines may contain the model from `(get-model)`
pub fn parse_solver_output(stdout: &str, stderr: &str) -> Result<SolverResult, SolverError> {
    let stdout = stdout.trim();

    if stdout.is_empty() {
        // Check stderr for clues
        if stderr.contains("timeout") {
            return Ok(SolverResult::Unknown("timeout".to_string()));
        }
        return Err(SolverError::ParseError(format!(
            "Empty solver output. stderr: {stderr}"
        )));
    }

    let first_line = stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or("");

    match first_line {
        "unsat" => Ok(SolverResult::Unsat),
        "sat" => {
            let model = parse_model(stdout);
            Ok(SolverResult::Sat(model))
        }
        "unknown" => {
            let reason = extract_unknown_reason(stdout, stderr);
            Ok(SolverResult::Unknown(reason))
        }
        "timeout" => Ok(SolverResult::Unknown("timeout".to_string())),
        _ => Err(SolverError::ParseError(format!(
            "Unexpected solver output: {first_line}"
        ))),
    }
}

/// Extract the reason string for an "unknown" result.
fn extract_unknown_reason(stdout: &str, stderr: &str) -> String {
    // Z3 sometimes prints the reason after "unknown"
    let after_unknown = stdout
        .lines()
        .skip_while(|line| line.trim() != "unknown")
        .skip(1)
        .map(str::trim)
        .find(|line| !line.is_empty());

    if let Some(reason) = after_unknown {
        // Clean up parenthesized reasons like "(timeout)"
        reason
            .trim_start_matches('(')
            .trim_end_matches(')')
            .to_string()
    } else if !stderr.is_empty() {
        stderr.trim().to_string()
    } else {
        "unknown".to_string()
    }
}

/// Parse a model from `(get-model)` output.
///
/// Both known layouts are handled:
///
/// ```text
/// (                              (model
///   (define-fun x () Int           (define-fun x () Int 5)
///     5)                         )
/// )
/// ```
///
/// Only nullary `define-fun` entries (constants) are extracted; anything
/// else in the model block is skipped. A malformed model block degrades to
/// `None` rather than an error — the sat/unsat answer is already parsed.
fn parse_model(output: &str) -> Option<Model> {
    if !output.contains("(define-fun ") {
        return None;
    }

    let mut assignments = Vec::new();
    let mut pos = 0;

    while let Some(def_pos) = output[pos..].find("(define-fun ") {
        let abs_pos = pos + def_pos;
        let Some(end) = find_sexp_end(output, abs_pos) else {
            break;
        };
        let body = &output[abs_pos + "(define-fun ".len()..end - 1];
        if let Some((name, value)) = parse_define_fun(body) {
            assignments.push((name, value));
        }
        pos = end;
    }

    if assignments.is_empty() {
        None
    } else {
        Some(Model::with_assignments(assignments))
    }
}

/// Find the position one past the closing paren of the s-expression starting
/// at `start` (which must point at a `(`).
fn find_sexp_end(text: &str, start: usize) -> Option<usize> {
    let bytes = text.as_bytes();
    let mut depth = 0usize;
    for (i, &b) in bytes.iter().enumerate().skip(start) {
        match b {
            b'(' => depth += 1,
            b')' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse the body of a nullary `define-fun`: `name () Sort value`.
///
/// Returns `None` for functions with parameters.
fn parse_define_fun(body: &str) -> Option<(String, String)> {
    let body = body.trim();
    let name_end = body.find(|c: char| c.is_whitespace())?;
    let name = &body[..name_end];
    let rest = body[name_end..].trim_start();

    // Nullary functions have "()" next; anything else has parameters.
    let rest = rest.strip_prefix("()")?.trim_start();

    // Skip the sort token (a word or a parenthesized sort).
    let value_start = if rest.starts_with('(') {
        find_sexp_end(rest, 0)?
    } else {
        rest.find(|c: char| c.is_whitespace())?
    };
    let value = rest[value_start..].trim();
    if value.is_empty() {
        return None;
    }

    // Normalize "(- 5)" to "-5" for readability.
    let value = if value.starts_with("(-") && value.ends_with(')') {
        let inner = value[2..value.len() - 1].trim();
        format!("-{inner}")
    } else {
        value.to_string()
    };

    Some((name.to_string(), value))
}
