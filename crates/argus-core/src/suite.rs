//! Predefined-test mode: each test's captured output is checked against
//! its expected stdout/stderr patterns.

use argus_grammar::BasicTest;
use argus_ir::output::{Output, RunStatus};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuiteResult {
    /// Position of the test in the bounds document.
    pub index: usize,
    pub args: Vec<String>,
    pub passed: bool,
    /// How the subject ended; `None` when it never produced output.
    pub status: Option<RunStatus>,
    /// Why the test failed.
    pub reason: Option<String>,
}

pub fn evaluate(index: usize, test: &BasicTest, output: &Output) -> SuiteResult {
    let reason = match &output.status {
        RunStatus::TimedOut => Some("timed out".to_string()),
        RunStatus::Aborted => Some("aborted".to_string()),
        RunStatus::Exited { .. } if !test.matches(&output.stdout, &output.stderr) => {
            Some("output did not match expectations".to_string())
        }
        RunStatus::Exited { .. } => None,
    };
    SuiteResult {
        index,
        args: test.args.clone(),
        passed: reason.is_none(),
        status: Some(output.status.clone()),
        reason,
    }
}

pub fn sandbox_failure(index: usize, test: &BasicTest, message: &str) -> SuiteResult {
    SuiteResult {
        index,
        args: test.args.clone(),
        passed: false,
        status: None,
        reason: Some(format!("sandbox failure: {message}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use argus_grammar::{compile, MatchPolicy};
    use argus_ir::parse_bounds;

    fn version_test() -> BasicTest {
        let bounds = parse_bounds(
            r#"{ "parameters": [], "tests": [
                { "args": ["--version"], "stdout": "tool \\d+\\.\\d+", "stderr": "" }
            ] }"#,
        )
        .unwrap();
        compile(&bounds, MatchPolicy::Union).unwrap().tests.remove(0)
    }

    fn output(stdout: &str, stderr: &str, status: RunStatus) -> Output {
        let mut out = Output::new(vec!["--version".into()], status);
        out.stdout = stdout.to_string();
        out.stderr = stderr.to_string();
        out
    }

    #[test]
    fn test_matching_output_passes() {
        let out = output("tool 1.2\n", "", RunStatus::Exited { code: Some(0) });
        let result = evaluate(0, &version_test(), &out);
        assert!(result.passed);
        assert!(result.reason.is_none());
    }

    #[test]
    fn test_unexpected_stderr_fails() {
        let out = output("tool 1.2\n", "warning\n", RunStatus::Exited { code: Some(0) });
        let result = evaluate(3, &version_test(), &out);
        assert!(!result.passed);
        assert_eq!(result.index, 3);
    }

    #[test]
    fn test_timeout_fails_even_if_output_matches() {
        let out = output("tool 1.2\n", "", RunStatus::TimedOut);
        assert!(!evaluate(0, &version_test(), &out).passed);
    }

    #[test]
    fn test_sandbox_failure_result() {
        let result = sandbox_failure(1, &version_test(), "denied");
        assert!(!result.passed);
        assert_eq!(result.reason.as_deref(), Some("sandbox failure: denied"));
    }
}
