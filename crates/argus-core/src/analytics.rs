//! Run-level summary data. Rendering is left to the caller; the report
//! serializes with serde.

use std::collections::BTreeMap;

use argus_ir::output::{Output, RunStatus};
use serde::{Deserialize, Serialize};

use crate::history::CoverageTotals;
use crate::limits::StopReason;
use crate::suite::SuiteResult;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunReport {
    /// Strategy that produced the argument vectors.
    pub generator: String,
    /// Tests executed, discarded ones included.
    pub tests_run: u64,
    /// Suite mode only.
    pub passed: u64,
    /// Suite mode only.
    pub failed: u64,
    pub timeouts: u64,
    pub aborted: u64,
    /// Tests discarded because the sandbox itself failed.
    pub sandbox_failures: u64,
    /// Tests whose coverage could not be collected.
    pub coverage_failures: u64,
    pub covered_lines: usize,
    pub coverable_lines: usize,
    pub coverage_percent: f64,
    /// First non-empty stderr line -> occurrences.
    pub error_signatures: BTreeMap<String, u64>,
    /// Permission event -> occurrences, summed over all tests.
    pub permissions: BTreeMap<String, u64>,
    pub suite: Vec<SuiteResult>,
    pub elapsed_secs: f64,
    pub stop_reason: Option<StopReason>,
}

impl RunReport {
    pub fn new(generator: &str) -> Self {
        Self {
            generator: generator.to_string(),
            ..Self::default()
        }
    }

    /// Account for one completed output.
    pub fn record_output(&mut self, output: &Output) {
        self.tests_run += 1;
        match output.status {
            RunStatus::TimedOut => self.timeouts += 1,
            RunStatus::Aborted => self.aborted += 1,
            RunStatus::Exited { .. } => {}
        }
        if let Some(signature) = output.error_signature() {
            *self
                .error_signatures
                .entry(signature.to_string())
                .or_insert(0) += 1;
        }
        for (event, count) in &output.permissions {
            *self.permissions.entry(event.clone()).or_insert(0) += count;
        }
    }

    /// Account for a test discarded because the sandbox failed.
    pub fn record_sandbox_failure(&mut self) {
        self.tests_run += 1;
        self.sandbox_failures += 1;
    }

    pub fn record_suite_result(&mut self, result: SuiteResult) {
        if result.passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.suite.push(result);
    }

    pub fn finish(&mut self, totals: &CoverageTotals, stop: StopReason, elapsed_secs: f64) {
        self.covered_lines = totals.covered_lines();
        self.coverable_lines = totals.coverable_lines();
        self.coverage_percent = totals.percent();
        self.stop_reason = Some(stop);
        self.elapsed_secs = elapsed_secs;
    }

    /// Number of distinct failure signatures seen.
    pub fn distinct_errors(&self) -> usize {
        self.error_signatures.len()
    }
}
