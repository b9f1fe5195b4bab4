//! The tester loop.
//!
//! One control thread generates an argument vector, runs the subject,
//! collects coverage, records the output and hands it back to the
//! generator as the prior for the next call. The pause and kill flags in
//! [`RunControl`] and the [`ResultLog`] are the only state shared with
//! other threads.

use std::path::Path;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use argus_explore::{GenerateError, Generator, TestGenerator};
use argus_grammar::compile::GrammarError;
use argus_grammar::{compile, CompiledBounds, ParameterGrammar};
use argus_ir::output::{CoverageSnapshot, Output};
use argus_ir::parse::{load_bounds, ParseError};
use argus_ir::types::TestBounds;
use argus_sandbox::{
    CoverageOracle, JsonCoverageFile, NoCoverage, ProcessSubject, SandboxError, Subject,
};

use crate::analytics::RunReport;
use crate::config::{ConfigError, RunConfig, RunMode};
use crate::control::{ResultLog, RunControl};
use crate::history::{CoverageHistory, CoverageTotals};
use crate::limits::{GoalTracker, StopReason};
use crate::logging;
use crate::suite;

/// The run cannot start.
#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Bounds error: {0}")]
    Bounds(#[from] ParseError),

    #[error("Grammar error: {0}")]
    Grammar(#[from] GrammarError),

    #[error("Subject error: {0}")]
    Subject(#[from] SandboxError),
}

#[derive(Debug, thiserror::Error)]
pub enum TesterError {
    #[error("Initialization failed: {0}")]
    Init(#[from] InitError),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerateError),
}

/// What became of one executed test.
enum Executed {
    Kept {
        output: Arc<Output>,
        coverage_failed: bool,
    },
    /// The sandbox failed; the test is not scored.
    Discarded(String),
}

pub struct Tester {
    config: RunConfig,
    grammar: Arc<ParameterGrammar>,
    bounds: CompiledBounds,
    subject: Box<dyn Subject + Send>,
    oracle: Box<dyn CoverageOracle + Send>,
    control: Arc<RunControl>,
    results: Arc<ResultLog>,
    history: CoverageHistory,
    totals: CoverageTotals,
}

impl Tester {
    /// Compile `bounds` and wire the given subject and oracle. Fails when
    /// the config or the bounds are invalid.
    pub fn new(
        config: RunConfig,
        bounds: &TestBounds,
        subject: Box<dyn Subject + Send>,
        oracle: Box<dyn CoverageOracle + Send>,
    ) -> Result<Self, TesterError> {
        config.validate().map_err(InitError::from)?;
        let bounds = compile(bounds, config.search.match_policy).map_err(InitError::from)?;

        Ok(Self {
            grammar: Arc::new(bounds.grammar.clone()),
            history: CoverageHistory::new(config.coverage.history_window),
            bounds,
            subject,
            oracle,
            control: Arc::new(RunControl::new()),
            results: Arc::new(ResultLog::new()),
            totals: CoverageTotals::new(),
            config,
        })
    }

    /// Tester for a real subject process. The program must exist.
    pub fn for_process(config: RunConfig, bounds: &TestBounds) -> Result<Self, TesterError> {
        let subject = ProcessSubject::new(config.sandbox.clone());
        let program = subject.check().map_err(InitError::from)?;
        tracing::info!(program = %program.display(), "subject located");

        let oracle: Box<dyn CoverageOracle + Send> = match &config.coverage.report_path {
            Some(path) if config.coverage.remove_after_read => {
                Box::new(JsonCoverageFile::new(path))
            }
            Some(path) => Box::new(JsonCoverageFile::new(path).keep_after_read()),
            None => Box::new(NoCoverage),
        };
        Self::new(config, bounds, Box::new(subject), oracle)
    }

    /// Load config and bounds from disk, install the fmt subscriber at the
    /// configured level, then [`Tester::for_process`].
    pub fn load(config_path: &Path, bounds_path: &Path) -> Result<Self, TesterError> {
        let config = RunConfig::load(config_path).map_err(InitError::from)?;
        if !logging::init(&config.log_level) {
            tracing::debug!("subscriber already installed, keeping it");
        }
        let bounds = load_bounds(bounds_path).map_err(InitError::from)?;
        Self::for_process(config, &bounds)
    }

    /// Handle for pausing, resuming, killing and reading progress.
    pub fn control(&self) -> Arc<RunControl> {
        self.control.clone()
    }

    pub fn results(&self) -> Arc<ResultLog> {
        self.results.clone()
    }

    pub fn grammar(&self) -> &Arc<ParameterGrammar> {
        &self.grammar
    }

    pub fn history(&mut self) -> &mut CoverageHistory {
        &mut self.history
    }

    pub fn totals(&self) -> &CoverageTotals {
        &self.totals
    }

    /// Run in the configured mode.
    pub fn run(&mut self) -> Result<RunReport, TesterError> {
        match self.config.mode {
            RunMode::Generate => {
                let mut generator = Generator::for_grammar(
                    self.grammar.clone(),
                    self.config.values.clone(),
                    self.config.search.clone(),
                );
                self.run_with(&mut generator)
            }
            RunMode::Suite => self.run_suite(),
        }
    }

    /// Generative loop driven by `generator`.
    pub fn run_with(&mut self, generator: &mut dyn TestGenerator) -> Result<RunReport, TesterError> {
        let goals = GoalTracker::new(self.config.goals.clone());
        let mut report = RunReport::new(generator.name());
        let mut prior: Option<Arc<Output>> = None;
        let mut tests_run = 0u64;

        tracing::info!(
            generator = generator.name(),
            min_tests = goals.goals().min_tests,
            wall_clock_secs = goals.goals().wall_clock_secs,
            "run started"
        );

        let stop = loop {
            if self.control.is_killed() {
                break StopReason::Killed;
            }
            if !goals.should_continue(tests_run) {
                break StopReason::GoalsReached;
            }
            if !self.wait_while_paused() {
                break StopReason::Killed;
            }

            let args = match generator.generate_next(prior.take()) {
                Ok(args) => args,
                Err(GenerateError::Exhausted) => break StopReason::GeneratorExhausted,
                Err(e) => return Err(e.into()),
            };

            let span = tracing::info_span!("test", index = tests_run);
            let _enter = span.enter();

            prior = match self.execute(args) {
                Executed::Kept {
                    output,
                    coverage_failed,
                } => {
                    report.record_output(&output);
                    report.coverage_failures += u64::from(coverage_failed);
                    Some(output)
                }
                Executed::Discarded(_) => {
                    report.record_sandbox_failure();
                    None
                }
            };
            tests_run += 1;
            self.control
                .set_percent_complete(goals.percent_complete(tests_run));
        };

        report.finish(&self.totals, stop.clone(), goals.elapsed().as_secs_f64());
        tracing::info!(
            tests = report.tests_run,
            coverage = report.coverage_percent,
            ?stop,
            "run finished"
        );
        Ok(report)
    }

    /// Run every predefined test once, in order.
    pub fn run_suite(&mut self) -> Result<RunReport, TesterError> {
        let start = Instant::now();
        let tests = self.bounds.tests.clone();
        let mut report = RunReport::new("suite");
        let mut stop = StopReason::SuiteComplete;

        for (index, test) in tests.iter().enumerate() {
            if !self.wait_while_paused() {
                stop = StopReason::Killed;
                break;
            }

            let span = tracing::info_span!("test", index);
            let _enter = span.enter();

            let result = match self.execute(test.args.clone()) {
                Executed::Kept {
                    output,
                    coverage_failed,
                } => {
                    report.record_output(&output);
                    report.coverage_failures += u64::from(coverage_failed);
                    suite::evaluate(index, test, &output)
                }
                Executed::Discarded(message) => {
                    report.record_sandbox_failure();
                    suite::sandbox_failure(index, test, &message)
                }
            };
            if !result.passed {
                tracing::info!(args = ?result.args, reason = ?result.reason, "suite test failed");
            }
            report.record_suite_result(result);
            self.control
                .set_percent_complete((index + 1) as f64 / tests.len() as f64);
        }

        if tests.is_empty() {
            self.control.set_percent_complete(1.0);
        }
        report.finish(&self.totals, stop, start.elapsed().as_secs_f64());
        Ok(report)
    }

    /// Block while paused. Returns false once killed.
    fn wait_while_paused(&self) -> bool {
        let poll = Duration::from_millis(self.config.sandbox.poll_interval_ms.max(1));
        loop {
            if self.control.is_killed() {
                return false;
            }
            if !self.control.is_paused() {
                return true;
            }
            thread::sleep(poll);
        }
    }

    fn execute(&mut self, args: Vec<String>) -> Executed {
        tracing::debug!(?args, "running subject");

        let raw = match self.subject.execute(&args, self.control.kill_flag()) {
            Ok(raw) => raw,
            Err(e) => {
                tracing::error!(error = %e, ?args, "sandbox failure, test discarded");
                return Executed::Discarded(e.to_string());
            }
        };

        let (coverage, coverage_failed) = match self.oracle.collect(&raw) {
            Ok(coverage) => (coverage, false),
            Err(e) => {
                tracing::warn!(error = %e, "coverage unavailable for this test");
                (CoverageSnapshot::new(), true)
            }
        };
        if !raw.status.is_complete() {
            tracing::warn!(status = ?raw.status, elapsed_ms = raw.elapsed_ms, "subject did not finish");
        }

        self.totals.merge(&coverage);
        self.history.push(Arc::new(coverage.clone()));

        let output = Arc::new(raw.into_output(args, coverage));
        let index = self.results.push(output.clone());
        tracing::debug!(index, status = ?output.status, "output recorded");
        Executed::Kept {
            output,
            coverage_failed,
        }
    }
}
