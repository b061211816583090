//! Suite runner: opens the database, runs each step's assertion, tallies verdicts

use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, error, info, warn};

use lighttest_common::{AssertionDefaults, QueryAsserter, QueryReport, QueryResult, Verdict};
use lighttest_sql::{Database, SqlConnection};

use crate::error::{RunnerError, RunnerResult};
use crate::spec::{StepSpec, SuiteSpec};

/// File written by [`write_results`]
pub const RESULTS_FILE: &str = "test-results.json";

/// How a single step ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    Slow,
    Unrecognisable,
    /// The step could not be run at all (bad step definition)
    Error,
    /// A critical step before it failed
    Skipped,
}

impl StepStatus {
    /// Whether the step counts as passed. An unrecognisable step is a
    /// negative step whose rows did not match: no error was detected.
    pub fn is_pass(self) -> bool {
        matches!(self, StepStatus::Passed | StepStatus::Unrecognisable)
    }
}

impl From<Verdict> for StepStatus {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Successful => StepStatus::Passed,
            Verdict::Failed => StepStatus::Failed,
            Verdict::Slow => StepStatus::Slow,
            Verdict::Unrecognisable => StepStatus::Unrecognisable,
        }
    }
}

/// Result of one step
#[derive(Debug, Clone, Serialize)]
pub struct StepResult {
    pub alias: String,
    pub status: StepStatus,
    pub duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<QueryReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StepResult {
    fn skipped(alias: &str) -> Self {
        Self {
            alias: alias.to_string(),
            status: StepStatus::Skipped,
            duration_ms: 0,
            report: None,
            error: None,
        }
    }
}

/// Result of one suite
#[derive(Debug, Clone, Serialize)]
pub struct SuiteResult {
    pub name: String,
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub slow: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub steps: Vec<StepResult>,
}

impl SuiteResult {
    fn tally(name: &str, steps: Vec<StepResult>, duration_ms: u64) -> Self {
        let count = |pred: fn(StepStatus) -> bool| steps.iter().filter(|s| pred(s.status)).count();
        Self {
            name: name.to_string(),
            total: steps.len(),
            passed: count(StepStatus::is_pass),
            failed: count(|s| matches!(s, StepStatus::Failed | StepStatus::Error)),
            slow: count(|s| s == StepStatus::Slow),
            skipped: count(|s| s == StepStatus::Skipped),
            duration_ms,
            steps,
        }
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.slow == 0
    }
}

/// Results across every suite of a run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub slow: usize,
    pub skipped: usize,
    pub duration_ms: u64,
    pub suites: Vec<SuiteResult>,
}

impl RunSummary {
    pub fn is_success(&self) -> bool {
        self.suites.iter().all(SuiteResult::is_success)
    }
}

/// Runner configuration
#[derive(Debug, Clone, Default)]
pub struct RunnerConfig {
    /// Baseline options; suite and step overrides layer on top
    pub defaults: AssertionDefaults,

    /// Database used by every suite, overriding the suites' own
    pub database: Option<PathBuf>,

    /// Where to write `test-results.json`
    pub output_dir: Option<PathBuf>,
}

/// Runs suites step by step
pub struct SuiteRunner {
    config: RunnerConfig,
}

impl SuiteRunner {
    pub fn new(config: RunnerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Run every suite in order
    pub fn run_suites(&self, specs: &[SuiteSpec]) -> RunnerResult<RunSummary> {
        let start = Instant::now();
        info!("Running {} suite(s)...", specs.len());

        let mut suites = Vec::with_capacity(specs.len());
        for spec in specs {
            suites.push(self.run_suite(spec)?);
        }

        let summary = RunSummary {
            total: suites.iter().map(|s| s.total).sum(),
            passed: suites.iter().map(|s| s.passed).sum(),
            failed: suites.iter().map(|s| s.failed).sum(),
            slow: suites.iter().map(|s| s.slow).sum(),
            skipped: suites.iter().map(|s| s.skipped).sum(),
            duration_ms: start.elapsed().as_millis() as u64,
            suites,
        };

        info!(
            "Results: {} passed, {} failed, {} slow, {} skipped ({} ms)",
            summary.passed, summary.failed, summary.slow, summary.skipped, summary.duration_ms
        );

        if let Some(dir) = &self.config.output_dir {
            write_results(&summary, dir)?;
        }
        Ok(summary)
    }

    /// Run a single suite. Setup or database failures abort the suite;
    /// step failures are recorded and the run continues.
    pub fn run_suite(&self, spec: &SuiteSpec) -> RunnerResult<SuiteResult> {
        let start = Instant::now();
        info!("Suite: {}", spec.name);

        let conn = SqlConnection::new(self.open_database(spec)?);
        for batch in &spec.setup {
            conn.database().execute_batch(batch)?;
        }

        let defaults = self.config.defaults.merged(&spec.defaults)?;
        let asserter = QueryAsserter::new(defaults);

        let mut steps = Vec::with_capacity(spec.steps.len());
        let mut halted_by: Option<&str> = None;

        for step in &spec.steps {
            if let Some(critical) = halted_by {
                debug!(step = %step.alias, "skipped after critical step '{}'", critical);
                steps.push(StepResult::skipped(&step.alias));
                continue;
            }

            let step_start = Instant::now();
            let (result, fatal) = match run_step(&conn, &asserter, step) {
                Ok((report, fatal)) => (
                    StepResult {
                        alias: step.alias.clone(),
                        status: report.verdict.into(),
                        duration_ms: step_start.elapsed().as_millis() as u64,
                        report: Some(report),
                        error: None,
                    },
                    fatal,
                ),
                Err(e) => {
                    error!("✗ {} - {}", step.alias, e);
                    let critical = step
                        .options
                        .critical_step
                        .unwrap_or(asserter.defaults().critical_step);
                    (
                        StepResult {
                            alias: step.alias.clone(),
                            status: StepStatus::Error,
                            duration_ms: step_start.elapsed().as_millis() as u64,
                            report: None,
                            error: Some(e.to_string()),
                        },
                        critical,
                    )
                }
            };

            match result.status {
                StepStatus::Passed => info!("✓ {} ({} ms)", result.alias, result.duration_ms),
                StepStatus::Error => {}
                status => warn!("✗ {} ({:?})", result.alias, status),
            }

            if fatal {
                warn!("critical step '{}' failed, skipping the rest of '{}'", step.alias, spec.name);
                halted_by = Some(step.alias.as_str());
            }
            steps.push(result);
        }

        Ok(SuiteResult::tally(
            &spec.name,
            steps,
            start.elapsed().as_millis() as u64,
        ))
    }

    fn open_database(&self, spec: &SuiteSpec) -> RunnerResult<Database> {
        let db = match self.config.database.as_ref().or(spec.database.as_ref()) {
            Some(path) => Database::open(path)?,
            None => Database::open_memory()?,
        };
        Ok(db)
    }
}

/// Execute the step's query and assert on it; returns the report and whether
/// the outcome halts the suite
fn run_step(
    conn: &SqlConnection,
    asserter: &QueryAsserter,
    step: &StepSpec,
) -> RunnerResult<(QueryReport, bool)> {
    let mut actual = execute(conn, step)?;
    let mut strategy = step.assert.build(conn, &step.alias)?;
    let outcome = asserter.run(strategy.as_mut(), &mut actual, &step.options)?;
    let fatal = outcome.is_fatal();
    Ok((outcome.report, fatal))
}

fn execute(conn: &SqlConnection, step: &StepSpec) -> RunnerResult<QueryResult> {
    if let Some(select) = &step.select {
        let columns: Vec<&str> = select.columns.iter().map(String::as_str).collect();
        return Ok(conn.select_by_params(
            &select.table,
            &columns,
            &select.filter_column,
            &select.params,
            &step.alias,
        )?);
    }
    match &step.query {
        Some(query) => Ok(conn.query_by_text(query, &step.alias)),
        None => Err(RunnerError::InvalidStep {
            step: step.alias.clone(),
            reason: "needs either `query` or `select`".to_string(),
        }),
    }
}

/// Write the run summary as JSON into `dir`
pub fn write_results(summary: &RunSummary, dir: &Path) -> RunnerResult<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(RESULTS_FILE);
    let json = serde_json::to_string_pretty(summary)?;
    std::fs::write(&path, json)?;
    info!("Results written to {}", path.display());
    Ok(path)
}
