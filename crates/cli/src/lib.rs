//! LightTest suite runner
//!
//! Loads YAML suites, runs each step's query against SQLite, and asserts on
//! the result with the strategies from `lighttest-common`.

pub mod error;
pub mod output;
pub mod runner;
pub mod spec;

pub use error::{RunnerError, RunnerResult};
pub use runner::{
    write_results, RunSummary, RunnerConfig, StepResult, StepStatus, SuiteResult, SuiteRunner,
    RESULTS_FILE,
};
pub use spec::{AssertSpec, SelectSpec, StepSpec, SuiteSpec};
