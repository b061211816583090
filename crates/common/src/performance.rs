//! Performance gate and verdict classification

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Whether a step expects its assertion to hold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Positivity {
    #[default]
    Positive,
    Negative,
}

/// Final classification of a query-backed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Successful,
    Failed,
    Slow,
    /// Negative step whose rows did not match: no error was detected, but
    /// nothing matched either
    Unrecognisable,
}

impl Verdict {
    pub fn is_success(self) -> bool {
        self == Verdict::Successful
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Successful => "successful",
            Verdict::Failed => "failed",
            Verdict::Slow => "slow",
            Verdict::Unrecognisable => "unrecognisable",
        };
        f.write_str(s)
    }
}

/// `true` when the query finished strictly within the limit
pub fn performance_ok(elapsed: Duration, limit: Duration) -> bool {
    elapsed < limit
}

/// Whether the step counts as erroneous given its positivity. Negative
/// steps only track the logical match, never performance.
pub fn error_detected(matched: bool, performance_ok: bool, positivity: Positivity) -> bool {
    match positivity {
        Positivity::Positive => !matched || !performance_ok,
        Positivity::Negative => matched,
    }
}

/// Map (error detected, match) onto a verdict
pub fn verdict(error_detected: bool, matched: bool) -> Verdict {
    match (error_detected, matched) {
        (true, false) => Verdict::Failed,
        (true, true) => Verdict::Slow,
        (false, true) => Verdict::Successful,
        (false, false) => Verdict::Unrecognisable,
    }
}

/// Everything the classification step decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub matched: bool,
    pub performance_ok: bool,
    pub error_detected: bool,
    pub verdict: Verdict,
}

/// Fold match status, the performance gate and positivity into a verdict
pub fn classify(matched: bool, elapsed: Duration, limit: Duration, positivity: Positivity) -> Classification {
    let performance_ok = performance_ok(elapsed, limit);
    let error_detected = error_detected(matched, performance_ok, positivity);
    Classification {
        matched,
        performance_ok,
        error_detected,
        verdict: verdict(error_detected, matched),
    }
}
