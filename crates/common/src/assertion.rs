//! The assertion pipeline
//!
//! ```text
//! options ──resolve──▶ ResolvedOptions
//!                         │
//! strategy.validate() ────┤   (caller misuse stops here, cursor untouched)
//!                         ▼
//! performance gate ─▶ upstream error? ──yes──▶ QueryFailed discrepancy
//!                         │ no
//!                         ▼
//!                 strategy.assert(actual)
//!                         ▼
//!                classify ─▶ Verdict ─▶ QueryReport
//! ```

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::{AssertionDefaults, AssertionOptions, ResolvedOptions};
use crate::error::Result;
use crate::performance::{classify, Classification, Verdict};
use crate::report::QueryReport;
use crate::result::QueryAssertionResult;
use crate::resultset::QueryResult;
use crate::strategy::AssertionStrategy;
use crate::value::normalize_all;

/// Everything one assertion produced
#[derive(Debug, Clone)]
pub struct AssertionOutcome {
    pub assertion: QueryAssertionResult,
    pub classification: Classification,
    pub options: ResolvedOptions,
    pub report: QueryReport,
}

impl AssertionOutcome {
    pub fn verdict(&self) -> Verdict {
        self.classification.verdict
    }

    /// A failed critical step: whatever follows should be skipped
    pub fn is_fatal(&self) -> bool {
        self.options.critical_step && self.classification.error_detected
    }
}

/// Runs strategies against query results under a set of defaults
#[derive(Debug, Clone, Default)]
pub struct QueryAsserter {
    defaults: AssertionDefaults,
}

impl QueryAsserter {
    pub fn new(defaults: AssertionDefaults) -> Self {
        Self { defaults }
    }

    pub fn defaults(&self) -> &AssertionDefaults {
        &self.defaults
    }

    /// Run `strategy` against `actual` and classify the outcome
    pub fn run(
        &self,
        strategy: &mut dyn AssertionStrategy,
        actual: &mut QueryResult,
        options: &AssertionOptions,
    ) -> Result<AssertionOutcome> {
        let resolved = options.resolve(&self.defaults)?;
        strategy.validate()?;

        let upstream_error = actual
            .error_message
            .clone()
            .filter(|m| !m.is_empty())
            .map(|m| (actual.alias.clone(), m))
            .or_else(|| {
                strategy
                    .expectation_error()
                    .map(|m| (format!("{} (expected)", actual.alias), m.to_string()))
            });

        let assertion = match &upstream_error {
            Some((alias, message)) => {
                warn!(alias = %alias, "query failed upstream, skipping {}: {}", strategy.name(), message);
                QueryAssertionResult::query_failed(alias, message)
            }
            None => strategy.assert(actual, resolved.fetch_size)?,
        };

        let classification = classify(
            assertion.is_match(),
            actual.required_time,
            resolved.performance_limit,
            resolved.positivity,
        );

        let report = self.build_report(strategy, actual, &assertion, &classification, &resolved);

        match classification.verdict {
            Verdict::Successful => debug!("{}", report.summary()),
            _ => warn!("{}", report.summary()),
        }

        Ok(AssertionOutcome {
            assertion,
            classification,
            options: resolved,
            report,
        })
    }

    fn build_report(
        &self,
        strategy: &dyn AssertionStrategy,
        actual: &QueryResult,
        assertion: &QueryAssertionResult,
        classification: &Classification,
        options: &ResolvedOptions,
    ) -> QueryReport {
        let expected_result = if options.show_expected_result {
            normalize_all(&strategy.expected_rows())
        } else {
            Vec::new()
        };
        let actual_result = if options.show_actual_result {
            normalize_all(&assertion.query_result)
        } else {
            Vec::new()
        };

        QueryReport {
            alias: actual.alias.clone(),
            assertion_type: strategy.name().to_string(),
            query: actual.query.clone(),
            expected_query_timelimit: options.performance_limit.as_secs_f64(),
            required_time: actual.required_time.as_secs_f64(),
            error_message: actual.error_message.clone().filter(|m| !m.is_empty()),
            positivity: options.positivity,
            critical_step: options.critical_step,
            verdict: classification.verdict,
            errors: assertion.errors.clone(),
            not_found_rows: normalize_all(&assertion.not_found_rows),
            expected_result,
            actual_result,
            attributes: options.attributes.clone(),
            created_at: Utc::now(),
        }
    }
}
