//! Output formatting for run summaries

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};

use crate::runner::{RunSummary, StepResult, StepStatus};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable table format
    #[default]
    Table,
    /// JSON format
    Json,
}

fn status_cell(status: StepStatus) -> &'static str {
    match status {
        StepStatus::Passed => "✓ passed",
        StepStatus::Failed => "✗ failed",
        StepStatus::Slow => "⏱ slow",
        StepStatus::Unrecognisable => "? unrecognisable",
        StepStatus::Error => "✗ error",
        StepStatus::Skipped => "- skipped",
    }
}

fn detail_cell(step: &StepResult) -> String {
    if let Some(error) = &step.error {
        return error.clone();
    }
    match &step.report {
        Some(report) => {
            let mut detail = format!(
                "{} error(s), {} not found, {:.3}s / {:.3}s",
                report.errors.len(),
                report.not_found_rows.len(),
                report.required_time,
                report.expected_query_timelimit,
            );
            if let Some(message) = &report.error_message {
                detail.push_str(": ");
                detail.push_str(message);
            }
            detail
        }
        None => String::new(),
    }
}

/// Render a summary as a table, one row per step
pub fn render_table(summary: &RunSummary) -> String {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec!["Suite", "Step", "Assertion", "Status", "Details"]);
    for suite in &summary.suites {
        for step in &suite.steps {
            let assertion = step
                .report
                .as_ref()
                .map(|r| r.assertion_type.clone())
                .unwrap_or_default();
            table.add_row(vec![
                suite.name.clone(),
                step.alias.clone(),
                assertion,
                status_cell(step.status).to_string(),
                detail_cell(step),
            ]);
        }
    }

    format!(
        "{table}\n{} step(s): {} passed, {} failed, {} slow, {} skipped ({} ms)",
        summary.total,
        summary.passed,
        summary.failed,
        summary.slow,
        summary.skipped,
        summary.duration_ms
    )
}

/// Print a summary in the chosen format
pub fn print_summary(summary: &RunSummary, format: OutputFormat) {
    match format {
        OutputFormat::Table => println!("{}", render_table(summary)),
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(summary).unwrap_or_default());
        }
    }
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
