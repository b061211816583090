//! LightTest CLI - Main Entry Point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use lighttest_cli::output::{self, OutputFormat};
use lighttest_cli::{RunnerConfig, SuiteRunner, SuiteSpec};
use lighttest_common::AssertionDefaults;

/// LightTest - query result assertions
#[derive(Parser)]
#[command(name = "lighttest")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run suites from a file or directory
    Run {
        /// Suite file or directory of suites
        path: PathBuf,

        /// Only run suites carrying this tag
        #[arg(long)]
        tag: Option<String>,

        /// Only run the suite with this name
        #[arg(long)]
        name: Option<String>,

        /// SQLite database overriding the suites' own
        #[arg(long, env = "LIGHTTEST_DATABASE")]
        database: Option<PathBuf>,

        /// TOML file with assertion defaults
        #[arg(long, env = "LIGHTTEST_CONFIG")]
        config: Option<PathBuf>,

        /// Directory for test-results.json
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Parse suites without running them
    Validate {
        /// Suite file or directory of suites
        path: PathBuf,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match execute(cli) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            output::print_error(&format!("{:#}", e));
            ExitCode::from(2)
        }
    }
}

/// Returns whether every step passed
fn execute(cli: Cli) -> anyhow::Result<bool> {
    match cli.command {
        Commands::Run {
            path,
            tag,
            name,
            database,
            config,
            output: output_dir,
        } => {
            let defaults = match config {
                Some(path) => AssertionDefaults::load(&path)?,
                None => AssertionDefaults::default(),
            };

            let mut specs = SuiteSpec::load_all(&path)?;
            if let Some(tag) = &tag {
                specs = SuiteSpec::filter_by_tag(specs, tag);
            }
            if let Some(name) = &name {
                specs.retain(|s| &s.name == name);
                if specs.is_empty() {
                    anyhow::bail!("Suite not found: {}", name);
                }
            }

            let runner = SuiteRunner::new(RunnerConfig {
                defaults,
                database,
                output_dir,
            });
            let summary = runner.run_suites(&specs)?;
            output::print_summary(&summary, cli.format);
            Ok(summary.is_success())
        }
        Commands::Validate { path } => {
            let specs = SuiteSpec::load_all(&path)?;
            let steps: usize = specs.iter().map(|s| s.steps.len()).sum();
            output::print_success(&format!(
                "{} suite(s), {} step(s) are valid",
                specs.len(),
                steps
            ));
            Ok(true)
        }
    }
}
