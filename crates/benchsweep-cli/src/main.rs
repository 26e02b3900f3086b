//! benchsweep - run benchmark sweeps and mine their output into a CSV report
//!
//! ```text
//! benchsweep --scripts-file scripts.json --patterns-file patterns.json -o results.csv
//! ```
//!
//! Exits 0 once the report is written, whatever the individual benchmarks
//! did; failures are recorded in the report's `Error` column. Exits non-zero
//! only when the configuration cannot be loaded or the report cannot be
//! created.

use anyhow::{Context, Result};
use benchsweep_core::{Harness, HarnessOptions, SystemProcessRunner};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, Level};

#[derive(Parser, Debug)]
#[command(name = "benchsweep")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "Run scripts with various arguments, mine their console output, and store results in CSV",
    long_about = None
)]
struct Cli {
    /// JSON file containing script configuration
    #[arg(long, visible_alias = "scripts_file", env = "BENCHSWEEP_SCRIPTS_FILE")]
    scripts_file: PathBuf,

    /// JSON file containing result and error patterns
    #[arg(long, visible_alias = "patterns_file", env = "BENCHSWEEP_PATTERNS_FILE")]
    patterns_file: PathBuf,

    /// Output CSV file path
    #[arg(
        short,
        long,
        visible_alias = "output_file",
        env = "BENCHSWEEP_OUTPUT_FILE",
        default_value = "results.csv"
    )]
    output_file: PathBuf,

    /// Number of sweep points to run at once (1 = sequential)
    #[arg(short, long, default_value_t = 1)]
    jobs: usize,

    /// Kill any benchmark still running after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Add a RawError column with the raw stderr of failed runs
    #[arg(long)]
    raw_errors: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn options(&self) -> HarnessOptions {
        HarnessOptions {
            jobs: self.jobs,
            timeout_secs: self.timeout_secs,
            raw_errors: self.raw_errors,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    benchsweep_core::init_tracing(cli.json, level);

    let options = cli.options();
    let harness = Harness::load(&cli.scripts_file, &cli.patterns_file, options)
        .context("Failed to load configuration")?;
    let runner = SystemProcessRunner::with_timeout(harness.options().timeout());

    info!(output = %cli.output_file.display(), "Writing report");
    let summary = harness.run_to_file(&runner, &cli.output_file).await?;

    info!(
        rows = summary.rows_written,
        skipped = summary.scripts_skipped,
        failed = summary.failed_runs,
        "Results written to {}",
        cli.output_file.display()
    );
    Ok(())
}
