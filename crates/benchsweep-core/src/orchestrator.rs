//! Harness orchestration: expand, execute, extract and report.
//!
//! Per script the harness moves through
//! `pending -> (skipped | running(point) -> row emitted, per point) -> done`.
//! A failing sweep point still yields exactly one row and the run continues.

use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::config::{load_patterns, load_scripts, PatternSet, ScriptSpec};
use crate::error::ReportResult;
use crate::expand::{expand, SweepPoint};
use crate::obs;
use crate::parser::{extract, Extracted};
use crate::runner::{Invocation, ProcessRunner, RunOutcome};
use crate::table::{ColumnSchema, ResultTable, RowData};

/// Runtime knobs for a harness run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HarnessOptions {
    /// Sweep points executing at once. 1 is the sequential reference mode.
    pub jobs: usize,
    /// Per-execution timeout in seconds. `None` waits indefinitely.
    pub timeout_secs: Option<u64>,
    /// Add a `RawError` column with the stderr of failed runs.
    pub raw_errors: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            jobs: 1,
            timeout_secs: None,
            raw_errors: false,
        }
    }
}

impl HarnessOptions {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Totals for a completed run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarnessSummary {
    pub scripts_total: usize,
    pub scripts_skipped: usize,
    pub rows_written: usize,
    pub failed_runs: usize,
    pub duration_ms: u64,
}

/// Drives every script of a configuration into one report.
#[derive(Debug, Clone)]
pub struct Harness {
    scripts: Vec<ScriptSpec>,
    patterns: PatternSet,
    options: HarnessOptions,
}

impl Harness {
    pub fn new(scripts: Vec<ScriptSpec>, patterns: PatternSet, options: HarnessOptions) -> Self {
        Self {
            scripts,
            patterns,
            options,
        }
    }

    /// Load both configuration documents. Any failure here aborts the run.
    pub fn load(scripts_file: &Path, patterns_file: &Path, options: HarnessOptions) -> Result<Self> {
        let scripts = load_scripts(scripts_file).context("Failed to load scripts document")?;
        let patterns = load_patterns(patterns_file).context("Failed to load patterns document")?;
        Ok(Self::new(scripts, patterns, options))
    }

    pub fn scripts(&self) -> &[ScriptSpec] {
        &self.scripts
    }

    pub fn options(&self) -> &HarnessOptions {
        &self.options
    }

    /// The report columns, resolved from the whole configuration.
    pub fn schema(&self) -> ColumnSchema {
        ColumnSchema::resolve(&self.scripts, &self.patterns, self.options.raw_errors)
    }

    /// Run everything and write the report to `output`.
    pub async fn run_to_file(
        &self,
        runner: &dyn ProcessRunner,
        output: &Path,
    ) -> Result<HarnessSummary> {
        let mut table = ResultTable::create(output, self.schema())
            .with_context(|| format!("Failed to create report {:?}", output))?;
        self.run(runner, &mut table).await
    }

    /// Run everything, appending one row per executed sweep point to `table`.
    pub async fn run<W: Write>(
        &self,
        runner: &dyn ProcessRunner,
        table: &mut ResultTable<W>,
    ) -> Result<HarnessSummary> {
        let start = Instant::now();
        let mut summary = HarnessSummary {
            scripts_total: self.scripts.len(),
            ..Default::default()
        };

        obs::emit_harness_started(self.scripts.len(), self.jobs());

        if self.jobs() > 1 {
            self.run_concurrent(runner, table, &mut summary).await?;
        } else {
            for spec in &self.scripts {
                self.run_script(spec, runner, table, &mut summary)
                    .instrument(obs::script_span(&spec.name))
                    .await?;
            }
        }

        summary.duration_ms = start.elapsed().as_millis() as u64;
        obs::emit_harness_finished(
            summary.rows_written,
            summary.scripts_skipped,
            summary.failed_runs,
            summary.duration_ms,
        );
        Ok(summary)
    }

    fn jobs(&self) -> usize {
        self.options.jobs.max(1)
    }

    async fn run_script<W: Write>(
        &self,
        spec: &ScriptSpec,
        runner: &dyn ProcessRunner,
        table: &mut ResultTable<W>,
        summary: &mut HarnessSummary,
    ) -> Result<()> {
        let Some(points) = self.plan(spec, summary) else {
            return Ok(());
        };
        for point in &points {
            let outcome = self.execute(runner, spec, point).await;
            self.record(table, spec, point, &outcome, summary)
                .with_context(|| format!("Failed to write report row for '{}'", spec.name))?;
        }
        Ok(())
    }

    /// Sweep points are executed up to `jobs` at a time. Each child gets its
    /// own environment overlay; rows are still written in submission order.
    async fn run_concurrent<W: Write>(
        &self,
        runner: &dyn ProcessRunner,
        table: &mut ResultTable<W>,
        summary: &mut HarnessSummary,
    ) -> Result<()> {
        let mut work: Vec<(&ScriptSpec, SweepPoint)> = Vec::new();
        for spec in &self.scripts {
            let _guard = obs::script_span(&spec.name).entered();
            if let Some(points) = self.plan(spec, summary) {
                work.extend(points.into_iter().map(|point| (spec, point)));
            }
        }

        let mut finished = stream::iter(work)
            .map(move |(spec, point)| async move {
                let outcome = self
                    .execute(runner, spec, &point)
                    .instrument(obs::script_span(&spec.name))
                    .await;
                (spec, point, outcome)
            })
            .buffered(self.jobs());

        while let Some((spec, point, outcome)) = finished.next().await {
            self.record(table, spec, &point, &outcome, summary)
                .with_context(|| format!("Failed to write report row for '{}'", spec.name))?;
        }
        Ok(())
    }

    /// Expand a script, logging it. `None` when the script is skipped.
    fn plan(&self, spec: &ScriptSpec, summary: &mut HarnessSummary) -> Option<Vec<SweepPoint>> {
        obs::emit_script_started(
            &spec.name,
            spec.extra_arguments.len(),
            &spec.default_arguments,
        );
        match expand(spec) {
            Ok(points) => Some(points),
            Err(reason) => {
                obs::emit_script_skipped(&reason);
                summary.scripts_skipped += 1;
                None
            }
        }
    }

    async fn execute(
        &self,
        runner: &dyn ProcessRunner,
        spec: &ScriptSpec,
        point: &SweepPoint,
    ) -> RunOutcome {
        obs::emit_sweep_started(&spec.name, point.index, &point.record);
        let outcome = runner.run(&Invocation::new(spec, point)).await;
        obs::emit_sweep_finished(&spec.name, point.index, &outcome);
        outcome
    }

    /// Results come from stdout of successful runs only; error patterns are
    /// applied to any non-empty stderr.
    fn record<W: Write>(
        &self,
        table: &mut ResultTable<W>,
        spec: &ScriptSpec,
        point: &SweepPoint,
        outcome: &RunOutcome,
        summary: &mut HarnessSummary,
    ) -> ReportResult<()> {
        let results = if outcome.passed() {
            extract(&outcome.stdout, &self.patterns.result_patterns)
        } else {
            Extracted::default()
        };
        let errors = if outcome.stderr.is_empty() {
            Extracted::default()
        } else {
            extract(&outcome.stderr, &self.patterns.error_patterns)
        };

        table.append_row(&RowData {
            model: &spec.name,
            record: &point.record,
            results: &results,
            errors: &errors,
            raw_error: (!outcome.passed()).then_some(outcome.stderr.as_str()),
        })?;

        summary.rows_written += 1;
        if !outcome.passed() {
            summary.failed_runs += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_patterns, parse_scripts, ArgumentSet};
    use crate::fakes::ScriptedProcessRunner;
    use std::path::PathBuf;

    fn harness(scripts_json: &str, patterns_json: &str, options: HarnessOptions) -> Harness {
        let origin = PathBuf::from("inline.json");
        Harness::new(
            parse_scripts(scripts_json, &origin).unwrap(),
            parse_patterns(patterns_json, &origin).unwrap(),
            options,
        )
    }

    async fn run_to_string(
        harness: &Harness,
        runner: &ScriptedProcessRunner,
    ) -> (String, HarnessSummary) {
        let mut table = ResultTable::new(Vec::new(), harness.schema()).unwrap();
        let summary = harness.run(runner, &mut table).await.unwrap();
        let csv = String::from_utf8(table.into_inner().unwrap()).unwrap();
        (csv, summary)
    }

    const BENCH1: &str = r#"{"scripts": [{
        "name": "bench1",
        "path": "./bench.sh",
        "default_arguments": ["--mode", "fast"],
        "extra_arguments": [{"threads": "4"}, {"threads": "8"}]
    }]}"#;

    const LATENCY: &str = r#"{"result_patterns": {"latency": "latency=(\\d+\\.\\d+)"},
        "error_patterns": {"oom": "OOM: (.*)"}}"#;

    #[tokio::test]
    async fn test_end_to_end_two_sweep_points() {
        let h = harness(BENCH1, LATENCY, HarnessOptions::default());
        let runner = ScriptedProcessRunner::new()
            .on(
                ["--mode", "fast", "--threads", "4"],
                RunOutcome::succeeded("latency=10.456\n", ""),
            )
            .on(
                ["--mode", "fast", "--threads", "8"],
                RunOutcome::succeeded("latency=5.2\n", ""),
            );

        let (csv, summary) = run_to_string(&h, &runner).await;
        assert_eq!(
            csv,
            "Model,threads,latency,Error\nbench1,4,10.46,\nbench1,8,5.2,\n"
        );
        assert_eq!(summary.rows_written, 2);
        assert_eq!(summary.failed_runs, 0);
        assert_eq!(runner.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_failing_run_populates_error() {
        let h = harness(
            r#"{"scripts": [{"name": "bench1", "path": "./bench.sh", "default_arguments": ["run"]}]}"#,
            LATENCY,
            HarnessOptions::default(),
        );
        let runner = ScriptedProcessRunner::new().on(
            ["run"],
            RunOutcome::failed(Some(1), "OOM: out of memory"),
        );

        let (csv, summary) = run_to_string(&h, &runner).await;
        assert_eq!(csv, "Model,latency,Error\nbench1,,oom: out of memory\n");
        assert_eq!(summary.failed_runs, 1);
    }

    #[tokio::test]
    async fn test_failed_run_ignores_stdout() {
        let h = harness(
            r#"{"scripts": [{"name": "b", "path": "p", "default_arguments": ["run"]}]}"#,
            LATENCY,
            HarnessOptions::default(),
        );
        let mut outcome = RunOutcome::failed(Some(2), "segfault");
        outcome.stdout = "latency=1.5".to_string();
        let runner = ScriptedProcessRunner::new().on(["run"], outcome);

        let (csv, _) = run_to_string(&h, &runner).await;
        assert_eq!(csv, "Model,latency,Error\nb,,\n");
    }

    #[tokio::test]
    async fn test_stderr_warning_on_success_is_reported() {
        let h = harness(
            r#"{"scripts": [{"name": "b", "path": "p", "default_arguments": ["run"]}]}"#,
            LATENCY,
            HarnessOptions::default(),
        );
        let runner = ScriptedProcessRunner::new().on(
            ["run"],
            RunOutcome::succeeded("latency=2.0", "OOM: near limit"),
        );

        let (csv, summary) = run_to_string(&h, &runner).await;
        assert_eq!(csv, "Model,latency,Error\nb,2.0,oom: near limit\n");
        assert_eq!(summary.failed_runs, 0);
    }

    #[tokio::test]
    async fn test_script_without_defaults_is_skipped() {
        let h = harness(
            r#"{"scripts": [
                {"name": "empty", "path": "p", "default_arguments": [], "extra_arguments": [{"batch": "2"}]},
                {"name": "ok", "path": "p", "default_arguments": ["run"]}
            ]}"#,
            LATENCY,
            HarnessOptions::default(),
        );
        let runner =
            ScriptedProcessRunner::new().on(["run"], RunOutcome::succeeded("latency=1.25", ""));

        let (csv, summary) = run_to_string(&h, &runner).await;
        // The skipped script's keys still shape the schema.
        assert_eq!(csv, "Model,batch,latency,Error\nok,,1.25,\n");
        assert_eq!(summary.scripts_total, 2);
        assert_eq!(summary.scripts_skipped, 1);
        assert_eq!(summary.rows_written, 1);
        assert_eq!(runner.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_env_and_interpreter_forwarded() {
        let h = harness(
            r#"{"scripts": [{"name": "py", "path": "bench.py", "interpreter": "python",
                "default_arguments": ["-q"], "env": {"OMP_NUM_THREADS": "2"}}]}"#,
            LATENCY,
            HarnessOptions::default(),
        );
        let runner = ScriptedProcessRunner::new().on(["-q"], RunOutcome::succeeded("", ""));
        run_to_string(&h, &runner).await;

        let calls = runner.calls();
        assert_eq!(calls[0].interpreter.as_deref(), Some("python"));
        assert_eq!(calls[0].program, PathBuf::from("bench.py"));
        assert_eq!(
            calls[0].env.get("OMP_NUM_THREADS").map(String::as_str),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_raw_errors_column() {
        let options = HarnessOptions {
            raw_errors: true,
            ..Default::default()
        };
        let h = harness(
            r#"{"scripts": [{"name": "b", "path": "p", "default_arguments": ["run"],
                "extra_arguments": [{"n": "1"}, {"n": "2"}]}]}"#,
            LATENCY,
            options,
        );
        let runner = ScriptedProcessRunner::new()
            .on(["run", "--n", "1"], RunOutcome::failed(Some(1), "illegal instruction\n"))
            .on(["run", "--n", "2"], RunOutcome::succeeded("latency=3.0", "noise"));

        let (csv, _) = run_to_string(&h, &runner).await;
        assert_eq!(
            csv,
            "Model,n,latency,Error,RawError\nb,1,,,illegal instruction\nb,2,3.0,,\n"
        );
    }

    #[tokio::test]
    async fn test_concurrent_mode_keeps_submission_order() {
        let options = HarnessOptions {
            jobs: 4,
            ..Default::default()
        };
        let h = harness(
            r#"{"scripts": [
                {"name": "a", "path": "p", "default_arguments": ["a"],
                 "extra_arguments": [{"n": "1"}, {"n": "2"}, {"n": "3"}]},
                {"name": "b", "path": "p", "default_arguments": ["b"]}
            ]}"#,
            LATENCY,
            options,
        );
        let runner = ScriptedProcessRunner::new()
            .on(["a", "--n", "1"], RunOutcome::succeeded("latency=1.0", ""))
            .on(["a", "--n", "2"], RunOutcome::succeeded("latency=2.0", ""))
            .on(["a", "--n", "3"], RunOutcome::succeeded("latency=3.0", ""))
            .on(["b"], RunOutcome::succeeded("latency=4.0", ""));

        let (csv, summary) = run_to_string(&h, &runner).await;
        assert_eq!(
            csv,
            "Model,n,latency,Error\na,1,1.0,\na,2,2.0,\na,3,3.0,\nb,,4.0,\n"
        );
        assert_eq!(summary.rows_written, 4);
    }

    #[tokio::test]
    async fn test_row_width_matches_header_for_every_outcome() {
        let h = harness(
            r#"{"scripts": [{"name": "w", "path": "p", "default_arguments": ["x"],
                "extra_arguments": [{"a": "1"}, {"b": ""}, {"a": "2", "b": "3"}]}]}"#,
            r#"{"result_patterns": {"r1": "r1=(\\d+)", "r2": "r2=(\\d+)"}}"#,
            HarnessOptions::default(),
        );
        let runner = ScriptedProcessRunner::new()
            .on(["x", "--a", "1"], RunOutcome::succeeded("r1=1", ""))
            .on(["x", "--b"], RunOutcome::failed(None, "killed"));
        // Third point has no scripted outcome: launch failure.

        let (csv, summary) = run_to_string(&h, &runner).await;
        let mut reader = csv::Reader::from_reader(csv.as_bytes());
        let width = reader.headers().unwrap().len();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 3);
        assert!(rows.iter().all(|r| r.len() == width));
        assert_eq!(summary.failed_runs, 2);
    }

    #[test]
    fn test_options_default() {
        let options = HarnessOptions::default();
        assert_eq!(options.jobs, 1);
        assert!(options.timeout().is_none());
        assert!(!options.raw_errors);
    }

    #[test]
    fn test_schema_from_harness() {
        let h = harness(BENCH1, LATENCY, HarnessOptions::default());
        assert_eq!(h.schema().header(), vec!["Model", "threads", "latency", "Error"]);
        let expected: ArgumentSet = vec![("threads", "8")].into_iter().collect();
        assert_eq!(h.scripts()[0].extra_arguments[1], expected);
    }
}
