//! Structured log events for the harness lifecycle.
//!
//! Every event carries an `event` field (`harness.started`,
//! `script.skipped`, `sweep.finished`, ...) so JSON log lines can be
//! filtered without parsing messages.

use tracing::{debug, info, warn};

use crate::config::ArgumentSet;
use crate::error::SkipReason;
use crate::runner::RunOutcome;

/// Span tagging everything logged while one script runs with its name.
///
/// Attach it with `tracing::Instrument` around async work, or `entered()`
/// for synchronous sections.
pub fn script_span(script: &str) -> tracing::Span {
    tracing::info_span!("benchsweep.script", script = %script)
}

pub fn emit_harness_started(script_count: usize, jobs: usize) {
    info!(
        event = "harness.started",
        scripts = script_count,
        jobs = jobs,
        "Running {} scripts",
        script_count
    );
}

pub fn emit_script_started(script: &str, sweep_points: usize, default_arguments: &[String]) {
    info!(
        event = "script.started",
        script = %script,
        sweep_points = sweep_points,
        default_arguments = ?default_arguments,
        "---> {} with {} set(s) of extra arguments",
        script,
        sweep_points
    );
}

/// Warning: the script contributes no rows.
pub fn emit_script_skipped(reason: &SkipReason) {
    warn!(event = "script.skipped", reason = %reason, "Skipping script");
}

pub fn emit_sweep_started(script: &str, index: usize, record: &ArgumentSet) {
    info!(
        event = "sweep.started",
        script = %script,
        index = index,
        arguments = %record,
        "Running with: {}",
        record
    );
}

pub fn emit_sweep_finished(script: &str, index: usize, outcome: &RunOutcome) {
    if outcome.passed() {
        debug!(
            event = "sweep.finished",
            script = %script,
            index = index,
            duration_ms = outcome.duration_ms,
            success = true,
        );
    } else {
        warn!(
            event = "sweep.finished",
            script = %script,
            index = index,
            status = ?outcome.status,
            exit_code = ?outcome.exit_code,
            duration_ms = outcome.duration_ms,
            success = false,
            "Benchmark failed"
        );
    }
}

pub fn emit_harness_finished(rows: usize, skipped: usize, failed: usize, duration_ms: u64) {
    info!(
        event = "harness.finished",
        rows = rows,
        skipped = skipped,
        failed = failed,
        duration_ms = duration_ms,
        "Report complete"
    );
}
