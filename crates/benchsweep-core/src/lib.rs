//! benchsweep core library
//!
//! Runs external benchmark programs across a matrix of argument and
//! environment variations and mines their console output into one CSV report:
//! - [`config`]: scripts/patterns documents and their validated domain types
//! - [`expand`]: sweep-point expansion into concrete argument vectors
//! - [`runner`]: child-process execution with per-child environment overlay
//! - [`parser`]: regex extraction with decimal normalisation
//! - [`table`]: report schema resolution and the streaming CSV sink
//! - [`orchestrator`]: the harness tying them together

pub mod config;
pub mod error;
pub mod expand;
pub mod fakes;
pub mod obs;
pub mod orchestrator;
pub mod parser;
pub mod runner;
pub mod table;
pub mod telemetry;

pub use config::{
    load_patterns, load_scripts, parse_patterns, parse_scripts, ArgumentSet, Pattern, PatternSet,
    ScriptSpec,
};
pub use error::{ConfigError, ReportError, SkipReason};
pub use expand::{expand, SweepPoint};
pub use orchestrator::{Harness, HarnessOptions, HarnessSummary};
pub use parser::{extract, normalize_capture, Extracted};
pub use runner::{Invocation, ProcessRunner, RunOutcome, RunStatus, SystemProcessRunner};
pub use table::{ColumnSchema, ResultTable, RowData};
pub use telemetry::init_tracing;
