//! Error taxonomy for benchsweep.
//!
//! Only configuration and report-sink failures are errors. Everything that
//! goes wrong while running a benchmark is captured as data in the report.

use std::path::PathBuf;

/// Errors raised while loading the scripts and patterns documents.
///
/// Any of these aborts the run: without a valid configuration the report
/// schema cannot be resolved.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("pattern '{name}' is not a valid regular expression: {source}")]
    InvalidPattern {
        name: String,
        #[source]
        source: regex::Error,
    },

    #[error("pattern '{name}' must be given as a string")]
    PatternNotString { name: String },

    #[error("pattern '{name}' must have exactly one capturing group, found {groups}")]
    CaptureGroups { name: String, groups: usize },

    #[error("script '{script}': extra argument '{key}' must be a string, number, boolean or null")]
    InvalidArgumentValue { script: String, key: String },
}

/// Errors raised by the report sink.
#[derive(Debug, thiserror::Error)]
pub enum ReportError {
    #[error("row for '{model}' carries argument '{column}' outside the resolved schema")]
    UnknownColumn { model: String, column: String },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Why a script was left out of the run. Non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("no default arguments provided for script '{script}'")]
    NoDefaultArguments { script: String },
}

/// Result type for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type for report operations.
pub type ReportResult<T> = std::result::Result<T, ReportError>;
