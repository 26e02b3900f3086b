//! Report schema resolution and the CSV sink.
//!
//! The column list is resolved once from the whole configuration before any
//! benchmark runs. Rows are validated against it and never widen it.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::config::{ArgumentSet, PatternSet, ScriptSpec};
use crate::error::{ReportError, ReportResult};
use crate::parser::Extracted;

pub const MODEL_COLUMN: &str = "Model";
pub const ERROR_COLUMN: &str = "Error";
pub const RAW_ERROR_COLUMN: &str = "RawError";

/// Fixed, ordered report columns:
/// `Model`, sorted argument keys, result names in configured order, `Error`,
/// and `RawError` when raw error passthrough is enabled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    argument_keys: Vec<String>,
    result_names: Vec<String>,
    raw_errors: bool,
}

impl ColumnSchema {
    /// Resolve the schema from every script, skipped ones included.
    pub fn resolve(specs: &[ScriptSpec], patterns: &PatternSet, raw_errors: bool) -> Self {
        let argument_keys: BTreeSet<&str> = specs
            .iter()
            .flat_map(|spec| spec.extra_arguments.iter())
            .flat_map(|set| set.keys())
            .collect();

        Self {
            argument_keys: argument_keys.into_iter().map(str::to_string).collect(),
            result_names: patterns.result_names().map(str::to_string).collect(),
            raw_errors,
        }
    }

    pub fn argument_keys(&self) -> &[String] {
        &self.argument_keys
    }

    pub fn result_names(&self) -> &[String] {
        &self.result_names
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = Vec::with_capacity(self.width());
        header.push(MODEL_COLUMN.to_string());
        header.extend(self.argument_keys.iter().cloned());
        header.extend(self.result_names.iter().cloned());
        header.push(ERROR_COLUMN.to_string());
        if self.raw_errors {
            header.push(RAW_ERROR_COLUMN.to_string());
        }
        header
    }

    pub fn width(&self) -> usize {
        2 + self.argument_keys.len() + self.result_names.len() + usize::from(self.raw_errors)
    }

    /// Lay out one row. Missing values become empty strings.
    pub fn row(&self, row: &RowData<'_>) -> ReportResult<Vec<String>> {
        if let Some(unknown) = row
            .record
            .keys()
            .find(|key| !self.argument_keys.iter().any(|k| k.as_str() == *key))
        {
            return Err(ReportError::UnknownColumn {
                model: row.model.to_string(),
                column: unknown.to_string(),
            });
        }

        let mut fields = Vec::with_capacity(self.width());
        fields.push(row.model.to_string());
        fields.extend(
            self.argument_keys
                .iter()
                .map(|key| row.record.get(key).unwrap_or_default().to_string()),
        );
        fields.extend(
            self.result_names
                .iter()
                .map(|name| row.results.get(name).unwrap_or_default().to_string()),
        );
        fields.push(row.errors.join_messages());
        if self.raw_errors {
            fields.push(row.raw_error.map(str::trim).unwrap_or_default().to_string());
        }
        Ok(fields)
    }
}

/// Inputs for one report row.
#[derive(Debug, Clone, Copy)]
pub struct RowData<'a> {
    /// Script name for the `Model` column.
    pub model: &'a str,
    /// Sweep-point record for the argument columns.
    pub record: &'a ArgumentSet,
    /// Result-pattern matches from stdout.
    pub results: &'a Extracted,
    /// Error-pattern matches from stderr.
    pub errors: &'a Extracted,
    /// Raw stderr of a failed run; only written with raw error passthrough.
    pub raw_error: Option<&'a str>,
}

/// Streaming CSV report. The header is written on construction and each row
/// is flushed as it is appended, in arrival order.
pub struct ResultTable<W: Write> {
    schema: ColumnSchema,
    writer: csv::Writer<W>,
    rows_written: usize,
}

impl ResultTable<File> {
    /// Create (truncate) the report file at `path`.
    pub fn create(path: &Path, schema: ColumnSchema) -> ReportResult<Self> {
        let file = File::create(path)?;
        Self::new(file, schema)
    }
}

impl<W: Write> ResultTable<W> {
    pub fn new(sink: W, schema: ColumnSchema) -> ReportResult<Self> {
        let mut writer = csv::Writer::from_writer(sink);
        writer.write_record(schema.header())?;
        writer.flush()?;
        Ok(Self {
            schema,
            writer,
            rows_written: 0,
        })
    }

    pub fn schema(&self) -> &ColumnSchema {
        &self.schema
    }

    pub fn rows_written(&self) -> usize {
        self.rows_written
    }

    pub fn append_row(&mut self, row: &RowData<'_>) -> ReportResult<()> {
        let fields = self.schema.row(row)?;
        self.writer.write_record(&fields)?;
        self.writer.flush()?;
        self.rows_written += 1;
        Ok(())
    }

    /// Flush and return the underlying sink.
    pub fn into_inner(self) -> ReportResult<W> {
        self.writer
            .into_inner()
            .map_err(|e| ReportError::Io(e.into_error()))
    }
}
