//! Import run accounting
//!
//! A single accumulator value threaded through the pipeline stages instead of
//! ambient mutable counters. Row-level and chunk-level diagnostics are plain
//! data records; only the finished [`ImportResult`] crosses the API boundary.

use serde::{Deserialize, Serialize};

/// One structured diagnostic: a row dropped during validation, or a chunk
/// rejected by the store during the write phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportError {
    /// 0-based input row index, for validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row: Option<usize>,
    /// 0-based chunk index, for batch write errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<usize>,
    /// Offending field name, when one field caused the failure
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Offending value as received
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Human-readable reason
    pub reason: String,
}

impl ImportError {
    /// A row excluded during validation
    pub fn row(index: usize, field: &str, value: &str, reason: impl Into<String>) -> Self {
        Self {
            row: Some(index),
            chunk: None,
            field: Some(field.to_string()),
            value: Some(value.to_string()),
            reason: reason.into(),
        }
    }

    /// A chunk rejected during the write phase
    pub fn chunk(index: usize, reason: impl Into<String>) -> Self {
        Self {
            row: None,
            chunk: Some(index),
            field: None,
            value: None,
            reason: reason.into(),
        }
    }
}

/// Accumulator for one import run, passed through and returned by each stage
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub imported: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub errors: Vec<ImportError>,
}

impl ImportReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows dropped during validation or deduplication
    pub fn record_skipped(&mut self, count: u64) {
        self.skipped += count;
    }

    /// A row excluded by validation: skipped from the write set and carried
    /// as a failure in the accounting.
    pub fn record_row_error(&mut self, error: ImportError) {
        self.failed += 1;
        self.skipped += 1;
        self.errors.push(error);
    }

    /// A chunk the store rejected: one error per chunk, every row in it
    /// counted as failed.
    pub fn record_chunk_error(&mut self, error: ImportError, rows_in_chunk: u64) {
        self.failed += rows_in_chunk;
        self.errors.push(error);
    }

    /// Successful upsert counts from the store
    pub fn record_written(&mut self, inserted: u64, updated: u64) {
        self.imported += inserted;
        self.updated += updated;
    }

    /// Merge accounting from a sub-stage
    pub fn absorb(&mut self, other: ImportReport) {
        self.imported += other.imported;
        self.updated += other.updated;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.errors.extend(other.errors);
    }

    /// Finish the run. `success` is true iff no errors were recorded; the
    /// returned error list is truncated to `max_errors` entries while the
    /// `failed` count keeps the full total.
    pub fn finish(mut self, message: impl Into<String>, max_errors: usize) -> ImportResult {
        let success = self.errors.is_empty();
        self.errors.truncate(max_errors);

        ImportResult {
            success,
            message: message.into(),
            imported: self.imported,
            updated: self.updated,
            skipped: self.skipped,
            failed: self.failed,
            errors: self.errors,
        }
    }
}

/// Aggregate result returned synchronously to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportResult {
    pub success: bool,
    pub message: String,
    pub imported: u64,
    pub updated: u64,
    pub skipped: u64,
    pub failed: u64,
    pub errors: Vec<ImportError>,
}
