//! Source reader
//!
//! Turns raw delimited text or spreadsheet binary into an ordered sequence of
//! header-keyed row records. All cell values are strings at this point; typed
//! spreadsheet cells are coerced before the rows leave this module.

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use rxcatalog_common::errors::{AppError, Result};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;

/// One input row: header column -> raw string value
///
/// Keys are normalized (trimmed, lowercased) at parse time so header access
/// tolerates the casing and spacing differences seen in real uploads.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRecord {
    fields: HashMap<String, String>,
}

impl RowRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, header: &str, value: String) {
        self.fields.insert(normalize_header(header), value);
    }

    /// Look up a field by any of its accepted header aliases
    pub fn field(&self, aliases: &[&str]) -> Option<&str> {
        aliases
            .iter()
            .find_map(|alias| self.fields.get(&normalize_header(alias)))
            .map(String::as_str)
    }

    /// Like [`field`](Self::field) but trims the value and maps missing to `""`
    pub fn field_trimmed(&self, aliases: &[&str]) -> &str {
        self.field(aliases).map(str::trim).unwrap_or("")
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(|v| v.trim().is_empty())
    }
}

/// Normalize a header cell for keying: strip BOM, trim, lowercase, collapse
/// internal whitespace to single spaces.
fn normalize_header(header: &str) -> String {
    header
        .trim_start_matches('\u{feff}')
        .trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parse RFC4180-like delimited text into row records.
///
/// The first non-blank line is the header row. Commas inside double-quoted
/// fields do not split; quote characters toggle an in-quotes state per
/// character. Doubled-quote escaping (`""`) is NOT supported; a literal quote
/// inside a field will be dropped. This matches the upstream data feed and is
/// a documented limitation rather than a feature.
///
/// Blank lines are skipped. Rows shorter than the header get empty strings
/// for the missing trailing columns; extra trailing fields are ignored.
pub fn parse_delimited_text(text: &str) -> Vec<RowRecord> {
    let mut lines = text.lines().filter(|line| !line.trim().is_empty());

    let headers: Vec<String> = match lines.next() {
        Some(header_line) => split_quoted(header_line),
        None => return Vec::new(),
    };

    let mut records = Vec::new();
    for line in lines {
        let values = split_quoted(line);
        let mut record = RowRecord::new();
        for (i, header) in headers.iter().enumerate() {
            let value = values.get(i).cloned().unwrap_or_default();
            record.insert(header, value);
        }
        records.push(record);
    }

    debug!(rows = records.len(), columns = headers.len(), "Parsed delimited text");
    records
}

/// Quote-aware comma split. Quote characters toggle the in-quotes state and
/// are not emitted; there is no escape sequence for a literal quote.
fn split_quoted(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in line.chars() {
        match ch {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                fields.push(std::mem::take(&mut current).trim().to_string());
            }
            _ => current.push(ch),
        }
    }
    fields.push(current.trim().to_string());

    fields
}

/// Parse the first sheet of a workbook into row records.
///
/// The header row keys the records; typed cells (numbers, dates, booleans)
/// are coerced to strings since downstream normalization assumes string
/// inputs. Malformed binary input is a fatal parse error that aborts the
/// import before any writes.
pub fn parse_spreadsheet(bytes: &[u8]) -> Result<Vec<RowRecord>> {
    let cursor = Cursor::new(bytes.to_vec());
    let mut workbook = open_workbook_auto_from_rs(cursor).map_err(|e| AppError::Parse {
        format: "spreadsheet".to_string(),
        message: e.to_string(),
    })?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| AppError::Parse {
            format: "spreadsheet".to_string(),
            message: "workbook has no sheets".to_string(),
        })?
        .map_err(|e| AppError::Parse {
            format: "spreadsheet".to_string(),
            message: e.to_string(),
        })?;

    let mut rows = range.rows();
    let headers: Vec<String> = match rows.next() {
        Some(header_row) => header_row.iter().map(cell_to_string).collect(),
        None => return Ok(Vec::new()),
    };

    let mut records = Vec::new();
    for row in rows {
        let mut record = RowRecord::new();
        for (i, header) in headers.iter().enumerate() {
            let value = row.get(i).map(cell_to_string).unwrap_or_default();
            record.insert(header, value);
        }
        if !record.is_empty() {
            records.push(record);
        }
    }

    debug!(rows = records.len(), columns = headers.len(), "Parsed spreadsheet");
    Ok(records)
}

/// Collapse a typed spreadsheet cell back to a string. Integral floats are
/// rendered without a fractional part ("500", not "500.0").
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => {
            if f.fract() == 0.0 && f.abs() < 1e15 {
                format!("{}", *f as i64)
            } else {
                f.to_string()
            }
        }
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.as_f64().to_string(),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(_) => String::new(),
    }
}
