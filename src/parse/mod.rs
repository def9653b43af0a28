// Line-oriented parsers for probe output. A bad line is rejected on its own and never
// takes the rest of the batch down with it.

mod containers;
mod gpu;

pub use containers::{extract_host_port, parse_container_rows, parse_percent, parse_stats_rows};
pub use gpu::{parse_cuda_driver, parse_cuda_toolkit, parse_driver_rows, parse_gpu_rows};

use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("line {line}: expected {expected} fields, found {found}")]
    FieldCount {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: invalid {field} {value:?}")]
    InvalidField {
        line: usize,
        field: &'static str,
        value: String,
    },
    #[error("unrecognized {what} output: all {rejected} lines rejected")]
    Unrecognized { what: &'static str, rejected: usize },
}

/// Records that parsed plus the lines that did not.
#[derive(Debug, Clone, PartialEq)]
pub struct Parsed<T> {
    pub records: Vec<T>,
    pub rejected: Vec<ParseError>,
}

impl<T> Default for Parsed<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl<T> Parsed<T> {
    /// Keep the good records. Fails only when there was output but not one line of it parsed,
    /// which means the format is not what we expect.
    pub fn into_result(self, what: &'static str) -> Result<Vec<T>, ParseError> {
        for e in &self.rejected {
            debug!(what, error = %e, "rejected probe line");
        }
        if self.records.is_empty() && !self.rejected.is_empty() {
            return Err(ParseError::Unrecognized {
                what,
                rejected: self.rejected.len(),
            });
        }
        Ok(self.records)
    }
}

/// Apply `parse_line` to every non-blank line, numbering from 1.
fn parse_lines<T>(
    raw: &str,
    mut parse_line: impl FnMut(usize, &str) -> Result<T, ParseError>,
) -> Parsed<T> {
    let mut out = Parsed::default();
    for (i, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(i + 1, line) {
            Ok(r) => out.records.push(r),
            Err(e) => out.rejected.push(e),
        }
    }
    out
}

fn require_fields<'a>(
    line_no: usize,
    fields: Vec<&'a str>,
    expected: usize,
) -> Result<Vec<&'a str>, ParseError> {
    if fields.len() < expected {
        return Err(ParseError::FieldCount {
            line: line_no,
            expected,
            found: fields.len(),
        });
    }
    Ok(fields)
}
