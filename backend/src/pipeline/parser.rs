//! Extracts identifiers from the first column of an uploaded CSV.

use crate::error::ParseError;
use crate::pipeline::{IdentifierSet, RawUpload};

/// Parses `raw` into the ordered identifiers of its first column.
///
/// The row count (header included) is checked against `max_rows` before any
/// row is inspected. A trailing newline does not count as an extra row. The
/// first row is always dropped as a header; remaining rows keep only their
/// first comma-separated cell with `\r` removed and whitespace trimmed, and
/// rows that end up empty are skipped.
pub fn parse(raw: &RawUpload, max_rows: usize) -> Result<IdentifierSet, ParseError> {
    let text = String::from_utf8_lossy(raw.bytes());
    let body = text.strip_suffix('\n').unwrap_or(&text);

    let rows: Vec<&str> = if body.is_empty() {
        Vec::new()
    } else {
        body.split('\n').collect()
    };

    if rows.len() > max_rows {
        return Err(ParseError::RowLimitExceeded {
            rows: rows.len(),
            max: max_rows,
        });
    }

    let ids = rows
        .into_iter()
        .skip(1)
        .filter_map(first_cell)
        .collect();

    Ok(IdentifierSet::from_normalized(ids))
}

fn first_cell(row: &str) -> Option<String> {
    let cell = row.split(',').next().unwrap_or_default().replace('\r', "");
    let cell = cell.trim();
    if cell.is_empty() {
        None
    } else {
        Some(cell.to_string())
    }
}
