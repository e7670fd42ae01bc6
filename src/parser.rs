//! CSV parser for published production-count sheets.

use csv::{ReaderBuilder, Trim};
use std::collections::HashMap;
use tracing::debug;

use crate::error::SourceUnavailable;

/// One data row keyed by header name. Empty cells are left out.
pub type RawRow = HashMap<String, String>;

/// Columns every source must carry.
pub const REQUIRED_COLUMNS: [&str; 5] = ["Model", "Line", "Time", "OK", "NG"];

/// Parses delimited text into raw row mappings.
///
/// Rows may be ragged: missing trailing cells simply produce missing keys and
/// are dealt with later by [`crate::records::clean_and_derive`].
///
/// # Errors
///
/// Returns [`SourceUnavailable::MissingColumns`] if the header lacks any of
/// [`REQUIRED_COLUMNS`], or [`SourceUnavailable::Csv`] if the payload is not
/// readable CSV.
pub fn parse_rows(bytes: &[u8]) -> Result<Vec<RawRow>, SourceUnavailable> {
    let mut rdr = ReaderBuilder::new()
        .flexible(true)
        .trim(Trim::All)
        .from_reader(bytes);

    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
        .collect();

    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| !headers.iter().any(|h| h == *c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(SourceUnavailable::MissingColumns(missing));
    }

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let row: RawRow = headers
            .iter()
            .zip(record.iter())
            .filter(|(_, value)| !value.is_empty())
            .map(|(name, value)| (name.clone(), value.to_string()))
            .collect();
        rows.push(row);
    }

    debug!(columns = headers.len(), rows = rows.len(), "Parsed CSV payload");
    Ok(rows)
}
