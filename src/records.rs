//! Production records and the cleaning pass that builds them from raw rows.

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::parser::RawRow;

/// One observation of good/defective counts for a model, line and time slot.
///
/// `input_count` and `yield_pct` are derived in [`Record::new`] and cannot be
/// set on their own.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    model: String,
    line: String,
    time: String,
    ok_count: u64,
    ng_count: u64,
    input_count: u64,
    yield_pct: Option<f64>,
}

impl Record {
    /// Builds a record and its derived fields.
    ///
    /// Returns `None` if `ok_count + ng_count` does not fit in a `u64`.
    pub fn new(
        model: impl Into<String>,
        line: impl Into<String>,
        time: impl Into<String>,
        ok_count: u64,
        ng_count: u64,
    ) -> Option<Self> {
        let input_count = ok_count.checked_add(ng_count)?;
        Some(Record {
            model: model.into(),
            line: line.into(),
            time: time.into(),
            ok_count,
            ng_count,
            input_count,
            yield_pct: yield_pct(ok_count.into(), ng_count.into()),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn time(&self) -> &str {
        &self.time
    }

    pub fn ok_count(&self) -> u64 {
        self.ok_count
    }

    pub fn ng_count(&self) -> u64 {
        self.ng_count
    }

    pub fn input_count(&self) -> u64 {
        self.input_count
    }

    /// Yield in percent, rounded to one decimal. `None` when nothing was input.
    pub fn yield_pct(&self) -> Option<f64> {
        self.yield_pct
    }

    /// Converts the record back into the raw shape the loader produces.
    pub fn to_raw(&self) -> RawRow {
        RawRow::from([
            ("Model".to_string(), self.model.clone()),
            ("Line".to_string(), self.line.clone()),
            ("Time".to_string(), self.time.clone()),
            ("OK".to_string(), self.ok_count.to_string()),
            ("NG".to_string(), self.ng_count.to_string()),
        ])
    }
}

/// Zero-guarded yield: `round(ok / (ok + ng) * 100, 1)`, or `None` for zero input.
///
/// Takes `u128` so group totals of many `u64` counts fit.
pub fn yield_pct(ok: u128, ng: u128) -> Option<f64> {
    let input = ok + ng;
    if input == 0 {
        None
    } else {
        let pct = ok as f64 / input as f64 * 100.0;
        Some((pct * 10.0).round() / 10.0)
    }
}

/// Why a raw row did not make it into the record set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
pub enum DropReason {
    #[error("missing value for '{0}'")]
    MissingField(&'static str),

    #[error("'{field}' is not a non-negative integer: '{value}'")]
    InvalidDataKind { field: &'static str, value: String },
}

/// A dropped row and its 0-based position among the data rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedRow {
    pub index: usize,
    pub reason: DropReason,
}

/// Result of [`clean_and_derive`]: the usable records plus a report of what was dropped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CleanOutput {
    pub records: Vec<Record>,
    pub dropped: Vec<DroppedRow>,
}

/// Validates raw rows and attaches derived fields.
///
/// Incomplete or non-numeric rows are dropped and reported; they never abort
/// the batch. Surviving records keep the input order.
pub fn clean_and_derive(raw_rows: &[RawRow]) -> CleanOutput {
    let mut out = CleanOutput::default();

    for (index, row) in raw_rows.iter().enumerate() {
        match clean_row(row) {
            Ok(record) => out.records.push(record),
            Err(reason) => {
                warn!(row = index, reason = %reason, "Dropping row");
                out.dropped.push(DroppedRow { index, reason });
            }
        }
    }

    debug!(
        kept = out.records.len(),
        dropped = out.dropped.len(),
        "Cleaned raw rows"
    );
    out
}

fn clean_row(row: &RawRow) -> Result<Record, DropReason> {
    let model = required(row, "Model")?;
    let line = required(row, "Line")?;
    let time = required(row, "Time")?;
    let ok = required(row, "OK")?;
    let ng = required(row, "NG")?;

    let ok_count = parse_count(ok).ok_or_else(|| DropReason::InvalidDataKind {
        field: "OK",
        value: ok.to_string(),
    })?;
    let ng_count = parse_count(ng).ok_or_else(|| DropReason::InvalidDataKind {
        field: "NG",
        value: ng.to_string(),
    })?;

    Record::new(model, line, time, ok_count, ng_count).ok_or_else(|| {
        DropReason::InvalidDataKind {
            field: "Input",
            value: format!("{ok_count} + {ng_count}"),
        }
    })
}

fn required<'a>(row: &'a RawRow, field: &'static str) -> Result<&'a str, DropReason> {
    row.get(field)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or(DropReason::MissingField(field))
}

/// Coerces a count cell to `u64`.
///
/// Accepts `,` as a thousands separator (spreadsheet exports write `1,234`)
/// and a zero fraction such as `90.0`. Signs, exponents and other fractions
/// are rejected.
fn parse_count(value: &str) -> Option<u64> {
    let value = value.trim();
    let int_part = match value.split_once('.') {
        Some((int_part, frac)) => {
            if frac.is_empty() || !frac.bytes().all(|b| b == b'0') {
                return None;
            }
            int_part
        }
        None => value,
    };

    strip_grouping(int_part)?.parse().ok()
}

/// Removes `,` separators from `1,234,567`-style digits. Misplaced separators yield `None`.
fn strip_grouping(digits: &str) -> Option<String> {
    let mut groups = digits.split(',');
    let first = groups.next()?;
    let rest: Vec<&str> = groups.collect();

    let all_digits = |g: &str| !g.is_empty() && g.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(first) || (!rest.is_empty() && first.len() > 3) {
        return None;
    }
    if rest.iter().any(|g| g.len() != 3 || !all_digits(g)) {
        return None;
    }

    Some(format!("{first}{}", rest.concat()))
}
