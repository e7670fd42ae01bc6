//! Output formatting and persistence for yield views.
//!
//! Supports text tables, JSON serialization, CSV export and CSV history append.

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::Path;
use tracing::debug;

use crate::analyzers::types::{DetailView, GroupSummary};

/// Formats a yield for display. The zero-input sentinel renders as an empty cell.
pub fn format_yield(yield_pct: Option<f64>) -> String {
    match yield_pct {
        Some(y) => format!("{y:.1}%"),
        None => String::new(),
    }
}

/// Renders the all-models comparison table.
pub fn render_summary(summary: &[GroupSummary]) -> String {
    let rows: Vec<Vec<String>> = summary
        .iter()
        .map(|s| {
            vec![
                s.model.clone(),
                s.total_ok.to_string(),
                s.total_ng.to_string(),
                s.total_input.to_string(),
                format_yield(s.group_yield_pct),
            ]
        })
        .collect();

    render_table(
        &["Model", "Total OK", "Total NG", "Total Input", "Yield (%)"],
        &rows,
        1,
    )
}

/// Renders the line/time table for one model followed by its totals.
pub fn render_detail(view: &DetailView) -> String {
    let rows: Vec<Vec<String>> = view
        .rows
        .iter()
        .map(|r| {
            vec![
                r.line.clone(),
                r.time.clone(),
                r.ok.to_string(),
                r.ng.to_string(),
                r.input.to_string(),
                format_yield(r.yield_pct),
            ]
        })
        .collect();

    let mut out = format!("{} - by line and time\n", view.model);
    out.push_str(&render_table(
        &["Line", "Time", "OK", "NG", "Input", "Yield (%)"],
        &rows,
        2,
    ));
    out.push_str(&format!(
        "\n{} totals: OK {}  NG {}  Input {}  Yield {}\n",
        view.model,
        view.total.total_ok,
        view.total.total_ng,
        view.total.total_input,
        view.total
            .group_yield_pct
            .map_or_else(|| "-".to_string(), |y| format!("{y:.1}%"))
    ));
    out
}

/// Lays out `rows` under `headers`. The first `text_columns` columns are
/// left-aligned, the rest right-aligned.
fn render_table(headers: &[&str], rows: &[Vec<String>], text_columns: usize) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    let line = |cells: Vec<&str>| -> String {
        cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i < text_columns {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(headers.to_vec());
    out.push('\n');
    out.push_str(
        &widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.push('\n');
    for row in rows {
        out.push_str(&line(row.iter().map(String::as_str).collect()));
        out.push('\n');
    }
    out
}

/// Serializes any view as pretty-printed JSON.
pub fn to_json(value: &impl Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Serializes rows as CSV text with a header line.
pub fn to_csv<T: Serialize>(rows: &[T]) -> Result<String> {
    let mut writer = WriterBuilder::new().from_writer(Vec::new());
    for row in rows {
        writer.serialize(row)?;
    }
    let bytes = writer.into_inner().map_err(|e| e.into_error())?;
    Ok(String::from_utf8(bytes)?)
}

/// Writes rows to `path` as CSV, replacing any existing file.
pub fn write_csv<T: Serialize>(path: &str, rows: &[T]) -> Result<()> {
    debug!(path, rows = rows.len(), "Writing CSV export");
    std::fs::write(path, to_csv(rows)?)?;
    Ok(())
}

/// A per-model summary stamped with the time of the load it came from.
#[derive(Debug, Serialize)]
pub struct HistoryRow {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub total_ok: u128,
    pub total_ng: u128,
    pub total_input: u128,
    pub yield_pct: Option<f64>,
}

impl HistoryRow {
    pub fn new(timestamp: DateTime<Utc>, summary: &GroupSummary) -> Self {
        HistoryRow {
            timestamp,
            model: summary.model.clone(),
            total_ok: summary.total_ok,
            total_ng: summary.total_ng,
            total_input: summary.total_input,
            yield_pct: summary.group_yield_pct,
        }
    }
}

/// Appends history rows to a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_history(path: &str, rows: &[HistoryRow]) -> Result<()> {
    let file_exists = Path::new(path).exists();
    debug!(path, file_exists, rows = rows.len(), "Appending history rows");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // header only on a fresh file
        .from_writer(file);

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}
