//! Data types produced by the aggregation pass.

use serde::Serialize;

use crate::records::Record;

/// Totals and yield for every record sharing a model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSummary {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Total OK")]
    pub total_ok: u128,
    #[serde(rename = "Total NG")]
    pub total_ng: u128,
    #[serde(rename = "Total Input")]
    pub total_input: u128,
    #[serde(rename = "Yield (%)")]
    pub group_yield_pct: Option<f64>,
}

/// One line/time slot in the per-model detail table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailRow {
    #[serde(rename = "Line")]
    pub line: String,
    #[serde(rename = "Time")]
    pub time: String,
    #[serde(rename = "OK")]
    pub ok: u64,
    #[serde(rename = "NG")]
    pub ng: u64,
    #[serde(rename = "Input")]
    pub input: u64,
    #[serde(rename = "Yield (%)")]
    pub yield_pct: Option<f64>,
}

impl From<&Record> for DetailRow {
    fn from(r: &Record) -> Self {
        DetailRow {
            line: r.line().to_string(),
            time: r.time().to_string(),
            ok: r.ok_count(),
            ng: r.ng_count(),
            input: r.input_count(),
            yield_pct: r.yield_pct(),
        }
    }
}

/// Everything shown for a single selected model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetailView {
    pub model: String,
    pub rows: Vec<DetailRow>,
    pub total: GroupSummary,
}
