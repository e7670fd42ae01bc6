use crate::analyzers::types::{DetailRow, DetailView, GroupSummary};
use crate::records::{Record, yield_pct};

/// Distinct model names in first-occurrence order.
pub fn distinct_models(records: &[Record]) -> Vec<String> {
    let mut models: Vec<String> = Vec::new();
    for r in records {
        if !models.iter().any(|m| m == r.model()) {
            models.push(r.model().to_string());
        }
    }
    models
}

/// The model selected when the caller has not picked one.
pub fn default_model(records: &[Record]) -> Option<&str> {
    records.first().map(Record::model)
}

/// Records for `model`, in their original order. Unknown models give an empty vec.
pub fn filter_by_model(records: &[Record], model: &str) -> Vec<Record> {
    records
        .iter()
        .filter(|r| r.model() == model)
        .cloned()
        .collect()
}

/// Sums counts over `records` and derives the group yield from the totals.
///
/// The model name is taken from the first record, so callers pass a slice
/// already filtered to one model. Returns `None` for an empty slice.
pub fn summarize_one(records: &[Record]) -> Option<GroupSummary> {
    let first = records.first()?;
    Some(totals(first.model(), records.iter()))
}

/// One [`GroupSummary`] per model, ordered as [`distinct_models`].
pub fn summarize_all(records: &[Record]) -> Vec<GroupSummary> {
    distinct_models(records)
        .into_iter()
        .map(|model| {
            let group = records.iter().filter(|r| r.model() == model);
            totals(&model, group)
        })
        .collect()
}

/// Detail rows plus the total row for one model.
pub fn detail_view(records: &[Record], model: &str) -> DetailView {
    let selected = filter_by_model(records, model);
    let total = summarize_one(&selected).unwrap_or_else(|| empty_summary(model));

    DetailView {
        model: model.to_string(),
        rows: selected.iter().map(DetailRow::from).collect(),
        total,
    }
}

fn totals<'a>(model: &str, records: impl Iterator<Item = &'a Record>) -> GroupSummary {
    // u128: sums of u64 counts cannot overflow
    let (total_ok, total_ng) = records.fold((0u128, 0u128), |(ok, ng), r| {
        (ok + u128::from(r.ok_count()), ng + u128::from(r.ng_count()))
    });

    GroupSummary {
        model: model.to_string(),
        total_ok,
        total_ng,
        total_input: total_ok + total_ng,
        group_yield_pct: yield_pct(total_ok, total_ng),
    }
}

fn empty_summary(model: &str) -> GroupSummary {
    totals(model, std::iter::empty())
}
