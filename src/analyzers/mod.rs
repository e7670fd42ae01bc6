//! Per-model aggregation of production records.
//!
//! Groups cleaned records by model, sums their OK/NG counts and derives the
//! group yield from the totals. Also builds the detail view for one model.

pub mod aggregate;
pub mod types;
