//! Error types shared by the loader side of the pipeline.

use thiserror::Error;

/// The tabular source could not be read for the current refresh.
///
/// Callers are expected to keep serving the last good snapshot when they see
/// this; see [`crate::loader::CachedLoader`].
#[derive(Debug, Error)]
pub enum SourceUnavailable {
    #[error("invalid source url '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("source returned status {status} for {url}")]
    Status { status: u16, url: String },

    #[error("failed to read source: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed csv payload: {0}")]
    Csv(#[from] csv::Error),

    #[error("source is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
}
