//! Record sources and the snapshot cache that sits in front of them.
//!
//! A [`RecordSource`] produces raw rows from a published sheet or a local
//! file. [`CachedLoader`] turns those rows into a [`Snapshot`] and keeps the
//! last good one around, so a failed refresh never leaves the caller empty.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tracing::{debug, info, warn};

use crate::error::SourceUnavailable;
use crate::fetch::{BasicClient, HttpClient, fetch_bytes};
use crate::parser::{RawRow, parse_rows};
use crate::records::{DroppedRow, Record, clean_and_derive};

/// Anything that can hand back the raw rows of a production sheet.
#[async_trait]
pub trait RecordSource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<RawRow>, SourceUnavailable>;

    /// Human-readable location, used in logs and snapshots.
    fn describe(&self) -> String;
}

#[async_trait]
impl<S: RecordSource + ?Sized> RecordSource for Box<S> {
    async fn fetch(&self) -> Result<Vec<RawRow>, SourceUnavailable> {
        (**self).fetch().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// A sheet published as CSV at an HTTP(S) URL.
pub struct SheetSource<C> {
    client: C,
    url: String,
}

impl<C: HttpClient> SheetSource<C> {
    pub fn new(client: C, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }
}

#[async_trait]
impl<C: HttpClient> RecordSource for SheetSource<C> {
    async fn fetch(&self) -> Result<Vec<RawRow>, SourceUnavailable> {
        debug!(url = %self.url, "Fetching published sheet");
        let bytes = fetch_bytes(&self.client, &self.url).await?;
        parse_rows(&bytes)
    }

    fn describe(&self) -> String {
        self.url.clone()
    }
}

/// A CSV file on local disk.
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl RecordSource for FileSource {
    async fn fetch(&self) -> Result<Vec<RawRow>, SourceUnavailable> {
        debug!(path = %self.path.display(), "Reading local sheet");
        let bytes = tokio::fs::read(&self.path).await?;
        parse_rows(&bytes)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Picks an HTTP source for `http(s)://` locations and a file source otherwise.
pub fn source_for(location: &str) -> Result<Box<dyn RecordSource>, SourceUnavailable> {
    if location.starts_with("http://") || location.starts_with("https://") {
        Ok(Box::new(SheetSource::new(BasicClient::new()?, location)))
    } else {
        Ok(Box::new(FileSource::new(location)))
    }
}

/// One successful load: cleaned records plus what was dropped on the way.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub source: String,
    pub loaded_at: DateTime<Utc>,
    pub raw_rows: usize,
    pub records: Vec<Record>,
    pub dropped: Vec<DroppedRow>,
}

/// Fetches and cleans one batch from `source`.
#[tracing::instrument(skip(source), fields(source = %source.describe()))]
pub async fn load_snapshot<S: RecordSource + ?Sized>(
    source: &S,
) -> Result<Snapshot, SourceUnavailable> {
    let rows = source.fetch().await?;
    let cleaned = clean_and_derive(&rows);

    let snapshot = Snapshot {
        source: source.describe(),
        loaded_at: Utc::now(),
        raw_rows: rows.len(),
        records: cleaned.records,
        dropped: cleaned.dropped,
    };

    info!(
        source = %snapshot.source,
        raw_rows = snapshot.raw_rows,
        records = snapshot.records.len(),
        dropped = snapshot.dropped.len(),
        "Snapshot loaded"
    );
    Ok(snapshot)
}

/// Caches the last good [`Snapshot`] of a source until told to reload.
pub struct CachedLoader<S> {
    source: S,
    snapshot: Option<Snapshot>,
    stale: bool,
}

impl<S: RecordSource> CachedLoader<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            snapshot: None,
            stale: false,
        }
    }

    /// Returns the cached snapshot, fetching first if there is none or it was invalidated.
    ///
    /// On failure the previous snapshot stays cached and can still be read
    /// through [`CachedLoader::last`].
    pub async fn load(&mut self) -> Result<&Snapshot, SourceUnavailable> {
        let current = match self.snapshot.take() {
            Some(snapshot) if !self.stale => snapshot,
            previous => {
                self.snapshot = previous;
                let fresh = match load_snapshot(&self.source).await {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        warn!(
                            source = %self.source.describe(),
                            error = %e,
                            has_previous = self.snapshot.is_some(),
                            "Load failed, keeping previous snapshot"
                        );
                        return Err(e);
                    }
                };
                self.stale = false;
                fresh
            }
        };
        Ok(self.snapshot.insert(current))
    }

    /// Marks the cache stale. The snapshot itself is kept until a reload succeeds.
    pub fn invalidate(&mut self) {
        self.stale = true;
    }

    /// Invalidates and reloads.
    pub async fn refresh(&mut self) -> Result<&Snapshot, SourceUnavailable> {
        self.invalidate();
        self.load().await
    }

    /// Last successfully loaded snapshot, stale or not.
    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::Write;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays canned fetch results in order.
    struct ScriptedSource {
        responses: Mutex<VecDeque<Result<Vec<RawRow>, SourceUnavailable>>>,
        calls: AtomicUsize,
    }

    impl ScriptedSource {
        fn new(responses: Vec<Result<Vec<RawRow>, SourceUnavailable>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RecordSource for ScriptedSource {
        async fn fetch(&self) -> Result<Vec<RawRow>, SourceUnavailable> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SourceUnavailable::MissingColumns(vec![])))
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    fn rows(csv: &str) -> Vec<RawRow> {
        parse_rows(csv.as_bytes()).unwrap()
    }

    fn unavailable() -> SourceUnavailable {
        SourceUnavailable::Status {
            status: 503,
            url: "https://example.invalid/pub?output=csv".to_string(),
        }
    }

    #[tokio::test]
    async fn test_load_is_cached_until_invalidated() {
        let source = ScriptedSource::new(vec![
            Ok(rows("Model,Line,Time,OK,NG\nA,1,08:00,9,1\n")),
            Ok(rows("Model,Line,Time,OK,NG\nA,1,08:00,9,1\nB,1,08:00,1,1\n")),
        ]);
        let mut loader = CachedLoader::new(source);

        assert_eq!(loader.load().await.unwrap().records.len(), 1);
        assert_eq!(loader.load().await.unwrap().records.len(), 1);
        assert_eq!(loader.source.calls.load(Ordering::SeqCst), 1);

        loader.invalidate();
        assert!(loader.is_stale());
        assert_eq!(loader.load().await.unwrap().records.len(), 2);
        assert!(!loader.is_stale());
        assert_eq!(loader.source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let source = ScriptedSource::new(vec![
            Ok(rows("Model,Line,Time,OK,NG\nA,1,08:00,9,1\n")),
            Err(unavailable()),
        ]);
        let mut loader = CachedLoader::new(source);
        let first_loaded_at = loader.load().await.unwrap().loaded_at;

        let err = loader.refresh().await.unwrap_err();
        assert!(matches!(err, SourceUnavailable::Status { status: 503, .. }));

        let last = loader.last().expect("previous snapshot retained");
        assert_eq!(last.records.len(), 1);
        assert_eq!(last.loaded_at, first_loaded_at);
        assert!(loader.is_stale());
    }

    #[tokio::test]
    async fn test_first_load_failure_leaves_nothing_cached() {
        let mut loader = CachedLoader::new(ScriptedSource::new(vec![Err(unavailable())]));

        assert!(loader.load().await.is_err());
        assert!(loader.last().is_none());
    }

    #[tokio::test]
    async fn test_snapshot_reports_dropped_rows() {
        let source = ScriptedSource::new(vec![Ok(rows(
            "Model,Line,Time,OK,NG\nA,1,08:00,90,10\nA,2,09:00,80,20\nB,1,08:00,,5\n",
        ))]);
        let mut loader = CachedLoader::new(source);
        let snapshot = loader.load().await.unwrap();

        assert_eq!(snapshot.raw_rows, 3);
        assert_eq!(snapshot.records.len(), 2);
        assert_eq!(snapshot.dropped.len(), 1);
        assert_eq!(snapshot.dropped[0].index, 2);
        assert_eq!(snapshot.source, "scripted");
    }

    #[tokio::test]
    async fn test_file_source_reads_csv() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "Model,Line,Time,OK,NG").unwrap();
        writeln!(file, "A,1,08:00,90,10").unwrap();

        let source = FileSource::new(&path);
        let fetched = source.fetch().await.unwrap();

        assert_eq!(fetched.len(), 1);
        assert_eq!(fetched[0]["Model"], "A");
    }

    #[tokio::test]
    async fn test_file_source_missing_file_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("nope.csv"));

        assert!(matches!(
            source.fetch().await,
            Err(SourceUnavailable::Io(_))
        ));
    }

    /// Serves one fixed HTTP response for every request.
    struct CannedClient {
        status: u16,
        body: &'static str,
    }

    #[async_trait]
    impl HttpClient for CannedClient {
        async fn execute(&self, _req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
            let resp = http::Response::builder()
                .status(self.status)
                .body(self.body)
                .unwrap();
            Ok(resp.into())
        }
    }

    const SHEET_URL: &str = "https://example.invalid/pub?output=csv";

    #[tokio::test]
    async fn test_sheet_source_parses_published_csv() {
        let client = CannedClient {
            status: 200,
            body: "Model,Line,Time,OK,NG\nA,1,08:00,90,10\nB,2,09:00,1,\n",
        };
        let source = SheetSource::new(client, SHEET_URL);
        let fetched = source.fetch().await.unwrap();

        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0]["OK"], "90");
        assert!(!fetched[1].contains_key("NG"));
        assert_eq!(source.describe(), SHEET_URL);
    }

    #[tokio::test]
    async fn test_sheet_source_server_error_is_status() {
        let source = SheetSource::new(
            CannedClient {
                status: 503,
                body: "",
            },
            SHEET_URL,
        );

        match source.fetch().await {
            Err(SourceUnavailable::Status { status, url }) => {
                assert_eq!(status, 503);
                assert_eq!(url, SHEET_URL);
            }
            other => panic!("expected Status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_sheet_source_invalid_url() {
        let source = SheetSource::new(
            CannedClient {
                status: 200,
                body: "",
            },
            "not a url",
        );

        assert!(matches!(
            source.fetch().await,
            Err(SourceUnavailable::InvalidUrl { .. })
        ));
    }

    #[tokio::test]
    async fn test_sheet_source_failure_keeps_cached_snapshot() {
        let good = SheetSource::new(
            CannedClient {
                status: 200,
                body: "Model,Line,Time,OK,NG\nA,1,08:00,90,10\n",
            },
            SHEET_URL,
        );
        let mut loader = CachedLoader::new(good);
        loader.load().await.unwrap();

        loader.source = SheetSource::new(
            CannedClient {
                status: 503,
                body: "",
            },
            SHEET_URL,
        );
        assert!(matches!(
            loader.refresh().await,
            Err(SourceUnavailable::Status { status: 503, .. })
        ));
        assert_eq!(loader.last().unwrap().records.len(), 1);
    }

    #[test]
    fn test_source_for_picks_by_scheme() {
        let file = source_for("data/sheet.csv").unwrap();
        assert_eq!(file.describe(), "data/sheet.csv");

        let sheet = source_for("https://docs.example.com/pub?output=csv").unwrap();
        assert_eq!(sheet.describe(), "https://docs.example.com/pub?output=csv");
    }
}
