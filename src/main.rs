//! CLI entry point for the yield board.
//!
//! Loads production counts from a published sheet or a local CSV and prints
//! the per-model detail view, the all-models summary, or a periodically
//! refreshed summary.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};
use yield_board::analyzers::aggregate::{
    default_model, detail_view, distinct_models, summarize_all,
};
use yield_board::analyzers::types::GroupSummary;
use yield_board::loader::{CachedLoader, RecordSource, Snapshot, source_for};
use yield_board::output::{
    HistoryRow, append_history, render_detail, render_summary, to_csv, to_json, write_csv,
};

#[derive(Parser)]
#[command(name = "yield_board")]
#[command(about = "Per-model production yield from a published sheet", long_about = None)]
struct Cli {
    /// URL of the published CSV or path to a local file (falls back to YIELD_SOURCE)
    #[arg(short, long, global = true, value_name = "URL_OR_FILE")]
    source: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
    Csv,
}

#[derive(Subcommand)]
enum Commands {
    /// List models in the order they first appear in the source
    Models,
    /// Show line/time rows and totals for one model
    Detail {
        /// Model to show (defaults to the first model in the source)
        #[arg(short, long)]
        model: Option<String>,

        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Also export the rows to this CSV file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Compare totals and yield across all models
    Summary {
        #[arg(short, long, value_enum, default_value_t = Format::Table)]
        format: Format,

        /// Also export the summary to this CSV file
        #[arg(short, long)]
        output: Option<String>,
    },
    /// Reload the source on an interval and print the summary each time
    Watch {
        /// Seconds between refreshes
        #[arg(short = 'i', long, default_value_t = 60)]
        interval: u64,

        /// Number of refreshes (0 = infinite)
        #[arg(short = 'n', long, default_value_t = 0)]
        samples: usize,

        /// Optional: CSV file to append each round's summary to
        #[arg(long)]
        history: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/yield_board.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("yield_board.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let location = cli
        .source
        .or_else(|| std::env::var("YIELD_SOURCE").ok())
        .context("no source given: pass --source or set YIELD_SOURCE")?;
    let mut loader = CachedLoader::new(source_for(&location)?);

    match cli.command {
        Commands::Models => {
            let snapshot = loader.load().await?;
            report_drops(snapshot);
            for model in distinct_models(&snapshot.records) {
                println!("{model}");
            }
        }
        Commands::Detail {
            model,
            format,
            output,
        } => {
            let snapshot = loader.load().await?;
            report_drops(snapshot);

            let Some(model) = model.or_else(|| default_model(&snapshot.records).map(String::from))
            else {
                warn!("Source has no usable records");
                return Ok(());
            };
            let view = detail_view(&snapshot.records, &model);
            if view.rows.is_empty() {
                warn!(model = %model, "Model not present in source");
            }

            match format {
                Format::Table => print!("{}", render_detail(&view)),
                Format::Json => println!("{}", to_json(&view)?),
                Format::Csv => print!("{}", to_csv(&view.rows)?),
            }
            if let Some(path) = output {
                write_csv(&path, &view.rows)?;
                info!(path = %path, rows = view.rows.len(), "Detail exported");
            }
        }
        Commands::Summary { format, output } => {
            let snapshot = loader.load().await?;
            report_drops(snapshot);

            let summary = summarize_all(&snapshot.records);
            emit_summary(&summary, format)?;
            if let Some(path) = output {
                write_csv(&path, &summary)?;
                info!(path = %path, models = summary.len(), "Summary exported");
            }
        }
        Commands::Watch {
            interval,
            samples,
            history,
        } => {
            watch(&mut loader, interval, samples, history.as_deref()).await?;
        }
    }

    Ok(())
}

fn emit_summary(summary: &[GroupSummary], format: Format) -> Result<()> {
    match format {
        Format::Table => print!("{}", render_summary(summary)),
        Format::Json => println!("{}", to_json(&summary)?),
        Format::Csv => print!("{}", to_csv(summary)?),
    }
    Ok(())
}

/// Logs how many rows the last load had to drop.
fn report_drops(snapshot: &Snapshot) {
    if snapshot.dropped.is_empty() {
        return;
    }
    warn!(
        dropped = snapshot.dropped.len(),
        raw_rows = snapshot.raw_rows,
        "Some rows were incomplete or malformed and were skipped"
    );
}

/// Refreshes the source every `interval` seconds and prints the summary.
///
/// A failed refresh keeps the previous snapshot and prints that instead.
#[tracing::instrument(skip(loader, history))]
async fn watch<S: RecordSource>(
    loader: &mut CachedLoader<S>,
    interval: u64,
    samples: usize,
    history: Option<&str>,
) -> Result<()> {
    if samples == 0 {
        info!(interval, "Refreshing indefinitely. Press Ctrl+C to stop.");
    } else {
        info!(samples, interval, "Starting refresh rounds");
    }

    let mut round = 0;

    loop {
        if samples > 0 && round >= samples {
            break;
        }
        round += 1;

        match loader.refresh().await {
            Ok(snapshot) => {
                report_drops(snapshot);
                let summary = summarize_all(&snapshot.records);
                print!("{}", render_summary(&summary));

                if let Some(path) = history {
                    let rows: Vec<HistoryRow> = summary
                        .iter()
                        .map(|s| HistoryRow::new(snapshot.loaded_at, s))
                        .collect();
                    if let Err(e) = append_history(path, &rows) {
                        error!(path, error = %e, "Failed to append history");
                    }
                }
                info!(round, models = summary.len(), "Refresh complete");
            }
            Err(e) => {
                error!(round, error = %e, "Refresh failed");
                match loader.last() {
                    Some(last) => {
                        warn!(loaded_at = %last.loaded_at, "Showing last good snapshot");
                        print!("{}", render_summary(&summarize_all(&last.records)));
                    }
                    None => warn!("No snapshot loaded yet"),
                }
            }
        }

        if samples == 0 || round < samples {
            tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
        }
    }

    info!(round, "Finished refreshing");
    Ok(())
}
