//! StockDB CLI — ingestion trigger, table bootstrap, and maintenance.
//!
//! Commands:
//! - `ingest` — run the ticker-history ingestion pipeline for an exchange
//! - `create-tables` — initialize empty history/equity tables
//! - `optimize` — compact and/or vacuum an exchange's history table
//! - `status` — report version, row count, and date range per table

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use stockdb_core::schema::{equity_schema, history_schema};
use stockdb_core::{
    DownloadMode, Exchange, IngestionConfig, IngestionRequest, Ingestor, RunOutcome, StoreError,
    TaskMode, VersionedTable, YahooProvider,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stockdb", about = "StockDB CLI — OHLCV history ingestion")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run ticker-history ingestion for one exchange.
    Ingest {
        /// Exchange identifier (e.g. nse, nasdaq).
        exchange: String,

        /// Trigger mode: auto (freshness-gated) or manual.
        #[arg(long, default_value = "auto")]
        mode: String,

        /// Download mode: incremental or full.
        #[arg(long = "download-mode", default_value = "incremental")]
        download_mode: String,

        /// Explicit ticker subset. Defaults to the equity universe.
        #[arg(long, num_args = 1..)]
        tickers: Option<Vec<String>>,

        /// Start date (YYYY-MM-DD), manual incremental runs only.
        #[arg(long)]
        start: Option<String>,

        /// End date (YYYY-MM-DD), manual incremental runs only.
        #[arg(long)]
        end: Option<String>,
    },
    /// Create empty history and equity tables.
    CreateTables {
        /// Exchange to create tables for; creates all when omitted.
        exchange: Option<String>,
    },
    /// Compact and vacuum an exchange's ticker-history table.
    Optimize {
        exchange: String,

        /// Skip snapshot compaction.
        #[arg(long, default_value_t = false)]
        no_compact: bool,

        /// Skip removal of superseded snapshot files.
        #[arg(long, default_value_t = false)]
        no_vacuum: bool,
    },
    /// Report table versions, row counts, and date ranges.
    Status {
        exchange: String,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Ingest {
            exchange,
            mode,
            download_mode,
            tickers,
            start,
            end,
        } => run_ingest(config, &exchange, &mode, &download_mode, tickers, start, end),
        Commands::CreateTables { exchange } => run_create_tables(config, exchange.as_deref()),
        Commands::Optimize {
            exchange,
            no_compact,
            no_vacuum,
        } => run_optimize(config, &exchange, !no_compact, !no_vacuum),
        Commands::Status { exchange } => run_status(config, &exchange),
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<IngestionConfig> {
    match path {
        Some(path) => {
            IngestionConfig::from_file(path).with_context(|| format!("loading {}", path.display()))
        }
        None => Ok(IngestionConfig::default()),
    }
}

fn parse_exchange(value: &str) -> Result<Exchange> {
    value
        .parse::<Exchange>()
        .with_context(|| format!("valid exchanges: {}", exchange_list()))
}

fn exchange_list() -> String {
    Exchange::ALL
        .iter()
        .map(|e| e.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{value}', expected YYYY-MM-DD"))
}

#[allow(clippy::too_many_arguments)]
fn run_ingest(
    config: IngestionConfig,
    exchange: &str,
    mode: &str,
    download_mode: &str,
    tickers: Option<Vec<String>>,
    start: Option<String>,
    end: Option<String>,
) -> Result<()> {
    let exchange = parse_exchange(exchange)?;
    let mode = match mode {
        "auto" => TaskMode::Auto,
        "manual" => TaskMode::Manual,
        other => bail!("unknown mode '{other}'. Valid: auto, manual"),
    };
    let download_mode = match download_mode {
        "incremental" => DownloadMode::Incremental,
        "full" => DownloadMode::Full,
        other => bail!("unknown download mode '{other}'. Valid: incremental, full"),
    };

    let request = IngestionRequest {
        exchange,
        mode,
        download_mode,
        tickers,
        start: start.as_deref().map(parse_date).transpose()?,
        end: end.as_deref().map(parse_date).transpose()?,
    };

    let provider = YahooProvider::new(config.fetch_timeout());
    let ingestor = Ingestor::new(config, &provider);
    let report = ingestor.run(&request)?;

    match &report.outcome {
        RunOutcome::NoNewData => println!("No new data to download for {exchange}."),
        RunOutcome::Merged(stats) => {
            println!(
                "Merged {} new and {} updated rows into {exchange} ({} tickers, {} skipped, {} batches).",
                stats.rows_inserted,
                stats.rows_updated,
                report.tickers_requested,
                report.tickers_skipped.len(),
                report.batches,
            );
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_create_tables(config: IngestionConfig, exchange: Option<&str>) -> Result<()> {
    let exchanges: Vec<Exchange> = match exchange {
        Some(value) => vec![parse_exchange(value)?],
        None => Exchange::ALL.to_vec(),
    };

    for exchange in exchanges {
        for (label, dir, schema) in [
            (
                "ticker_history",
                exchange.history_dir(&config.store_root),
                history_schema(),
            ),
            (
                "equity",
                exchange.equity_dir(&config.store_root),
                equity_schema(),
            ),
        ] {
            match VersionedTable::create(&dir, &schema) {
                Ok(_) => println!("Created {exchange}/{label} at {}", dir.display()),
                Err(StoreError::AlreadyExists { .. }) => {
                    println!("Skipped {exchange}/{label}: already exists")
                }
                Err(err) => return Err(err.into()),
            }
        }
    }
    Ok(())
}

fn run_optimize(config: IngestionConfig, exchange: &str, compact: bool, vacuum: bool) -> Result<()> {
    let exchange = parse_exchange(exchange)?;
    let mut table = VersionedTable::open(&exchange.history_dir(&config.store_root))?;
    let stats = table.optimize(compact, vacuum)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn run_status(config: IngestionConfig, exchange: &str) -> Result<()> {
    let exchange = parse_exchange(exchange)?;

    println!("{} ({})", exchange, exchange.full_name());
    let history = VersionedTable::open(&exchange.history_dir(&config.store_root))?;
    let range = match (history.min_date()?, history.max_date()?) {
        (Some(min), Some(max)) => format!("{min} to {max}"),
        _ => "(empty)".to_string(),
    };
    println!(
        "  ticker_history  v{:<4} {:>10} rows  {}",
        history.version(),
        history.row_count()?,
        range,
    );

    match VersionedTable::open(&exchange.equity_dir(&config.store_root)) {
        Ok(equity) => println!(
            "  equity          v{:<4} {:>10} rows",
            equity.version(),
            equity.row_count()?,
        ),
        Err(StoreError::NotFound { .. }) => println!("  equity          (missing)"),
        Err(err) => return Err(err.into()),
    }
    Ok(())
}
