//! StockDB Core — versioned OHLCV storage and the ticker-history
//! ingestion pipeline.
//!
//! - Canonical history/equity schemas and validation
//! - Commit-log versioned parquet table store (scan, merge, optimize)
//! - Freshness resolution (incremental vs full windows, 18:00 cutoff)
//! - Batch planning over the ticker universe
//! - Yahoo Finance history provider behind a mockable trait
//! - Normalization/enrichment into the canonical schema
//! - The ingestion orchestrator tying it all together

pub mod batch;
pub mod config;
pub mod equity;
pub mod exchange;
pub mod freshness;
pub mod ingest;
pub mod normalize;
pub mod provider;
pub mod schema;
pub mod store;
pub mod yahoo;

pub use config::IngestionConfig;
pub use equity::EquityRef;
pub use exchange::Exchange;
pub use freshness::{data_cutoff, Freshness};
pub use ingest::{
    DownloadMode, IngestError, IngestionReport, IngestionRequest, Ingestor, RunOutcome, TaskMode,
};
pub use provider::{DownloadWindow, HistoryProvider, ProviderError, TickerFrame};
pub use store::{MergeStats, OptimizeStats, StoreError, VersionedTable};
pub use yahoo::YahooProvider;
