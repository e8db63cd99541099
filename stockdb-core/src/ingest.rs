//! Ingestion orchestration.
//!
//! One run per (exchange, trigger): resolve freshness, plan batches, fetch
//! and normalize each batch, concatenate, then a single merge. The merge
//! is deliberately deferred to the end — a provider failure in batch N
//! aborts the run with the table untouched, and concurrent readers never
//! observe a partially ingested run.

use crate::batch::plan_batches;
use crate::config::IngestionConfig;
use crate::equity::EquityRef;
use crate::exchange::Exchange;
use crate::freshness::{data_cutoff, Freshness};
use crate::normalize::{empty_fetch_frame, enrich, normalize_batch};
use crate::provider::{DownloadWindow, HistoryProvider, ProviderError};
use crate::store::{MergeStats, StoreError, VersionedTable};
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::{concat, UnionArgs};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum IngestError {
    /// Bad request or configuration, rejected before any network or store
    /// I/O. Retrying without changing the input is pointless.
    #[error("invalid request: {0}")]
    Validation(String),

    /// Upstream provider failure for a whole batch call.
    #[error("provider failure: {0}")]
    Provider(#[from] ProviderError),

    /// Storage failure. `StoreError::Conflict` inside is retryable.
    #[error("store failure: {0}")]
    Store(#[from] StoreError),

    /// Columnar pipeline failure between fetch and merge.
    #[error("frame pipeline error: {0}")]
    Frame(String),
}

/// How the run was triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskMode {
    /// Scheduled: the run decides for itself whether data is needed.
    Auto,
    /// Operator-driven: always runs, window from the request.
    Manual,
}

/// What to download once a run is underway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadMode {
    Incremental,
    Full,
}

/// A validated-on-entry ingestion trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRequest {
    pub exchange: Exchange,
    pub mode: TaskMode,
    pub download_mode: DownloadMode,
    /// Explicit ticker subset; defaults to the exchange's equity universe.
    pub tickers: Option<Vec<String>>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl IngestionRequest {
    /// Scheduled incremental run over the full universe.
    pub fn auto(exchange: Exchange) -> Self {
        Self {
            exchange,
            mode: TaskMode::Auto,
            download_mode: DownloadMode::Incremental,
            tickers: None,
            start: None,
            end: None,
        }
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        match (self.mode, self.download_mode) {
            (TaskMode::Auto, _) => {
                if self.start.is_some() || self.end.is_some() {
                    return Err(IngestError::Validation(
                        "auto mode determines its own window; explicit dates are not allowed"
                            .into(),
                    ));
                }
            }
            (TaskMode::Manual, DownloadMode::Incremental) => match (self.start, self.end) {
                (Some(start), Some(end)) => {
                    if start > end {
                        return Err(IngestError::Validation(format!(
                            "start date {start} is after end date {end}"
                        )));
                    }
                }
                _ => {
                    return Err(IngestError::Validation(
                        "manual incremental runs require both start and end dates".into(),
                    ))
                }
            },
            (TaskMode::Manual, DownloadMode::Full) => {
                if self.start.is_some() || self.end.is_some() {
                    return Err(IngestError::Validation(
                        "full downloads cover all history; explicit dates are not allowed".into(),
                    ));
                }
            }
        }

        if let Some(tickers) = &self.tickers {
            if tickers.is_empty() {
                return Err(IngestError::Validation(
                    "explicit ticker list must not be empty".into(),
                ));
            }
        }
        Ok(())
    }
}

/// What a finished run did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "result")]
pub enum RunOutcome {
    /// Freshness cutoff not yet passed — nothing fetched, nothing merged.
    NoNewData,
    Merged(MergeStats),
}

/// Structural summary returned to the trigger interface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub exchange: Exchange,
    pub outcome: RunOutcome,
    pub window: Option<DownloadWindow>,
    pub tickers_requested: usize,
    /// Tickers that produced no rows this run (delisted, unknown, or just
    /// quiet) — excluded from the merge, not errors.
    pub tickers_skipped: Vec<String>,
    pub batches: usize,
}

impl IngestionReport {
    fn no_new_data(exchange: Exchange) -> Self {
        Self {
            exchange,
            outcome: RunOutcome::NoNewData,
            window: None,
            tickers_requested: 0,
            tickers_skipped: Vec::new(),
            batches: 0,
        }
    }
}

/// The ingestion orchestrator. Construct once with a config and provider;
/// each `run` call is one complete state machine pass.
pub struct Ingestor<'a> {
    config: IngestionConfig,
    provider: &'a dyn HistoryProvider,
}

impl<'a> Ingestor<'a> {
    pub fn new(config: IngestionConfig, provider: &'a dyn HistoryProvider) -> Self {
        Self { config, provider }
    }

    /// Run ingestion with the current wall clock.
    pub fn run(&self, request: &IngestionRequest) -> Result<IngestionReport, IngestError> {
        self.run_at(request, chrono::Local::now().naive_local())
    }

    /// Run ingestion as of an explicit `now` (injected for deterministic
    /// tests). Merge conflicts re-resolve freshness and retry the whole
    /// run, up to the configured limit.
    pub fn run_at(
        &self,
        request: &IngestionRequest,
        now: NaiveDateTime,
    ) -> Result<IngestionReport, IngestError> {
        self.config
            .validate()
            .map_err(|e| IngestError::Validation(e.to_string()))?;
        request.validate()?;

        let mut attempt = 0;
        loop {
            match self.run_once(request, now) {
                Err(IngestError::Store(StoreError::Conflict { version }))
                    if attempt < self.config.max_merge_retries =>
                {
                    attempt += 1;
                    warn!(
                        exchange = %request.exchange,
                        version,
                        attempt,
                        "merge conflict, re-resolving freshness and retrying run"
                    );
                }
                other => return other,
            }
        }
    }

    fn run_once(
        &self,
        request: &IngestionRequest,
        now: NaiveDateTime,
    ) -> Result<IngestionReport, IngestError> {
        let root = &self.config.store_root;
        let exchange = request.exchange;
        let mut history = VersionedTable::open(&exchange.history_dir(root))?;

        // One max(date) read answers both "needed at all" and "from when".
        let freshness = Freshness::read(&history)?;
        if request.mode == TaskMode::Auto {
            let cutoff = data_cutoff(now);
            if !freshness.is_stale(cutoff) {
                info!(%exchange, %cutoff, "no new data to download");
                return Ok(IngestionReport::no_new_data(exchange));
            }
        }

        let window = match (request.mode, request.download_mode) {
            (_, DownloadMode::Full) => DownloadWindow::Full,
            (TaskMode::Auto, DownloadMode::Incremental) => freshness.window(),
            (TaskMode::Manual, DownloadMode::Incremental) => match (request.start, request.end) {
                (Some(start), Some(end)) => DownloadWindow::Range { start, end },
                _ => {
                    return Err(IngestError::Validation(
                        "manual incremental runs require both start and end dates".into(),
                    ))
                }
            },
        };

        let equity = EquityRef::open(root, exchange)?;
        let tickers = match &request.tickers {
            Some(list) => dedup_upper(list),
            None => equity.symbols()?,
        };
        let batches = plan_batches(&tickers, self.config.batch_size)?;
        let batch_total = batches.len();
        info!(
            %exchange,
            ?window,
            tickers = tickers.len(),
            batches = batch_total,
            "starting ingestion run"
        );

        let mut skipped = Vec::new();
        let mut normalized = Vec::with_capacity(batch_total);
        for (index, batch) in batches.iter().enumerate() {
            debug!(
                batch = index + 1,
                total = batch_total,
                size = batch.len(),
                "fetching batch"
            );
            let frames = self.provider.fetch_batch(batch, &window, exchange)?;
            for frame in &frames {
                if frame.is_empty() {
                    skipped.push(frame.symbol.clone());
                }
            }
            normalized.push(normalize_batch(&frames, equity.scan()?)?);
        }

        let combined = if normalized.is_empty() {
            enrich(empty_fetch_frame(), equity.scan()?)
        } else {
            concat(&normalized, UnionArgs::default())
                .map_err(|e| IngestError::Frame(format!("run concatenation: {e}")))?
        };
        let frame = combined
            .collect()
            .map_err(|e| IngestError::Frame(format!("collecting run frame: {e}")))?;

        // The single merge of the run.
        let stats = history.merge(&frame)?;
        info!(
            %exchange,
            inserted = stats.rows_inserted,
            updated = stats.rows_updated,
            skipped = skipped.len(),
            "ingestion run merged"
        );

        Ok(IngestionReport {
            exchange,
            outcome: RunOutcome::Merged(stats),
            window: Some(window),
            tickers_requested: tickers.len(),
            tickers_skipped: skipped,
            batches: batch_total,
        })
    }
}

/// Uppercase and dedup an explicit ticker list, preserving order.
fn dedup_upper(tickers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let upper = ticker.to_uppercase();
        if seen.insert(upper.clone()) {
            out.push(upper);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn manual(download_mode: DownloadMode) -> IngestionRequest {
        IngestionRequest {
            exchange: Exchange::Nse,
            mode: TaskMode::Manual,
            download_mode,
            tickers: None,
            start: None,
            end: None,
        }
    }

    #[test]
    fn auto_request_with_dates_is_rejected() {
        let mut request = IngestionRequest::auto(Exchange::Nse);
        request.start = Some(date(2024, 1, 1));
        assert!(matches!(
            request.validate().unwrap_err(),
            IngestError::Validation(_)
        ));
    }

    #[test]
    fn auto_request_without_dates_is_valid() {
        assert!(IngestionRequest::auto(Exchange::Nse).validate().is_ok());
    }

    #[test]
    fn manual_incremental_requires_both_dates() {
        let mut request = manual(DownloadMode::Incremental);
        assert!(request.validate().is_err());

        request.start = Some(date(2024, 1, 1));
        assert!(request.validate().is_err());

        request.end = Some(date(2024, 2, 1));
        assert!(request.validate().is_ok());
    }

    #[test]
    fn manual_incremental_rejects_inverted_range() {
        let mut request = manual(DownloadMode::Incremental);
        request.start = Some(date(2024, 2, 1));
        request.end = Some(date(2024, 1, 1));
        assert!(matches!(
            request.validate().unwrap_err(),
            IngestError::Validation(_)
        ));
    }

    #[test]
    fn manual_full_forbids_dates() {
        let mut request = manual(DownloadMode::Full);
        assert!(request.validate().is_ok());
        request.end = Some(date(2024, 1, 1));
        assert!(request.validate().is_err());
    }

    #[test]
    fn empty_explicit_ticker_list_is_rejected() {
        let mut request = IngestionRequest::auto(Exchange::Nse);
        request.tickers = Some(Vec::new());
        assert!(matches!(
            request.validate().unwrap_err(),
            IngestError::Validation(_)
        ));
    }

    #[test]
    fn dedup_upper_preserves_first_occurrence_order() {
        let input = vec![
            "tcs".to_string(),
            "INFY".to_string(),
            "TCS".to_string(),
            "wipro".to_string(),
        ];
        assert_eq!(dedup_upper(&input), vec!["TCS", "INFY", "WIPRO"]);
    }
}
