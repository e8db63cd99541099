//! History provider trait and structured error types.
//!
//! The `HistoryProvider` trait abstracts over the market-data source so the
//! orchestrator can be exercised with a mock in tests. Frames come back in
//! provider-native shape (column casing, nulls, no dedup) — the normalizer
//! owns the reshape into the canonical schema.

use crate::exchange::Exchange;
use chrono::NaiveDate;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Resolved download window for one ingestion run. Ephemeral — recomputed
/// from the table's `max(date)` on every run, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DownloadWindow {
    /// Entire available history per ticker (empty table, or a forced full
    /// download).
    Full,
    /// Incremental: everything from this date through today, inclusive.
    Since(NaiveDate),
    /// Explicit range, both ends inclusive (manual runs).
    Range { start: NaiveDate, end: NaiveDate },
}

/// Raw per-ticker result of a batch fetch.
///
/// `frame` uses the provider's own column names and may contain nulls; a
/// ticker with no data has a zero-height frame.
#[derive(Debug)]
pub struct TickerFrame {
    pub symbol: String,
    pub frame: DataFrame,
}

impl TickerFrame {
    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }
}

/// Errors for a wholesale batch failure.
///
/// A single ticker with no data is *not* an error — it comes back as an
/// empty `TickerFrame` and is skipped downstream.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("provider request timed out for {symbol}")]
    Timeout { symbol: String },

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("authentication required: {0}")]
    AuthenticationRequired(String),

    #[error("provider error: {0}")]
    Other(String),
}

/// A market-data source for daily OHLCV history.
pub trait HistoryProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch daily bars for every ticker in one batch over the window.
    ///
    /// Must return exactly one frame per requested ticker, in request
    /// order; tickers without data yield empty frames. Any `Err` means the
    /// whole batch failed and the run must abort.
    fn fetch_batch(
        &self,
        tickers: &[String],
        window: &DownloadWindow,
        exchange: Exchange,
    ) -> Result<Vec<TickerFrame>, ProviderError>;
}
