//! Yahoo Finance history provider.
//!
//! Fetches daily OHLCV bars from Yahoo's v8 chart API: response parsing,
//! retry with exponential backoff, and the exchange suffix convention.
//!
//! Yahoo treats the requested end of a range as *exclusive*, so every
//! ranged request asks for `end + 1 day` — see [`window_bounds`]. Do not
//! "fix" this without checking the provider actually changed; the boundary
//! is pinned by a regression test.

use crate::exchange::Exchange;
use crate::provider::{DownloadWindow, HistoryProvider, ProviderError, TickerFrame};
use chrono::NaiveDate;
use polars::prelude::*;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    open: Vec<Option<f64>>,
    high: Vec<Option<f64>>,
    low: Vec<Option<f64>>,
    close: Vec<Option<f64>>,
    volume: Vec<Option<i64>>,
}

/// Concrete request bounds derived from a [`DownloadWindow`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowBounds {
    /// `range=max` — everything the provider has.
    MaxRange,
    /// Unix-second period bounds; `period2` is already advanced past the
    /// requested inclusive end.
    Period { period1: i64, period2: i64 },
}

/// Translate an ingestion window into provider request bounds.
///
/// `today` is passed in rather than read from the clock so the boundary
/// behavior is testable. The provider returns bars strictly before
/// `period2`, so the inclusive end (`today` for incremental runs, the
/// explicit `end` for manual ranges) is shifted forward by one day.
pub fn window_bounds(window: &DownloadWindow, today: NaiveDate) -> WindowBounds {
    match window {
        DownloadWindow::Full => WindowBounds::MaxRange,
        DownloadWindow::Since(start) => WindowBounds::Period {
            period1: midnight_ts(*start),
            period2: midnight_ts(today + chrono::Duration::days(1)),
        },
        DownloadWindow::Range { start, end } => WindowBounds::Period {
            period1: midnight_ts(*start),
            period2: midnight_ts(*end + chrono::Duration::days(1)),
        },
    }
}

fn midnight_ts(date: NaiveDate) -> i64 {
    date.and_hms_opt(0, 0, 0).unwrap().and_utc().timestamp()
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    max_retries: u32,
    base_delay: Duration,
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            max_retries: 3,
            base_delay: Duration::from_millis(500),
        }
    }

    /// Build the chart API URL for one symbol and resolved bounds.
    fn chart_url(symbol: &str, bounds: WindowBounds) -> String {
        match bounds {
            WindowBounds::MaxRange => format!(
                "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
                 ?range=max&interval=1d"
            ),
            WindowBounds::Period { period1, period2 } => format!(
                "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
                 ?period1={period1}&period2={period2}&interval=1d"
            ),
        }
    }

    /// Parse a chart response into a raw frame.
    ///
    /// `Ok(None)` means the symbol has no data (unknown/delisted or an
    /// empty window) — the caller downgrades that to an empty frame.
    fn parse_response(
        symbol: &str,
        resp: ChartResponse,
    ) -> Result<Option<DataFrame>, ProviderError> {
        let result = match resp.chart.result {
            Some(result) => result,
            None => {
                return match resp.chart.error {
                    Some(err) if err.code == "Not Found" => Ok(None),
                    Some(err) => Err(ProviderError::ResponseFormatChanged(format!(
                        "{}: {}",
                        err.code, err.description
                    ))),
                    None => Err(ProviderError::ResponseFormatChanged(
                        "empty result with no error".into(),
                    )),
                };
            }
        };

        let data = match result.into_iter().next() {
            Some(data) => data,
            None => return Ok(None),
        };

        // No timestamps is how Yahoo reports an empty-but-valid window.
        let timestamps = match data.timestamp {
            Some(ts) if !ts.is_empty() => ts,
            _ => return Ok(None),
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| ProviderError::ResponseFormatChanged("no quote data".into()))?;

        let n = timestamps.len();
        let mut dates: Vec<i32> = Vec::with_capacity(n);
        let mut opens: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut highs: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut lows: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut closes: Vec<Option<f64>> = Vec::with_capacity(n);
        let mut volumes: Vec<Option<i64>> = Vec::with_capacity(n);

        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    ProviderError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;

            let open = quote.open.get(i).copied().flatten();
            let high = quote.high.get(i).copied().flatten();
            let low = quote.low.get(i).copied().flatten();
            let close = quote.close.get(i).copied().flatten();
            let volume = quote.volume.get(i).copied().flatten();

            // Rows where every field is null are non-trading days; rows
            // with partial nulls are kept for the normalizer to drop.
            if open.is_none()
                && high.is_none()
                && low.is_none()
                && close.is_none()
                && volume.is_none()
            {
                continue;
            }

            dates.push((date - epoch).num_days() as i32);
            opens.push(open);
            highs.push(high);
            lows.push(low);
            closes.push(close);
            volumes.push(volume);
        }

        if dates.is_empty() {
            debug!(symbol, "response contained only non-trading rows");
            return Ok(None);
        }

        let frame = DataFrame::new(vec![
            Column::new("Date".into(), dates)
                .cast(&DataType::Date)
                .map_err(|e| ProviderError::Other(format!("date column: {e}")))?,
            Column::new("Open".into(), opens),
            Column::new("High".into(), highs),
            Column::new("Low".into(), lows),
            Column::new("Close".into(), closes),
            Column::new("Volume".into(), volumes),
        ])
        .map_err(|e| ProviderError::Other(format!("raw frame: {e}")))?;

        Ok(Some(frame))
    }

    /// Zero-row frame in provider-native shape for tickers without data.
    fn empty_frame() -> DataFrame {
        DataFrame::empty_with_schema(&Schema::from_iter(vec![
            Field::new("Date".into(), DataType::Date),
            Field::new("Open".into(), DataType::Float64),
            Field::new("High".into(), DataType::Float64),
            Field::new("Low".into(), DataType::Float64),
            Field::new("Close".into(), DataType::Float64),
            Field::new("Volume".into(), DataType::Int64),
        ]))
    }

    /// One symbol request with bounded retries and exponential backoff.
    fn fetch_symbol(
        &self,
        symbol: &str,
        bounds: WindowBounds,
    ) -> Result<Option<DataFrame>, ProviderError> {
        let url = Self::chart_url(symbol, bounds);
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.pow(attempt - 1);
                std::thread::sleep(delay);
            }

            match self.client.get(&url).send() {
                Ok(resp) => {
                    let status = resp.status();

                    if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse::<u64>().ok())
                            .unwrap_or(60);
                        last_error = Some(ProviderError::RateLimited {
                            retry_after_secs: retry_after,
                        });
                        continue;
                    }

                    if status == reqwest::StatusCode::UNAUTHORIZED
                        || status == reqwest::StatusCode::FORBIDDEN
                    {
                        return Err(ProviderError::AuthenticationRequired(format!(
                            "provider refused request with HTTP {status}"
                        )));
                    }

                    if !status.is_success() {
                        last_error =
                            Some(ProviderError::Other(format!("HTTP {status} for {symbol}")));
                        continue;
                    }

                    let chart: ChartResponse = resp.json().map_err(|e| {
                        ProviderError::ResponseFormatChanged(format!(
                            "failed to parse response for {symbol}: {e}"
                        ))
                    })?;

                    return Self::parse_response(symbol, chart);
                }
                Err(e) => {
                    if e.is_timeout() {
                        last_error = Some(ProviderError::Timeout {
                            symbol: symbol.to_string(),
                        });
                        continue;
                    }
                    if e.is_connect() {
                        last_error = Some(ProviderError::NetworkUnreachable(e.to_string()));
                        continue;
                    }
                    return Err(ProviderError::NetworkUnreachable(e.to_string()));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| ProviderError::Other("max retries exceeded".into())))
    }
}

impl HistoryProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_batch(
        &self,
        tickers: &[String],
        window: &DownloadWindow,
        exchange: Exchange,
    ) -> Result<Vec<TickerFrame>, ProviderError> {
        let today = chrono::Local::now().date_naive();
        let bounds = window_bounds(window, today);

        let mut frames = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            let request_symbol = exchange.provider_symbol(ticker);
            let frame = match self.fetch_symbol(&request_symbol, bounds)? {
                Some(frame) => frame,
                None => {
                    warn!(ticker = %ticker, %exchange, "no data from provider, skipping ticker");
                    Self::empty_frame()
                }
            };
            frames.push(TickerFrame {
                symbol: ticker.to_uppercase(),
                frame,
            });
        }
        Ok(frames)
    }
}
