//! Freshness resolution: is a run needed, and over which window?
//!
//! Both questions are answered from one `max(date)` aggregate so "check"
//! and "act" can never disagree within a run. The 18:00 settlement rule
//! lives here as a single pure function — the ingestion gate and any
//! health check must share it, not duplicate it.

use crate::provider::DownloadWindow;
use crate::store::{StoreError, VersionedTable};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use tracing::debug;

/// The latest date for which the trading day is considered settled: today
/// once the local clock reaches 18:00, otherwise yesterday.
pub fn data_cutoff(now: NaiveDateTime) -> NaiveDate {
    if now.hour() >= 18 {
        now.date()
    } else {
        now.date() - chrono::Duration::days(1)
    }
}

/// Snapshot of a table's freshness, read once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Freshness {
    max_date: Option<NaiveDate>,
}

impl Freshness {
    /// Read `max(date)` from the table via a pushdown aggregate.
    pub fn read(table: &VersionedTable) -> Result<Self, StoreError> {
        let max_date = table.max_date()?;
        debug!(?max_date, "resolved table freshness");
        Ok(Self { max_date })
    }

    #[cfg(test)]
    fn from_max_date(max_date: Option<NaiveDate>) -> Self {
        Self { max_date }
    }

    /// Latest ingested date, if any.
    pub fn max_date(&self) -> Option<NaiveDate> {
        self.max_date
    }

    /// Download window for the next run: full history for an empty table,
    /// otherwise everything after the last ingested day.
    pub fn window(&self) -> DownloadWindow {
        match self.max_date {
            None => DownloadWindow::Full,
            Some(max) => DownloadWindow::Since(max + chrono::Duration::days(1)),
        }
    }

    /// Whether new data can exist at all, given the settlement cutoff. An
    /// empty table is always stale.
    pub fn is_stale(&self, cutoff: NaiveDate) -> bool {
        match self.max_date {
            None => true,
            Some(max) => max < cutoff,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn cutoff_is_yesterday_before_settlement() {
        let now = date(2024, 3, 11).and_hms_opt(17, 59, 0).unwrap();
        assert_eq!(data_cutoff(now), date(2024, 3, 10));
    }

    #[test]
    fn cutoff_is_today_from_settlement_onward() {
        let now = date(2024, 3, 11).and_hms_opt(18, 0, 0).unwrap();
        assert_eq!(data_cutoff(now), date(2024, 3, 11));

        let later = date(2024, 3, 11).and_hms_opt(23, 30, 0).unwrap();
        assert_eq!(data_cutoff(later), date(2024, 3, 11));
    }

    #[test]
    fn empty_table_resolves_to_full_window() {
        let freshness = Freshness::from_max_date(None);
        assert_eq!(freshness.window(), DownloadWindow::Full);
        assert!(freshness.is_stale(date(2024, 3, 11)));
    }

    #[test]
    fn populated_table_resolves_to_next_day() {
        let freshness = Freshness::from_max_date(Some(date(2024, 3, 10)));
        assert_eq!(
            freshness.window(),
            DownloadWindow::Since(date(2024, 3, 11))
        );
    }

    #[test]
    fn staleness_from_the_same_read() {
        let freshness = Freshness::from_max_date(Some(date(2024, 3, 10)));
        assert!(freshness.is_stale(date(2024, 3, 11)));
        assert!(!freshness.is_stale(date(2024, 3, 10)));
        assert!(!freshness.is_stale(date(2024, 3, 9)));
    }
}
