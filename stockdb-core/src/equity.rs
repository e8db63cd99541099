//! Read-only access to the per-exchange equity reference table.
//!
//! The equity table is populated by a separate ingestion path; this core
//! only reads it — for the company join and as the default ticker
//! universe.

use crate::exchange::Exchange;
use crate::store::{StoreError, VersionedTable};
use chrono::NaiveDate;
use polars::prelude::*;
use std::collections::HashSet;
use std::path::Path;

/// One row of equity reference data.
#[derive(Debug, Clone, PartialEq)]
pub struct EquityRow {
    pub symbol: String,
    pub company: String,
    pub index_symbol: Vec<String>,
    pub series: Option<String>,
    pub listing_date: Option<NaiveDate>,
}

/// Build an equity frame in table schema order. Used by equity loaders and
/// test fixtures.
pub fn equity_frame(rows: &[EquityRow]) -> PolarsResult<DataFrame> {
    let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
    let companies: Vec<&str> = rows.iter().map(|r| r.company.as_str()).collect();
    let index_lists: Vec<Series> = rows
        .iter()
        .map(|r| Series::new("".into(), r.index_symbol.as_slice()))
        .collect();
    let series: Vec<Option<&str>> = rows.iter().map(|r| r.series.as_deref()).collect();
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
    let listing_dates: Vec<Option<i32>> = rows
        .iter()
        .map(|r| r.listing_date.map(|d| (d - epoch).num_days() as i32))
        .collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        Column::new("company".into(), companies),
        Column::new("index_symbol".into(), index_lists),
        Column::new("series".into(), series),
        Column::new("listing_date".into(), listing_dates).cast(&DataType::Date)?,
    ])
}

/// Handle to one exchange's equity reference table.
pub struct EquityRef {
    table: VersionedTable,
}

impl EquityRef {
    pub fn open(root: &Path, exchange: Exchange) -> Result<Self, StoreError> {
        Ok(Self {
            table: VersionedTable::open(&exchange.equity_dir(root))?,
        })
    }

    /// Lazy scan of the full reference table.
    pub fn scan(&self) -> Result<LazyFrame, StoreError> {
        self.table.scan()
    }

    /// The exchange's ticker universe: uppercased symbols, deduplicated,
    /// table order preserved.
    pub fn symbols(&self) -> Result<Vec<String>, StoreError> {
        let out = self.scan()?.select([col("symbol")]).collect()?;
        let column = out.column("symbol")?.str()?;

        let mut seen = HashSet::new();
        let mut symbols = Vec::new();
        for value in column.iter().flatten() {
            let upper = value.to_uppercase();
            if seen.insert(upper.clone()) {
                symbols.push(upper);
            }
        }
        Ok(symbols)
    }
}
