//! Normalization and enrichment of raw provider frames.
//!
//! Reshapes provider-native frames into the canonical history schema:
//! column renames, null-row drops, ticker stamping, dtype casts, the
//! company left join. Empty inputs come out as zero-row frames with the
//! full canonical schema, so concatenation downstream never depends on
//! which tickers happened to have data.

use crate::ingest::IngestError;
use crate::provider::TickerFrame;
use crate::schema::{history_fetch_schema, HISTORY_REQUIRED};
use polars::prelude::*;

fn frame_err(context: &str, err: PolarsError) -> IngestError {
    IngestError::Frame(format!("{context}: {err}"))
}

/// Reshape one raw per-ticker frame into the pre-join canonical form.
///
/// The date-like column ("Date" or "Datetime") becomes `date`; the
/// remaining provider columns are lowercased; rows with a null in any
/// required field and bars violating `high ≥ low` / `volume ≥ 0` are
/// dropped; `ticker` is stamped from the batch symbol.
pub fn canonical_frame(symbol: &str, raw: &DataFrame) -> Result<LazyFrame, IngestError> {
    if raw.height() == 0 {
        return Ok(empty_fetch_frame());
    }

    let existing: Vec<String> = raw
        .get_column_names()
        .iter()
        .map(|name| name.to_string())
        .collect();
    let renamed: Vec<String> = existing
        .iter()
        .map(|name| {
            if name == "Date" || name == "Datetime" {
                "date".to_string()
            } else {
                name.to_lowercase()
            }
        })
        .collect();

    let required: Vec<Expr> = HISTORY_REQUIRED.iter().map(|c| col(*c)).collect();

    Ok(raw
        .clone()
        .lazy()
        .rename(existing, renamed, true)
        .drop_nulls(Some(required))
        .filter(
            col("high")
                .gt_eq(col("low"))
                .and(col("volume").gt_eq(lit(0))),
        )
        .with_columns([lit(symbol.to_uppercase()).alias("ticker")])
        .select([
            col("date").cast(DataType::Date),
            col("open").cast(DataType::Float32),
            col("high").cast(DataType::Float32),
            col("low").cast(DataType::Float32),
            col("close").cast(DataType::Float32),
            col("volume").cast(DataType::Int64),
            col("ticker"),
        ]))
}

/// Zero-row frame with the pre-join canonical schema.
pub fn empty_fetch_frame() -> LazyFrame {
    DataFrame::empty_with_schema(&history_fetch_schema()).lazy()
}

/// Attach `company` from the equity reference and project the canonical
/// column order. Tickers without equity metadata keep a null company
/// rather than being dropped.
pub fn enrich(history: LazyFrame, equity: LazyFrame) -> LazyFrame {
    history
        .join(
            equity.select([col("symbol"), col("company")]),
            [col("ticker")],
            [col("symbol")],
            JoinArgs::new(JoinType::Left),
        )
        .select([
            col("date"),
            col("ticker"),
            col("company"),
            col("open"),
            col("high"),
            col("low"),
            col("close"),
            col("volume"),
        ])
}

/// Normalize one batch end to end: canonicalize every per-ticker frame,
/// concat vertically, enrich with the equity reference.
pub fn normalize_batch(
    frames: &[TickerFrame],
    equity: LazyFrame,
) -> Result<LazyFrame, IngestError> {
    let mut canonical = Vec::with_capacity(frames.len());
    for ticker_frame in frames {
        canonical.push(canonical_frame(&ticker_frame.symbol, &ticker_frame.frame)?);
    }

    let combined = if canonical.is_empty() {
        empty_fetch_frame()
    } else {
        concat(&canonical, UnionArgs::default())
            .map_err(|e| frame_err("batch concatenation", e))?
    };

    Ok(enrich(combined, equity))
}
