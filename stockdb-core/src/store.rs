//! Commit-log versioned parquet tables.
//!
//! Layout: `{table_dir}/part-{version:08}.parquet` snapshot files plus
//! `{table_dir}/_log/{version:08}.json` commit records.
//!
//! - A handle pins the version that was current when it was opened; all
//!   reads go through that snapshot only, so writers never block readers.
//! - Writes are atomic: snapshot to .tmp, rename into place, then publish
//!   by creating the next commit record with `create_new`. Exactly one of
//!   two racing writers wins the record; the loser gets a retryable
//!   `Conflict` and its orphan snapshot is removed.
//! - `optimize` (compact + vacuum) is maintenance only — merge and scan
//!   never depend on it.

use crate::schema::SchemaError;
use chrono::{NaiveDate, NaiveDateTime};
use polars::prelude::*;
use polars::sql::SQLContext;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Merge key identifying a logical history row.
pub const MERGE_KEY: [&str; 2] = ["date", "ticker"];

/// Name a table scan is registered under for SQL filters.
pub const SQL_TABLE_NAME: &str = "stockdb";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no table at {path} — create it before ingesting")]
    NotFound { path: PathBuf },

    #[error("table already exists at {path}")]
    AlreadyExists { path: PathBuf },

    #[error("version {version} does not exist at {path}")]
    VersionNotFound { path: PathBuf, version: u64 },

    #[error("merge conflict: version {version} was committed by another writer")]
    Conflict { version: u64 },

    #[error("schema mismatch: {0}")]
    Schema(#[from] SchemaError),

    #[error("incoming frame has {actual} columns, table has {expected}")]
    ColumnCountMismatch { expected: usize, actual: usize },

    #[error("merge key column '{0}' missing from incoming frame")]
    MissingKey(String),

    #[error("corrupt table at {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("commit record serialization: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("column engine error: {0}")]
    Polars(#[from] PolarsError),
}

/// One entry in a table's commit log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub version: u64,
    pub snapshot: String,
    pub operation: String,
    pub rows: usize,
    pub data_hash: String,
    pub committed_at: NaiveDateTime,
}

/// Result of an upsert merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStats {
    pub rows_inserted: usize,
    pub rows_updated: usize,
    pub rows_total: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CompactionStats {
    pub version: u64,
    pub rows: usize,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct VacuumStats {
    pub files_deleted: usize,
    pub bytes_freed: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct OptimizeStats {
    pub compaction: Option<CompactionStats>,
    pub vacuum: Option<VacuumStats>,
}

/// Handle to one versioned table, pinned to a single committed version.
#[derive(Debug)]
pub struct VersionedTable {
    dir: PathBuf,
    version: u64,
    snapshot: PathBuf,
}

impl VersionedTable {
    /// Initialize an empty, schema-only table. Errors if one already exists.
    pub fn create(dir: &Path, schema: &Schema) -> Result<Self, StoreError> {
        if latest_version(dir)?.is_some() {
            return Err(StoreError::AlreadyExists {
                path: dir.to_path_buf(),
            });
        }
        fs::create_dir_all(log_dir(dir))?;

        let mut empty = DataFrame::empty_with_schema(schema);
        let data_hash = write_snapshot(dir, 0, &mut empty)?;
        commit(
            dir,
            &CommitRecord {
                version: 0,
                snapshot: snapshot_name(0),
                operation: "create".into(),
                rows: 0,
                data_hash,
                committed_at: chrono::Local::now().naive_local(),
            },
        )?;
        info!(table = %dir.display(), "created empty table");

        Ok(Self {
            dir: dir.to_path_buf(),
            version: 0,
            snapshot: snapshot_path(dir, 0),
        })
    }

    /// Open a table at its latest committed version.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        let version = latest_version(dir)?.ok_or_else(|| StoreError::NotFound {
            path: dir.to_path_buf(),
        })?;
        Self::open_at(dir, version)
    }

    /// Open a table pinned to a specific (possibly historical) version.
    pub fn open_at(dir: &Path, version: u64) -> Result<Self, StoreError> {
        let record = read_record(dir, version)?;
        let snapshot = dir.join(&record.snapshot);
        if !snapshot.exists() {
            return Err(StoreError::Corrupt {
                path: snapshot,
                reason: format!(
                    "snapshot for version {version} is gone (superseded versions may have been vacuumed)"
                ),
            });
        }
        Ok(Self {
            dir: dir.to_path_buf(),
            version,
            snapshot,
        })
    }

    /// Version this handle is pinned to.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Lazy scan of the pinned snapshot. Filters and projections applied by
    /// the caller are pushed down into the parquet read.
    pub fn scan(&self) -> Result<LazyFrame, StoreError> {
        Ok(LazyFrame::scan_parquet(
            &self.snapshot,
            ScanArgsParquet::default(),
        )?)
    }

    /// Scan filtered by a single predicate expression.
    pub fn filter(&self, predicate: Expr) -> Result<LazyFrame, StoreError> {
        Ok(self.scan()?.filter(predicate))
    }

    /// Run an ad-hoc SQL `SELECT` with this table registered as `stockdb`.
    pub fn sql(&self, query: &str) -> Result<LazyFrame, StoreError> {
        let mut ctx = SQLContext::new();
        ctx.register(SQL_TABLE_NAME, self.scan()?);
        Ok(ctx.execute(query)?)
    }

    /// Aggregate `max(date)` without materializing rows. `None` on an
    /// empty table.
    pub fn max_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        self.date_aggregate(col("date").max())
    }

    /// Aggregate `min(date)` without materializing rows.
    pub fn min_date(&self) -> Result<Option<NaiveDate>, StoreError> {
        self.date_aggregate(col("date").min())
    }

    fn date_aggregate(&self, expr: Expr) -> Result<Option<NaiveDate>, StoreError> {
        let out = self.scan()?.select([expr]).collect()?;
        let days = out.column("date")?.date()?.get(0);
        Ok(days.map(date_from_days))
    }

    /// Number of rows in the pinned snapshot.
    pub fn row_count(&self) -> Result<usize, StoreError> {
        let out = self.scan()?.select([len()]).collect()?;
        let n = out.column("len")?.u32()?.get(0).unwrap_or(0);
        Ok(n as usize)
    }

    /// Upsert on the `(date, ticker)` merge key.
    pub fn merge(&mut self, incoming: &DataFrame) -> Result<MergeStats, StoreError> {
        self.merge_with_keys(incoming, &MERGE_KEY)
    }

    /// Upsert on an explicit key column set: rows whose key exists are
    /// replaced wholesale, the rest are inserted. Atomic per call — readers
    /// see either the previous version or the fully merged one.
    pub fn merge_with_keys(
        &mut self,
        incoming: &DataFrame,
        keys: &[&str],
    ) -> Result<MergeStats, StoreError> {
        if incoming.height() == 0 {
            // Nothing to merge; avoid committing an identical version.
            debug!(table = %self.dir.display(), "merge skipped: empty input");
            return Ok(MergeStats::default());
        }

        let current = self.scan()?.collect()?;
        check_columns(incoming, &current)?;
        for key in keys {
            if incoming.column(key).is_err() {
                return Err(StoreError::MissingKey((*key).to_string()));
            }
        }

        let sort_cols: Vec<PlSmallStr> = keys.iter().map(|k| PlSmallStr::from(*k)).collect();
        let key_exprs: Vec<Expr> = keys.iter().map(|k| col(*k)).collect();

        // Align column order with the table before the vertical concat.
        let column_order: Vec<Expr> = current
            .get_columns()
            .iter()
            .map(|c| col(c.name().as_str()))
            .collect();
        let deduped = incoming
            .clone()
            .lazy()
            .select(column_order)
            .unique_stable(
                Some(keys.iter().map(|k| (*k).into()).collect()),
                UniqueKeepStrategy::First,
            )
            .collect()?;

        let matched = current
            .select(keys.iter().copied())?
            .lazy()
            .join(
                deduped.select(keys.iter().copied())?.lazy(),
                key_exprs.clone(),
                key_exprs,
                JoinArgs::new(JoinType::Inner),
            )
            .collect()?
            .height();

        // Incoming first: on key collision `unique_stable(First)` keeps the
        // incoming row, which is exactly "when matched, update all columns".
        let merged = concat(
            &[deduped.clone().lazy(), current.lazy()],
            UnionArgs::default(),
        )?
        .unique_stable(
            Some(keys.iter().map(|k| (*k).into()).collect()),
            UniqueKeepStrategy::First,
        )
        .sort(sort_cols, SortMultipleOptions::default())
        .collect()?;

        let stats = MergeStats {
            rows_inserted: deduped.height() - matched,
            rows_updated: matched,
            rows_total: merged.height(),
        };

        let version = self.version + 1;
        let mut merged = merged;
        let data_hash = write_snapshot(&self.dir, version, &mut merged)?;
        let record = CommitRecord {
            version,
            snapshot: snapshot_name(version),
            operation: "merge".into(),
            rows: stats.rows_total,
            data_hash,
            committed_at: chrono::Local::now().naive_local(),
        };

        match commit(&self.dir, &record) {
            Ok(()) => {
                self.version = version;
                self.snapshot = snapshot_path(&self.dir, version);
                info!(
                    table = %self.dir.display(),
                    version,
                    inserted = stats.rows_inserted,
                    updated = stats.rows_updated,
                    "merge committed"
                );
                Ok(stats)
            }
            Err(err) => {
                // Lost the race (or failed to publish): the unreferenced
                // snapshot must not linger.
                let _ = fs::remove_file(snapshot_path(&self.dir, version));
                Err(err)
            }
        }
    }

    /// Maintenance: compact the current snapshot (re-clustered by the merge
    /// key where present) and/or vacuum superseded snapshot files.
    pub fn optimize(&mut self, compact: bool, vacuum: bool) -> Result<OptimizeStats, StoreError> {
        let mut stats = OptimizeStats::default();
        if compact {
            stats.compaction = Some(self.compact()?);
        }
        if vacuum {
            stats.vacuum = Some(self.vacuum()?);
        }
        Ok(stats)
    }

    fn compact(&mut self) -> Result<CompactionStats, StoreError> {
        let current = self.scan()?.collect()?;
        let sort_cols: Vec<PlSmallStr> = MERGE_KEY
            .iter()
            .filter(|k| current.column(k).is_ok())
            .map(|k| PlSmallStr::from(*k))
            .collect();
        let mut compacted = if sort_cols.is_empty() {
            current
        } else {
            current
                .lazy()
                .sort(sort_cols, SortMultipleOptions::default())
                .collect()?
        };

        let version = self.version + 1;
        let rows = compacted.height();
        let data_hash = write_snapshot(&self.dir, version, &mut compacted)?;
        let record = CommitRecord {
            version,
            snapshot: snapshot_name(version),
            operation: "compact".into(),
            rows,
            data_hash,
            committed_at: chrono::Local::now().naive_local(),
        };
        match commit(&self.dir, &record) {
            Ok(()) => {
                self.version = version;
                self.snapshot = snapshot_path(&self.dir, version);
                Ok(CompactionStats { version, rows })
            }
            Err(err) => {
                let _ = fs::remove_file(snapshot_path(&self.dir, version));
                Err(err)
            }
        }
    }

    /// Delete snapshot files older than this handle's version. Logical rows
    /// are untouched; commit records are kept as table history.
    fn vacuum(&self) -> Result<VacuumStats, StoreError> {
        let mut stats = VacuumStats::default();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();

            // Stale .tmp files from interrupted writes are also fair game.
            let superseded = match parse_snapshot_version(&name) {
                Some(version) => version < self.version,
                None => name.ends_with(".parquet.tmp"),
            };
            if !superseded {
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            fs::remove_file(entry.path())?;
            stats.files_deleted += 1;
            stats.bytes_freed += size;
        }
        debug!(
            table = %self.dir.display(),
            files = stats.files_deleted,
            bytes = stats.bytes_freed,
            "vacuum finished"
        );
        Ok(stats)
    }
}

// ── Log and snapshot plumbing ───────────────────────────────────────

fn log_dir(dir: &Path) -> PathBuf {
    dir.join("_log")
}

fn log_path(dir: &Path, version: u64) -> PathBuf {
    log_dir(dir).join(format!("{version:08}.json"))
}

fn snapshot_name(version: u64) -> String {
    format!("part-{version:08}.parquet")
}

fn snapshot_path(dir: &Path, version: u64) -> PathBuf {
    dir.join(snapshot_name(version))
}

fn parse_snapshot_version(file_name: &str) -> Option<u64> {
    file_name
        .strip_prefix("part-")?
        .strip_suffix(".parquet")?
        .parse()
        .ok()
}

/// Highest committed version, or `None` for a missing/empty table.
fn latest_version(dir: &Path) -> Result<Option<u64>, StoreError> {
    let entries = match fs::read_dir(log_dir(dir)) {
        Ok(entries) => entries,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };

    let mut latest = None;
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if let Some(version) = name.strip_suffix(".json").and_then(|s| s.parse::<u64>().ok()) {
            latest = latest.max(Some(version));
        }
    }
    Ok(latest)
}

fn read_record(dir: &Path, version: u64) -> Result<CommitRecord, StoreError> {
    let path = log_path(dir, version);
    let content = fs::read_to_string(&path).map_err(|err| {
        if err.kind() == ErrorKind::NotFound {
            StoreError::VersionNotFound {
                path: dir.to_path_buf(),
                version,
            }
        } else {
            err.into()
        }
    })?;
    serde_json::from_str(&content).map_err(|err| StoreError::Corrupt {
        path,
        reason: format!("unreadable commit record: {err}"),
    })
}

/// Write a snapshot atomically (tmp + fsync + rename); returns its content
/// hash.
fn write_snapshot(dir: &Path, version: u64, df: &mut DataFrame) -> Result<String, StoreError> {
    let path = snapshot_path(dir, version);
    let tmp_path = path.with_extension("parquet.tmp");

    let file = fs::File::create(&tmp_path)?;
    ParquetWriter::new(file).finish(df)?;

    // The rename is what makes the version reachable; flush first so a
    // committed version is durable.
    fs::File::open(&tmp_path)?.sync_all()?;
    fs::rename(&tmp_path, &path).map_err(|err| {
        let _ = fs::remove_file(&tmp_path);
        StoreError::Io(err)
    })?;

    Ok(blake3::hash(&fs::read(&path)?).to_hex().to_string())
}

/// Publish a version: exactly one writer can create the record file.
fn commit(dir: &Path, record: &CommitRecord) -> Result<(), StoreError> {
    let path = log_path(dir, record.version);
    let json = serde_json::to_string_pretty(record)?;

    let mut file = match fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&path)
    {
        Ok(file) => file,
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {
            return Err(StoreError::Conflict {
                version: record.version,
            })
        }
        Err(err) => return Err(err.into()),
    };
    file.write_all(json.as_bytes())?;
    file.sync_all()?;
    Ok(())
}

fn check_columns(incoming: &DataFrame, current: &DataFrame) -> Result<(), StoreError> {
    if incoming.width() != current.width() {
        return Err(StoreError::ColumnCountMismatch {
            expected: current.width(),
            actual: incoming.width(),
        });
    }
    for column in current.get_columns() {
        let found = incoming
            .column(column.name())
            .map_err(|_| SchemaError::MissingColumn(column.name().to_string()))?;
        if found.dtype() != column.dtype() {
            return Err(SchemaError::TypeMismatch {
                column: column.name().to_string(),
                expected: column.dtype().clone(),
                actual: found.dtype().clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn date_from_days(days: i32) -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Duration::days(days as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::history_schema;
    use std::sync::atomic::{AtomicU64, Ordering};

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_table_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::Relaxed);
        let dir = std::env::temp_dir().join(format!("stockdb_store_{}_{id}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    fn days(year: i32, month: u32, day: u32) -> i32 {
        (NaiveDate::from_ymd_opt(year, month, day).unwrap()
            - NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
        .num_days() as i32
    }

    /// Rows: (days-since-epoch, ticker, company, open, high, low, close, volume).
    fn history_df(rows: &[(i32, &str, Option<&str>, f32, f32, f32, f32, i64)]) -> DataFrame {
        let dates: Vec<i32> = rows.iter().map(|r| r.0).collect();
        let tickers: Vec<&str> = rows.iter().map(|r| r.1).collect();
        let companies: Vec<Option<&str>> = rows.iter().map(|r| r.2).collect();
        let opens: Vec<f32> = rows.iter().map(|r| r.3).collect();
        let highs: Vec<f32> = rows.iter().map(|r| r.4).collect();
        let lows: Vec<f32> = rows.iter().map(|r| r.5).collect();
        let closes: Vec<f32> = rows.iter().map(|r| r.6).collect();
        let volumes: Vec<i64> = rows.iter().map(|r| r.7).collect();

        DataFrame::new(vec![
            Column::new("date".into(), dates)
                .cast(&DataType::Date)
                .unwrap(),
            Column::new("ticker".into(), tickers),
            Column::new("company".into(), companies),
            Column::new("open".into(), opens),
            Column::new("high".into(), highs),
            Column::new("low".into(), lows),
            Column::new("close".into(), closes),
            Column::new("volume".into(), volumes),
        ])
        .unwrap()
    }

    fn sample_rows() -> DataFrame {
        history_df(&[
            (
                days(2024, 3, 10),
                "TCS",
                Some("Tata Consultancy"),
                3800.0,
                3850.0,
                3790.0,
                3820.0,
                1_000_000,
            ),
            (
                days(2024, 3, 10),
                "INFY",
                Some("Infosys"),
                1500.0,
                1520.0,
                1490.0,
                1510.0,
                2_000_000,
            ),
        ])
    }

    #[test]
    fn create_and_open_roundtrip() {
        let dir = temp_table_dir();
        let table = VersionedTable::create(&dir, &history_schema()).unwrap();
        assert_eq!(table.version(), 0);
        assert_eq!(table.row_count().unwrap(), 0);

        let reopened = VersionedTable::open(&dir).unwrap();
        assert_eq!(reopened.version(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn create_twice_is_rejected() {
        let dir = temp_table_dir();
        VersionedTable::create(&dir, &history_schema()).unwrap();
        let result = VersionedTable::create(&dir, &history_schema());
        assert!(matches!(
            result.unwrap_err(),
            StoreError::AlreadyExists { .. }
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn open_missing_table_is_not_found() {
        let dir = temp_table_dir();
        assert!(matches!(
            VersionedTable::open(&dir).unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[test]
    fn merge_inserts_then_idempotent_update() {
        let dir = temp_table_dir();
        let mut table = VersionedTable::create(&dir, &history_schema()).unwrap();

        let stats = table.merge(&sample_rows()).unwrap();
        assert_eq!(stats.rows_inserted, 2);
        assert_eq!(stats.rows_updated, 0);
        assert_eq!(stats.rows_total, 2);

        // Re-merging the identical set must not grow the table.
        let stats = table.merge(&sample_rows()).unwrap();
        assert_eq!(stats.rows_inserted, 0);
        assert_eq!(stats.rows_updated, 2);
        assert_eq!(stats.rows_total, 2);
        assert_eq!(table.row_count().unwrap(), 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn merge_replaces_all_columns_for_matched_key() {
        let dir = temp_table_dir();
        let mut table = VersionedTable::create(&dir, &history_schema()).unwrap();
        table.merge(&sample_rows()).unwrap();

        let revised = history_df(&[(
            days(2024, 3, 10),
            "TCS",
            None,
            3810.0,
            3860.0,
            3800.0,
            3830.0,
            1_100_000,
        )]);
        let stats = table.merge(&revised).unwrap();
        assert_eq!(stats.rows_updated, 1);
        assert_eq!(stats.rows_total, 2);

        let out = table
            .filter(col("ticker").eq(lit("TCS")))
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.column("close").unwrap().f32().unwrap().get(0), Some(3830.0));
        assert_eq!(out.column("company").unwrap().str().unwrap().get(0), None);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn merge_empty_input_is_a_noop() {
        let dir = temp_table_dir();
        let mut table = VersionedTable::create(&dir, &history_schema()).unwrap();
        let empty = DataFrame::empty_with_schema(&history_schema());
        let stats = table.merge(&empty).unwrap();
        assert_eq!(stats, MergeStats::default());
        assert_eq!(table.version(), 0);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn merge_rejects_schema_mismatch() {
        let dir = temp_table_dir();
        let mut table = VersionedTable::create(&dir, &history_schema()).unwrap();
        let bad = df!(
            "date" => &[1i32],
            "ticker" => &["TCS"],
        )
        .unwrap();
        let result = table.merge(&bad);
        assert!(matches!(
            result.unwrap_err(),
            StoreError::ColumnCountMismatch { .. }
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn concurrent_merge_loses_with_conflict() {
        let dir = temp_table_dir();
        let mut first = VersionedTable::create(&dir, &history_schema()).unwrap();
        let mut second = VersionedTable::open(&dir).unwrap();

        first.merge(&sample_rows()).unwrap();

        let late = history_df(&[(
            days(2024, 3, 11),
            "TCS",
            Some("Tata Consultancy"),
            3820.0,
            3870.0,
            3810.0,
            3840.0,
            900_000,
        )]);
        let result = second.merge(&late);
        assert!(matches!(result.unwrap_err(), StoreError::Conflict { .. }));

        // The losing writer must not have published anything.
        let reopened = VersionedTable::open(&dir).unwrap();
        assert_eq!(reopened.version(), 1);
        assert_eq!(reopened.row_count().unwrap(), 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn snapshot_isolation_for_open_handles() {
        let dir = temp_table_dir();
        let mut writer = VersionedTable::create(&dir, &history_schema()).unwrap();
        let reader = VersionedTable::open(&dir).unwrap();

        writer.merge(&sample_rows()).unwrap();

        // The pre-merge handle still sees the empty version 0 snapshot.
        assert_eq!(reader.row_count().unwrap(), 0);
        assert_eq!(VersionedTable::open(&dir).unwrap().row_count().unwrap(), 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn time_travel_open_at() {
        let dir = temp_table_dir();
        let mut table = VersionedTable::create(&dir, &history_schema()).unwrap();
        table.merge(&sample_rows()).unwrap();

        let v0 = VersionedTable::open_at(&dir, 0).unwrap();
        assert_eq!(v0.row_count().unwrap(), 0);
        assert!(matches!(
            VersionedTable::open_at(&dir, 99).unwrap_err(),
            StoreError::VersionNotFound { .. }
        ));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn max_date_aggregate() {
        let dir = temp_table_dir();
        let mut table = VersionedTable::create(&dir, &history_schema()).unwrap();
        assert_eq!(table.max_date().unwrap(), None);

        table.merge(&sample_rows()).unwrap();
        assert_eq!(
            table.max_date().unwrap(),
            Some(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
        );
        assert_eq!(
            table.min_date().unwrap(),
            Some(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap())
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn sql_filter_over_scan() {
        let dir = temp_table_dir();
        let mut table = VersionedTable::create(&dir, &history_schema()).unwrap();
        table.merge(&sample_rows()).unwrap();

        let out = table
            .sql("SELECT ticker FROM stockdb WHERE close > 2000.0")
            .unwrap()
            .collect()
            .unwrap();
        assert_eq!(out.height(), 1);
        assert_eq!(out.column("ticker").unwrap().str().unwrap().get(0), Some("TCS"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn optimize_vacuum_drops_superseded_snapshots() {
        let dir = temp_table_dir();
        let mut table = VersionedTable::create(&dir, &history_schema()).unwrap();
        table.merge(&sample_rows()).unwrap();

        let stats = table.optimize(true, true).unwrap();
        let compaction = stats.compaction.unwrap();
        assert_eq!(compaction.rows, 2);
        // create + merge snapshots are both superseded by the compacted one
        assert_eq!(stats.vacuum.unwrap().files_deleted, 2);

        // Current version still reads fine; vacuumed version does not.
        assert_eq!(table.row_count().unwrap(), 2);
        assert!(matches!(
            VersionedTable::open_at(&dir, 0).unwrap_err(),
            StoreError::Corrupt { .. }
        ));
        let _ = fs::remove_dir_all(&dir);
    }
}
