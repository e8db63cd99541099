//! Batch planning over the ticker universe.
//!
//! Bounds per-request memory and provider exposure to O(batch_size)
//! regardless of how many tickers an exchange lists.

use crate::ingest::IngestError;

/// Number of batches needed for `n` items at `batch_size` per batch.
pub fn batch_count(n: usize, batch_size: usize) -> Result<usize, IngestError> {
    if batch_size == 0 {
        return Err(IngestError::Validation(
            "batch size must be greater than zero".into(),
        ));
    }
    Ok(n.div_ceil(batch_size))
}

/// Partition `tickers` into contiguous, non-overlapping, order-preserving
/// slices of at most `batch_size` each.
///
/// Concatenating the result reproduces the input exactly; an empty input
/// yields no batches.
pub fn plan_batches<'a>(
    tickers: &'a [String],
    batch_size: usize,
) -> Result<Vec<&'a [String]>, IngestError> {
    // Validated even for empty input: a zero batch size is a config bug,
    // not a degenerate plan.
    let count = batch_count(tickers.len(), batch_size)?;
    let mut batches = Vec::with_capacity(count);
    for batch in tickers.chunks(batch_size) {
        batches.push(batch);
    }
    Ok(batches)
}
