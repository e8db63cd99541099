//! Property tests for pipeline invariants.
//!
//! 1. Batch coverage — batches partition the ticker list exactly
//! 2. Provider symbol mapping — suffix handling is idempotent

use proptest::prelude::*;
use stockdb_core::batch::{batch_count, plan_batches};
use stockdb_core::Exchange;

fn arb_tickers() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[A-Z]{1,6}", 0..200)
}

proptest! {
    /// Σ|batch_i| = N, no overlaps, concatenation reproduces the input.
    #[test]
    fn batches_partition_the_universe(tickers in arb_tickers(), batch_size in 1usize..50) {
        let batches = plan_batches(&tickers, batch_size).unwrap();

        let total: usize = batches.iter().map(|b| b.len()).sum();
        prop_assert_eq!(total, tickers.len());

        let rejoined: Vec<String> = batches.concat();
        prop_assert_eq!(rejoined, tickers.clone());

        prop_assert_eq!(batches.len(), batch_count(tickers.len(), batch_size).unwrap());
    }

    /// Every batch except the last is exactly batch_size; none exceeds it.
    #[test]
    fn batches_are_bounded(tickers in arb_tickers(), batch_size in 1usize..50) {
        let batches = plan_batches(&tickers, batch_size).unwrap();

        for (i, batch) in batches.iter().enumerate() {
            prop_assert!(batch.len() <= batch_size);
            if i + 1 < batches.len() {
                prop_assert_eq!(batch.len(), batch_size);
            } else {
                prop_assert!(!batch.is_empty());
            }
        }
    }

    /// Re-qualifying an already qualified symbol never stacks suffixes.
    #[test]
    fn provider_symbol_mapping_is_idempotent(ticker in "[A-Za-z]{1,6}") {
        for exchange in Exchange::ALL {
            let once = exchange.provider_symbol(&ticker);
            let twice = exchange.provider_symbol(&once);
            prop_assert_eq!(&once, &twice);
            prop_assert!(once.ends_with(exchange.provider_suffix()));
        }
    }
}
