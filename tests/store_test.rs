//! Price store durability and invariant tests.

mod common;

use std::io::Write;
use common::sample;
use farewatch::error::Error;
use farewatch::store::PriceStore;
use farewatch::types::currency::Currency;
use farewatch::types::ids::RouteId;
use farewatch::types::price::Price;
use farewatch::types::timestamp::Timestamp;
use tempfile::tempdir;

fn prices(samples: &[farewatch::events::sample::PriceSample]) -> Vec<i64> {
    samples.iter().map(|s| s.price.minor_units()).collect()
}

#[tokio::test]
async fn test_repeated_quote_is_stored_once() {
    let dir = tempdir().unwrap();
    let (store, _) = PriceStore::open(dir.path()).await.unwrap();

    let first = store.append(sample("VGO-MEX", 1, 79_900)).await.unwrap();
    assert!(first.inserted);
    assert!(first.previous.is_empty());

    for ms in 2..10 {
        let result = store.append(sample("VGO-MEX", ms, 79_900)).await.unwrap();
        assert!(!result.inserted);
    }

    let history = store.history(&RouteId::from("VGO-MEX"), None).await;
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn test_return_to_earlier_price_is_recorded() {
    let dir = tempdir().unwrap();
    let (store, _) = PriceStore::open(dir.path()).await.unwrap();

    for (ms, price) in [(1, 100), (2, 90), (3, 100)] {
        assert!(store.append(sample("VGO-MEX", ms, price)).await.unwrap().inserted);
    }

    let history = store.history(&RouteId::from("VGO-MEX"), None).await;
    assert_eq!(prices(&history.to_vec()), vec![100, 90, 100]);
}

#[tokio::test]
async fn test_currency_change_is_not_a_duplicate() {
    let dir = tempdir().unwrap();
    let (store, _) = PriceStore::open(dir.path()).await.unwrap();

    store.append(sample("VGO-MEX", 1, 100)).await.unwrap();
    let mut usd = sample("VGO-MEX", 2, 100);
    usd.currency = Currency::Usd;
    assert!(store.append(usd).await.unwrap().inserted);
}

#[tokio::test]
async fn test_out_of_order_sample_is_rejected() {
    let dir = tempdir().unwrap();
    let (store, _) = PriceStore::open(dir.path()).await.unwrap();

    store.append(sample("VGO-MEX", 10, 100)).await.unwrap();
    let result = store.append(sample("VGO-MEX", 10, 90)).await;
    assert!(matches!(result, Err(Error::OutOfOrderSample { .. })));

    let latest = store.latest(&RouteId::from("VGO-MEX")).await.unwrap();
    assert_eq!(latest.price, Price::from_minor(100));
}

#[tokio::test]
async fn test_previous_history_excludes_new_sample() {
    let dir = tempdir().unwrap();
    let (store, _) = PriceStore::open(dir.path()).await.unwrap();

    store.append(sample("VGO-MEX", 1, 100)).await.unwrap();
    store.append(sample("VGO-MEX", 2, 90)).await.unwrap();
    let result = store.append(sample("VGO-MEX", 3, 80)).await.unwrap();

    assert_eq!(prices(&result.previous.to_vec()), vec![100, 90]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_appends_keep_timestamps_increasing() {
    let dir = tempdir().unwrap();
    let (store, _) = PriceStore::open(dir.path()).await.unwrap();

    let mut handles = Vec::new();
    for i in 0..64i64 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            let mut s = sample("VGO-MEX", 0, 1_000 + i);
            s.observed_at = Timestamp::now();
            store.append(s).await
        }));
    }
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) | Err(Error::OutOfOrderSample { .. }) => {}
            Err(e) => panic!("unexpected append failure: {}", e),
        }
    }

    let history = store.history(&RouteId::from("VGO-MEX"), None).await;
    assert!(!history.is_empty());
    let stamps: Vec<Timestamp> = history.iter().map(|s| s.observed_at).collect();
    assert!(stamps.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn test_history_survives_reopen() {
    let dir = tempdir().unwrap();
    {
        let (store, _) = PriceStore::open(dir.path()).await.unwrap();
        for (ms, price) in [(1, 100), (2, 90), (3, 95)] {
            store.append(sample("VGO-MEX", ms, price)).await.unwrap();
        }
        store.append(sample("MAD-OUR", 1, 4_550)).await.unwrap();
    }

    let (store, report) = PriceStore::open(dir.path()).await.unwrap();
    assert_eq!(report.routes_loaded, 2);
    assert_eq!(report.samples_loaded, 4);
    assert!(!report.has_warnings());

    let history = store.history(&RouteId::from("VGO-MEX"), None).await;
    assert_eq!(prices(&history.to_vec()), vec![100, 90, 95]);

    let since = store.history(&RouteId::from("VGO-MEX"), Some(Timestamp::from_millis(2))).await;
    assert_eq!(prices(&since.to_vec()), vec![90, 95]);
}

#[tokio::test]
async fn test_corrupted_final_record_is_truncated() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("VGO-MEX.log");
    {
        let (store, _) = PriceStore::open(dir.path()).await.unwrap();
        store.append(sample("VGO-MEX", 1, 100)).await.unwrap();
        store.append(sample("VGO-MEX", 2, 90)).await.unwrap();
    }

    let intact_len = std::fs::metadata(&log_path).unwrap().len();
    {
        let (store, _) = PriceStore::open(dir.path()).await.unwrap();
        store.append(sample("VGO-MEX", 3, 80)).await.unwrap();
    }
    // Flip the final byte of the last record
    let mut bytes = std::fs::read(&log_path).unwrap();
    let last = bytes.len() - 1;
    bytes[last] ^= 0xff;
    std::fs::write(&log_path, &bytes).unwrap();

    let (store, report) = PriceStore::open(dir.path()).await.unwrap();
    assert_eq!(report.truncated.len(), 1);
    assert_eq!(report.truncated[0].route_id, RouteId::from("VGO-MEX"));

    let history = store.history(&RouteId::from("VGO-MEX"), None).await;
    assert_eq!(prices(&history.to_vec()), vec![100, 90]);
    assert_eq!(std::fs::metadata(&log_path).unwrap().len(), intact_len);

    // The healed log accepts appends again
    assert!(store.append(sample("VGO-MEX", 4, 85)).await.unwrap().inserted);
}

#[tokio::test]
async fn test_partial_trailing_write_is_truncated() {
    let dir = tempdir().unwrap();
    let log_path = dir.path().join("VGO-MEX.log");
    {
        let (store, _) = PriceStore::open(dir.path()).await.unwrap();
        store.append(sample("VGO-MEX", 1, 100)).await.unwrap();
    }
    let intact_len = std::fs::metadata(&log_path).unwrap().len();

    let mut file = std::fs::OpenOptions::new().append(true).open(&log_path).unwrap();
    file.write_all(&[0x20, 0x00, 0x00]).unwrap();
    drop(file);

    let (store, report) = PriceStore::open(dir.path()).await.unwrap();
    assert_eq!(report.truncated[0].bytes, 3);
    assert_eq!(store.history(&RouteId::from("VGO-MEX"), None).await.len(), 1);
    assert_eq!(std::fs::metadata(&log_path).unwrap().len(), intact_len);
}

#[tokio::test]
async fn test_unreadable_log_is_skipped_and_other_routes_load() {
    let dir = tempdir().unwrap();
    {
        let (store, _) = PriceStore::open(dir.path()).await.unwrap();
        store.append(sample("VGO-MEX", 1, 100)).await.unwrap();
    }
    std::fs::create_dir(dir.path().join("BAD.log")).unwrap();

    let (store, report) = PriceStore::open(dir.path()).await.unwrap();
    assert_eq!(report.routes_loaded, 1);
    assert_eq!(report.skipped.len(), 1);
    assert_eq!(report.skipped[0].route_id, RouteId::from("BAD"));
    assert!(report.has_warnings());

    assert_eq!(store.history(&RouteId::from("VGO-MEX"), None).await.len(), 1);
    assert!(store.append(sample("VGO-MEX", 2, 90)).await.unwrap().inserted);

    let bad = RouteId::from("BAD");
    let result = store.append(sample("BAD", 1, 100)).await;
    assert!(matches!(result, Err(Error::StorePersistence { .. })));
    assert_eq!(store.failure_streak(&bad), 1);
    assert!(store.compact(&bad).await.is_err());
    assert!(dir.path().join("BAD.log").is_dir());
}

#[tokio::test]
async fn test_compact_rewrites_log() {
    let dir = tempdir().unwrap();
    let route = RouteId::from("VGO-MEX");
    let (store, _) = PriceStore::open(dir.path()).await.unwrap();
    for (ms, price) in [(1, 100), (2, 90)] {
        store.append(sample("VGO-MEX", ms, price)).await.unwrap();
    }

    assert_eq!(store.compact(&route).await.unwrap(), 2);
    assert_eq!(store.compact(&RouteId::from("UNKNOWN")).await.unwrap(), 0);
    store.append(sample("VGO-MEX", 3, 70)).await.unwrap();
    drop(store);

    let (store, report) = PriceStore::open(dir.path()).await.unwrap();
    assert!(!report.has_warnings());
    assert_eq!(prices(&store.history(&route, None).await.to_vec()), vec![100, 90, 70]);
}

#[tokio::test]
async fn test_unwritable_directory_counts_failure_streak() {
    let dir = tempdir().unwrap();
    let (store, _) = PriceStore::open(dir.path()).await.unwrap();
    let route = RouteId::from("VGO-MEX");

    // A directory squatting on the log path makes every open fail.
    std::fs::create_dir(dir.path().join("VGO-MEX.log")).unwrap();

    for ms in 1..=3 {
        let result = store.append(sample("VGO-MEX", ms, 100 + ms as i64)).await;
        assert!(matches!(result, Err(Error::StorePersistence { .. })));
    }
    assert_eq!(store.failure_streak(&route), 3);
    assert!(store.history(&route, None).await.is_empty());

    std::fs::remove_dir(dir.path().join("VGO-MEX.log")).unwrap();
    store.append(sample("VGO-MEX", 10, 100)).await.unwrap();
    assert_eq!(store.failure_streak(&route), 0);
}

proptest::proptest! {
    #![proptest_config(proptest::prelude::ProptestConfig::with_cases(32))]

    #[test]
    fn prop_history_collapses_runs_of_equal_quotes(
        quotes in proptest::collection::vec(1i64..5, 1..40)
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
        let stored = runtime.block_on(async {
            let dir = tempdir().unwrap();
            let (store, _) = PriceStore::open(dir.path()).await.unwrap();
            for (i, price) in quotes.iter().enumerate() {
                store.append(sample("VGO-MEX", i as u64 + 1, *price)).await.unwrap();
            }
            prices(&store.history(&RouteId::from("VGO-MEX"), None).await.to_vec())
        });

        let mut expected = quotes.clone();
        expected.dedup();
        proptest::prop_assert_eq!(stored, expected);
    }
}
