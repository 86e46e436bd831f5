//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the cache core against simple models.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::cache::{
    Cache, CacheKey, CacheOptions, EntryStore, MemoryStats, ShardSelector, ShardedMap,
    SingleLockMap, Sweep,
};
use crate::error::Result;

// == Strategies ==
/// Generates cache keys from a small alphabet so sequences revisit keys
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}".prop_map(|s| s)
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,64}".prop_map(|s| s)
}

#[derive(Debug, Clone)]
enum StoreOp {
    Store { key: String, value: String },
    Lookup { key: String },
    Delete { key: String },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| StoreOp::Store { key, value }),
        key_strategy().prop_map(|key| StoreOp::Lookup { key }),
        key_strategy().prop_map(|key| StoreOp::Delete { key }),
    ]
}

/// Applies `ops` to `store` and to a HashMap model, failing on divergence.
async fn check_against_model(
    store: &dyn EntryStore<String>,
    ops: &[StoreOp],
) -> std::result::Result<(), TestCaseError> {
    let mut model: HashMap<String, String> = HashMap::new();

    for op in ops {
        match op {
            StoreOp::Store { key, value } => {
                store.store(CacheKey::new(key), value.clone(), None).await;
                model.insert(key.clone(), value.clone());
            }
            StoreOp::Lookup { key } => {
                let found = store.lookup(&CacheKey::new(key)).await.map(|e| e.value);
                prop_assert_eq!(found.as_ref(), model.get(key), "lookup of '{}'", key);
            }
            StoreOp::Delete { key } => {
                let removed = store.delete(&CacheKey::new(key)).await;
                prop_assert_eq!(removed, model.remove(key).is_some(), "delete of '{}'", key);
            }
        }
        prop_assert_eq!(store.len(), model.len(), "length after {:?}", op);
    }

    let mut expected_bytes = 0;
    for key in model.keys() {
        let entry = store.lookup(&CacheKey::new(key)).await;
        prop_assert!(entry.is_some());
        expected_bytes += entry.map(|e| e.approx_size).unwrap_or(0);
    }
    prop_assert_eq!(store.approx_bytes(), expected_bytes, "byte accounting");
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Both backends agree with a plain map for any store/lookup/delete sequence.
    #[test]
    fn prop_single_lock_map_matches_model(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let store: SingleLockMap<String> = SingleLockMap::new();
        tokio_test::block_on(check_against_model(&store, &ops))?;
    }

    #[test]
    fn prop_sharded_map_matches_model(
        ops in prop::collection::vec(store_op_strategy(), 1..60),
        shard_bits in 0u32..5
    ) {
        let store: ShardedMap<String> = ShardedMap::new(1 << shard_bits).unwrap();
        tokio_test::block_on(check_against_model(&store, &ops))?;
    }

    // Without expiry, each distinct key is computed exactly once and every
    // other get is a hit.
    #[test]
    fn prop_each_key_computed_once(keys in prop::collection::vec(key_strategy(), 1..80)) {
        let stats = Arc::new(MemoryStats::new());
        let store: Arc<dyn EntryStore<String>> = Arc::new(ShardedMap::new(8).unwrap());
        let cache = Cache::new(CacheOptions::new("prop"), store, stats.clone());
        let calls = Arc::new(AtomicUsize::new(0));
        let cancel = CancellationToken::new();

        tokio_test::block_on(async {
            for key in &keys {
                let calls = Arc::clone(&calls);
                let expected = format!("value-{}", key);
                let value = cache
                    .get(&cancel, &CacheKey::new(key), move |_| async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Result::Ok(expected)
                    })
                    .await
                    .unwrap();
                assert_eq!(value, format!("value-{}", key));
            }
        });

        let distinct = keys.iter().collect::<HashSet<_>>().len();
        let snapshot = stats.snapshot("prop");
        prop_assert_eq!(calls.load(Ordering::SeqCst), distinct);
        prop_assert_eq!(snapshot.misses as usize, distinct);
        prop_assert_eq!(snapshot.hits as usize, keys.len() - distinct);
        prop_assert_eq!(snapshot.writes as usize, distinct);
        prop_assert_eq!(snapshot.items as usize, distinct);
    }

    // A pressure sweep removes at least one entry from every non-empty shard
    // and never more than the rounded-up fraction of it.
    #[test]
    fn prop_pressure_sweep_is_bounded(
        count in 1usize..300,
        fraction in 0.01f64..=1.0
    ) {
        let store: ShardedMap<String> = ShardedMap::new(4).unwrap();
        let removed = tokio_test::block_on(async {
            for i in 0..count {
                store.store(CacheKey::new(format!("k{}", i)), "v".to_string(), None).await;
            }
            let before = store.shard_lengths().await;
            let removed = store.sweep(Sweep::Pressure { fraction }).await;
            let after = store.shard_lengths().await;
            for (b, a) in before.iter().zip(after.iter()) {
                let dropped = b - a;
                let quota = if *b == 0 { 0 } else { ((*b as f64 * fraction).ceil() as usize).clamp(1, *b) };
                assert_eq!(dropped, quota);
            }
            removed
        });

        prop_assert!(removed >= 1);
        prop_assert_eq!(store.len(), count - removed);
    }

    // Shard selection is deterministic and always in range.
    #[test]
    fn prop_shard_selection_in_range(key in "[ -~]{0,40}", shard_bits in 0u32..8, seed in any::<u64>()) {
        let selector = ShardSelector::new(1 << shard_bits, seed).unwrap();
        let key = CacheKey::new(&key);
        let shard = selector.shard_for_key(&key);
        prop_assert!(shard < selector.shard_count());
        prop_assert_eq!(selector.shard_for_key(&key), shard);
    }
}

// == Property Test for Error Response Format ==
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    // Every error variant renders as JSON with a string "error" field.
    #[test]
    fn prop_error_response_format(error_msg in "[a-zA-Z0-9 _-]{1,100}") {
        use crate::error::CacheError;
        use axum::body::to_bytes;
        use axum::response::IntoResponse;

        let error_variants = vec![
            CacheError::upstream(anyhow::anyhow!("{}", error_msg)),
            CacheError::Cancelled,
            CacheError::Config(error_msg.clone()),
            CacheError::InvalidRequest(error_msg.clone()),
        ];

        for error in error_variants {
            let expected_msg = error.to_string();
            let response = error.into_response();

            let content_type = response.headers()
                .get("content-type")
                .and_then(|v| v.to_str().ok());
            prop_assert!(
                content_type.map(|ct| ct.contains("application/json")).unwrap_or(false),
                "Response should have JSON content-type"
            );

            let bytes = tokio_test::block_on(async {
                to_bytes(response.into_body(), usize::MAX).await.unwrap()
            });
            let json: serde_json::Value = serde_json::from_slice(&bytes)
                .expect("Response body should be valid JSON");

            prop_assert_eq!(json["error"].as_str(), Some(expected_msg.as_str()));
        }
    }
}
