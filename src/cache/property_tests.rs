//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the store's observable behavior over random
//! operation sequences.

use proptest::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::cache::CacheStore;

// == Test Configuration ==
const TEST_TTL: Duration = Duration::from_secs(300);

// == Strategies ==
/// Generates cache keys from a small alphabet so operations collide often
fn key_strategy() -> impl Strategy<Value = String> {
    "[a-e]{1,2}"
}

fn value_strategy() -> impl Strategy<Value = u32> {
    any::<u32>()
}

/// A single cache operation for sequence testing
#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: u32 },
    Get { key: String },
    Remove { key: String },
    GetOrCreate { key: String, value: u32 },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    prop_oneof![
        (key_strategy(), value_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        key_strategy().prop_map(|key| CacheOp::Get { key }),
        key_strategy().prop_map(|key| CacheOp::Remove { key }),
        (key_strategy(), value_strategy())
            .prop_map(|(key, value)| CacheOp::GetOrCreate { key, value }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Storing a pair and reading it back returns the stored value.
    #[test]
    fn prop_roundtrip_storage(key in key_strategy(), value in value_strategy()) {
        let store = CacheStore::new(TEST_TTL);

        store.put(key.clone(), value).unwrap();

        prop_assert_eq!(store.get(&key).unwrap(), Some(value));
    }

    // A second put for the same key replaces the first.
    #[test]
    fn prop_overwrite_semantics(
        key in key_strategy(),
        value1 in value_strategy(),
        value2 in value_strategy()
    ) {
        let store = CacheStore::new(TEST_TTL);

        store.put(key.clone(), value1).unwrap();
        store.put(key.clone(), value2).unwrap();

        prop_assert_eq!(store.get(&key).unwrap(), Some(value2));
        prop_assert_eq!(store.len(), 1, "Should have exactly one entry after overwrite");
    }

    // The store behaves like a plain map (without expiry) and its length
    // counter always equals the number of keys a get can find.
    #[test]
    fn prop_matches_model_and_size(ops in prop::collection::vec(cache_op_strategy(), 1..60)) {
        let store = CacheStore::new(TEST_TTL);
        let mut model: HashMap<String, u32> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    store.put(key.clone(), value).unwrap();
                    model.insert(key, value);
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(store.get(&key).unwrap(), model.get(&key).copied());
                }
                CacheOp::Remove { key } => {
                    prop_assert_eq!(store.remove(&key).unwrap(), model.remove(&key));
                }
                CacheOp::GetOrCreate { key, value } => {
                    let expected = *model.entry(key.clone()).or_insert(value);
                    prop_assert_eq!(store.get_or_create(key, |_| value).unwrap(), expected);
                }
            }
            prop_assert_eq!(store.len(), model.len(), "Length counter drifted");
        }

        for (key, value) in &model {
            prop_assert_eq!(store.get(key).unwrap(), Some(*value));
        }
    }

    // Repeated get-or-create calls run the creator once per key.
    #[test]
    fn prop_get_or_create_creates_once(keys in prop::collection::vec(key_strategy(), 1..40)) {
        let store = CacheStore::new(TEST_TTL);
        let calls = AtomicUsize::new(0);

        for key in &keys {
            store
                .get_or_create(key.clone(), |key| {
                    calls.fetch_add(1, Ordering::SeqCst);
                    key.len()
                })
                .unwrap();
        }

        let distinct: std::collections::HashSet<_> = keys.iter().collect();
        prop_assert_eq!(calls.load(Ordering::SeqCst), distinct.len());
        prop_assert_eq!(store.stats().creations, distinct.len() as u64);
    }

    // With a zero TTL a sweep empties the store and leaves the counter at zero.
    #[test]
    fn prop_zero_ttl_sweep_empties_store(
        entries in prop::collection::vec((key_strategy(), value_strategy()), 0..30)
    ) {
        let store = CacheStore::new(Duration::ZERO);
        for (key, value) in entries {
            store.put(key, value).unwrap();
        }

        let before = store.len();
        let evicted = store.purge_expired().unwrap();

        prop_assert_eq!(evicted, before);
        prop_assert_eq!(store.len(), 0);
    }
}
