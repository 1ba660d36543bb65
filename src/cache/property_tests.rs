//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check store and key invariants over random call sequences.

use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::cache::TtlStore;
use crate::key::{CacheKey, KeyDeriver};
use crate::policy::elapsed;

// == Test Configuration ==
const TEST_TTL_MS: u64 = 500;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap()
}

// == Strategies ==
/// Argument bundles: a small identity and two positional values
fn args_strategy() -> impl Strategy<Value = (String, i64, String)> {
    ("[a-z_]{1,12}", any::<i64>(), "[a-zA-Z0-9 ]{0,24}")
}

#[derive(Debug, Clone)]
enum StoreOp {
    Put { key: u8, value: u32 },
    Sweep,
    Wait { ms: u64 },
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    prop_oneof![
        (0u8..16, any::<u32>()).prop_map(|(key, value)| StoreOp::Put { key, value }),
        Just(StoreOp::Sweep),
        (0u64..400).prop_map(|ms| StoreOp::Wait { ms }),
    ]
}

fn key_of(n: u8) -> CacheKey {
    CacheKey::from_canonical(&n.to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Deriving twice from identical input always yields the identical key.
    #[test]
    fn prop_key_is_deterministic((name, n, s) in args_strategy()) {
        let first = KeyDeriver::derive_from(&name, None, &(n, &s)).unwrap();
        let second = KeyDeriver::derive_from(&name, None, &(n, &s)).unwrap();
        prop_assert_eq!(first, second);
    }

    // Changing any one argument changes the key.
    #[test]
    fn prop_differing_args_differ(
        (name, n, s) in args_strategy(),
        other_n in any::<i64>(),
        other_s in "[a-zA-Z0-9 ]{0,24}"
    ) {
        let key = KeyDeriver::derive_from(&name, None, &(n, &s)).unwrap();
        if other_n != n {
            let changed = KeyDeriver::derive_from(&name, None, &(other_n, &s)).unwrap();
            prop_assert_ne!(&key, &changed);
        }
        if other_s != s {
            let changed = KeyDeriver::derive_from(&name, None, &(n, &other_s)).unwrap();
            prop_assert_ne!(&key, &changed);
        }
    }

    // Keyword arguments hash the same regardless of insertion order.
    #[test]
    fn prop_keyword_order_irrelevant(pairs in prop::collection::vec(("[a-z]{1,8}", any::<u16>()), 0..8)) {
        // HashMap iteration order is arbitrary, BTreeMap's is sorted
        let unordered: HashMap<String, u16> = pairs.iter().cloned().collect();
        let sorted: BTreeMap<String, u16> = unordered.clone().into_iter().collect();

        let a = KeyDeriver::derive("f", None, &(), &unordered).unwrap();
        let b = KeyDeriver::derive("f", None, &(), &sorted).unwrap();
        prop_assert_eq!(a, b);
    }

    // After any sweep, every remaining entry is within the TTL, and every entry
    // within the TTL is still there.
    #[test]
    fn prop_sweep_invariant(ops in prop::collection::vec(store_op_strategy(), 1..60)) {
        let ttl = Duration::from_millis(TEST_TTL_MS);
        let mut store = TtlStore::new();
        let mut now = base();
        let mut model: HashMap<u8, (u32, DateTime<Utc>)> = HashMap::new();

        for op in ops {
            match op {
                StoreOp::Put { key, value } => {
                    store.put(key_of(key), value, now);
                    model.insert(key, (value, now));
                }
                StoreOp::Sweep => {
                    let removed = store.sweep(now, ttl);
                    let before = model.len();
                    model.retain(|_, (_, stored_at)| elapsed(*stored_at, now) <= ttl);
                    prop_assert_eq!(removed, before - model.len());

                    for (_, entry) in store.entries() {
                        prop_assert!(elapsed(entry.stored_at, now) <= ttl);
                    }
                }
                StoreOp::Wait { ms } => {
                    now += chrono::Duration::milliseconds(ms as i64);
                }
            }
            prop_assert_eq!(store.len(), model.len());
        }

        for (key, (value, stored_at)) in &model {
            let entry = store.get(&key_of(*key)).unwrap();
            prop_assert_eq!(entry.value, *value);
            prop_assert_eq!(entry.stored_at, *stored_at);
        }
    }

    // Overwriting a key keeps exactly one entry with the latest value.
    #[test]
    fn prop_overwrite_semantics(key in 0u8..16, first in any::<u32>(), second in any::<u32>(), gap in 0u64..1000) {
        let mut store = TtlStore::new();
        store.put(key_of(key), first, base());
        let later = base() + chrono::Duration::milliseconds(gap as i64);
        store.put(key_of(key), second, later);

        prop_assert_eq!(store.len(), 1);
        let entry = store.get(&key_of(key)).unwrap();
        prop_assert_eq!(entry.value, second);
        prop_assert_eq!(entry.stored_at, later);
    }
}
