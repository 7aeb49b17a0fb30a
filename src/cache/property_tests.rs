//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check key canonicalization and the entry state machine
//! under arbitrary operation sequences.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use serde_json::Value;

use crate::cache::{
    AnyData, CacheEvent, CacheStore, ErasedFetcher, FetchPolicy, ObserverId, QueryKey,
    QueryOptions, QueryStatus, MAX_KEY_LENGTH,
};
use crate::error::{FetchError, QueryError};

// == Test Configuration ==
const TEST_MAX_ENTRIES: usize = 100;
const KEY_POOL: [&str; 4] = ["posts", "users", "todos", "comments"];

// == Strategies ==
/// Generates object members with unique names
fn members_strategy() -> impl Strategy<Value = Vec<(String, i64)>> {
    prop::collection::hash_map("[a-z]{1,8}", any::<i64>(), 1..8)
        .prop_map(|members| members.into_iter().collect())
}

/// Operations on a store, addressing keys by index into `KEY_POOL`
#[derive(Debug, Clone)]
enum StoreOp {
    Attach { key: usize, enabled: bool },
    Detach { key: usize },
    BeginFetch { key: usize },
    CompleteFetch { ticket: usize, ok: bool },
    Invalidate { key: usize },
    Remove { key: usize },
    CollectGarbage,
}

fn store_op_strategy() -> impl Strategy<Value = StoreOp> {
    let key = 0..KEY_POOL.len();
    prop_oneof![
        (key.clone(), any::<bool>()).prop_map(|(key, enabled)| StoreOp::Attach { key, enabled }),
        key.clone().prop_map(|key| StoreOp::Detach { key }),
        key.clone().prop_map(|key| StoreOp::BeginFetch { key }),
        (0usize..64, any::<bool>()).prop_map(|(ticket, ok)| StoreOp::CompleteFetch { ticket, ok }),
        key.clone().prop_map(|key| StoreOp::Invalidate { key }),
        key.prop_map(|key| StoreOp::Remove { key }),
        Just(StoreOp::CollectGarbage),
    ]
}

fn pool_key(index: usize) -> QueryKey {
    QueryKey::new([KEY_POOL[index]]).unwrap()
}

fn policy() -> FetchPolicy {
    let fetcher: ErasedFetcher = Arc::new(|_key: QueryKey| {
        async { Ok::<AnyData, FetchError>(Arc::new(0_u32)) }.boxed()
    });
    FetchPolicy {
        fetcher,
        retry: 0,
        retry_delay: Duration::ZERO,
    }
}

fn object_text(members: &[(String, i64)]) -> String {
    let body: Vec<String> = members
        .iter()
        .map(|(name, value)| format!("\"{}\":{}", name, value))
        .collect();
    format!("{{{}}}", body.join(","))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Object members are canonicalized, so the order they were written in
    // never changes the key.
    #[test]
    fn prop_key_ignores_member_order(members in members_strategy()) {
        let mut reversed = members.clone();
        reversed.reverse();

        let forward: Value = serde_json::from_str(&object_text(&members)).unwrap();
        let backward: Value = serde_json::from_str(&object_text(&reversed)).unwrap();

        let a = QueryKey::new(("posts", forward)).unwrap();
        let b = QueryKey::new(("posts", backward)).unwrap();
        prop_assert_eq!(a.as_str(), b.as_str());
        prop_assert_eq!(a, b);
    }

    // Distinct string parts give distinct keys, and the canonical text parses
    // back to the original parts.
    #[test]
    fn prop_key_text_is_faithful(a in ".{0,32}", b in ".{0,32}") {
        let key_a = QueryKey::new(["todos", a.as_str()]).unwrap();
        let key_b = QueryKey::new(["todos", b.as_str()]).unwrap();
        prop_assert_eq!(key_a == key_b, a == b);

        let parsed: Vec<String> = serde_json::from_str(key_a.as_str()).unwrap();
        prop_assert_eq!(parsed, vec!["todos".to_string(), a]);
    }

    #[test]
    fn prop_key_length_limit(len in 1usize..(MAX_KEY_LENGTH * 2)) {
        let part = "x".repeat(len);
        let canonical_len = len + 4; // ["..."]
        match QueryKey::new([part]) {
            Ok(key) => {
                prop_assert!(canonical_len <= MAX_KEY_LENGTH);
                prop_assert_eq!(key.as_str().len(), canonical_len);
            }
            Err(QueryError::KeyTooLong { len, max }) => {
                prop_assert!(canonical_len > MAX_KEY_LENGTH);
                prop_assert_eq!(len, canonical_len);
                prop_assert_eq!(max, MAX_KEY_LENGTH);
            }
            Err(other) => prop_assert!(false, "unexpected error: {}", other),
        }
    }

    // For any sequence of store operations:
    // - a key has at most one fetch in flight, and only its newest ticket
    //   can settle it
    // - an entry is Success exactly when a fetch has succeeded since it was
    //   created, and never falls back to Pending or Error afterwards
    // - observer counts and entry totals match what was attached and removed
    #[test]
    fn prop_store_state_machine(ops in prop::collection::vec(store_op_strategy(), 1..80)) {
        let mut store = CacheStore::new(TEST_MAX_ENTRIES, Duration::ZERO);
        let mut observers: HashMap<usize, Vec<ObserverId>> = HashMap::new();
        let mut tickets: Vec<(usize, u64)> = Vec::new();
        let mut succeeded: HashSet<usize> = HashSet::new();

        for op in ops {
            match op {
                StoreOp::Attach { key, enabled } => {
                    let options = QueryOptions::default().enabled(enabled);
                    let attached = store
                        .attach::<u32>(&pool_key(key), Some(policy()), options)
                        .unwrap();
                    prop_assert!(enabled || !attached.should_fetch);
                    observers.entry(key).or_default().push(attached.observer);
                }
                StoreOp::Detach { key } => {
                    if let Some(observer) = observers.get_mut(&key).and_then(Vec::pop) {
                        prop_assert!(store.detach(&pool_key(key), observer));
                    }
                }
                StoreOp::BeginFetch { key } => {
                    let query_key = pool_key(key);
                    let was_fetching = store.get(&query_key).map(|e| e.is_fetching());
                    let ticket = store.begin_fetch(&query_key);
                    match was_fetching {
                        None | Some(true) => prop_assert!(ticket.is_none()),
                        Some(false) => {
                            let ticket = ticket.unwrap();
                            prop_assert!(store.get(&query_key).unwrap().is_fetching());
                            tickets.push((key, ticket.id));
                        }
                    }
                }
                StoreOp::CompleteFetch { ticket, ok } => {
                    if tickets.is_empty() {
                        continue;
                    }
                    let (key, id) = tickets[ticket % tickets.len()];
                    let query_key = pool_key(key);
                    let current = store
                        .get(&query_key)
                        .and_then(|e| e.in_flight.as_ref().map(|f| f.id));

                    let outcome = if ok {
                        Ok(Arc::new(7_u32) as AnyData)
                    } else {
                        Err(FetchError::new("network down"))
                    };
                    let applied = store.complete_fetch(&query_key, id, outcome);
                    prop_assert_eq!(applied, current == Some(id));
                    if applied {
                        prop_assert!(!store.get(&query_key).unwrap().is_fetching());
                        if ok {
                            succeeded.insert(key);
                        }
                    }
                }
                StoreOp::Invalidate { key } => {
                    let query_key = pool_key(key);
                    let (matched, _) = store.invalidate(|k| k == &query_key);
                    prop_assert_eq!(matched, usize::from(store.contains(&query_key)));
                }
                StoreOp::Remove { key } => {
                    store.remove(&pool_key(key));
                    observers.remove(&key);
                    succeeded.remove(&key);
                }
                StoreOp::CollectGarbage => {
                    store.collect_garbage();
                    for key in 0..KEY_POOL.len() {
                        if !store.contains(&pool_key(key)) {
                            prop_assert!(observers.get(&key).map_or(true, Vec::is_empty));
                            succeeded.remove(&key);
                        }
                    }
                }
            }

            for key in 0..KEY_POOL.len() {
                let Some(entry) = store.get(&pool_key(key)) else {
                    continue;
                };
                let expected_observers = observers.get(&key).map_or(0, Vec::len);
                prop_assert_eq!(entry.observer_count(), expected_observers);
                prop_assert_eq!(
                    entry.status() == QueryStatus::Success,
                    succeeded.contains(&key)
                );
            }
            prop_assert!(store.in_flight_count() <= store.len());
            prop_assert_eq!(store.stats().total_entries, store.len());
        }
    }
}

// Event delivery is checked through a broadcast receiver driven by a
// blocking executor, without a Tokio runtime.
proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_added_events_follow_attach_order(names in prop::collection::hash_set("[a-z]{1,12}", 1..20)) {
        let names: Vec<String> = names.into_iter().collect();
        let mut store = CacheStore::new(TEST_MAX_ENTRIES, Duration::ZERO);
        let mut events = store.events();

        for name in &names {
            store
                .attach::<u32>(&QueryKey::new([name]).unwrap(), None, QueryOptions::default())
                .unwrap();
        }

        for name in &names {
            let event = tokio_test::block_on(events.recv()).unwrap();
            prop_assert_eq!(event, CacheEvent::Added(QueryKey::new([name]).unwrap()));
        }
        prop_assert!(events.try_recv().is_err());
    }
}
