//! Property-Based Tests for Cache Module
//!
//! Uses proptest to check the map contract of `NamespaceCache` against the
//! in-memory coordination store.

use proptest::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::{encode, NamespaceCache};
use crate::store::{CoordinationClient, MemoryConnector, SessionConnector, WatchedEvent, Watcher};

// == Test Configuration ==
const TEST_NAMESPACE: &str = "/prop-cache";

struct NoopWatcher;

impl Watcher for NoopWatcher {
    fn process(&self, _event: WatchedEvent) {}
}

fn new_session(connector: &MemoryConnector) -> Arc<dyn CoordinationClient> {
    connector
        .connect("localhost:2181", Duration::from_secs(3), Arc::new(NoopWatcher))
        .unwrap()
}

fn new_cache() -> NamespaceCache<String, String> {
    let connector = MemoryConnector::default();
    NamespaceCache::new(new_session(&connector), TEST_NAMESPACE).unwrap()
}

// == Strategies ==
/// Generates valid cache keys (single path segments)
fn valid_key_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9_-]{1,32}".prop_map(|s| s)
}

/// Generates cache values of varying length
fn valid_value_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,128}".prop_map(|s| s)
}

/// A sequence of cache operations for model checking
#[derive(Debug, Clone)]
enum CacheOp {
    Put { key: String, value: String },
    Get { key: String },
    Remove { key: String },
}

fn cache_op_strategy() -> impl Strategy<Value = CacheOp> {
    // A small key space makes collisions between operations likely
    let key = "[a-d]";
    prop_oneof![
        (key, valid_value_strategy()).prop_map(|(key, value)| CacheOp::Put { key, value }),
        key.prop_map(|key| CacheOp::Get { key }),
        key.prop_map(|key| CacheOp::Remove { key }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    // Storing a value and reading it back returns the same value.
    #[test]
    fn prop_roundtrip_storage(key in valid_key_strategy(), value in valid_value_strategy()) {
        let cache = new_cache();

        cache.put(&key, &value).unwrap();

        prop_assert_eq!(cache.get(&key).unwrap(), Some(value));
    }

    // The first put returns nothing, the second returns the first value.
    #[test]
    fn prop_put_returns_previous(
        key in valid_key_strategy(),
        value1 in valid_value_strategy(),
        value2 in valid_value_strategy()
    ) {
        let cache = new_cache();

        prop_assert_eq!(cache.put(&key, &value1).unwrap(), None);
        prop_assert_eq!(cache.put(&key, &value2).unwrap(), Some(value1));
        prop_assert_eq!(cache.len().unwrap(), 1);
    }

    // A second remove of the same key returns nothing.
    #[test]
    fn prop_remove_is_idempotent(key in valid_key_strategy(), value in valid_value_strategy()) {
        let cache = new_cache();
        cache.put(&key, &value).unwrap();

        prop_assert_eq!(cache.remove(&key).unwrap(), Some(value));
        prop_assert_eq!(cache.remove(&key).unwrap(), None);
        prop_assert_eq!(cache.get(&key).unwrap(), None);
    }

    // size() is the sum of encoded payload lengths, not the entry count.
    #[test]
    fn prop_size_is_payload_bytes(
        entries in prop::collection::hash_map(valid_key_strategy(), valid_value_strategy(), 1..20)
    ) {
        let cache = new_cache();
        let mut expected = 0;
        for (key, value) in &entries {
            cache.put(key, value).unwrap();
            expected += encode(value).unwrap().len();
        }

        prop_assert_eq!(cache.size().unwrap(), expected);
        prop_assert_eq!(cache.len().unwrap(), entries.len());
    }

    // keys() has one element per entry and values() is never longer.
    #[test]
    fn prop_enumeration_consistency(
        keys in prop::collection::vec(valid_key_strategy(), 0..30)
    ) {
        let cache = new_cache();
        for key in &keys {
            cache.put(key, &key.to_uppercase()).unwrap();
        }

        let listed = cache.keys().unwrap();
        let unique: HashSet<&String> = keys.iter().collect();
        let listed_unique: HashSet<&String> = listed.iter().collect();

        prop_assert_eq!(listed.len(), listed_unique.len(), "keys() contains duplicates");
        prop_assert_eq!(listed_unique, unique);
        prop_assert!(cache.values().unwrap().len() <= listed.len());
    }

    // After clear(), none of the stored keys can be read back.
    #[test]
    fn prop_clear_removes_everything(
        keys in prop::collection::hash_set(valid_key_strategy(), 1..20)
    ) {
        let cache = new_cache();
        for key in &keys {
            cache.put(key, key).unwrap();
        }

        cache.clear().unwrap();

        for key in &keys {
            prop_assert_eq!(cache.get(key).unwrap(), None);
        }
        prop_assert_eq!(cache.size().unwrap(), 0);
    }

    // Any operation sequence behaves like a HashMap.
    #[test]
    fn prop_matches_hashmap_model(ops in prop::collection::vec(cache_op_strategy(), 1..50)) {
        let cache = new_cache();
        let mut model: HashMap<String, String> = HashMap::new();

        for op in ops {
            match op {
                CacheOp::Put { key, value } => {
                    let previous = cache.put(&key, &value).unwrap();
                    prop_assert_eq!(previous, model.insert(key, value));
                }
                CacheOp::Get { key } => {
                    prop_assert_eq!(cache.get(&key).unwrap(), model.get(&key).cloned());
                }
                CacheOp::Remove { key } => {
                    prop_assert_eq!(cache.remove(&key).unwrap(), model.remove(&key));
                }
            }
        }

        prop_assert_eq!(cache.len().unwrap(), model.len());
    }

    // Caches rooted at different paths never see each other's entries.
    #[test]
    fn prop_namespace_isolation(
        left_keys in prop::collection::hash_set(valid_key_strategy(), 1..10),
        right_keys in prop::collection::hash_set(valid_key_strategy(), 1..10)
    ) {
        let connector = MemoryConnector::default();
        let session = new_session(&connector);
        let left: NamespaceCache<String, String> =
            NamespaceCache::new(session.clone(), "/left").unwrap();
        let right: NamespaceCache<String, String> =
            NamespaceCache::new(session, "/right").unwrap();

        for key in &left_keys {
            left.put(key, &"left".to_string()).unwrap();
        }
        for key in &right_keys {
            right.put(key, &"right".to_string()).unwrap();
        }

        prop_assert_eq!(left.keys().unwrap().into_iter().collect::<HashSet<_>>(), left_keys);
        prop_assert!(right.values().unwrap().iter().all(|v| v == "right"));
    }
}
