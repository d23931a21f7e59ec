// Batch operation tests against on-disk namespaces
// Covers read-after-write, delete and transaction splitting behaviour

mod common;

use brokernode_cache::{Category, generate_bulk_keys, namespace_name};
use common::{GENESIS, PREFIX, TestCache};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::time::Duration;

#[test]
fn test_set_then_get_returns_written_values() {
    let cache = TestCache::new();
    let ns = cache
        .registry
        .namespace(&namespace_name(PREFIX, GENESIS, Category::Message).unwrap())
        .unwrap();

    let mut rng = StdRng::seed_from_u64(7);
    for round in 0..20 {
        let count = rng.random_range(1..200);
        let keys = generate_bulk_keys(GENESIS, round * 1000, round * 1000 + count - 1);
        let written: HashMap<String, Vec<u8>> = keys
            .iter()
            .map(|k| {
                let len = rng.random_range(1..64);
                (k.clone(), (0..len).map(|_| rng.random()).collect())
            })
            .collect();

        ns.batch_set(&written, None).unwrap();
        let read = ns.batch_get(&keys).unwrap();
        assert_eq!(read, written, "round {round}");

        ns.batch_delete(&keys).unwrap();
        let after = ns.batch_get(&keys).unwrap();
        assert!(after.is_empty(), "round {round}");
    }
}

#[test]
fn test_split_transactions_apply_all_pairs_in_order() {
    // Two entries or ~100 bytes per transaction forces many commits
    let cache = TestCache::with_limits(2, 100);
    let ns = cache.registry.namespace("broker.ab.hash").unwrap();

    let keys = generate_bulk_keys("ab", 0, 99);
    // Later writes to the same key win
    let mut pairs: Vec<(String, &str)> = keys.iter().map(|k| (k.clone(), "first")).collect();
    pairs.extend(keys.iter().take(10).map(|k| (k.clone(), "second")));

    assert_eq!(ns.batch_set(pairs, None).unwrap(), 110);

    let read = ns.batch_get(&keys).unwrap();
    assert_eq!(read.len(), 100);
    assert_eq!(read["ab_0"], b"second");
    assert_eq!(read["ab_9"], b"second");
    assert_eq!(read["ab_10"], b"first");
}

#[test]
fn test_oversized_value_is_written_alone() {
    let cache = TestCache::with_limits(100, 16);
    let ns = cache.registry.namespace("broker.ab.message").unwrap();

    let big = vec![b'x'; 1024];
    ns.batch_set([("ab_0", big.as_slice()), ("ab_1", b"small".as_slice())], None)
        .unwrap();

    let read = ns.batch_get(&["ab_0", "ab_1"]).unwrap();
    assert_eq!(read["ab_0"].len(), 1024);
    assert_eq!(read["ab_1"], b"small");
}

#[test]
fn test_missing_keys_are_omitted() {
    let cache = TestCache::new();
    let ns = cache.registry.namespace("broker.ab.complete").unwrap();
    let read = ns.batch_get(&generate_bulk_keys("ab", 0, 5)).unwrap();
    assert!(read.is_empty());
}

#[test]
fn test_expired_values_read_as_absent() {
    let cache = TestCache::with_limits(10, 1024);
    let ns = cache.registry.namespace("broker.ab.in_progress").unwrap();

    ns.batch_set([("ab_0", "old")], Some(Duration::ZERO)).unwrap();
    ns.batch_set([("ab_1", "new")], Some(Duration::from_secs(600)))
        .unwrap();

    let read = ns.batch_get(&["ab_0", "ab_1"]).unwrap();
    assert_eq!(read.len(), 1);
    assert!(read.contains_key("ab_1"));

    assert_eq!(cache.registry.purge_expired().unwrap(), 1);
    assert_eq!(cache.registry.purge_expired().unwrap(), 0);
}

#[test]
fn test_test_mode_ignores_requested_ttl() {
    // Test mode always applies its fixed TTL, so a zero TTL is not expired
    let cache = TestCache::new();
    let ns = cache.registry.namespace("broker.ab.hash").unwrap();
    ns.batch_set([("ab_0", "v")], Some(Duration::ZERO)).unwrap();
    assert_eq!(ns.batch_get(&["ab_0"]).unwrap().len(), 1);
}
