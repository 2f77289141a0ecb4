//! Single-threaded SkipList tests
//!
//! Checks membership and both iteration directions against a `BTreeSet`.

use std::collections::BTreeSet;

use cinderkv::skiplist::{OrdComparator, SkipList};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

type Key = u64;

#[test]
fn test_empty() {
    let list: SkipList<Key, _> = SkipList::new(OrdComparator);
    assert!(!list.contains(&10));
    assert!(list.is_empty());

    let mut iter = list.iter();
    assert!(!iter.valid());
    iter.seek_to_first();
    assert!(!iter.valid());
    iter.seek(&100);
    assert!(!iter.valid());
    iter.seek_to_last();
    assert!(!iter.valid());
}

#[test]
fn test_insert_and_lookup() {
    const N: usize = 2000;
    const R: u64 = 5000;

    let mut rng = StdRng::seed_from_u64(1000);
    let mut keys = BTreeSet::new();
    let list = SkipList::new(OrdComparator);
    for _ in 0..N {
        let key: Key = rng.gen_range(0..R);
        if keys.insert(key) {
            list.insert(key);
        }
    }
    assert_eq!(list.len(), keys.len());

    for i in 0..R {
        assert_eq!(list.contains(&i), keys.contains(&i), "key {}", i);
    }

    // Simple iterator tests
    {
        let mut iter = list.iter();
        assert!(!iter.valid());

        iter.seek(&0);
        assert!(iter.valid());
        assert_eq!(keys.iter().next(), Some(iter.key()));

        iter.seek_to_first();
        assert!(iter.valid());
        assert_eq!(keys.iter().next(), Some(iter.key()));

        iter.seek_to_last();
        assert!(iter.valid());
        assert_eq!(keys.iter().next_back(), Some(iter.key()));
    }

    // Forward iteration test
    for i in 0..R {
        let mut iter = list.iter();
        iter.seek(&i);

        // Compare against model iterator
        let mut model = keys.range(i..);
        for _ in 0..3 {
            match model.next() {
                Some(expected) => {
                    assert!(iter.valid());
                    assert_eq!(iter.key(), expected);
                    iter.next();
                }
                None => {
                    assert!(!iter.valid());
                    break;
                }
            }
        }
    }

    // Backward iteration test
    {
        let mut iter = list.iter();
        iter.seek_to_last();

        // Compare against model iterator
        for expected in keys.iter().rev() {
            assert!(iter.valid());
            assert_eq!(iter.key(), expected);
            iter.prev();
        }
        assert!(!iter.valid());
    }
}

#[test]
fn test_custom_comparator() {
    // Reverse order through a closure comparator
    let list = SkipList::new(|a: &u32, b: &u32| b.cmp(a));
    for key in [3u32, 1, 4, 1, 5, 9, 2, 6] {
        if !list.contains(&key) {
            list.insert(key);
        }
    }

    let mut iter = list.iter();
    iter.seek_to_first();
    let mut seen = Vec::new();
    while iter.valid() {
        seen.push(*iter.key());
        iter.next();
    }
    assert_eq!(seen, vec![9, 6, 5, 4, 3, 2, 1]);
}

#[test]
fn test_memory_usage_tracks_inserts() {
    let list = SkipList::new(OrdComparator);
    let initial = list.memory_usage();
    assert!(initial > 0, "head node lives in the arena");
    for key in 0..10_000u64 {
        list.insert(key);
    }
    assert!(list.memory_usage() > initial);
    assert_eq!(list.len(), 10_000);
}
