//! MemTable Tests
//!
//! Tests verify:
//! - Snapshot lookups see the newest version at or below the snapshot
//! - Tombstones hide older versions
//! - Iteration in internal key order
//! - Memory accounting and flush trigger
//! - Concurrent readers alongside the writer

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cinderkv::memtable::{
    InternalKeyComparator, LookupKey, MemTable, MemTableEntry, ParsedInternalKey,
    ValueType,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn new_memtable() -> MemTable {
    MemTable::new(InternalKeyComparator::default())
}

fn get(memtable: &MemTable, key: &[u8], snapshot: u64) -> Option<MemTableEntry> {
    memtable.get(&LookupKey::new(key, snapshot))
}

fn value(v: &[u8]) -> Option<MemTableEntry> {
    Some(MemTableEntry::Value(v.to_vec()))
}

// =============================================================================
// Basic Operations Tests
// =============================================================================

#[test]
fn test_new_memtable_is_empty() {
    let memtable = new_memtable();
    assert_eq!(memtable.entry_count(), 0);
    assert!(memtable.is_empty());
    assert_eq!(get(&memtable, b"anything", 100), None);
}

#[test]
fn test_put_and_get() {
    let memtable = new_memtable();
    memtable.add(1, ValueType::Value, b"key1", b"value1");

    assert_eq!(get(&memtable, b"key1", 1), value(b"value1"));
    assert_eq!(memtable.entry_count(), 1);
}

#[test]
fn test_get_nonexistent_key() {
    let memtable = new_memtable();
    memtable.add(1, ValueType::Value, b"b", b"1");

    assert_eq!(get(&memtable, b"a", 10), None);
    assert_eq!(get(&memtable, b"c", 10), None);
    // Prefix of an existing key
    assert_eq!(get(&memtable, b"", 10), None);
}

#[test]
fn test_entry_invisible_before_its_sequence() {
    let memtable = new_memtable();
    memtable.add(5, ValueType::Value, b"k", b"v");

    assert_eq!(get(&memtable, b"k", 4), None);
    assert_eq!(get(&memtable, b"k", 5), value(b"v"));
}

// =============================================================================
// Snapshot and Tombstone Tests
// =============================================================================

#[test]
fn test_snapshot_reads() {
    let memtable = new_memtable();
    memtable.add(1, ValueType::Value, b"k", b"v1");
    memtable.add(2, ValueType::Value, b"k", b"v2");

    assert_eq!(get(&memtable, b"k", 1), value(b"v1"));
    assert_eq!(get(&memtable, b"k", 2), value(b"v2"));
    assert_eq!(get(&memtable, b"k", 1_000), value(b"v2"));
}

#[test]
fn test_delete_creates_tombstone() {
    let memtable = new_memtable();
    memtable.add(1, ValueType::Value, b"k", b"v");
    memtable.add(2, ValueType::Deletion, b"k", b"");

    assert_eq!(get(&memtable, b"k", 2), Some(MemTableEntry::Tombstone));
    assert_eq!(get(&memtable, b"k", 3), Some(MemTableEntry::Tombstone));
    assert_eq!(get(&memtable, b"k", 1), value(b"v"));
}

#[test]
fn test_put_after_delete() {
    let memtable = new_memtable();
    memtable.add(1, ValueType::Value, b"k", b"old");
    memtable.add(2, ValueType::Deletion, b"k", b"");
    memtable.add(3, ValueType::Value, b"k", b"new");

    assert_eq!(get(&memtable, b"k", 3), value(b"new"));
    assert_eq!(get(&memtable, b"k", 2), Some(MemTableEntry::Tombstone));
    assert_eq!(memtable.entry_count(), 3);
}

#[test]
fn test_empty_key_and_value() {
    let memtable = new_memtable();
    memtable.add(1, ValueType::Value, b"", b"empty key");
    memtable.add(2, ValueType::Value, b"empty value", b"");

    assert_eq!(get(&memtable, b"", 2), value(b"empty key"));
    assert_eq!(get(&memtable, b"empty value", 2), value(b""));
}

#[test]
fn test_large_value() {
    let memtable = MemTable::with_block_size(InternalKeyComparator::default(), 1024);
    let big = vec![0x5a; 100_000];
    memtable.add(1, ValueType::Value, b"big", &big);
    memtable.add(2, ValueType::Value, b"small", b"s");

    assert_eq!(get(&memtable, b"big", 2), Some(MemTableEntry::Value(big)));
    assert_eq!(get(&memtable, b"small", 2), value(b"s"));
}

// =============================================================================
// Iteration Tests
// =============================================================================

#[test]
fn test_iter_empty() {
    let memtable = new_memtable();
    let mut iter = memtable.iter();
    iter.seek_to_first();
    assert!(!iter.valid());
    iter.seek_to_last();
    assert!(!iter.valid());
}

#[test]
fn test_iter_internal_key_order() {
    let memtable = new_memtable();
    memtable.add(1, ValueType::Value, b"b", b"b1");
    memtable.add(2, ValueType::Value, b"a", b"a2");
    memtable.add(3, ValueType::Deletion, b"b", b"");
    memtable.add(4, ValueType::Value, b"c", b"c4");
    memtable.add(5, ValueType::Value, b"a", b"a5");

    let mut seen = Vec::new();
    let mut iter = memtable.iter();
    iter.seek_to_first();
    while iter.valid() {
        let parsed = iter.parsed_key();
        seen.push((parsed.user_key.to_vec(), parsed.sequence, iter.value().to_vec()));
        iter.next();
    }

    // User key ascending, newest version first
    let expected: Vec<(Vec<u8>, u64, Vec<u8>)> = vec![
        (b"a".to_vec(), 5, b"a5".to_vec()),
        (b"a".to_vec(), 2, b"a2".to_vec()),
        (b"b".to_vec(), 3, Vec::new()),
        (b"b".to_vec(), 1, b"b1".to_vec()),
        (b"c".to_vec(), 4, b"c4".to_vec()),
    ];
    assert_eq!(seen, expected);
}

#[test]
fn test_iter_includes_tombstones() {
    let memtable = new_memtable();
    memtable.add(1, ValueType::Deletion, b"gone", b"");

    let mut iter = memtable.iter();
    iter.seek_to_first();
    assert!(iter.valid());
    assert_eq!(
        iter.parsed_key(),
        ParsedInternalKey::new(b"gone", 1, ValueType::Deletion)
    );
    assert!(iter.value().is_empty());
}

#[test]
fn test_iter_seek_and_prev() {
    let memtable = new_memtable();
    for (i, key) in [b"a", b"c", b"e"].iter().enumerate() {
        memtable.add(i as u64 + 1, ValueType::Value, *key, b"v");
    }

    let mut iter = memtable.iter();
    iter.seek(LookupKey::new(b"b", 100).internal_key());
    assert!(iter.valid());
    assert_eq!(iter.parsed_key().user_key, b"c");

    iter.prev();
    assert_eq!(iter.parsed_key().user_key, b"a");
    iter.prev();
    assert!(!iter.valid());

    iter.seek_to_last();
    assert_eq!(iter.parsed_key().user_key, b"e");
}

// =============================================================================
// Memory Accounting Tests
// =============================================================================

#[test]
fn test_memory_usage_grows() {
    let memtable = new_memtable();
    let before = memtable.approximate_memory_usage();
    for i in 0..1_000u64 {
        memtable.add(i + 1, ValueType::Value, format!("key{:04}", i).as_bytes(), b"value");
    }
    assert!(memtable.approximate_memory_usage() > before);
}

#[test]
fn test_should_flush() {
    let memtable = new_memtable();
    let usage = memtable.approximate_memory_usage();
    assert!(!memtable.should_flush(usage + 1));
    assert!(memtable.should_flush(usage));

    memtable.add(1, ValueType::Value, b"k", &vec![0; 10_000]);
    assert!(memtable.should_flush(usage + 1));
}

#[test]
fn test_many_entries() {
    let memtable = new_memtable();
    for i in 0..100u64 {
        let key = format!("key{:03}", i);
        let val = format!("value{:03}", i);
        memtable.add(i + 1, ValueType::Value, key.as_bytes(), val.as_bytes());
    }

    assert_eq!(memtable.entry_count(), 100);
    for i in 0..100u64 {
        let key = format!("key{:03}", i);
        let val = format!("value{:03}", i);
        assert_eq!(get(&memtable, key.as_bytes(), 100), value(val.as_bytes()));
        // Not yet written at the previous sequence
        assert_eq!(get(&memtable, key.as_bytes(), i), None);
    }

    let mut iter = memtable.iter();
    iter.seek_to_first();
    let mut count = 0;
    while iter.valid() {
        assert_eq!(iter.parsed_key().user_key, format!("key{:03}", count).as_bytes());
        count += 1;
        iter.next();
    }
    assert_eq!(count, 100);
}

// =============================================================================
// Concurrency Tests
// =============================================================================

#[test]
fn test_concurrent_readers_see_published_sequences() {
    const WRITES: u64 = 2_000;

    let memtable = Arc::new(new_memtable());
    // Sequence of the last fully inserted entry
    let published = AtomicU64::new(0);

    crossbeam::scope(|s| {
        for _ in 0..4 {
            let memtable = Arc::clone(&memtable);
            let published = &published;
            s.spawn(move |_| loop {
                let snapshot = published.load(Ordering::Acquire);
                for seq in (1..=snapshot).step_by(97) {
                    let key = format!("key{:06}", seq);
                    let expected = format!("value{}", seq);
                    assert_eq!(
                        memtable.get(&LookupKey::new(key.as_bytes(), snapshot)),
                        Some(MemTableEntry::Value(expected.into_bytes()))
                    );
                }
                if snapshot == WRITES {
                    break;
                }
            });
        }

        for seq in 1..=WRITES {
            let key = format!("key{:06}", seq);
            let val = format!("value{}", seq);
            memtable.add(seq, ValueType::Value, key.as_bytes(), val.as_bytes());
            published.store(seq, Ordering::Release);
        }
    })
    .unwrap();

    assert_eq!(memtable.entry_count(), WRITES as usize);
}
