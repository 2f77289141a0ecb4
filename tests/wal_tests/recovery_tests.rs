//! Tests for WAL recovery
//!
//! These tests verify:
//! - Replay of batches into a memtable with their sequences
//! - Torn tails and corrupted blocks are skipped and counted
//! - Verification leaves the memtable untouched

use std::fs::{self, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use cinderkv::memtable::{
    InternalKeyComparator, LookupKey, MemTable, MemTableEntry, MAX_SEQUENCE_NUMBER,
};
use cinderkv::wal::{
    LogFile, LogWriter, WalEntry, WalRecovery, WriteBatch, BLOCK_SIZE, HEADER_SIZE,
};
use tempfile::TempDir;

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_temp_wal() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let wal_path = temp_dir.path().join("wal.log");
    (temp_dir, wal_path)
}

fn write_entries(path: &Path, entries: &[WalEntry]) {
    let (file, len) = LogFile::open_append(path).unwrap();
    let mut writer = LogWriter::with_offset(file, len);
    for entry in entries {
        writer.append(&entry.encode().unwrap()).unwrap();
    }
    writer.sync().unwrap();
}

fn put_entry(sequence: u64, key: &str, value: &str) -> WalEntry {
    let mut batch = WriteBatch::new();
    batch.put(key, value);
    WalEntry::new(sequence, batch)
}

fn new_memtable() -> MemTable {
    MemTable::new(InternalKeyComparator::default())
}

fn lookup(memtable: &MemTable, key: &str, sequence: u64) -> Option<MemTableEntry> {
    memtable.get(&LookupKey::new(key.as_bytes(), sequence))
}

// =============================================================================
// Replay
// =============================================================================

#[test]
fn test_recover_missing_file() {
    let (_temp, wal_path) = setup_temp_wal();
    let memtable = new_memtable();

    let result = WalRecovery::recover(&wal_path, &memtable, true).unwrap();
    assert_eq!(result.records_recovered, 0);
    assert_eq!(result.last_sequence, 0);
    assert!(memtable.is_empty());
}

#[test]
fn test_recover_applies_batches_in_order() {
    let (_temp, wal_path) = setup_temp_wal();

    let mut batch = WriteBatch::new();
    batch.put("a", "2").delete("b");
    write_entries(
        &wal_path,
        &[put_entry(1, "a", "1"), put_entry(2, "b", "1"), WalEntry::new(3, batch)],
    );

    let memtable = new_memtable();
    let result = WalRecovery::recover(&wal_path, &memtable, true).unwrap();
    assert_eq!(result.records_recovered, 3);
    assert_eq!(result.operations_applied, 4);
    assert_eq!(result.last_sequence, 4);
    assert!(result.is_clean());

    assert_eq!(lookup(&memtable, "a", 2), Some(MemTableEntry::Value(b"1".to_vec())));
    assert_eq!(lookup(&memtable, "a", 3), Some(MemTableEntry::Value(b"2".to_vec())));
    assert_eq!(lookup(&memtable, "b", 3), Some(MemTableEntry::Value(b"1".to_vec())));
    assert_eq!(lookup(&memtable, "b", 4), Some(MemTableEntry::Tombstone));
}

// =============================================================================
// Damage
// =============================================================================

#[test]
fn test_recover_ignores_torn_tail() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, &[put_entry(1, "k1", "v1"), put_entry(2, "k2", "v2")]);

    // Simulate a crash in the middle of the second record
    let len = fs::metadata(&wal_path).unwrap().len();
    let file = OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.set_len(len - 3).unwrap();

    let memtable = new_memtable();
    let result = WalRecovery::recover(&wal_path, &memtable, true).unwrap();
    assert_eq!(result.records_recovered, 1);
    assert_eq!(result.last_sequence, 1);
    assert!(result.is_clean());
    assert_eq!(result.bytes_dropped, 0);
    assert_eq!(lookup(&memtable, "k2", 10), None);

    // Only the first record is intact
    let first_len = put_entry(1, "k1", "v1").encode().unwrap().len() as u64;
    assert_eq!(result.valid_len, HEADER_SIZE as u64 + first_len);
}

#[test]
fn test_valid_len_covers_whole_clean_log() {
    let (_temp, wal_path) = setup_temp_wal();
    let big = "v".repeat(2 * BLOCK_SIZE);
    write_entries(&wal_path, &[put_entry(1, "a", "1"), put_entry(2, "big", &big)]);

    let result = WalRecovery::verify(&wal_path).unwrap();
    assert_eq!(result.valid_len, fs::metadata(&wal_path).unwrap().len());
}

#[test]
fn test_recover_skips_corrupted_block() {
    let (_temp, wal_path) = setup_temp_wal();
    let big = "v".repeat(BLOCK_SIZE);
    write_entries(
        &wal_path,
        &[
            put_entry(1, "first", "1"),
            put_entry(2, "big", &big),
            put_entry(3, "last", "3"),
        ],
    );

    // Flip a byte early in block 1, inside the big record's tail
    let mut file = OpenOptions::new().write(true).open(&wal_path).unwrap();
    file.seek(SeekFrom::Start(BLOCK_SIZE as u64 + 10)).unwrap();
    file.write_all(&[0xAB]).unwrap();
    file.sync_all().unwrap();
    drop(file);

    let memtable = new_memtable();
    let result = WalRecovery::recover(&wal_path, &memtable, true).unwrap();
    assert_eq!(result.records_recovered, 1);
    assert!(result.corruption_events >= 1);
    assert!(result.bytes_dropped > 0);
    assert_eq!(result.last_sequence, 1);

    assert_eq!(
        lookup(&memtable, "first", 10),
        Some(MemTableEntry::Value(b"1".to_vec()))
    );
    assert_eq!(lookup(&memtable, "big", 10), None);
}

#[test]
fn test_undecodable_record_is_counted() {
    let (_temp, wal_path) = setup_temp_wal();
    {
        let (file, len) = LogFile::open_append(&wal_path).unwrap();
        let mut writer = LogWriter::with_offset(file, len);
        writer.append(&put_entry(1, "k", "v").encode().unwrap()).unwrap();
        // Well-framed record whose payload is not an entry
        writer.append(b"junk").unwrap();
        writer.sync().unwrap();
    }

    let memtable = new_memtable();
    let result = WalRecovery::recover(&wal_path, &memtable, true).unwrap();
    assert_eq!(result.records_recovered, 1);
    assert_eq!(result.corruption_events, 1);
    assert_eq!(result.bytes_dropped, 4);
}

#[test]
fn test_out_of_range_sequence_is_counted() {
    let (_temp, wal_path) = setup_temp_wal();
    let mut pair = WriteBatch::new();
    pair.put("x", "1").put("y", "2");
    let huge = put_entry(u64::MAX, "huge", "v");
    let edge = WalEntry::new(MAX_SEQUENCE_NUMBER, pair);
    write_entries(
        &wal_path,
        &[put_entry(1, "k", "v"), huge.clone(), edge.clone(), put_entry(2, "k2", "v")],
    );

    let memtable = new_memtable();
    let result = WalRecovery::recover(&wal_path, &memtable, true).unwrap();
    assert_eq!(result.records_recovered, 2);
    assert_eq!(result.operations_applied, 2);
    assert_eq!(result.corruption_events, 2);
    assert_eq!(
        result.bytes_dropped,
        (huge.encode().unwrap().len() + edge.encode().unwrap().len()) as u64
    );
    assert_eq!(result.last_sequence, 2);
    assert_eq!(lookup(&memtable, "huge", MAX_SEQUENCE_NUMBER), None);
    assert_eq!(lookup(&memtable, "x", MAX_SEQUENCE_NUMBER), None);
}

// =============================================================================
// Verification
// =============================================================================

#[test]
fn test_verify_does_not_apply() {
    let (_temp, wal_path) = setup_temp_wal();
    write_entries(&wal_path, &[put_entry(1, "k1", "v1"), put_entry(2, "k2", "v2")]);

    let result = WalRecovery::verify(&wal_path).unwrap();
    assert_eq!(result.records_recovered, 2);
    assert_eq!(result.operations_applied, 0);
    assert_eq!(result.last_sequence, 2);
    assert!(result.is_clean());
}
