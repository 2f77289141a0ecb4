//! WAL Recovery
//!
//! Replays a log into a memtable after a restart. Damaged regions are
//! skipped and counted; a record cut short by a crash is silently dropped.

use std::fs::File;
use std::path::Path;

use crate::error::{CinderError, Result};
use crate::memtable::{MemTable, SequenceNumber, ValueType};

use super::reader::LogReader;
use super::{Operation, WalEntry};

/// Replays WAL files
pub struct WalRecovery;

/// Result of a recovery operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecoveryResult {
    /// Logical records read and decoded
    pub records_recovered: u64,

    /// Operations inserted into the memtable (zero when only verifying)
    pub operations_applied: u64,

    /// Corruption notices raised while reading
    pub corruption_events: u64,

    /// Approximate bytes skipped because of corruption
    pub bytes_dropped: u64,

    /// Highest sequence found in the log, 0 if none
    pub last_sequence: SequenceNumber,

    /// Offset just past the last well-framed record. Bytes beyond it are
    /// padding, damage, or a torn tail.
    pub valid_len: u64,
}

impl RecoveryResult {
    pub fn is_clean(&self) -> bool {
        self.corruption_events == 0
    }
}

impl WalRecovery {
    /// Replay the log at `path` into `memtable`
    ///
    /// A missing log recovers nothing. Only I/O failures are errors.
    pub fn recover(
        path: &Path,
        memtable: &MemTable,
        verify_checksums: bool,
    ) -> Result<RecoveryResult> {
        let result = Self::scan(path, verify_checksums, |entry| {
            let mut sequence = entry.sequence;
            for op in &entry.batch {
                match op {
                    Operation::Put { key, value } => {
                        memtable.add(sequence, ValueType::Value, key, value)
                    }
                    Operation::Delete { key } => memtable.add(sequence, ValueType::Deletion, key, &[]),
                }
                sequence += 1;
            }
            entry.batch.len() as u64
        })?;

        tracing::info!(
            path = %path.display(),
            records = result.records_recovered,
            operations = result.operations_applied,
            corruption_events = result.corruption_events,
            bytes_dropped = result.bytes_dropped,
            last_sequence = result.last_sequence,
            "WAL recovery complete"
        );
        Ok(result)
    }

    /// Check the integrity of the log at `path` without applying it
    pub fn verify(path: &Path) -> Result<RecoveryResult> {
        Self::scan(path, true, |_| 0)
    }

    /// Read every entry, handing each to `apply`, which returns the number
    /// of operations it applied
    fn scan<F>(path: &Path, verify_checksums: bool, mut apply: F) -> Result<RecoveryResult>
    where
        F: FnMut(&WalEntry) -> u64,
    {
        let mut result = RecoveryResult::default();
        if !path.exists() {
            return Ok(result);
        }

        let mut events = 0u64;
        let mut dropped = 0u64;
        let mut reader = LogReader::new(File::open(path)?, verify_checksums, 0).with_reporter(
            |bytes: usize, reason: &CinderError| {
                tracing::warn!(bytes, %reason, "dropping corrupted WAL bytes");
                events += 1;
                dropped += bytes as u64;
            },
        );

        let mut record = Vec::new();
        while reader.read_record(&mut record)? {
            result.valid_len = reader.end_of_last_record();
            let entry = match WalEntry::decode(&record) {
                Ok(entry) => entry,
                Err(e) => {
                    // Intact framing, undecodable payload
                    tracing::warn!(
                        offset = reader.last_record_offset(),
                        bytes = record.len(),
                        error = %e,
                        "skipping undecodable WAL record"
                    );
                    result.corruption_events += 1;
                    result.bytes_dropped += record.len() as u64;
                    continue;
                }
            };

            let Some(last_sequence) = entry.checked_last_sequence() else {
                tracing::warn!(
                    offset = reader.last_record_offset(),
                    sequence = entry.sequence,
                    operations = entry.batch.len(),
                    "skipping WAL record with out-of-range sequence"
                );
                result.corruption_events += 1;
                result.bytes_dropped += record.len() as u64;
                continue;
            };

            result.records_recovered += 1;
            result.operations_applied += apply(&entry);
            if !entry.batch.is_empty() {
                result.last_sequence = result.last_sequence.max(last_sequence);
            }
        }
        drop(reader);

        result.corruption_events += events;
        result.bytes_dropped += dropped;
        Ok(result)
    }
}
