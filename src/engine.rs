//! Engine Module
//!
//! Embedded storage core that ties the log and the memtable together.
//!
//! ## Responsibilities
//! - Log every write batch before it becomes visible
//! - Assign sequence numbers and publish them to readers
//! - Serve snapshot reads from the memtable without locking
//! - Replay the log on startup

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::{Config, WalSyncStrategy};
use crate::error::{CinderError, Result};
use crate::memtable::{
    check_entry_lengths, InternalKeyComparator, LookupKey, MemTable, MemTableEntry,
    SequenceNumber, ValueType, MAX_SEQUENCE_NUMBER,
};
use crate::wal::{
    LogFile, LogWriter, Operation, WalEntry, WalRecovery, WritableFile, WriteBatch,
};

/// Log plus sync bookkeeping, owned by whoever holds the write lock
struct WriterState {
    log: LogWriter<Box<dyn WritableFile + Send>>,

    /// Entries appended since the last sync
    uncommitted: usize,
}

/// The main storage engine
///
/// ## Concurrency Model: Single-Writer / Multiple-Reader (SWMR)
///
/// - **Writes** (put/delete/write): serialized by the `writer` mutex, which
///   covers the log append, the memtable insert and the sequence publish.
/// - **Reads** (get/get_at): take no lock. A read pins `last_sequence`
///   first; entries with a higher sequence are invisible to it even if
///   they are already linked into the memtable.
pub struct Engine {
    /// Engine configuration
    config: Config,

    /// In-memory table for recent writes (lock-free reads)
    memtable: Arc<MemTable>,

    /// Write-ahead log and its sync counter
    writer: Mutex<WriterState>,

    /// Highest sequence whose batch is fully in the memtable
    last_sequence: AtomicU64,
}

impl Engine {
    const WAL_FILENAME: &'static str = "wal.log";

    /// Open or create an engine with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Replay the WAL, if any, into a fresh memtable
    /// 3. Cut off anything after the last intact record
    /// 4. Reopen the WAL for appending where it left off
    pub fn open(config: Config) -> Result<Self> {
        Self::open_with_sink(config, LogFile::open_append)
    }

    /// Open with a caller-supplied log sink
    ///
    /// `open_sink` gets the WAL path after recovery and returns the sink
    /// plus the number of log bytes already at that path.
    pub fn open_with_sink<W, F>(config: Config, open_sink: F) -> Result<Self>
    where
        W: WritableFile + Send + 'static,
        F: FnOnce(&Path) -> Result<(W, u64)>,
    {
        config.validate()?;
        fs::create_dir_all(&config.data_dir)?;

        let wal_path = config.data_dir.join(Self::WAL_FILENAME);
        let memtable = Arc::new(MemTable::with_block_size(
            InternalKeyComparator::default(),
            config.arena_block_size,
        ));

        let recovery = WalRecovery::recover(&wal_path, &memtable, config.verify_checksums)?;
        if !recovery.is_clean() {
            tracing::warn!(
                corruption_events = recovery.corruption_events,
                bytes_dropped = recovery.bytes_dropped,
                "WAL replay skipped corrupted data"
            );
        }

        // New records must not follow a torn tail in the same block, or the
        // reader would take the torn header's length across them
        if wal_path.exists() {
            let len = fs::metadata(&wal_path)?.len();
            if len > recovery.valid_len {
                tracing::warn!(
                    path = %wal_path.display(),
                    len,
                    valid_len = recovery.valid_len,
                    "truncating WAL after last intact record"
                );
                LogFile::truncate(&wal_path, recovery.valid_len)?;
            }
        }

        let (sink, len) = open_sink(&wal_path)?;
        tracing::debug!(path = %wal_path.display(), len, "WAL opened for append");
        let sink: Box<dyn WritableFile + Send> = Box::new(sink);

        Ok(Self {
            config,
            memtable,
            writer: Mutex::new(WriterState {
                log: LogWriter::with_offset(sink, len),
                uncommitted: 0,
            }),
            last_sequence: AtomicU64::new(recovery.last_sequence),
        })
    }

    /// Open with a path (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    /// Get the newest value of `key`
    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.get_at(key, self.snapshot())
    }

    /// Get the value of `key` as of `snapshot`
    pub fn get_at(&self, key: &[u8], snapshot: SequenceNumber) -> Result<Option<Vec<u8>>> {
        let lookup = LookupKey::new(key, snapshot.min(MAX_SEQUENCE_NUMBER));
        Ok(match self.memtable.get(&lookup) {
            Some(MemTableEntry::Value(value)) => Some(value),
            Some(MemTableEntry::Tombstone) | None => None,
        })
    }

    /// Sequence number that pins the current state for `get_at`
    pub fn snapshot(&self) -> SequenceNumber {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Put a key-value pair
    pub fn put(&self, key: &[u8], value: &[u8]) -> Result<SequenceNumber> {
        let mut batch = WriteBatch::new();
        batch.put(key, value);
        self.write(batch)
    }

    /// Delete a key
    pub fn delete(&self, key: &[u8]) -> Result<SequenceNumber> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write(batch)
    }

    /// Apply a batch atomically
    ///
    /// Steps:
    /// 1. Acquire the write lock
    /// 2. Append the batch to the WAL (durability)
    /// 3. Insert every operation into the MemTable
    /// 4. Publish the new last sequence to readers
    ///
    /// Returns the sequence of the last operation. If the log append or
    /// sync fails nothing is applied, the error is returned, and every later
    /// write fails until the engine is reopened. The failed batch may still
    /// be replayed on reopen.
    pub fn write(&self, batch: WriteBatch) -> Result<SequenceNumber> {
        let mut writer = self.writer.lock();
        let last = self.last_sequence.load(Ordering::Relaxed);
        if batch.is_empty() {
            return Ok(last);
        }
        if MAX_SEQUENCE_NUMBER - last < batch.len() as u64 {
            return Err(CinderError::InvalidArgument("sequence numbers exhausted".into()));
        }
        for op in &batch {
            match op {
                Operation::Put { key, value } => check_entry_lengths(key.len(), value.len())?,
                Operation::Delete { key } => check_entry_lengths(key.len(), 0)?,
            }
        }

        let entry = WalEntry::new(last + 1, batch);
        writer.log.append(&entry.encode()?)?;
        self.maybe_sync(&mut writer)?;

        let mut sequence = entry.sequence;
        for op in &entry.batch {
            match op {
                Operation::Put { key, value } => {
                    self.memtable.add(sequence, ValueType::Value, key, value)
                }
                Operation::Delete { key } => {
                    self.memtable.add(sequence, ValueType::Deletion, key, &[])
                }
            }
            sequence += 1;
        }

        let last = entry.last_sequence();
        self.last_sequence.store(last, Ordering::Release);

        if self.should_flush() {
            tracing::debug!(
                usage = self.memtable.approximate_memory_usage(),
                limit = self.config.memtable_size_limit,
                "memtable over size limit"
            );
        }
        Ok(last)
    }

    fn maybe_sync(&self, writer: &mut WriterState) -> Result<()> {
        match self.config.wal_sync_strategy {
            WalSyncStrategy::EveryWrite => writer.log.sync(),
            WalSyncStrategy::EveryNEntries { count } => {
                writer.uncommitted += 1;
                if writer.uncommitted >= count {
                    writer.log.sync()?;
                    writer.uncommitted = 0;
                }
                Ok(())
            }
        }
    }

    /// Force buffered log records to stable storage
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock();
        writer.log.sync()?;
        writer.uncommitted = 0;
        Ok(())
    }

    /// Close the engine gracefully, syncing the WAL
    pub fn close(self) -> Result<()> {
        self.sync()?;
        tracing::debug!(last_sequence = self.last_sequence(), "engine closed");
        Ok(())
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Shared handle to the current memtable
    pub fn memtable(&self) -> Arc<MemTable> {
        Arc::clone(&self.memtable)
    }

    /// True once the memtable has outgrown `memtable_size_limit`
    pub fn should_flush(&self) -> bool {
        self.memtable.should_flush(self.config.memtable_size_limit)
    }

    pub fn last_sequence(&self) -> SequenceNumber {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Get the data directory path
    pub fn data_dir(&self) -> &Path {
        &self.config.data_dir
    }

    /// Path of the write-ahead log
    pub fn wal_path(&self) -> std::path::PathBuf {
        self.config.data_dir.join(Self::WAL_FILENAME)
    }

    /// Get the configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
