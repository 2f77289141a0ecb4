//! Configuration for CinderKV
//!
//! Centralized configuration with sensible defaults.

use std::path::PathBuf;

use crate::arena::DEFAULT_BLOCK_SIZE;
use crate::error::{CinderError, Result};

/// Main configuration for a CinderKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files
    /// Internal structure:
    ///   {data_dir}/
    ///     └── wal.log          (write-ahead log)
    pub data_dir: PathBuf,

    // -------------------------------------------------------------------------
    // WAL Configuration
    // -------------------------------------------------------------------------
    /// Sync strategy: how often to fsync WAL
    pub wal_sync_strategy: WalSyncStrategy,

    /// Verify record checksums when replaying the WAL
    pub verify_checksums: bool,

    // -------------------------------------------------------------------------
    // MemTable Configuration
    // -------------------------------------------------------------------------
    /// Memtable memory usage (in bytes) past which it should be flushed
    pub memtable_size_limit: usize,

    /// Size of each standard arena block backing the memtable
    pub arena_block_size: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./cinderkv_data"),
            wal_sync_strategy: WalSyncStrategy::EveryNEntries { count: 100 },
            verify_checksums: true,
            memtable_size_limit: 4 * 1024 * 1024, // 4 MB
            arena_block_size: DEFAULT_BLOCK_SIZE,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.arena_block_size == 0 {
            return Err(CinderError::Config("arena_block_size must be > 0".into()));
        }
        if self.memtable_size_limit == 0 {
            return Err(CinderError::Config("memtable_size_limit must be > 0".into()));
        }
        if let WalSyncStrategy::EveryNEntries { count: 0 } = self.wal_sync_strategy {
            return Err(CinderError::Config(
                "EveryNEntries sync strategy needs a count > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Enable or disable checksum verification during replay
    pub fn verify_checksums(mut self, verify: bool) -> Self {
        self.config.verify_checksums = verify;
        self
    }

    /// Set the memtable size limit (in bytes)
    pub fn memtable_size_limit(mut self, size: usize) -> Self {
        self.config.memtable_size_limit = size;
        self
    }

    /// Set the arena block size (in bytes)
    pub fn arena_block_size(mut self, size: usize) -> Self {
        self.config.arena_block_size = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
