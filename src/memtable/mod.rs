//! MemTable Module
//!
//! In-memory data structure for recent writes.
//!
//! ## Responsibilities
//! - Multi-version storage keyed by (user key, sequence, type)
//! - Single-writer/multi-reader access pattern without read locks
//! - Snapshot point lookups that respect tombstones
//! - Track memory usage for flush triggers
//! - Ordered iteration for flushing and inspection
//!
//! ## Entry Layout
//! Every entry is one contiguous arena allocation:
//! ```text
//! ┌──────────────┬──────────┬─────────┬──────────────┬─────────┐
//! │ ikey len (4) │ user key │ tag (8) │ value len (4)│ value   │
//! └──────────────┴──────────┴─────────┴──────────────┴─────────┘
//! ```
//! and the skiplist key is just a pointer to its first byte.

mod key;
mod table;

pub use key::{
    check_entry_lengths, pack_sequence_and_type, InternalKey, InternalKeyComparator, LookupKey,
    ParsedInternalKey, SequenceNumber, ValueType, MAX_KEY_LEN, MAX_SEQUENCE_NUMBER,
    MAX_VALUE_LEN, TAG_SIZE,
};
pub use table::{MemTable, MemTableIterator};

/// Result of a memtable point lookup
#[derive(Debug, Clone, PartialEq)]
pub enum MemTableEntry {
    /// A live value
    Value(Vec<u8>),

    /// A tombstone (deleted key); older versions must not be consulted
    Tombstone,
}
