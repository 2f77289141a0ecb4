//! MemTable implementation
//!
//! Skiplist-based memtable whose entries live in the skiplist's arena.

use std::cmp::Ordering;
use std::ptr::NonNull;
use std::slice;

use bytes::{Buf, BufMut};

use super::key::{
    extract_tag, extract_user_key, length_prefix, pack_sequence_and_type, unpack_tag,
    InternalKeyComparator, LookupKey, ParsedInternalKey, SequenceNumber, ValueType,
    LENGTH_PREFIX_SIZE, TAG_SIZE,
};
use super::MemTableEntry;
use crate::arena::{Arena, DEFAULT_BLOCK_SIZE};
use crate::comparator::Comparator;
use crate::skiplist::{KeyComparator, SkipList, SkipListIterator};

/// Pointer to a length-prefixed entry
///
/// Points either into the arena (stored entries) or at a caller's buffer
/// for the duration of a seek (lookup keys share the key prefix layout).
#[derive(Clone, Copy)]
struct EntryPtr(NonNull<u8>);

// SAFETY: entries are immutable once written and outlive the skiplist that
// holds pointers to them.
unsafe impl Send for EntryPtr {}
unsafe impl Sync for EntryPtr {}

impl EntryPtr {
    fn from_slice(buf: &[u8]) -> Self {
        EntryPtr(NonNull::from(buf).cast())
    }

    /// # Safety
    /// `ptr` must point at a length field written by `MemTable::add` or
    /// `LookupKey::new`.
    unsafe fn read_u32(ptr: *const u8) -> u32 {
        let mut raw = slice::from_raw_parts(ptr, 4);
        raw.get_u32_le()
    }

    /// # Safety
    /// The pointee must be a well-formed entry or lookup key alive for `'a`.
    unsafe fn internal_key<'a>(self) -> &'a [u8] {
        let base = self.0.as_ptr();
        let len = Self::read_u32(base) as usize;
        slice::from_raw_parts(base.add(LENGTH_PREFIX_SIZE), len)
    }

    /// # Safety
    /// The pointee must be a full entry written by `MemTable::add`.
    unsafe fn value<'a>(self) -> &'a [u8] {
        let key_len = self.internal_key().len();
        let value_len_at = self.0.as_ptr().add(LENGTH_PREFIX_SIZE + key_len);
        let value_len = Self::read_u32(value_len_at) as usize;
        slice::from_raw_parts(value_len_at.add(4), value_len)
    }
}

/// Adapts the internal key order to entry pointers
struct EntryComparator {
    internal: InternalKeyComparator,
}

impl KeyComparator<EntryPtr> for EntryComparator {
    fn compare(&self, a: &EntryPtr, b: &EntryPtr) -> Ordering {
        // SAFETY: the skiplist only compares stored entries and the lookup
        // key of an in-flight seek.
        let (a, b) = unsafe { (a.internal_key(), b.internal_key()) };
        self.internal.compare(a, b)
    }
}

/// Tags in the table were all written from a `ValueType`
fn stored_value_type(type_byte: u8) -> ValueType {
    match ValueType::try_from(type_byte) {
        Ok(value_type) => value_type,
        Err(_) => unreachable!("memtable entry with type byte {}", type_byte),
    }
}

/// In-memory table for recent writes
///
/// Share it with `Arc<MemTable>`; the arena and every entry are freed when
/// the last handle drops.
pub struct MemTable {
    comparator: InternalKeyComparator,
    table: SkipList<EntryPtr, EntryComparator>,
}

impl MemTable {
    /// Create a new empty MemTable
    pub fn new(comparator: InternalKeyComparator) -> Self {
        Self::with_block_size(comparator, DEFAULT_BLOCK_SIZE)
    }

    /// Create a new empty MemTable with a custom arena block size
    pub fn with_block_size(comparator: InternalKeyComparator, block_size: usize) -> Self {
        let table = SkipList::with_arena(
            EntryComparator {
                internal: comparator.clone(),
            },
            Arena::with_block_size(block_size),
        );
        Self { comparator, table }
    }

    /// Add an entry for `user_key` at `sequence`
    ///
    /// Deletions are stored as tombstones with an empty value. Sequences
    /// must be unique within the table.
    ///
    /// # Panics
    ///
    /// If the key or value is longer than [`MAX_KEY_LEN`](super::MAX_KEY_LEN)
    /// or [`MAX_VALUE_LEN`](super::MAX_VALUE_LEN).
    pub fn add(
        &self,
        sequence: SequenceNumber,
        value_type: ValueType,
        user_key: &[u8],
        value: &[u8],
    ) {
        let internal_key_len = user_key.len() + TAG_SIZE;
        let encoded_len = LENGTH_PREFIX_SIZE + internal_key_len + 4 + value.len();
        let tag = pack_sequence_and_type(sequence, value_type);

        self.table.insert_with(|arena| {
            let buf = arena.allocate(encoded_len);
            {
                let mut dst: &mut [u8] = &mut *buf;
                dst.put_u32_le(length_prefix(internal_key_len));
                dst.put_slice(user_key);
                dst.put_u64_le(tag);
                dst.put_u32_le(length_prefix(value.len()));
                dst.put_slice(value);
                debug_assert!(dst.is_empty());
            }
            // Read-only from here on
            EntryPtr::from_slice(buf)
        });
    }

    /// Look up the newest version of `key.user_key()` visible at the
    /// lookup sequence
    ///
    /// Returns `None` if this table has no visible version, in which case
    /// older tables should be consulted. A `Tombstone` means the key is
    /// deleted and the search must stop.
    pub fn get(&self, key: &LookupKey) -> Option<MemTableEntry> {
        let mut iter = self.table.iter();
        iter.seek(&EntryPtr::from_slice(key.memtable_key()));
        if !iter.valid() {
            return None;
        }

        let entry = *iter.key();
        // SAFETY: `entry` is a stored entry owned by `self.table`.
        let internal_key = unsafe { entry.internal_key() };
        let user_comparator = self.comparator.user_comparator();
        if user_comparator.compare(extract_user_key(internal_key), key.user_key())
            != Ordering::Equal
        {
            return None;
        }

        let (_, type_byte) = unpack_tag(extract_tag(internal_key));
        match stored_value_type(type_byte) {
            // SAFETY: as above.
            ValueType::Value => Some(MemTableEntry::Value(unsafe { entry.value() }.to_vec())),
            ValueType::Deletion => Some(MemTableEntry::Tombstone),
        }
    }

    /// Cursor over every entry in internal key order
    pub fn iter(&self) -> MemTableIterator<'_> {
        MemTableIterator {
            iter: self.table.iter(),
            seek_buf: Vec::new(),
        }
    }

    /// Bytes held by the backing arena
    pub fn approximate_memory_usage(&self) -> usize {
        self.table.memory_usage()
    }

    /// Number of entries, tombstones and overwritten versions included
    pub fn entry_count(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Check if should flush (usage >= limit)
    pub fn should_flush(&self, size_limit: usize) -> bool {
        self.approximate_memory_usage() >= size_limit
    }

    pub fn comparator(&self) -> &InternalKeyComparator {
        &self.comparator
    }
}

/// Cursor over MemTable entries
///
/// Same positioning API and visibility guarantees as
/// [`SkipListIterator`]; keys are internal keys.
pub struct MemTableIterator<'a> {
    iter: SkipListIterator<'a, EntryPtr, EntryComparator>,
    seek_buf: Vec<u8>,
}

#[allow(clippy::should_implement_trait)]
impl<'a> MemTableIterator<'a> {
    pub fn valid(&self) -> bool {
        self.iter.valid()
    }

    /// Position at the first entry >= `internal_key`
    pub fn seek(&mut self, internal_key: &[u8]) {
        self.seek_buf.clear();
        self.seek_buf.put_u32_le(length_prefix(internal_key.len()));
        self.seek_buf.put_slice(internal_key);
        self.iter.seek(&EntryPtr::from_slice(&self.seek_buf));
    }

    pub fn seek_to_first(&mut self) {
        self.iter.seek_to_first();
    }

    pub fn seek_to_last(&mut self) {
        self.iter.seek_to_last();
    }

    pub fn next(&mut self) {
        self.iter.next();
    }

    pub fn prev(&mut self) {
        self.iter.prev();
    }

    /// Internal key at the current position
    pub fn key(&self) -> &'a [u8] {
        // SAFETY: the cursor rests on a stored entry, alive as long as the
        // table it borrows.
        unsafe { self.iter.key().internal_key() }
    }

    /// Value at the current position (empty for tombstones)
    pub fn value(&self) -> &'a [u8] {
        // SAFETY: as in `key`.
        unsafe { self.iter.key().value() }
    }

    /// Decoded internal key at the current position
    pub fn parsed_key(&self) -> ParsedInternalKey<'a> {
        let internal_key = self.key();
        let (sequence, type_byte) = unpack_tag(extract_tag(internal_key));
        ParsedInternalKey::new(
            extract_user_key(internal_key),
            sequence,
            stored_value_type(type_byte),
        )
    }
}
