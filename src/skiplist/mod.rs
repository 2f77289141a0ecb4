//! SkipList Module
//!
//! Arena-backed ordered index with one writer and any number of lock-free
//! readers.
//!
//! ## Responsibilities
//! - Keep keys ordered by a caller-supplied comparator
//! - Insert with a randomized, geometrically distributed node height
//! - Lookups and bidirectional iteration concurrent with the writer
//!
//! ## Publish Protocol
//! ```text
//!   writer                              reader
//!   ------                              ------
//!   allocate node, write key/height
//!   node.next[i] = prev[i].next[i]      (relaxed, node still private)
//!   prev[i].next[i] = node ──release──▶ load prev[i].next[i] ──acquire
//!                                       sees a fully initialized node
//! ```
//! Levels are linked bottom-up, so a node reachable at level `i` is
//! already reachable at every level below `i`.
//!
//! Writers are serialized by an internal mutex that also owns the height
//! RNG and guards the arena. Readers never take it.

mod iterator;
mod node;

use std::cmp::Ordering as CmpOrdering;
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::arena::Arena;
use node::Node;

pub use iterator::SkipListIterator;

/// Highest tower a node can have
pub const MAX_HEIGHT: usize = 12;

/// Each extra level is kept with probability 1/BRANCHING
const BRANCHING: u32 = 4;

const HEIGHT_SEED: u64 = 0xdead_beef;

/// Total order over skiplist keys
pub trait KeyComparator<K> {
    fn compare(&self, a: &K, b: &K) -> CmpOrdering;
}

impl<K, F> KeyComparator<K> for F
where
    F: Fn(&K, &K) -> CmpOrdering,
{
    fn compare(&self, a: &K, b: &K) -> CmpOrdering {
        self(a, b)
    }
}

/// Comparator for keys with a natural order
#[derive(Debug, Clone, Copy, Default)]
pub struct OrdComparator;

impl<K: Ord> KeyComparator<K> for OrdComparator {
    fn compare(&self, a: &K, b: &K) -> CmpOrdering {
        a.cmp(b)
    }
}

/// Concurrent skiplist over `Copy` keys
///
/// Keys are never dropped; anything they point at must outlive the list
/// (the memtable stores its entries in the list's own arena).
pub struct SkipList<K, C> {
    cmp: C,

    /// Owns every node; only touched by the writer, except `usage()`
    arena: Arena,

    /// Sentinel with a full-height tower and no key
    head: NonNull<Node<K>>,

    /// Height of the tallest node; a stale read only costs a few steps
    max_height: CachePadded<AtomicUsize>,

    len: AtomicUsize,

    /// Single-writer section
    writer: Mutex<StdRng>,
}

// SAFETY: nodes are immutable after publication apart from their atomic
// links, the arena is only allocated from while holding `writer`, and the
// only arena state readers touch is its atomic usage counter.
unsafe impl<K: Send + Sync, C: Send + Sync> Send for SkipList<K, C> {}
unsafe impl<K: Send + Sync, C: Send + Sync> Sync for SkipList<K, C> {}

impl<K: Copy, C: KeyComparator<K>> SkipList<K, C> {
    /// Create an empty list backed by a default arena
    pub fn new(cmp: C) -> Self {
        Self::with_arena(cmp, Arena::new())
    }

    /// Create an empty list that allocates from `arena`
    pub fn with_arena(cmp: C, arena: Arena) -> Self {
        let head = Node::new_in(&arena, None, MAX_HEIGHT);
        Self {
            cmp,
            arena,
            head,
            max_height: CachePadded::new(AtomicUsize::new(1)),
            len: AtomicUsize::new(0),
            writer: Mutex::new(StdRng::seed_from_u64(HEIGHT_SEED)),
        }
    }

    /// Insert `key`
    ///
    /// Duplicates are not rejected; callers needing set semantics check
    /// [`SkipList::contains`] first from the writing thread.
    pub fn insert(&self, key: K) {
        self.insert_with(|_| key)
    }

    /// Insert the key built by `make_key`
    ///
    /// `make_key` runs inside the writer section, so it may allocate the
    /// key's backing storage from the list's arena.
    pub fn insert_with<F>(&self, make_key: F)
    where
        F: FnOnce(&Arena) -> K,
    {
        let mut rng = self.writer.lock();
        let key = make_key(&self.arena);

        let mut prev = [self.head.as_ptr(); MAX_HEIGHT];
        self.find_greater_or_equal(&key, Some(&mut prev));

        let height = random_height(&mut rng);
        if height > self.max_height() {
            // prev[max_height..height] already point at head. Readers that
            // see the new height before the node simply drop down a level
            // from head's null links.
            self.max_height.store(height, Ordering::Relaxed);
        }

        let node = Node::new_in(&self.arena, Some(key), height).as_ptr();
        for (level, &pred) in prev.iter().enumerate().take(height) {
            // SAFETY: `pred` is head or a published node whose tower
            // reaches `level`; `node` was allocated with `height` links.
            unsafe {
                Node::set_next_relaxed(node, level, Node::next_relaxed(pred, level));
                Node::set_next(pred, level, node);
            }
        }
        self.len.fetch_add(1, Ordering::Relaxed);
    }

    /// True if a key equal to `key` is in the list
    pub fn contains(&self, key: &K) -> bool {
        let x = self.find_greater_or_equal(key, None);
        // SAFETY: non-null results are published nodes.
        !x.is_null() && self.cmp.compare(key, unsafe { Node::key(x) }) == CmpOrdering::Equal
    }

    /// Cursor over the list, initially not positioned
    pub fn iter(&self) -> SkipListIterator<'_, K, C> {
        SkipListIterator::new(self)
    }

    /// Number of inserted keys
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes held by the backing arena
    pub fn memory_usage(&self) -> usize {
        self.arena.usage()
    }

    fn max_height(&self) -> usize {
        self.max_height.load(Ordering::Relaxed)
    }

    fn head(&self) -> *mut Node<K> {
        self.head.as_ptr()
    }

    fn key_is_after_node(&self, key: &K, node: *mut Node<K>) -> bool {
        // SAFETY: non-null links always lead to published nodes.
        !node.is_null() && self.cmp.compare(unsafe { Node::key(node) }, key) == CmpOrdering::Less
    }

    /// First node >= `key`, or null
    ///
    /// Fills `prev[level]` with the last node < `key` at every level below
    /// the current max height.
    fn find_greater_or_equal(
        &self,
        key: &K,
        mut prev: Option<&mut [*mut Node<K>; MAX_HEIGHT]>,
    ) -> *mut Node<K> {
        let mut x = self.head();
        let mut level = self.max_height() - 1;
        loop {
            // SAFETY: `x` is head or a node reached through a link at a
            // level it participates in.
            let next = unsafe { Node::next(x, level) };
            if self.key_is_after_node(key, next) {
                x = next;
            } else {
                if let Some(prev) = prev.as_mut() {
                    prev[level] = x;
                }
                if level == 0 {
                    return next;
                }
                level -= 1;
            }
        }
    }

    /// Last node < `key`, or head
    fn find_less_than(&self, key: &K) -> *mut Node<K> {
        let mut x = self.head();
        let mut level = self.max_height() - 1;
        loop {
            // SAFETY: as in `find_greater_or_equal`.
            let next = unsafe { Node::next(x, level) };
            if next.is_null()
                || self.cmp.compare(unsafe { Node::key(next) }, key) != CmpOrdering::Less
            {
                if level == 0 {
                    return x;
                }
                level -= 1;
            } else {
                x = next;
            }
        }
    }

    /// Last node in the list, or head if empty
    fn find_last(&self) -> *mut Node<K> {
        let mut x = self.head();
        let mut level = self.max_height() - 1;
        loop {
            // SAFETY: as in `find_greater_or_equal`.
            let next = unsafe { Node::next(x, level) };
            if next.is_null() {
                if level == 0 {
                    return x;
                }
                level -= 1;
            } else {
                x = next;
            }
        }
    }

    fn is_head(&self, node: *const Node<K>) -> bool {
        ptr::eq(node, self.head())
    }
}

/// Geometric height in `1..=MAX_HEIGHT`
fn random_height(rng: &mut StdRng) -> usize {
    let mut height = 1;
    while height < MAX_HEIGHT && rng.gen_ratio(1, BRANCHING) {
        height += 1;
    }
    height
}
