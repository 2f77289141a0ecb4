//! SkipList cursor

use std::ptr;

use super::node::Node;
use super::{KeyComparator, SkipList};

/// Positioned cursor over a [`SkipList`]
///
/// Sees every key linked before it was positioned and possibly some keys
/// inserted afterwards. There are no back links: `prev` searches again from
/// the head for the last key below the current one.
pub struct SkipListIterator<'a, K, C> {
    list: &'a SkipList<K, C>,
    node: *const Node<K>,
}

#[allow(clippy::should_implement_trait)]
impl<'a, K: Copy, C: KeyComparator<K>> SkipListIterator<'a, K, C> {
    pub(super) fn new(list: &'a SkipList<K, C>) -> Self {
        Self {
            list,
            node: ptr::null(),
        }
    }

    /// True if positioned at a key
    pub fn valid(&self) -> bool {
        !self.node.is_null()
    }

    /// Key at the current position
    ///
    /// # Panics
    /// Panics if the iterator is not valid.
    pub fn key(&self) -> &'a K {
        assert!(self.valid(), "key() on an invalid skiplist iterator");
        // SAFETY: a valid cursor always rests on a published non-head node,
        // and nodes live as long as the list.
        unsafe { Node::key(self.node) }
    }

    /// Advance to the next key
    pub fn next(&mut self) {
        assert!(self.valid(), "next() on an invalid skiplist iterator");
        // SAFETY: see `key`.
        self.node = unsafe { Node::next(self.node, 0) };
    }

    /// Step back to the previous key
    pub fn prev(&mut self) {
        let key = *self.key();
        let node = self.list.find_less_than(&key);
        self.node = if self.list.is_head(node) {
            ptr::null()
        } else {
            node
        };
    }

    /// Position at the first key >= `target`
    pub fn seek(&mut self, target: &K) {
        self.node = self.list.find_greater_or_equal(target, None);
    }

    pub fn seek_to_first(&mut self) {
        // SAFETY: head is always live.
        self.node = unsafe { Node::next(self.list.head(), 0) };
    }

    pub fn seek_to_last(&mut self) {
        let node = self.list.find_last();
        self.node = if self.list.is_head(node) {
            ptr::null()
        } else {
            node
        };
    }
}
