//! Skiplist node layout
//!
//! A node is laid out in arena memory as its fixed header followed by a
//! tower of `height` links:
//!
//! ```text
//! ┌──────────┬──────────┬─────────┬─────────┬─────┬──────────────┐
//! │ key (K)  │ height   │ next[0] │ next[1] │ ... │ next[h - 1]  │
//! └──────────┴──────────┴─────────┴─────────┴─────┴──────────────┘
//! ```
//!
//! Only the tower entries the node actually has are allocated, so every
//! access goes through raw node pointers rather than `&Node` references.

use std::mem::{self, MaybeUninit};
use std::ptr::{self, NonNull};
use std::sync::atomic::{AtomicPtr, Ordering};

use crate::arena::{Arena, ALIGN};

#[repr(C)]
pub(super) struct Node<K> {
    /// Uninitialized only for the head sentinel
    key: MaybeUninit<K>,
    height: usize,
    tower: [AtomicPtr<Node<K>>; 0],
}

impl<K> Node<K> {
    fn alloc_size(height: usize) -> usize {
        let size = mem::offset_of!(Node<K>, tower) + height * mem::size_of::<AtomicPtr<Node<K>>>();
        size.max(mem::size_of::<Node<K>>())
    }

    /// Allocate a node in `arena` with every link null
    ///
    /// The node is private to the caller until a predecessor link is
    /// published with [`Node::set_next`].
    pub(super) fn new_in(arena: &Arena, key: Option<K>, height: usize) -> NonNull<Node<K>> {
        assert!(
            mem::align_of::<Node<K>>() <= ALIGN,
            "skiplist keys may not need more than {} byte alignment",
            ALIGN
        );
        debug_assert!(height > 0);
        let mem = arena.allocate_aligned(Self::alloc_size(height));
        let node = mem.as_mut_ptr().cast::<Node<K>>();
        // SAFETY: `mem` is aligned and large enough for the header plus
        // `height` links, and nothing else references it yet.
        unsafe {
            let key = match key {
                Some(key) => MaybeUninit::new(key),
                None => MaybeUninit::uninit(),
            };
            ptr::addr_of_mut!((*node).key).write(key);
            ptr::addr_of_mut!((*node).height).write(height);
            let tower = ptr::addr_of_mut!((*node).tower).cast::<AtomicPtr<Node<K>>>();
            for level in 0..height {
                tower.add(level).write(AtomicPtr::new(ptr::null_mut()));
            }
            NonNull::new_unchecked(node)
        }
    }

    /// # Safety
    /// `node` must be a live, non-head node of this list.
    pub(super) unsafe fn key<'a>(node: *const Self) -> &'a K {
        (*ptr::addr_of!((*node).key)).assume_init_ref()
    }

    /// # Safety
    /// `node` must be live and `level` below its height.
    unsafe fn link<'a>(node: *const Self, level: usize) -> &'a AtomicPtr<Self> {
        debug_assert!(level < *ptr::addr_of!((*node).height));
        &*ptr::addr_of!((*node).tower)
            .cast::<AtomicPtr<Self>>()
            .add(level)
    }

    /// Acquire load: the returned node is fully initialized.
    ///
    /// # Safety
    /// See [`Node::link`].
    pub(super) unsafe fn next(node: *const Self, level: usize) -> *mut Self {
        Self::link(node, level).load(Ordering::Acquire)
    }

    /// Release store: publishes `next` and everything written before it.
    ///
    /// # Safety
    /// See [`Node::link`].
    pub(super) unsafe fn set_next(node: *const Self, level: usize, next: *mut Self) {
        Self::link(node, level).store(next, Ordering::Release)
    }

    /// # Safety
    /// See [`Node::link`]. Only for nodes not yet visible to readers, or
    /// from the writer reading its own earlier stores.
    pub(super) unsafe fn next_relaxed(node: *const Self, level: usize) -> *mut Self {
        Self::link(node, level).load(Ordering::Relaxed)
    }

    /// # Safety
    /// See [`Node::next_relaxed`].
    pub(super) unsafe fn set_next_relaxed(node: *const Self, level: usize, next: *mut Self) {
        Self::link(node, level).store(next, Ordering::Relaxed)
    }
}
