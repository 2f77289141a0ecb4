//! Arena Allocator
//!
//! Bump-pointer allocator backing the skiplist and the memtable entries.
//!
//! ## Responsibilities
//! - Hand out byte ranges that stay valid until the arena is dropped
//! - Never free individual allocations
//! - Track an approximate usage figure readable from any thread
//!
//! ```text
//!  blocks: [ block 0 (full) ][ block 1 (dedicated, large) ][ block 2 .. ]
//!                                                            ^ptr  ^ptr+remaining
//! ```
//!
//! Requests larger than a quarter of the block size get a dedicated block so
//! a big allocation never wastes the tail of the shared block.

use std::alloc::{self, Layout};
use std::cell::{Cell, RefCell};
use std::mem;
use std::ptr::{self, NonNull};
use std::slice;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default size of a standard block
pub const DEFAULT_BLOCK_SIZE: usize = 4096;

/// Alignment guaranteed by `allocate_aligned` and by every block start
pub const ALIGN: usize = if mem::size_of::<*const ()>() > 8 {
    mem::size_of::<*const ()>()
} else {
    8
};

/// A single heap block owned by the arena
struct Block {
    ptr: NonNull<u8>,
    layout: Layout,
}

/// Bump allocator
///
/// Allocation goes through `&self` and hands back disjoint `&mut [u8]`
/// slices, so the arena is `!Sync`: only one thread may allocate. `usage()`
/// is a relaxed atomic load.
pub struct Arena {
    /// Allocation cursor in the current block
    alloc_ptr: Cell<*mut u8>,

    /// Bytes left after `alloc_ptr` in the current block
    alloc_bytes_remaining: Cell<usize>,

    /// Every block handed out so far
    blocks: RefCell<Vec<Block>>,

    /// Total bytes of blocks plus per-block bookkeeping
    memory_usage: AtomicUsize,

    block_size: usize,
}

// SAFETY: the arena exclusively owns its blocks; moving it to another thread
// moves that ownership along with it.
unsafe impl Send for Arena {}

impl Arena {
    /// Create an empty arena with the default block size
    pub fn new() -> Self {
        Self::with_block_size(DEFAULT_BLOCK_SIZE)
    }

    /// Create an empty arena with a custom standard block size
    pub fn with_block_size(block_size: usize) -> Self {
        assert!(block_size > 0, "arena block size must be > 0");
        Self {
            alloc_ptr: Cell::new(ptr::null_mut()),
            alloc_bytes_remaining: Cell::new(0),
            blocks: RefCell::new(Vec::new()),
            memory_usage: AtomicUsize::new(0),
            block_size,
        }
    }

    /// Allocate `bytes` bytes with no alignment guarantee
    ///
    /// # Panics
    /// Panics if `bytes == 0`.
    #[allow(clippy::mut_from_ref)]
    pub fn allocate(&self, bytes: usize) -> &mut [u8] {
        assert!(bytes > 0, "zero-byte arena allocations are not supported");
        let remaining = self.alloc_bytes_remaining.get();
        let ptr = if bytes <= remaining {
            let result = self.alloc_ptr.get();
            // SAFETY: `bytes <= remaining`, so the bumped cursor stays inside
            // the current block.
            self.alloc_ptr.set(unsafe { result.add(bytes) });
            self.alloc_bytes_remaining.set(remaining - bytes);
            result
        } else {
            self.allocate_fallback(bytes)
        };
        // SAFETY: `ptr` points at `bytes` zero-initialized bytes that no
        // other allocation overlaps, and the block lives as long as `self`.
        unsafe { slice::from_raw_parts_mut(ptr, bytes) }
    }

    /// Allocate `bytes` bytes aligned to [`ALIGN`]
    ///
    /// # Panics
    /// Panics if `bytes == 0`.
    #[allow(clippy::mut_from_ref)]
    pub fn allocate_aligned(&self, bytes: usize) -> &mut [u8] {
        assert!(bytes > 0, "zero-byte arena allocations are not supported");
        let current_mod = self.alloc_ptr.get() as usize & (ALIGN - 1);
        let slop = if current_mod == 0 { 0 } else { ALIGN - current_mod };
        let needed = bytes + slop;
        let remaining = self.alloc_bytes_remaining.get();
        let ptr = if needed <= remaining {
            // SAFETY: `needed <= remaining` keeps both pointers in the block.
            let result = unsafe { self.alloc_ptr.get().add(slop) };
            self.alloc_ptr.set(unsafe { self.alloc_ptr.get().add(needed) });
            self.alloc_bytes_remaining.set(remaining - needed);
            result
        } else {
            // Fresh blocks always start at ALIGN
            self.allocate_fallback(bytes)
        };
        debug_assert_eq!(ptr as usize & (ALIGN - 1), 0);
        // SAFETY: as in `allocate`.
        unsafe { slice::from_raw_parts_mut(ptr, bytes) }
    }

    /// Approximate memory held by the arena
    pub fn usage(&self) -> usize {
        self.memory_usage.load(Ordering::Relaxed)
    }

    /// Standard block size of this arena
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    fn allocate_fallback(&self, bytes: usize) -> *mut u8 {
        if bytes > self.block_size / 4 {
            // Dedicated block; the current block keeps serving small requests
            return self.allocate_new_block(bytes);
        }

        // The rest of the current block is wasted
        let block = self.allocate_new_block(self.block_size);
        // SAFETY: `bytes <= block_size / 4 < block_size`.
        self.alloc_ptr.set(unsafe { block.add(bytes) });
        self.alloc_bytes_remaining.set(self.block_size - bytes);
        block
    }

    fn allocate_new_block(&self, block_bytes: usize) -> *mut u8 {
        let layout = match Layout::from_size_align(block_bytes, ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("arena block of {} bytes exceeds the address space", block_bytes),
        };
        // SAFETY: `layout` has a non-zero size.
        let raw = unsafe { alloc::alloc_zeroed(layout) };
        let Some(ptr) = NonNull::new(raw) else {
            alloc::handle_alloc_error(layout);
        };
        self.blocks.borrow_mut().push(Block { ptr, layout });
        self.memory_usage
            .fetch_add(block_bytes + mem::size_of::<*mut u8>(), Ordering::Relaxed);
        tracing::trace!(block_bytes, usage = self.usage(), "arena block allocated");
        raw
    }
}

impl Default for Arena {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        for block in self.blocks.get_mut().drain(..) {
            // SAFETY: every block was allocated with exactly this layout.
            unsafe { alloc::dealloc(block.ptr.as_ptr(), block.layout) };
        }
    }
}
