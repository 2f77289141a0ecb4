//! Arena allocation tests
//!
//! These tests verify:
//! - Usage never undercounts and stays close to the bytes requested
//! - Allocations never alias one another
//! - Alignment of aligned allocations

use cinderkv::arena::{Arena, ALIGN, DEFAULT_BLOCK_SIZE};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[test]
fn test_empty() {
    let arena = Arena::new();
    assert_eq!(arena.usage(), 0);
    assert_eq!(arena.block_size(), DEFAULT_BLOCK_SIZE);
}

#[test]
fn test_simple() {
    const N: usize = 100_000;

    let arena = Arena::new();
    let mut rng = StdRng::seed_from_u64(301);
    let mut allocated: Vec<(usize, &mut [u8])> = Vec::new();
    let mut bytes = 0;

    for i in 0..N {
        let mut size = if i % (N / 10) == 0 {
            i
        } else if rng.gen_ratio(1, 4000) {
            rng.gen_range(0..6000)
        } else if rng.gen_ratio(1, 10) {
            rng.gen_range(0..100)
        } else {
            rng.gen_range(0..20)
        };
        if size == 0 {
            // Our arena disallows size 0 allocations
            size = 1;
        }

        let block = if rng.gen_ratio(1, 10) {
            arena.allocate_aligned(size)
        } else {
            arena.allocate(size)
        };

        // Fill the "i"th allocation with a known bit pattern
        block.fill((i % 256) as u8);
        bytes += size;
        allocated.push((size, block));

        assert!(arena.usage() >= bytes);
        if i > N / 10 {
            assert!(
                arena.usage() as f64 <= bytes as f64 * 1.10,
                "usage {} for {} bytes",
                arena.usage(),
                bytes
            );
        }
    }

    for (i, (size, block)) in allocated.iter().enumerate() {
        assert_eq!(block.len(), *size);
        for &byte in block.iter() {
            // Check the "i"th allocation for the known bit pattern
            assert_eq!(byte, (i % 256) as u8);
        }
    }
}

#[test]
fn test_allocations_are_disjoint() {
    let arena = Arena::with_block_size(256);
    let mut ranges = Vec::new();
    for size in [1usize, 7, 64, 65, 200, 3, 1000, 8, 8, 63] {
        let block = arena.allocate(size);
        let start = block.as_ptr() as usize;
        ranges.push((start, start + size));
    }
    ranges.sort_unstable();
    for pair in ranges.windows(2) {
        assert!(pair[0].1 <= pair[1].0, "{:?} overlaps {:?}", pair[0], pair[1]);
    }
}

#[test]
fn test_aligned_allocations() {
    let arena = Arena::new();
    for size in [1usize, 3, 8, 13, 100, 2000] {
        // Knock the cursor off alignment first
        arena.allocate(1);
        let block = arena.allocate_aligned(size);
        assert_eq!(block.as_ptr() as usize % ALIGN, 0);
        assert_eq!(block.len(), size);
    }
}

#[test]
fn test_usage_counts_block_overhead() {
    let arena = Arena::with_block_size(1024);
    arena.allocate(10);
    let one_block = arena.usage();
    assert!(one_block >= 1024);

    // Fits in the current block
    arena.allocate(10);
    assert_eq!(arena.usage(), one_block);

    // Larger than a quarter block: dedicated block of exactly that size
    arena.allocate(600);
    assert_eq!(arena.usage(), 2 * one_block - 1024 + 600);
}

#[test]
#[should_panic]
fn test_zero_size_allocation_panics() {
    Arena::new().allocate(0);
}
