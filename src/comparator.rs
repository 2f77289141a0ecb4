//! User key comparators

use std::cmp::Ordering;

/// Total order over user keys
///
/// Must be deterministic: the memtable relies on the same answer for the
/// same pair of keys for its whole lifetime.
pub trait Comparator: Send + Sync {
    /// Name persisted alongside data ordered by this comparator
    fn name(&self) -> &'static str;

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering;
}

/// Lexicographic byte order
#[derive(Debug, Clone, Copy, Default)]
pub struct BytewiseComparator;

impl Comparator for BytewiseComparator {
    fn name(&self) -> &'static str {
        "cinderkv.BytewiseComparator"
    }

    fn compare(&self, a: &[u8], b: &[u8]) -> Ordering {
        a.cmp(b)
    }
}
