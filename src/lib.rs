//! # CinderKV
//!
//! The in-memory write path of an embedded key-value store:
//! - Bump arena for memtable entries and skiplist nodes
//! - Concurrent skiplist (one writer, lock-free readers)
//! - Multi-version memtable with snapshot reads and tombstones
//! - Block-framed write-ahead log with corruption-tolerant replay
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                          Engine                              │
//! │            (Single Writer / Multi Reader)                    │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//!          ┌────────────┴────────────┐
//!          │                         │
//!          ▼                         ▼
//!   ┌─────────────┐          ┌─────────────┐
//!   │     WAL     │          │  MemTable   │
//!   │  (Blocks)   │          │ (SkipList)  │
//!   └─────────────┘          └──────┬──────┘
//!                                   │
//!                                   ▼
//!                           ┌─────────────┐
//!                           │    Arena    │
//!                           └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod status;
pub mod config;

pub mod arena;
pub mod comparator;
pub mod skiplist;
pub mod memtable;
pub mod wal;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use config::Config;
pub use engine::Engine;
pub use error::{CinderError, ErrorKind, Result};
pub use status::Status;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of CinderKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
