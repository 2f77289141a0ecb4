//! Write-Ahead Log (WAL) Module
//!
//! Provides durability guarantees through append-only logging.
//!
//! ## Responsibilities
//! - Frame logical records into checksummed, block-aligned physical records
//! - Reassemble records on read, skipping and reporting corruption
//! - Tolerate a torn tail left by a crash mid-write
//! - Replay logged write batches into a memtable
//!
//! ## File Format
//! The file is a sequence of 32 KiB blocks. Records never straddle a
//! block boundary; a record too large for the space left is split into
//! FIRST, MIDDLE.., LAST fragments.
//! ```text
//! ┌──────────────────────── block (32768) ────────────────────────┐
//! │ ┌─────────┬─────────┬──────────┬─────────┐                    │
//! │ │ CRC (4) │ Len (2) │ Type (1) │ Payload │ ...  trailer (<7)  │
//! │ └─────────┴─────────┴──────────┴─────────┘                    │
//! └───────────────────────────────────────────────────────────────┘
//! ```

mod entry;
mod file;
mod format;
mod reader;
mod recovery;
mod writer;

pub use entry::{Operation, WalEntry, WriteBatch};
pub use file::{LogFile, SequentialFile, WritableFile};
pub use format::{mask_crc, unmask_crc, RecordType, BLOCK_SIZE, HEADER_SIZE, MAX_RECORD_TYPE};
pub use reader::{LogReader, Reporter, WalIterator};
pub use recovery::{RecoveryResult, WalRecovery};
pub use writer::LogWriter;
