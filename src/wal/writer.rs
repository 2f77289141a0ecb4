//! Log Writer
//!
//! Frames logical records into checksummed physical records inside
//! fixed-size blocks.

use std::io;

use crate::error::{CinderError, Result};

use super::file::WritableFile;
use super::format::{
    mask_crc, record_crc, type_crc, RecordType, BLOCK_SIZE, HEADER_SIZE, MAX_RECORD_TYPE,
};

/// Appends records to a block-framed log
pub struct LogWriter<W: WritableFile> {
    dest: W,

    /// Current offset in block
    block_offset: usize,

    /// crc32c of each record type byte, precomputed
    type_crc: [u32; MAX_RECORD_TYPE as usize + 1],

    /// First sink failure. The sink may hold part of a record, so the block
    /// position is unknown and every later call fails.
    failure: Option<String>,
}

impl<W: WritableFile> LogWriter<W> {
    /// Create a writer that appends to an empty `dest`
    pub fn new(dest: W) -> Self {
        Self::with_offset(dest, 0)
    }

    /// Create a writer that appends to `dest`, which already holds
    /// `dest_len` bytes of log
    pub fn with_offset(dest: W, dest_len: u64) -> Self {
        let mut crcs = [0u32; MAX_RECORD_TYPE as usize + 1];
        for (record_type, crc) in crcs.iter_mut().enumerate() {
            *crc = type_crc(record_type as u8);
        }
        Self {
            dest,
            block_offset: (dest_len % BLOCK_SIZE as u64) as usize,
            type_crc: crcs,
            failure: None,
        }
    }

    /// Append one logical record
    ///
    /// Sink failures are returned as-is; a partially written record is left
    /// for the reader to discard. After a failure the writer is unusable.
    pub fn append(&mut self, payload: &[u8]) -> Result<()> {
        self.check_usable()?;
        let result = self.append_fragments(payload);
        self.track(result)
    }

    /// Flush buffered records to the OS
    pub fn flush(&mut self) -> Result<()> {
        self.check_usable()?;
        let result = self.dest.flush();
        self.track(result)
    }

    /// Flush buffered records to stable storage
    pub fn sync(&mut self) -> Result<()> {
        self.check_usable()?;
        let result = self.dest.sync();
        self.track(result)
    }

    /// True once a sink call has failed
    pub fn has_failed(&self) -> bool {
        self.failure.is_some()
    }

    /// Offset inside the current block
    pub fn block_offset(&self) -> usize {
        self.block_offset
    }

    pub fn get_ref(&self) -> &W {
        &self.dest
    }

    pub fn into_inner(self) -> W {
        self.dest
    }

    fn check_usable(&self) -> Result<()> {
        match &self.failure {
            Some(reason) => Err(CinderError::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("log writer failed earlier: {}", reason),
            ))),
            None => Ok(()),
        }
    }

    fn track(&mut self, result: Result<()>) -> Result<()> {
        if let Err(e) = &result {
            tracing::error!(error = %e, "log sink failed, writer disabled");
            self.failure = Some(e.to_string());
        }
        result
    }

    fn append_fragments(&mut self, payload: &[u8]) -> Result<()> {
        let mut left = payload;
        let mut begin = true;

        // An empty payload still emits a single zero-length FULL record
        loop {
            let leftover = BLOCK_SIZE - self.block_offset;
            if leftover < HEADER_SIZE {
                // Switch to a new block, zero-filling the trailer
                if leftover > 0 {
                    const TRAILER: [u8; HEADER_SIZE] = [0; HEADER_SIZE];
                    self.dest.append(&TRAILER[..leftover])?;
                }
                tracing::trace!(padding = leftover, "log block switch");
                self.block_offset = 0;
            }

            let avail = BLOCK_SIZE - self.block_offset - HEADER_SIZE;
            let fragment_length = left.len().min(avail);
            let end = fragment_length == left.len();

            let record_type = match (begin, end) {
                (true, true) => RecordType::Full,
                (true, false) => RecordType::First,
                (false, true) => RecordType::Last,
                (false, false) => RecordType::Middle,
            };

            let (fragment, rest) = left.split_at(fragment_length);
            self.emit_physical_record(record_type, fragment)?;
            left = rest;
            begin = false;

            if left.is_empty() {
                return Ok(());
            }
        }
    }

    fn emit_physical_record(&mut self, record_type: RecordType, payload: &[u8]) -> Result<()> {
        debug_assert!(payload.len() <= 0xffff);
        debug_assert!(self.block_offset + HEADER_SIZE + payload.len() <= BLOCK_SIZE);

        let crc = mask_crc(record_crc(self.type_crc[record_type as usize], payload));
        let mut header = [0u8; HEADER_SIZE];
        header[..4].copy_from_slice(&crc.to_le_bytes());
        header[4..6].copy_from_slice(&(payload.len() as u16).to_le_bytes());
        header[6] = record_type as u8;

        self.dest.append(&header)?;
        self.dest.append(payload)?;
        self.dest.flush()?;
        self.block_offset += HEADER_SIZE + payload.len();
        Ok(())
    }
}
