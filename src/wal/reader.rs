//! Log Reader
//!
//! Reassembles logical records from the block stream produced by
//! [`LogWriter`](super::LogWriter).
//!
//! Corruption (checksum mismatch, impossible length, broken fragment
//! sequence) is reported through a [`Reporter`] and skipped: the reader
//! drops the rest of the damaged block and continues with the next one.
//! Only failures of the underlying file are returned as errors.

use std::fs::File;
use std::ops::Range;
use std::path::Path;

use crate::error::{CinderError, Result};

use super::file::SequentialFile;
use super::format::{unmask_crc, RecordType, BLOCK_SIZE, HEADER_SIZE};

/// Receives notice of dropped log bytes
pub trait Reporter {
    /// `bytes` is the approximate number of bytes dropped
    fn corruption(&mut self, bytes: usize, reason: &CinderError);
}

impl<F> Reporter for F
where
    F: FnMut(usize, &CinderError),
{
    fn corruption(&mut self, bytes: usize, reason: &CinderError) {
        self(bytes, reason)
    }
}

/// Outcome of reading one physical record; ranges index the block buffer
enum Physical {
    Full(Range<usize>),
    First(Range<usize>),
    Middle(Range<usize>),
    Last(Range<usize>),
    Unknown { type_byte: u8, len: usize },
    /// End of input, including a record truncated by a crash
    Eof,
    /// Damaged or skipped record, already reported if needed
    Bad,
}

/// Reads logical records from a block-framed log
pub struct LogReader<'r, R: SequentialFile> {
    file: R,
    reporter: Option<Box<dyn Reporter + 'r>>,
    verify_checksums: bool,

    /// One block of input; `backing[buf_start..buf_end]` is unconsumed
    backing: Box<[u8]>,
    buf_start: usize,
    buf_end: usize,

    /// Last read returned less than a full block
    eof: bool,

    /// Offset of the last record returned by `read_record`
    last_record_offset: u64,

    /// Offset just past the last record returned by `read_record`
    last_record_end: u64,

    /// Offset of the first byte past the buffered block
    end_of_buffer_offset: u64,

    /// Records starting before this offset are skipped
    initial_offset: u64,
    skipped_to_initial_block: bool,

    /// Dropping MIDDLE/LAST fragments of a record that began before
    /// `initial_offset`
    resyncing: bool,
}

impl LogReader<'static, File> {
    /// Open the log at `path`, verifying checksums
    pub fn open(path: &Path) -> Result<Self> {
        Ok(LogReader::new(File::open(path)?, true, 0))
    }
}

impl<'r, R: SequentialFile> LogReader<'r, R> {
    /// Create a reader over `file`
    ///
    /// With `verify_checksums` false, damaged payloads are returned as-is.
    /// Reading starts with the first record at or after `initial_offset`.
    pub fn new(file: R, verify_checksums: bool, initial_offset: u64) -> Self {
        Self {
            file,
            reporter: None,
            verify_checksums,
            backing: vec![0u8; BLOCK_SIZE].into_boxed_slice(),
            buf_start: 0,
            buf_end: 0,
            eof: false,
            last_record_offset: 0,
            last_record_end: 0,
            end_of_buffer_offset: 0,
            initial_offset,
            skipped_to_initial_block: initial_offset == 0,
            resyncing: initial_offset > 0,
        }
    }

    /// Route corruption notices to `reporter` instead of the log
    pub fn with_reporter(mut self, reporter: impl Reporter + 'r) -> Self {
        self.reporter = Some(Box::new(reporter));
        self
    }

    /// Read the next logical record into `record`
    ///
    /// Returns `Ok(false)` at end of input. `record` doubles as the scratch
    /// buffer for fragment reassembly and is left empty on `Ok(false)`.
    pub fn read_record(&mut self, record: &mut Vec<u8>) -> Result<bool> {
        if !self.skipped_to_initial_block {
            self.skip_to_initial_block()?;
            self.skipped_to_initial_block = true;
        }

        record.clear();
        let mut in_fragmented_record = false;
        // Offset of the first fragment of the record being assembled
        let mut prospective_record_offset = 0;

        loop {
            let physical = self.read_physical_record()?;

            if self.resyncing {
                match physical {
                    Physical::Middle(_) => continue,
                    Physical::Last(_) => {
                        self.resyncing = false;
                        continue;
                    }
                    _ => self.resyncing = false,
                }
            }

            match physical {
                Physical::Full(fragment) => {
                    if in_fragmented_record && !record.is_empty() {
                        self.report_corruption(record.len(), "partial record without end(1)");
                    }
                    prospective_record_offset = self.physical_record_offset(fragment.len());
                    record.clear();
                    record.extend_from_slice(&self.backing[fragment]);
                    self.last_record_offset = prospective_record_offset;
                    self.last_record_end = self.consumed_offset();
                    return Ok(true);
                }

                Physical::First(fragment) => {
                    if in_fragmented_record && !record.is_empty() {
                        self.report_corruption(record.len(), "partial record without end(2)");
                    }
                    prospective_record_offset = self.physical_record_offset(fragment.len());
                    record.clear();
                    record.extend_from_slice(&self.backing[fragment]);
                    in_fragmented_record = true;
                }

                Physical::Middle(fragment) => {
                    if in_fragmented_record {
                        record.extend_from_slice(&self.backing[fragment]);
                    } else {
                        self.report_corruption(
                            fragment.len(),
                            "missing start of fragmented record(1)",
                        );
                    }
                }

                Physical::Last(fragment) => {
                    if in_fragmented_record {
                        record.extend_from_slice(&self.backing[fragment]);
                        self.last_record_offset = prospective_record_offset;
                        self.last_record_end = self.consumed_offset();
                        return Ok(true);
                    }
                    self.report_corruption(fragment.len(), "missing start of fragmented record(2)");
                }

                Physical::Eof => {
                    // A partial record at the tail means the writer died
                    // mid-record; that is not corruption.
                    record.clear();
                    return Ok(false);
                }

                Physical::Bad => {
                    if in_fragmented_record {
                        self.report_corruption(record.len(), "error in middle of record");
                        in_fragmented_record = false;
                        record.clear();
                    }
                }

                Physical::Unknown { type_byte, len } => {
                    let dropped = len + if in_fragmented_record { record.len() } else { 0 };
                    self.report_corruption(dropped, &format!("unknown record type {}", type_byte));
                    in_fragmented_record = false;
                    record.clear();
                }
            }
        }
    }

    /// Physical offset of the last record returned by `read_record`
    pub fn last_record_offset(&self) -> u64 {
        self.last_record_offset
    }

    /// Offset just past the last record returned by `read_record`, 0 if
    /// none was
    ///
    /// Everything after it in the file is padding, damage, or a record cut
    /// short by a crash.
    pub fn end_of_last_record(&self) -> u64 {
        self.last_record_end
    }

    /// Iterate over the remaining logical records
    pub fn records(self) -> WalIterator<'r, R> {
        WalIterator {
            reader: self,
            done: false,
        }
    }

    pub fn into_inner(self) -> R {
        self.file
    }

    fn buffered(&self) -> usize {
        self.buf_end - self.buf_start
    }

    fn clear_buffer(&mut self) {
        self.buf_start = 0;
        self.buf_end = 0;
    }

    /// File offset of the first unconsumed byte
    fn consumed_offset(&self) -> u64 {
        self.end_of_buffer_offset - self.buffered() as u64
    }

    /// Offset of the physical record whose payload was just consumed
    fn physical_record_offset(&self, payload_len: usize) -> u64 {
        self.end_of_buffer_offset - (self.buffered() + HEADER_SIZE + payload_len) as u64
    }

    /// Position the file at the start of the block holding `initial_offset`
    fn skip_to_initial_block(&mut self) -> Result<()> {
        let block_size = BLOCK_SIZE as u64;
        let offset_in_block = self.initial_offset % block_size;
        let mut block_start = self.initial_offset - offset_in_block;

        // Offsets inside a block trailer belong to the next block
        if offset_in_block > block_size - 6 {
            block_start += block_size;
        }

        self.end_of_buffer_offset = block_start;
        if block_start > 0 {
            self.file.skip(block_start)?;
        }
        Ok(())
    }

    fn read_physical_record(&mut self) -> Result<Physical> {
        loop {
            if self.buffered() < HEADER_SIZE {
                if self.eof {
                    // Truncated header at the tail: the writer crashed
                    // while writing it.
                    self.clear_buffer();
                    return Ok(Physical::Eof);
                }

                // Whatever is left is a zero trailer; read the next block
                self.clear_buffer();
                let read = match self.file.read(&mut self.backing) {
                    Ok(read) => read,
                    Err(e) => {
                        self.eof = true;
                        return Err(e);
                    }
                };
                self.buf_end = read;
                self.end_of_buffer_offset += read as u64;
                if read < BLOCK_SIZE {
                    self.eof = true;
                }
                continue;
            }

            let header = &self.backing[self.buf_start..self.buf_start + HEADER_SIZE];
            let stored_crc = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
            let length = u16::from_le_bytes([header[4], header[5]]) as usize;
            let type_byte = header[6];

            if HEADER_SIZE + length > self.buffered() {
                let drop_size = self.buffered();
                self.clear_buffer();
                if !self.eof {
                    self.report_corruption(drop_size, "bad record length");
                    return Ok(Physical::Bad);
                }
                // Truncated payload at the tail: the writer crashed
                // mid-record.
                return Ok(Physical::Eof);
            }

            if type_byte == RecordType::Zero as u8 && length == 0 {
                // Preallocated, never-written region. Skip it silently.
                self.clear_buffer();
                return Ok(Physical::Bad);
            }

            if self.verify_checksums {
                // The crc covers the type byte and the payload
                let covered = self.buf_start + HEADER_SIZE - 1..self.buf_start + HEADER_SIZE + length;
                let actual = crc32c::crc32c(&self.backing[covered]);
                if actual != unmask_crc(stored_crc) {
                    // The length itself may be corrupt, so drop the whole
                    // rest of the block rather than trusting it.
                    let drop_size = self.buffered();
                    self.clear_buffer();
                    self.report_corruption(drop_size, "checksum mismatch");
                    return Ok(Physical::Bad);
                }
            }

            let payload = self.buf_start + HEADER_SIZE..self.buf_start + HEADER_SIZE + length;
            self.buf_start += HEADER_SIZE + length;

            // Skip physical records that started before initial_offset
            if self.physical_record_offset(length) < self.initial_offset {
                return Ok(Physical::Bad);
            }

            return Ok(match RecordType::from_u8(type_byte) {
                Some(RecordType::Full) => Physical::Full(payload),
                Some(RecordType::First) => Physical::First(payload),
                Some(RecordType::Middle) => Physical::Middle(payload),
                Some(RecordType::Last) => Physical::Last(payload),
                Some(RecordType::Zero) | None => Physical::Unknown {
                    type_byte,
                    len: length,
                },
            });
        }
    }

    fn report_corruption(&mut self, bytes: usize, reason: &str) {
        self.report_drop(bytes, CinderError::corruption(reason));
    }

    fn report_drop(&mut self, bytes: usize, reason: CinderError) {
        // Bytes before initial_offset were never meant to be read
        let drop_start = self
            .end_of_buffer_offset
            .checked_sub((self.buffered() + bytes) as u64);
        if drop_start.is_some_and(|start| start < self.initial_offset) {
            return;
        }
        match self.reporter.as_mut() {
            Some(reporter) => reporter.corruption(bytes, &reason),
            None => tracing::warn!(bytes, %reason, "dropping log bytes"),
        }
    }
}

/// Iterator over the logical records of a log
pub struct WalIterator<'r, R: SequentialFile> {
    reader: LogReader<'r, R>,
    done: bool,
}

impl<'r, R: SequentialFile> WalIterator<'r, R> {
    pub fn into_reader(self) -> LogReader<'r, R> {
        self.reader
    }
}

impl<R: SequentialFile> Iterator for WalIterator<'_, R> {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut record = Vec::new();
        match self.reader.read_record(&mut record) {
            Ok(true) => Some(Ok(record)),
            Ok(false) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}
