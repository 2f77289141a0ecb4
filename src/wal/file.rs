//! File capabilities used by the log
//!
//! The writer needs an append-only sink and the reader a sequential
//! source. Both are small traits so tests can inject in-memory or failing
//! implementations.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Cursor, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Append-only sink
pub trait WritableFile {
    fn append(&mut self, data: &[u8]) -> Result<()>;

    /// Push buffered bytes to the OS
    fn flush(&mut self) -> Result<()>;

    /// Push buffered bytes to stable storage
    fn sync(&mut self) -> Result<()>;
}

/// Sequential source
pub trait SequentialFile {
    /// Read into `buf`, filling it completely unless end of file is hit.
    /// Returns the number of bytes read; 0 means end of file.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Skip `n` bytes, stopping quietly at end of file
    ///
    /// Never slower than reading the bytes; implementations backed by a
    /// seekable handle override this with a seek.
    fn skip(&mut self, n: u64) -> Result<()> {
        let mut scratch = [0u8; 4096];
        let mut left = n;
        while left > 0 {
            let chunk = left.min(scratch.len() as u64) as usize;
            let read = self.read(&mut scratch[..chunk])?;
            if read == 0 {
                break;
            }
            left -= read as u64;
        }
        Ok(())
    }
}

/// Loop `Read::read` until `buf` is full or the reader is exhausted
fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

impl SequentialFile for File {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(read_full(self, buf)?)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let offset = i64::try_from(n).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, "skip distance overflows i64")
        })?;
        self.seek(SeekFrom::Current(offset))?;
        Ok(())
    }
}

impl<T: AsRef<[u8]>> SequentialFile for Cursor<T> {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Ok(read_full(self, buf)?)
    }

    fn skip(&mut self, n: u64) -> Result<()> {
        let len = self.get_ref().as_ref().len() as u64;
        let target = self.position().saturating_add(n).min(len);
        self.set_position(target);
        Ok(())
    }
}

impl WritableFile for Vec<u8> {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.extend_from_slice(data);
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<W: WritableFile + ?Sized> WritableFile for Box<W> {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        (**self).append(data)
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }

    fn sync(&mut self) -> Result<()> {
        (**self).sync()
    }
}

/// Buffered log file opened for appending
pub struct LogFile {
    path: PathBuf,
    writer: BufWriter<File>,
}

impl LogFile {
    /// Open `path` for appending, creating it if needed
    ///
    /// Returns the file and its current length, which the log writer needs
    /// to resume mid-block.
    pub fn open_append(path: &Path) -> Result<(Self, u64)> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let len = file.metadata()?.len();
        Ok((
            Self {
                path: path.to_path_buf(),
                writer: BufWriter::new(file),
            },
            len,
        ))
    }

    /// Create `path`, truncating any existing contents
    pub fn create(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        Ok(Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
        })
    }

    /// Cut the file at `path` down to `len` bytes and sync it
    pub fn truncate(path: &Path, len: u64) -> Result<()> {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(len)?;
        file.sync_all()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl WritableFile for LogFile {
    fn append(&mut self, data: &[u8]) -> Result<()> {
        self.writer.write_all(data)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_data()?;
        Ok(())
    }
}
