//! Block Store
//!
//! Seek-and-transfer access to whole blocks inside the container file.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{PackError, Result};

use super::Block;

/// Disk-backed block storage for one container file
///
/// Tracks the file length itself so `grow()` can hand out the previous
/// end-of-file without a metadata round-trip per block.
pub struct BlockStore {
    /// Open container file
    file: File,
    /// Path, kept for diagnostics
    path: PathBuf,
    /// Size of every data block
    block_size: u64,
    /// Current file length in bytes
    len: u64,
}

impl BlockStore {
    /// Create (or truncate) a container file and reserve `header_size` bytes
    pub fn create(path: &Path, block_size: u32, header_size: u64) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;

        file.set_len(header_size)?;

        Ok(Self {
            file,
            path: path.to_path_buf(),
            block_size: block_size as u64,
            len: header_size,
        })
    }

    /// Wrap an already-open container file
    ///
    /// Used after the header has been read, since the block size is only
    /// known from the header preamble.
    pub fn from_file(file: File, path: &Path, block_size: u32) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self {
            file,
            path: path.to_path_buf(),
            block_size: block_size as u64,
            len,
        })
    }

    /// Read the block stored at `offset`
    pub fn read_block(&mut self, offset: u64) -> Result<Block> {
        if self.block_end(offset)? > self.len {
            return Err(PackError::Corrupt(format!(
                "block at offset {} extends past end of {} ({} bytes)",
                offset,
                self.path.display(),
                self.len
            )));
        }

        let mut block = Block::zeroed(self.block_size as usize);
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(block.as_bytes_mut())?;

        tracing::trace!(offset, "read block");
        Ok(block)
    }

    /// Write `block` at `offset`
    pub fn write_block(&mut self, offset: u64, block: &Block) -> Result<()> {
        if block.len() as u64 != self.block_size {
            return Err(PackError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!(
                    "block must be exactly {} bytes, got {}",
                    self.block_size,
                    block.len()
                ),
            )));
        }

        let end = self.block_end(offset)?;
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.write_all(block.as_bytes())?;
        self.len = self.len.max(end);

        tracing::trace!(offset, "wrote block");
        Ok(())
    }

    /// End offset of the block at `offset`
    fn block_end(&self, offset: u64) -> Result<u64> {
        offset.checked_add(self.block_size).ok_or_else(|| {
            PackError::Corrupt(format!("block offset {} is out of range", offset))
        })
    }

    /// Extend the file by one block and return the new block's offset
    ///
    /// The returned offset is the previous end of file.
    pub fn grow(&mut self) -> Result<u64> {
        let offset = self.len;
        let end = self.block_end(offset)?;
        self.file.set_len(end)?;
        self.len = end;

        tracing::debug!(offset, new_len = self.len, "grew container by one block");
        Ok(offset)
    }

    /// Shrink (or extend) the file to exactly `len` bytes
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        self.len = len;
        Ok(())
    }

    /// Overwrite the header region at offset 0
    pub fn write_header(&mut self, bytes: &[u8]) -> Result<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(bytes)?;
        self.len = self.len.max(bytes.len() as u64);
        Ok(())
    }

    /// Sync all writes to disk
    pub fn sync(&mut self) -> Result<()> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Current file length in bytes
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Block size in bytes
    pub fn block_size(&self) -> u64 {
        self.block_size
    }
}
