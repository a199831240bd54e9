//! Block buffer
//!
//! A fixed-size, zero-initialised byte buffer holding one data block.

use std::io::{self, Read};

use bytes::BytesMut;

/// One data block worth of bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    data: BytesMut,
}

impl Block {
    /// Create an all-zero block of `size` bytes
    pub fn zeroed(size: usize) -> Self {
        Self {
            data: BytesMut::zeroed(size),
        }
    }

    /// Create a block from `content`, zero-padding up to `size`
    ///
    /// Content longer than `size` is cut at the block boundary.
    pub fn from_content(content: &[u8], size: usize) -> Self {
        let mut block = Self::zeroed(size);
        let len = content.len().min(size);
        block.data[..len].copy_from_slice(&content[..len]);
        block
    }

    /// Fill the block from `reader`, starting at byte `start`
    ///
    /// Keeps reading until the block is full or the reader reports EOF, so a
    /// short count always means the input is exhausted. Everything past the
    /// filled region is zeroed. Returns the number of bytes read.
    pub fn fill_from<R: Read + ?Sized>(&mut self, reader: &mut R, start: usize) -> io::Result<usize> {
        let start = start.min(self.data.len());
        let mut filled = start;
        while filled < self.data.len() {
            match reader.read(&mut self.data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        self.data[filled..].fill(0);
        Ok(filled - start)
    }

    /// Block length in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow the block contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Mutably borrow the block contents
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}
