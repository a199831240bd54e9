//! Container geometry
//!
//! Block size and capacity limits, fixed when a container is created and
//! recorded in its preamble.

use crate::config::Config;
use crate::error::{PackError, Result};

use super::{HEADER_ALIGNMENT, MAX_NAME_LEN, PREAMBLE_SIZE};

/// Largest header region we are willing to reserve
const MAX_HEADER_SIZE: u64 = 1 << 30; // 1 GiB

/// bincode length prefix for sequences and strings
const LEN_PREFIX: u64 = 8;

/// Fixed layout constants of one container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// Size of every data block
    pub block_size: u32,
    /// Metadata table capacity
    pub max_entries: u32,
    /// Block limit per entry
    pub max_blocks_per_entry: u32,
    /// Free registry capacity
    pub max_free_blocks: u32,
    /// Bytes reserved for the header; the first data block starts here
    pub header_size: u64,
}

impl Geometry {
    /// Derive the geometry for a new container
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;

        let header_size = Self::required_header_size(
            config.max_entries,
            config.max_blocks_per_entry,
            config.max_free_blocks,
        )
        .ok_or_else(|| {
            PackError::Config(format!(
                "header for {} entries x {} blocks with {} free slots exceeds {} bytes",
                config.max_entries,
                config.max_blocks_per_entry,
                config.max_free_blocks,
                MAX_HEADER_SIZE
            ))
        })?;

        Ok(Self {
            block_size: config.block_size,
            max_entries: config.max_entries,
            max_blocks_per_entry: config.max_blocks_per_entry,
            max_free_blocks: config.max_free_blocks,
            header_size,
        })
    }

    /// Worst-case header size for the given capacities, aligned up
    ///
    /// Returns `None` if it overflows or exceeds the 1 GiB ceiling.
    pub fn required_header_size(
        max_entries: u32,
        max_blocks_per_entry: u32,
        max_free_blocks: u32,
    ) -> Option<u64> {
        // name + total_size + block list
        let per_entry = (LEN_PREFIX + MAX_NAME_LEN as u64)
            .checked_add(8)?
            .checked_add(LEN_PREFIX)?
            .checked_add(8u64.checked_mul(max_blocks_per_entry as u64)?)?;

        let entries = LEN_PREFIX.checked_add(per_entry.checked_mul(max_entries as u64)?)?;
        let free = LEN_PREFIX.checked_add(8u64.checked_mul(max_free_blocks as u64)?)?;

        let raw = PREAMBLE_SIZE.checked_add(entries)?.checked_add(free)?;
        let aligned = raw.checked_add(HEADER_ALIGNMENT - 1)? / HEADER_ALIGNMENT * HEADER_ALIGNMENT;

        (aligned <= MAX_HEADER_SIZE).then_some(aligned)
    }

    /// Block size as u64
    pub fn block_len(&self) -> u64 {
        self.block_size as u64
    }

    /// Whether `offset` is a block boundary inside the data region
    pub fn is_block_offset(&self, offset: u64) -> bool {
        offset >= self.header_size && (offset - self.header_size) % self.block_len() == 0
    }

    /// File length of a container holding exactly `blocks` contiguous blocks
    pub fn compact_len(&self, blocks: u64) -> u64 {
        self.header_size + blocks * self.block_len()
    }
}
