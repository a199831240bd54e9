//! File entry definitions
//!
//! One packed file's metadata: its name, logical size and block list.

use serde::{Deserialize, Serialize};

use crate::error::{PackError, Result};

use super::MAX_NAME_LEN;

/// Metadata for one packed file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Unique name within the table
    pub name: String,

    /// Logical content length (padding excluded)
    pub total_size: u64,

    /// Block offsets in content order
    pub block_offsets: Vec<u64>,
}

impl FileEntry {
    /// Create an empty entry that owns no blocks
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total_size: 0,
            block_offsets: Vec::new(),
        }
    }

    /// Number of blocks owned
    pub fn block_count(&self) -> usize {
        self.block_offsets.len()
    }

    /// Valid bytes held in the final block, or 0 if it is full or absent
    pub fn tail_len(&self, block_size: u64) -> u64 {
        self.total_size % block_size
    }

    /// Whether the size agrees with the block count for `block_size`
    ///
    /// Every block but the last is full, and the last one holds at least
    /// one valid byte.
    pub fn is_consistent(&self, block_size: u64) -> bool {
        let expected = self.total_size.div_ceil(block_size);
        expected == self.block_offsets.len() as u64
    }
}

/// Check that `name` can be stored as an entry name
pub fn validate_name(name: &str) -> Result<()> {
    let reason = if name.is_empty() {
        "name is empty"
    } else if name.len() > MAX_NAME_LEN {
        "name is longer than 255 bytes"
    } else if name.contains('\0') {
        "name contains a NUL byte"
    } else {
        return Ok(());
    };

    Err(PackError::InvalidName {
        name: name.to_string(),
        reason,
    })
}
