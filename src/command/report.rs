//! Report definitions
//!
//! Represents what an operation did, item by item.

use std::fmt;

use crate::error::PackError;

/// Result of a successfully executed operation
#[derive(Debug)]
pub enum Outcome {
    /// Create, append, update, delete or extract
    Batch(BatchReport),

    /// List output
    Listing { entries: Vec<EntryInfo>, verbose: bool },

    /// Defragment summary
    Defragmented(DefragReport),
}

impl Outcome {
    /// Whether any item failed
    pub fn has_failures(&self) -> bool {
        match self {
            Outcome::Batch(report) => !report.is_clean(),
            _ => false,
        }
    }
}

/// Per-item results of a multi-item operation
#[derive(Debug, Default)]
pub struct BatchReport {
    /// Items that succeeded, with the bytes each one moved
    pub completed: Vec<(String, u64)>,

    /// Items that were skipped
    pub failures: Vec<ItemFailure>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a successful item
    pub fn complete(&mut self, name: impl Into<String>, bytes: u64) {
        self.completed.push((name.into(), bytes));
    }

    /// Record a skipped item
    pub fn fail(&mut self, name: impl Into<String>, error: PackError) {
        let name = name.into();
        tracing::debug!(name = %name, error = %error, "skipped item");
        self.failures.push(ItemFailure { name, error });
    }

    /// True if no item failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One skipped item and why
#[derive(Debug)]
pub struct ItemFailure {
    pub name: String,
    pub error: PackError,
}

impl fmt::Display for ItemFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}

/// One row of list output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryInfo {
    pub name: String,
    pub total_size: u64,
    pub block_offsets: Vec<u64>,
}

impl EntryInfo {
    /// `name<TAB>size`, plus the block offsets when `verbose`
    pub fn render(&self, verbose: bool) -> String {
        let mut line = format!("{}\t{}", self.name, self.total_size);
        if verbose {
            let offsets: Vec<String> = self.block_offsets.iter().map(u64::to_string).collect();
            line.push('\t');
            line.push_str(&offsets.join(","));
        }
        line
    }
}

/// What a defragmentation pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefragReport {
    /// Blocks whose offset changed
    pub blocks_moved: u64,
    /// Live blocks after compaction
    pub live_blocks: u64,
    /// File length before compaction
    pub old_len: u64,
    /// File length after truncation
    pub new_len: u64,
}

impl DefragReport {
    /// Bytes returned to the filesystem
    pub fn reclaimed(&self) -> u64 {
        self.old_len.saturating_sub(self.new_len)
    }
}
