//! Metadata Table
//!
//! Capacity-bounded, insertion-ordered list of file entries.

use std::collections::HashSet;

use crate::error::{PackError, Result};

use super::{FileEntry, FreeBlockRegistry};

/// Ordered table of packed files
///
/// Lookups are linear; the table is bounded by `max_entries` and small
/// enough that a map would only add a second source of truth.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetadataTable {
    entries: Vec<FileEntry>,
    max_entries: usize,
    max_blocks_per_entry: usize,
}

impl MetadataTable {
    /// Create an empty table
    pub fn new(max_entries: usize, max_blocks_per_entry: usize) -> Self {
        Self {
            entries: Vec::new(),
            max_entries,
            max_blocks_per_entry,
        }
    }

    /// Rebuild a table from persisted entries
    pub fn from_entries(
        entries: Vec<FileEntry>,
        max_entries: usize,
        max_blocks_per_entry: usize,
    ) -> Result<Self> {
        if entries.len() > max_entries {
            return Err(PackError::Corrupt(format!(
                "table holds {} entries, limit is {}",
                entries.len(),
                max_entries
            )));
        }

        let mut seen = HashSet::new();
        for entry in &entries {
            if !seen.insert(entry.name.as_str()) {
                return Err(PackError::Corrupt(format!(
                    "duplicate entry name {:?}",
                    entry.name
                )));
            }
            if entry.block_count() > max_blocks_per_entry {
                return Err(PackError::Corrupt(format!(
                    "entry {:?} owns {} blocks, limit is {}",
                    entry.name,
                    entry.block_count(),
                    max_blocks_per_entry
                )));
            }
        }

        Ok(Self {
            entries,
            max_entries,
            max_blocks_per_entry,
        })
    }

    // =========================================================================
    // Lookup
    // =========================================================================

    /// Find an entry by exact name
    pub fn find_entry(&self, name: &str) -> Option<&FileEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.name == name)
    }

    /// Fail if writing one more block under `name` would exceed a limit
    pub fn check_room(&self, name: &str) -> Result<()> {
        match self.find_entry(name) {
            Some(entry) if entry.block_count() >= self.max_blocks_per_entry => {
                Err(PackError::Capacity {
                    what: "blocks per entry",
                    limit: self.max_blocks_per_entry,
                })
            }
            Some(_) => Ok(()),
            None if self.entries.len() >= self.max_entries => Err(PackError::Capacity {
                what: "metadata table entries",
                limit: self.max_entries,
            }),
            None => Ok(()),
        }
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Record a newly written block against `name`
    ///
    /// Extends the entry if it exists, otherwise creates it with this single
    /// block. Create and append both funnel through here, so a name seen a
    /// second time in one pass simply keeps growing.
    pub fn append_block_to_entry(&mut self, name: &str, offset: u64, bytes_written: u64) -> Result<()> {
        self.check_room(name)?;

        match self.position(name) {
            Some(idx) => {
                let entry = &mut self.entries[idx];
                entry.block_offsets.push(offset);
                entry.total_size += bytes_written;
            }
            None => self.entries.push(FileEntry {
                name: name.to_string(),
                total_size: bytes_written,
                block_offsets: vec![offset],
            }),
        }
        Ok(())
    }

    /// Count `bytes` written into the existing tail block of `name`
    pub fn extend_tail(&mut self, name: &str, bytes: u64) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| PackError::NotFound(name.to_string()))?;
        self.entries[idx].total_size += bytes;
        Ok(())
    }

    /// Create an empty entry for `name` unless one exists
    pub fn ensure_entry(&mut self, name: &str) -> Result<()> {
        if self.position(name).is_some() {
            return Ok(());
        }
        if self.entries.len() >= self.max_entries {
            return Err(PackError::Capacity {
                what: "metadata table entries",
                limit: self.max_entries,
            });
        }
        self.entries.push(FileEntry::new(name));
        Ok(())
    }

    /// Remove `name`, handing its blocks to `registry`
    ///
    /// Later entries shift down one position; the free registry is not
    /// compacted.
    pub fn remove_entry(&mut self, name: &str, registry: &mut FreeBlockRegistry) -> Result<FileEntry> {
        let idx = self
            .position(name)
            .ok_or_else(|| PackError::NotFound(name.to_string()))?;

        registry.release_all(&self.entries[idx].block_offsets)?;
        Ok(self.entries.remove(idx))
    }

    /// Swap in new content for `name`, keeping its table position
    ///
    /// Whatever blocks the entry still owns are released first.
    pub fn replace_entry_content(
        &mut self,
        name: &str,
        new_blocks: Vec<u64>,
        new_size: u64,
        registry: &mut FreeBlockRegistry,
    ) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| PackError::NotFound(name.to_string()))?;

        if new_blocks.len() > self.max_blocks_per_entry {
            return Err(PackError::Capacity {
                what: "blocks per entry",
                limit: self.max_blocks_per_entry,
            });
        }

        registry.release_all(&self.entries[idx].block_offsets)?;

        let entry = &mut self.entries[idx];
        entry.block_offsets = new_blocks;
        entry.total_size = new_size;
        Ok(())
    }

    /// Release every block of `name` and zero its size, keeping the entry
    pub fn detach_blocks(&mut self, name: &str, registry: &mut FreeBlockRegistry) -> Result<()> {
        let idx = self
            .position(name)
            .ok_or_else(|| PackError::NotFound(name.to_string()))?;

        registry.release_all(&self.entries[idx].block_offsets)?;

        let entry = &mut self.entries[idx];
        entry.block_offsets.clear();
        entry.total_size = 0;
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// All entries in table order
    pub fn entries(&self) -> &[FileEntry] {
        &self.entries
    }

    /// Mutable entries, for in-place offset rewrites during compaction
    pub(crate) fn entries_mut(&mut self) -> &mut [FileEntry] {
        &mut self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total blocks owned across all entries
    pub fn live_block_count(&self) -> usize {
        self.entries.iter().map(FileEntry::block_count).sum()
    }

    pub fn max_blocks_per_entry(&self) -> usize {
        self.max_blocks_per_entry
    }
}
