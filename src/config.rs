//! Configuration for blockpack
//!
//! Centralized configuration with sensible defaults. Only `create` consults
//! a `Config`; every later operation reads the same constants back from the
//! container preamble, since they are part of the on-disk format.

use crate::error::{PackError, Result};

/// Block sizes must be a multiple of this many bytes
pub const BLOCK_ALIGNMENT: u32 = 512;

/// Capacity and geometry configuration for a new container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Data Region
    // -------------------------------------------------------------------------
    /// Size of every data block in bytes
    pub block_size: u32,

    // -------------------------------------------------------------------------
    // Header Capacity
    // -------------------------------------------------------------------------
    /// Maximum number of entries in the metadata table
    pub max_entries: u32,

    /// Maximum number of blocks a single entry may own
    pub max_blocks_per_entry: u32,

    /// Maximum number of offsets the free block registry may hold
    pub max_free_blocks: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            block_size: 256 * 1024, // 256 KiB
            max_entries: 100,
            max_blocks_per_entry: 1024,
            max_free_blocks: 16 * 1024,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Check that the configuration describes a usable container
    pub fn validate(&self) -> Result<()> {
        if self.block_size == 0 || self.block_size % BLOCK_ALIGNMENT != 0 {
            return Err(PackError::Config(format!(
                "block size {} must be a non-zero multiple of {}",
                self.block_size, BLOCK_ALIGNMENT
            )));
        }
        if self.max_entries == 0 {
            return Err(PackError::Config("max_entries must be at least 1".to_string()));
        }
        if self.max_blocks_per_entry == 0 {
            return Err(PackError::Config(
                "max_blocks_per_entry must be at least 1".to_string(),
            ));
        }
        if self.max_free_blocks == 0 {
            return Err(PackError::Config(
                "max_free_blocks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data block size (in bytes)
    pub fn block_size(mut self, size: u32) -> Self {
        self.config.block_size = size;
        self
    }

    /// Set the metadata table capacity
    pub fn max_entries(mut self, count: u32) -> Self {
        self.config.max_entries = count;
        self
    }

    /// Set the per-entry block limit
    pub fn max_blocks_per_entry(mut self, count: u32) -> Self {
        self.config.max_blocks_per_entry = count;
        self
    }

    /// Set the free block registry capacity
    pub fn max_free_blocks(mut self, count: u32) -> Self {
        self.config.max_free_blocks = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
