//! Header Module
//!
//! The Header Record at offset 0: the metadata table plus the free block
//! registry, loaded whole at the start of an operation and rewritten whole
//! at the end.
//!
//! ## Header Layout
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │ Preamble (48 bytes, little-endian)                         │
//! │   Magic "BLKPACK\0" (8) | Version u16 (2) | Reserved (2)   │
//! │   BlockSize u32 | MaxEntries u32 | MaxBlocksPerEntry u32   │
//! │   MaxFreeBlocks u32 | HeaderSize u64 | BodyLen u64         │
//! │   Reserved (4)                                             │
//! ├────────────────────────────────────────────────────────────┤
//! │ Body (bincode)                                             │
//! │   entries: [ { name, total_size, block_offsets[] } ... ]   │
//! │   free_blocks: [ offset ... ]                              │
//! ├────────────────────────────────────────────────────────────┤
//! │ Zero padding up to HeaderSize                              │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! HeaderSize is the worst-case body for the recorded capacities, so a
//! full table always fits without moving the first data block.

mod entry;
mod free_list;
mod geometry;
mod record;
mod table;

pub use entry::{validate_name, FileEntry};
pub use free_list::FreeBlockRegistry;
pub use geometry::Geometry;
pub use record::HeaderRecord;
pub use table::MetadataTable;

// =============================================================================
// Shared Constants
// =============================================================================

/// Magic bytes identifying a blockpack container
pub const MAGIC: &[u8; 8] = b"BLKPACK\0";

/// Current container format version
pub const VERSION: u16 = 1;

/// Fixed preamble size preceding the serialized body
pub const PREAMBLE_SIZE: u64 = 48;

/// Longest accepted entry name in bytes
pub const MAX_NAME_LEN: usize = 255;

/// Header region is rounded up to this boundary
pub const HEADER_ALIGNMENT: u64 = 4096;
