//! # blockpack
//!
//! A single-file block archive:
//! - Fixed-size header record holding the metadata table and free list
//! - Fixed-size data blocks, reused through a FIFO free block registry
//! - Create, append, update, delete, extract, list and defragment
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     CLI (blockpack)                          │
//! │              (one operation per invocation)                  │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Operation
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                       Engine                                 │
//! │          (open → run → persist header → report)              │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                      Archive                                 │
//! │      (block-write loop, extract, defragment)                 │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │                                  │
//!            ▼                                  ▼
//!   ┌─────────────────┐              ┌─────────────────────┐
//!   │  HeaderRecord   │              │     BlockStore      │
//!   │ MetadataTable + │              │ read / write / grow │
//!   │ FreeBlockReg.   │              │   (container file)  │
//!   └─────────────────┘              └─────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod store;
pub mod header;
pub mod command;
pub mod archive;
pub mod engine;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use archive::Archive;
pub use command::{BatchReport, DefragReport, EntryInfo, InputSource, Operation, Outcome};
pub use config::Config;
pub use engine::Engine;
pub use error::{PackError, Result};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of blockpack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Entry name used for content read from standard input
pub const STDIN_NAME: &str = "stdin";
