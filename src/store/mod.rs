//! Store Module
//!
//! Raw fixed-size block I/O against the container file.
//!
//! ## Responsibilities
//! - Read and write whole blocks at a byte offset
//! - Grow the file by exactly one block when the free registry runs dry
//! - Truncate trailing space after defragmentation
//! - Rewrite the header region at offset 0
//!
//! ## File Layout
//! ```text
//! ┌──────────────────────┬─────────┬─────────┬─────────┬─────┐
//! │ Header Record        │ Block   │ Block   │ Block   │ ... │
//! │ (header_size bytes)  │ (bs)    │ (bs)    │ (bs)    │     │
//! └──────────────────────┴─────────┴─────────┴─────────┴─────┘
//! 0                      header_size
//! ```
//!
//! The store knows nothing about which blocks belong to which entry; that
//! is the header's job.

mod block;
mod block_store;

pub use block::Block;
pub use block_store::BlockStore;
