//! Command Module
//!
//! Requests handed to the engine and the reports it hands back.
//!
//! ## Operations
//! - `Create`     - new container from inputs
//! - `Append`     - add inputs to an existing container
//! - `Update`     - re-pack named entries from files of the same name
//! - `Delete`     - drop named entries, freeing their blocks
//! - `Extract`    - write entries back out as files
//! - `List`       - report names, sizes and (verbose) block offsets
//! - `Defragment` - compact live blocks and truncate the container
//!
//! Per-item problems land in a `BatchReport`; only fatal errors surface as
//! `Err` from `Engine::execute`.

mod operation;
mod report;

pub use operation::{InputSource, Operation, OperationType};
pub use report::{BatchReport, DefragReport, EntryInfo, ItemFailure, Outcome};
