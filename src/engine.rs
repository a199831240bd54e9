//! Engine Module
//!
//! Routes one operation to one container, end to end.
//!
//! ## Responsibilities
//! - Open (or create) the container named by the operation
//! - Run the operation against the loaded header
//! - Persist the header for mutating operations
//! - Keep per-item failures in the report and fatal ones in the `Err`
//!
//! Every call is synchronous and owns the container exclusively for its
//! duration; concurrent invocations on one path are not supported.

use std::io::Write;
use std::path::Path;

use crate::archive::Archive;
use crate::command::{BatchReport, DefragReport, EntryInfo, InputSource, Operation, Outcome};
use crate::config::Config;
use crate::error::Result;

/// The archive engine
///
/// Holds the configuration used for newly created containers. Existing
/// containers carry their own geometry and ignore it.
#[derive(Debug, Clone, Default)]
pub struct Engine {
    config: Config,
}

impl Engine {
    /// Create an engine that creates containers with `config`
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Execute an operation
    ///
    /// Routes operations to the appropriate handler.
    pub fn execute(&self, operation: Operation) -> Result<Outcome> {
        tracing::debug!(
            op = ?operation.operation_type(),
            archive = %operation.archive().display(),
            mutating = operation.is_mutating(),
            "executing"
        );

        match operation {
            Operation::Create { archive, inputs } => {
                self.create(&archive, inputs).map(Outcome::Batch)
            }
            Operation::Append { archive, inputs } => {
                self.append(&archive, inputs).map(Outcome::Batch)
            }
            Operation::Update { archive, names } => {
                self.update(&archive, &names).map(Outcome::Batch)
            }
            Operation::Delete { archive, names } => {
                self.delete(&archive, &names).map(Outcome::Batch)
            }
            Operation::Extract {
                archive,
                destination,
                names,
            } => self
                .extract(&archive, &destination, &names)
                .map(Outcome::Batch),
            Operation::List { archive, verbose } => {
                let entries = self.list(&archive)?;
                Ok(Outcome::Listing { entries, verbose })
            }
            Operation::Defragment { archive } => {
                self.defragment(&archive).map(Outcome::Defragmented)
            }
        }
    }

    /// Create a container at `path` and pack `inputs` into it
    pub fn create(&self, path: &Path, inputs: Vec<InputSource>) -> Result<BatchReport> {
        let mut archive = Archive::create(path, &self.config)?;
        let report = archive.add(inputs)?;
        archive.close()?;
        Ok(report)
    }

    /// Pack `inputs` into an existing container
    pub fn append(&self, path: &Path, inputs: Vec<InputSource>) -> Result<BatchReport> {
        let mut archive = Archive::open(path)?;
        let report = archive.add(inputs)?;
        archive.close()?;
        Ok(report)
    }

    /// Re-pack each named entry from the file of the same name
    pub fn update(&self, path: &Path, names: &[String]) -> Result<BatchReport> {
        let sources = names
            .iter()
            .map(|name| InputSource::named_file(name.clone(), name))
            .collect();
        self.update_from(path, sources)
    }

    /// Re-pack entries from arbitrary sources, matched by source name
    pub fn update_from(&self, path: &Path, sources: Vec<InputSource>) -> Result<BatchReport> {
        let mut archive = Archive::open(path)?;
        let report = archive.update(sources)?;
        archive.close()?;
        Ok(report)
    }

    /// Delete named entries
    pub fn delete(&self, path: &Path, names: &[String]) -> Result<BatchReport> {
        let mut archive = Archive::open(path)?;
        let report = archive.delete(names)?;
        archive.close()?;
        Ok(report)
    }

    /// Extract entries (all of them when `names` is empty) under `destination`
    pub fn extract(&self, path: &Path, destination: &Path, names: &[String]) -> Result<BatchReport> {
        let mut archive = Archive::open_read_only(path)?;
        archive.extract(destination, names)
    }

    /// Stream named entries, in the order given, into `writer`
    pub fn extract_to_writer<W: Write>(
        &self,
        path: &Path,
        names: &[String],
        writer: &mut W,
    ) -> Result<BatchReport> {
        let mut archive = Archive::open_read_only(path)?;
        let names: Vec<String> = if names.is_empty() {
            archive.list().into_iter().map(|e| e.name).collect()
        } else {
            names.to_vec()
        };

        let mut report = BatchReport::new();
        for name in names {
            match archive.extract_entry(&name, writer) {
                Ok(bytes) => report.complete(name, bytes),
                Err(e) if !e.is_fatal() => report.fail(name, e),
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }

    /// List entries without touching the container
    pub fn list(&self, path: &Path) -> Result<Vec<EntryInfo>> {
        let archive = Archive::open_read_only(path)?;
        Ok(archive.list())
    }

    /// Compact the container's data region
    pub fn defragment(&self, path: &Path) -> Result<DefragReport> {
        let mut archive = Archive::open(path)?;
        let report = archive.defragment()?;
        archive.close()?;
        Ok(report)
    }
}
