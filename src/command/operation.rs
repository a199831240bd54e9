//! Operation definitions
//!
//! Represents one archive operation and the content sources it consumes.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::PathBuf;

use crate::error::{PackError, Result};

/// Operation types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationType {
    Create,
    Append,
    Update,
    Delete,
    Extract,
    List,
    Defragment,
}

/// A fully validated operation against one container
#[derive(Debug)]
pub enum Operation {
    /// Create (or overwrite) a container from inputs
    Create {
        archive: PathBuf,
        inputs: Vec<InputSource>,
    },

    /// Add inputs to an existing container
    Append {
        archive: PathBuf,
        inputs: Vec<InputSource>,
    },

    /// Re-pack entries from files named like them
    Update { archive: PathBuf, names: Vec<String> },

    /// Remove entries
    Delete { archive: PathBuf, names: Vec<String> },

    /// Write entries under `destination`; all entries when `names` is empty
    Extract {
        archive: PathBuf,
        destination: PathBuf,
        names: Vec<String>,
    },

    /// Report entries; `verbose` adds block offsets
    List { archive: PathBuf, verbose: bool },

    /// Compact the data region
    Defragment { archive: PathBuf },
}

impl Operation {
    /// Get the operation type
    pub fn operation_type(&self) -> OperationType {
        match self {
            Operation::Create { .. } => OperationType::Create,
            Operation::Append { .. } => OperationType::Append,
            Operation::Update { .. } => OperationType::Update,
            Operation::Delete { .. } => OperationType::Delete,
            Operation::Extract { .. } => OperationType::Extract,
            Operation::List { .. } => OperationType::List,
            Operation::Defragment { .. } => OperationType::Defragment,
        }
    }

    /// Container path this operation targets
    pub fn archive(&self) -> &PathBuf {
        match self {
            Operation::Create { archive, .. }
            | Operation::Append { archive, .. }
            | Operation::Update { archive, .. }
            | Operation::Delete { archive, .. }
            | Operation::Extract { archive, .. }
            | Operation::List { archive, .. }
            | Operation::Defragment { archive } => archive,
        }
    }

    /// Whether the operation rewrites the header
    pub fn is_mutating(&self) -> bool {
        !matches!(self, Operation::List { .. })
    }
}

/// A named byte stream to pack
///
/// Files are opened lazily so an unreadable one becomes a per-item failure
/// rather than aborting the batch.
pub enum InputSource {
    /// A file on disk, stored under `name`
    File { name: String, path: PathBuf },

    /// A file whose path is not valid UTF-8 and so has no entry name
    ///
    /// `display` is the lossy rendering, used only for reporting.
    NonUtf8 { display: String, path: PathBuf },

    /// Any reader, stored under `name`
    Stream {
        name: String,
        reader: Box<dyn Read>,
    },
}

impl InputSource {
    /// File input stored under its path as given
    pub fn file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        match path.to_str() {
            Some(name) => Self::File {
                name: name.to_string(),
                path,
            },
            None => Self::NonUtf8 {
                display: path.to_string_lossy().into_owned(),
                path,
            },
        }
    }

    /// File input stored under an explicit name
    pub fn named_file(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self::File {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Stream input stored under `name`
    pub fn stream(name: impl Into<String>, reader: impl Read + 'static) -> Self {
        Self::Stream {
            name: name.into(),
            reader: Box::new(reader),
        }
    }

    /// Entry name this source is stored under
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Stream { name, .. } => name,
            Self::NonUtf8 { display, .. } => display,
        }
    }

    /// Open the source for reading
    pub fn open(self) -> Result<(String, Box<dyn Read>)> {
        match self {
            Self::File { name, path } => {
                let file = File::open(&path).map_err(|source| PackError::Input {
                    path: path.display().to_string(),
                    source,
                })?;
                Ok((name, Box::new(BufReader::new(file))))
            }
            Self::Stream { name, reader } => Ok((name, reader)),
            Self::NonUtf8 { display, .. } => Err(PackError::InvalidName {
                name: display,
                reason: "file name is not valid UTF-8",
            }),
        }
    }
}

impl fmt::Debug for InputSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File { name, path } => f
                .debug_struct("File")
                .field("name", name)
                .field("path", path)
                .finish(),
            Self::NonUtf8 { path, .. } => f.debug_struct("NonUtf8").field("path", path).finish(),
            Self::Stream { name, .. } => f.debug_struct("Stream").field("name", name).finish(),
        }
    }
}
