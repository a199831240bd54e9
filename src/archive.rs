//! Archive Module
//!
//! One open container: the block store plus its in-memory header.
//!
//! ## Responsibilities
//! - Load the header on open, persist it on close
//! - Pack byte streams into blocks, growing the file only when the free
//!   registry is empty
//! - Update, delete, extract and list entries
//! - Compact live blocks to the front of the data region
//!
//! Nothing is written back to offset 0 until `close()`. A fatal error
//! part-way through leaves the previous header on disk untouched.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};

use crate::command::{BatchReport, DefragReport, EntryInfo, InputSource};
use crate::config::Config;
use crate::error::{PackError, Result};
use crate::header::{validate_name, FileEntry, Geometry, HeaderRecord};
use crate::store::{Block, BlockStore};

/// Where freshly written blocks are recorded
enum BlockSink<'a> {
    /// Extend the named table entry block by block
    Entry,
    /// Collect offsets for a later `replace_entry_content`
    Collect {
        blocks: &'a mut Vec<u64>,
        bytes: &'a mut u64,
    },
}

/// An open container
pub struct Archive {
    store: BlockStore,
    header: HeaderRecord,
    writable: bool,
}

impl Archive {
    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Create (or truncate) a container at `path`
    ///
    /// The data region starts with one pre-grown free block just past the
    /// header. The empty header is persisted immediately.
    pub fn create(path: &Path, config: &Config) -> Result<Self> {
        let geometry = Geometry::from_config(config)?;
        let store = BlockStore::create(path, geometry.block_size, geometry.header_size)?;

        let mut archive = Self {
            store,
            header: HeaderRecord::new(geometry),
            writable: true,
        };

        let first = archive.store.grow()?;
        archive.header.registry_mut().register_new_block(first)?;
        archive.persist()?;

        tracing::info!(
            path = %path.display(),
            block_size = geometry.block_size,
            header_size = geometry.header_size,
            "created container"
        );
        Ok(archive)
    }

    /// Open an existing container for modification
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with(path, true)
    }

    /// Open an existing container without write access
    pub fn open_read_only(path: &Path) -> Result<Self> {
        Self::open_with(path, false)
    }

    fn open_with(path: &Path, writable: bool) -> Result<Self> {
        let mut file = OpenOptions::new().read(true).write(writable).open(path)?;
        let header = HeaderRecord::read_from(&mut file)?;
        let store = BlockStore::from_file(file, path, header.geometry().block_size)?;

        if store.len() < header.geometry().header_size {
            return Err(PackError::Format(format!(
                "{} is shorter than its header region",
                path.display()
            )));
        }

        tracing::debug!(
            path = %path.display(),
            entries = header.table().len(),
            free = header.registry().len(),
            "loaded header"
        );

        Ok(Self {
            store,
            header,
            writable,
        })
    }

    /// Write the header back to offset 0 and sync
    pub fn persist(&mut self) -> Result<()> {
        if !self.writable {
            return Err(PackError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "container was opened read-only",
            )));
        }

        let bytes = self.header.encode()?;
        self.store.write_header(&bytes)?;
        self.store.sync()?;

        tracing::debug!(
            entries = self.header.table().len(),
            free = self.header.registry().len(),
            "persisted header"
        );
        Ok(())
    }

    /// Persist the header (if writable) and close the container
    pub fn close(mut self) -> Result<()> {
        if self.writable {
            self.persist()?;
        }
        Ok(())
    }

    // =========================================================================
    // Create / Append
    // =========================================================================

    /// Pack every input, extending entries that already exist
    pub fn add(&mut self, inputs: Vec<InputSource>) -> Result<BatchReport> {
        let mut report = BatchReport::new();

        for input in inputs {
            let name = input.name().to_string();
            match self.add_one(input) {
                Ok(bytes) => {
                    tracing::info!(name = %name, bytes, "added");
                    report.complete(name, bytes);
                }
                Err(e) if !e.is_fatal() => report.fail(name, e),
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    fn add_one(&mut self, input: InputSource) -> Result<u64> {
        validate_name(input.name())?;
        let (name, mut reader) = input.open()?;

        let mut total = self.top_up_tail(&name, &mut reader)?;
        total += self.write_blocks(&name, &mut reader, BlockSink::Entry)?;

        // Empty inputs still get an entry
        self.header.table_mut().ensure_entry(&name)?;
        Ok(total)
    }

    /// Fill the padding of an existing entry's last block from `reader`
    ///
    /// Keeps the "only the final block is partial" invariant when content
    /// is appended to a name that already exists.
    fn top_up_tail(&mut self, name: &str, reader: &mut dyn Read) -> Result<u64> {
        let block_size = self.store.block_size();
        let (offset, tail) = match self.header.table().find_entry(name) {
            Some(entry) => match (entry.block_offsets.last(), entry.tail_len(block_size)) {
                (Some(&offset), tail) if tail > 0 => (offset, tail),
                _ => return Ok(0),
            },
            None => return Ok(0),
        };

        let mut block = self.store.read_block(offset)?;
        let read = block
            .fill_from(reader, tail as usize)
            .map_err(|source| input_error(name, source))?;
        if read == 0 {
            return Ok(0);
        }

        self.store.write_block(offset, &block)?;
        self.header.table_mut().extend_tail(name, read as u64)?;
        tracing::debug!(name, offset, bytes = read, "topped up tail block");
        Ok(read as u64)
    }

    /// The block-write loop shared by create, append and update
    ///
    /// Reads one block at a time until the reader is exhausted, allocating
    /// (or growing) a block for each chunk. A short chunk is zero-padded and
    /// ends the loop.
    fn write_blocks(&mut self, name: &str, reader: &mut dyn Read, mut sink: BlockSink<'_>) -> Result<u64> {
        let block_size = self.store.block_size() as usize;
        let max_blocks = self.header.table().max_blocks_per_entry();
        let mut block = Block::zeroed(block_size);
        let mut total = 0u64;

        loop {
            let read = block
                .fill_from(reader, 0)
                .map_err(|source| input_error(name, source))?;
            if read == 0 {
                break;
            }

            match &sink {
                BlockSink::Entry => self.header.table().check_room(name)?,
                BlockSink::Collect { blocks, .. } if blocks.len() >= max_blocks => {
                    return Err(PackError::Capacity {
                        what: "blocks per entry",
                        limit: max_blocks,
                    });
                }
                BlockSink::Collect { .. } => {}
            }

            let offset = self.allocate_block()?;
            self.store.write_block(offset, &block)?;

            match &mut sink {
                BlockSink::Entry => {
                    self.header
                        .table_mut()
                        .append_block_to_entry(name, offset, read as u64)?;
                }
                BlockSink::Collect { blocks, bytes } => {
                    blocks.push(offset);
                    **bytes += read as u64;
                }
            }

            total += read as u64;
            if read < block_size {
                break;
            }
        }

        Ok(total)
    }

    /// Take a free block, growing the container by one block if none is left
    fn allocate_block(&mut self) -> Result<u64> {
        if let Some(offset) = self.header.registry_mut().allocate() {
            tracing::debug!(offset, "allocated free block");
            return Ok(offset);
        }

        let offset = self.store.grow()?;
        self.header.registry_mut().register_new_block(offset)?;
        self.header.registry_mut().allocate().ok_or_else(|| {
            PackError::Corrupt(format!(
                "free registry empty right after registering block {}",
                offset
            ))
        })
    }

    // =========================================================================
    // Update / Delete
    // =========================================================================

    /// Re-pack existing entries from new content
    ///
    /// Each entry's old blocks are released before the new content is
    /// written, so the rewrite can reuse them.
    pub fn update(&mut self, sources: Vec<InputSource>) -> Result<BatchReport> {
        let mut report = BatchReport::new();

        for source in sources {
            let name = source.name().to_string();
            if self.header.table().find_entry(&name).is_none() {
                report.fail(name.clone(), PackError::NotFound(name));
                continue;
            }

            let reader = match source.open() {
                Ok((_, reader)) => reader,
                Err(e) if !e.is_fatal() => {
                    report.fail(name, e);
                    continue;
                }
                Err(e) => return Err(e),
            };

            // The first block is read before anything is released, so an
            // input that fails straight away leaves the entry as it was.
            let mut reader = match read_head(reader, self.store.block_size()) {
                Ok(reader) => reader,
                Err(source) => {
                    report.fail(name.clone(), input_error(&name, source));
                    continue;
                }
            };

            {
                let (table, registry) = self.header.parts_mut();
                table.detach_blocks(&name, registry)?;
            }

            let mut blocks = Vec::new();
            let mut bytes = 0u64;
            let written = self.write_blocks(
                &name,
                &mut reader,
                BlockSink::Collect {
                    blocks: &mut blocks,
                    bytes: &mut bytes,
                },
            );

            // Whatever made it to disk is attached even if the input failed
            // part-way, so no block is left unowned.
            {
                let (table, registry) = self.header.parts_mut();
                table.replace_entry_content(&name, blocks, bytes, registry)?;
            }

            match written {
                Ok(bytes) => {
                    tracing::info!(name = %name, bytes, "updated");
                    report.complete(name, bytes);
                }
                Err(e) if !e.is_fatal() => report.fail(name, e),
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    /// Remove entries, returning their blocks to the free registry
    pub fn delete(&mut self, names: &[String]) -> Result<BatchReport> {
        let mut report = BatchReport::new();

        for name in names {
            let (table, registry) = self.header.parts_mut();
            match table.remove_entry(name, registry) {
                Ok(entry) => {
                    tracing::info!(name = %name, blocks = entry.block_count(), "deleted");
                    report.complete(name.clone(), entry.total_size);
                }
                Err(e) if !e.is_fatal() => report.fail(name.clone(), e),
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    // =========================================================================
    // Extract / List
    // =========================================================================

    /// Write entries out as files under `destination`
    ///
    /// An empty `names` selects every entry.
    pub fn extract(&mut self, destination: &Path, names: &[String]) -> Result<BatchReport> {
        let mut report = BatchReport::new();

        let targets: Vec<FileEntry> = if names.is_empty() {
            self.header.table().entries().to_vec()
        } else {
            let mut targets = Vec::new();
            for name in names {
                match self.header.table().find_entry(name) {
                    Some(entry) => targets.push(entry.clone()),
                    None => report.fail(name.clone(), PackError::NotFound(name.clone())),
                }
            }
            targets
        };

        for entry in targets {
            match self.extract_to_file(&entry, destination) {
                Ok(bytes) => {
                    tracing::info!(name = %entry.name, bytes, "extracted");
                    report.complete(entry.name, bytes);
                }
                Err(e) if !e.is_fatal() => report.fail(entry.name, e),
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    fn extract_to_file(&mut self, entry: &FileEntry, destination: &Path) -> Result<u64> {
        let out_path = safe_join(destination, &entry.name)?;
        let label = out_path.display().to_string();
        let output_error = |source| PackError::Output {
            path: label.clone(),
            source,
        };

        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(output_error)?;
        }
        let file = File::create(&out_path).map_err(output_error)?;
        let mut writer = BufWriter::new(file);

        let bytes = self.copy_entry(entry, &mut writer, &label)?;
        writer.flush().map_err(output_error)?;
        Ok(bytes)
    }

    /// Stream one entry's content into `writer`
    pub fn extract_entry<W: Write>(&mut self, name: &str, writer: &mut W) -> Result<u64> {
        let entry = self
            .header
            .table()
            .find_entry(name)
            .cloned()
            .ok_or_else(|| PackError::NotFound(name.to_string()))?;

        let bytes = self.copy_entry(&entry, writer, name)?;
        writer.flush().map_err(|source| PackError::Output {
            path: name.to_string(),
            source,
        })?;
        Ok(bytes)
    }

    /// Copy blocks in order, trimming the last one to the remaining size
    fn copy_entry<W: Write>(&mut self, entry: &FileEntry, writer: &mut W, label: &str) -> Result<u64> {
        let block_size = self.store.block_size();
        let mut remaining = entry.total_size;

        for &offset in &entry.block_offsets {
            let block = self.store.read_block(offset)?;
            let n = remaining.min(block_size) as usize;
            writer
                .write_all(&block.as_bytes()[..n])
                .map_err(|source| PackError::Output {
                    path: label.to_string(),
                    source,
                })?;
            remaining -= n as u64;
        }

        if remaining != 0 {
            return Err(PackError::Corrupt(format!(
                "entry {:?} is {} bytes short of its recorded size",
                entry.name, remaining
            )));
        }
        Ok(entry.total_size)
    }

    /// Names, sizes and block offsets in table order
    pub fn list(&self) -> Vec<EntryInfo> {
        self.header
            .table()
            .entries()
            .iter()
            .map(|entry| EntryInfo {
                name: entry.name.clone(),
                total_size: entry.total_size,
                block_offsets: entry.block_offsets.clone(),
            })
            .collect()
    }

    // =========================================================================
    // Defragment
    // =========================================================================

    /// Move every live block to a contiguous run just past the header
    ///
    /// Entries are walked in table order behind a cursor. When the cursor
    /// slot holds a block that has not been visited yet, the two blocks are
    /// swapped so nothing live is overwritten. Sizes are untouched. The free
    /// registry ends up empty and the file is cut at the cursor.
    pub fn defragment(&mut self) -> Result<DefragReport> {
        let block_len = self.store.block_size();
        let old_len = self.store.len();
        let mut cursor = self.header.geometry().header_size;
        let mut blocks_moved = 0u64;

        let (table, registry) = self.header.parts_mut();
        let entries = table.entries_mut();

        // offset -> (entry index, block index)
        let mut owner: HashMap<u64, (usize, usize)> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            for (j, &offset) in entry.block_offsets.iter().enumerate() {
                owner.insert(offset, (i, j));
            }
        }

        for i in 0..entries.len() {
            for j in 0..entries[i].block_offsets.len() {
                let src = entries[i].block_offsets[j];
                if src != cursor {
                    let block = self.store.read_block(src)?;

                    match owner.get(&cursor).copied() {
                        Some((k, l)) => {
                            let displaced = self.store.read_block(cursor)?;
                            self.store.write_block(src, &displaced)?;
                            entries[k].block_offsets[l] = src;
                            owner.insert(src, (k, l));
                        }
                        None => {
                            owner.remove(&src);
                        }
                    }

                    self.store.write_block(cursor, &block)?;
                    entries[i].block_offsets[j] = cursor;
                    owner.insert(cursor, (i, j));
                    blocks_moved += 1;
                }
                cursor += block_len;
            }
        }

        registry.clear();
        self.store.truncate(cursor)?;

        let report = DefragReport {
            blocks_moved,
            live_blocks: owner.len() as u64,
            old_len,
            new_len: cursor,
        };
        tracing::info!(
            moved = report.blocks_moved,
            live = report.live_blocks,
            reclaimed = report.reclaimed(),
            "defragmented"
        );
        Ok(report)
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// The in-memory header
    pub fn header(&self) -> &HeaderRecord {
        &self.header
    }

    /// Container geometry
    pub fn geometry(&self) -> &Geometry {
        self.header.geometry()
    }

    /// Current container file length
    pub fn file_len(&self) -> u64 {
        self.store.len()
    }
}

/// Buffer up to `len` bytes of `reader` and chain the rest behind them
fn read_head(mut reader: Box<dyn Read>, len: u64) -> std::io::Result<impl Read> {
    let mut head = Vec::with_capacity(len as usize);
    (&mut reader).take(len).read_to_end(&mut head)?;
    Ok(Cursor::new(head).chain(reader))
}

fn input_error(name: &str, source: std::io::Error) -> PackError {
    PackError::Input {
        path: name.to_string(),
        source,
    }
}

/// Join an entry name onto `destination`
///
/// Leading `/` (and drive prefixes) are stripped the way tar does; any `..`
/// component is refused so nothing lands outside `destination`.
fn safe_join(destination: &Path, name: &str) -> Result<PathBuf> {
    let mut joined = destination.to_path_buf();

    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => joined.push(part),
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                return Err(PackError::InvalidName {
                    name: name.to_string(),
                    reason: "name would extract outside the destination",
                });
            }
        }
    }

    if joined == destination {
        return Err(PackError::InvalidName {
            name: name.to_string(),
            reason: "name has no file component",
        });
    }
    Ok(joined)
}
