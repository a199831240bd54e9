//! Header Record
//!
//! In-memory form of the header region plus its fixed-size encoding.

use std::collections::HashSet;
use std::io::{ErrorKind, Read, Seek, SeekFrom};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{PackError, Result};

use super::{FileEntry, FreeBlockRegistry, Geometry, MetadataTable, MAGIC, PREAMBLE_SIZE, VERSION};

/// Serialized body, borrowed for encoding
#[derive(Serialize)]
struct BodyRef<'a> {
    entries: &'a [FileEntry],
    free_blocks: Vec<u64>,
}

/// Serialized body, owned for decoding
#[derive(Deserialize)]
struct Body {
    entries: Vec<FileEntry>,
    free_blocks: Vec<u64>,
}

/// Metadata table and free registry of one container
#[derive(Debug, Clone)]
pub struct HeaderRecord {
    geometry: Geometry,
    table: MetadataTable,
    registry: FreeBlockRegistry,
}

impl HeaderRecord {
    /// Create an empty header for `geometry`
    pub fn new(geometry: Geometry) -> Self {
        Self {
            table: MetadataTable::new(
                geometry.max_entries as usize,
                geometry.max_blocks_per_entry as usize,
            ),
            registry: FreeBlockRegistry::new(geometry.max_free_blocks as usize),
            geometry,
        }
    }

    // =========================================================================
    // Encoding
    // =========================================================================

    /// Encode to exactly `header_size` bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(&BodyRef {
            entries: self.table.entries(),
            free_blocks: self.registry.iter().collect(),
        })?;

        let total = PREAMBLE_SIZE + body.len() as u64;
        if total > self.geometry.header_size {
            return Err(PackError::Capacity {
                what: "header region bytes",
                limit: self.geometry.header_size as usize,
            });
        }

        let mut bytes = Vec::with_capacity(self.geometry.header_size as usize);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes()); // reserved
        bytes.extend_from_slice(&self.geometry.block_size.to_le_bytes());
        bytes.extend_from_slice(&self.geometry.max_entries.to_le_bytes());
        bytes.extend_from_slice(&self.geometry.max_blocks_per_entry.to_le_bytes());
        bytes.extend_from_slice(&self.geometry.max_free_blocks.to_le_bytes());
        bytes.extend_from_slice(&self.geometry.header_size.to_le_bytes());
        bytes.extend_from_slice(&(body.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&[0u8; 4]); // reserved
        debug_assert_eq!(bytes.len() as u64, PREAMBLE_SIZE);

        bytes.extend_from_slice(&body);
        bytes.resize(self.geometry.header_size as usize, 0);
        Ok(bytes)
    }

    /// Read and validate the header at the start of `reader`
    pub fn read_from<R: Read + Seek>(reader: &mut R) -> Result<Self> {
        reader.seek(SeekFrom::Start(0))?;

        let mut preamble = [0u8; PREAMBLE_SIZE as usize];
        read_exact_or_format(reader, &mut preamble, "preamble")?;

        let (geometry, body_len) = Self::decode_preamble(&preamble)?;

        let mut body = vec![0u8; body_len as usize];
        read_exact_or_format(reader, &mut body, "header body")?;

        Self::decode_body(geometry, &body)
    }

    /// Decode a full header region
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < PREAMBLE_SIZE as usize {
            return Err(PackError::Format("header shorter than preamble".to_string()));
        }
        let (geometry, body_len) = Self::decode_preamble(&bytes[..PREAMBLE_SIZE as usize])?;

        let body_end = (PREAMBLE_SIZE + body_len) as usize;
        if bytes.len() < body_end {
            return Err(PackError::Format("header body truncated".to_string()));
        }
        Self::decode_body(geometry, &bytes[PREAMBLE_SIZE as usize..body_end])
    }

    fn decode_preamble(preamble: &[u8]) -> Result<(Geometry, u64)> {
        if &preamble[0..8] != MAGIC {
            return Err(PackError::Format(format!(
                "invalid magic: expected {:?}, got {:?}",
                MAGIC,
                &preamble[0..8]
            )));
        }

        let version = u16::from_le_bytes([preamble[8], preamble[9]]);
        if version != VERSION {
            return Err(PackError::Format(format!(
                "unsupported container version: {}",
                version
            )));
        }

        let u32_at = |at: usize| {
            u32::from_le_bytes([preamble[at], preamble[at + 1], preamble[at + 2], preamble[at + 3]])
        };
        let u64_at = |at: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&preamble[at..at + 8]);
            u64::from_le_bytes(raw)
        };

        let config = Config {
            block_size: u32_at(12),
            max_entries: u32_at(16),
            max_blocks_per_entry: u32_at(20),
            max_free_blocks: u32_at(24),
        };
        let header_size = u64_at(28);
        let body_len = u64_at(36);

        let geometry = Geometry::from_config(&config)
            .map_err(|e| PackError::Format(format!("bad geometry in preamble: {}", e)))?;
        if geometry.header_size != header_size {
            return Err(PackError::Format(format!(
                "header size {} does not match capacities (expected {})",
                header_size, geometry.header_size
            )));
        }
        if PREAMBLE_SIZE + body_len > header_size {
            return Err(PackError::Format(format!(
                "body length {} overruns header region",
                body_len
            )));
        }

        Ok((geometry, body_len))
    }

    fn decode_body(geometry: Geometry, body: &[u8]) -> Result<Self> {
        let body: Body = bincode::deserialize(body)?;

        let record = Self {
            table: MetadataTable::from_entries(
                body.entries,
                geometry.max_entries as usize,
                geometry.max_blocks_per_entry as usize,
            )?,
            registry: FreeBlockRegistry::from_offsets(
                body.free_blocks,
                geometry.max_free_blocks as usize,
            )
            .map_err(|e| match e {
                PackError::Capacity { .. } => {
                    PackError::Corrupt("free list exceeds its capacity".to_string())
                }
                other => other,
            })?,
            geometry,
        };

        record.check_invariants()?;
        Ok(record)
    }

    // =========================================================================
    // Invariants
    // =========================================================================

    /// Verify block alignment, size accounting and ownership disjointness
    ///
    /// Every block offset is owned by exactly one entry or sits in the free
    /// registry, never both.
    pub fn check_invariants(&self) -> Result<()> {
        let block_len = self.geometry.block_len();
        let mut owned: HashSet<u64> = HashSet::new();

        for entry in self.table.entries() {
            if !entry.is_consistent(block_len) {
                return Err(PackError::Corrupt(format!(
                    "entry {:?}: size {} does not match {} blocks",
                    entry.name,
                    entry.total_size,
                    entry.block_count()
                )));
            }
            for &offset in &entry.block_offsets {
                if !self.geometry.is_block_offset(offset) {
                    return Err(PackError::Corrupt(format!(
                        "entry {:?}: misaligned block offset {}",
                        entry.name, offset
                    )));
                }
                if !owned.insert(offset) {
                    return Err(PackError::Corrupt(format!(
                        "block at offset {} owned twice",
                        offset
                    )));
                }
                if self.registry.contains(offset) {
                    return Err(PackError::Corrupt(format!(
                        "block at offset {} is both owned and free",
                        offset
                    )));
                }
            }
        }

        for offset in self.registry.iter() {
            if !self.geometry.is_block_offset(offset) {
                return Err(PackError::Corrupt(format!(
                    "misaligned free offset {}",
                    offset
                )));
            }
        }

        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn geometry(&self) -> &Geometry {
        &self.geometry
    }

    pub fn table(&self) -> &MetadataTable {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut MetadataTable {
        &mut self.table
    }

    pub fn registry(&self) -> &FreeBlockRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut FreeBlockRegistry {
        &mut self.registry
    }

    /// Borrow table and registry together for operations that move blocks
    /// between them
    pub fn parts_mut(&mut self) -> (&mut MetadataTable, &mut FreeBlockRegistry) {
        (&mut self.table, &mut self.registry)
    }
}

/// `read_exact`, reporting a short file as a format error
fn read_exact_or_format<R: Read>(reader: &mut R, buf: &mut [u8], what: &str) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => {
            PackError::Format(format!("container too short to hold its {}", what))
        }
        _ => PackError::Io(e),
    })
}
