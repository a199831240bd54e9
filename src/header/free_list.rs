//! Free Block Registry
//!
//! FIFO queue of reusable block offsets. Allocation pops from the front,
//! release pushes to the back, so offsets come back out in the order they
//! were given up. Consumed offsets leave the queue entirely; nothing is
//! tombstoned, so the queue length is exactly the live free count.

use std::collections::{HashSet, VecDeque};

use crate::error::{PackError, Result};

/// Tracks block offsets available for reuse
#[derive(Debug, Clone, Default)]
pub struct FreeBlockRegistry {
    /// Available offsets, oldest first
    free: VecDeque<u64>,
    /// Membership mirror of `free` for double-release detection
    members: HashSet<u64>,
    /// Maximum number of offsets held at once
    capacity: usize,
}

impl FreeBlockRegistry {
    /// Create an empty registry holding at most `capacity` offsets
    pub fn new(capacity: usize) -> Self {
        Self {
            free: VecDeque::new(),
            members: HashSet::new(),
            capacity,
        }
    }

    /// Rebuild a registry from persisted offsets
    pub fn from_offsets<I>(offsets: I, capacity: usize) -> Result<Self>
    where
        I: IntoIterator<Item = u64>,
    {
        let mut registry = Self::new(capacity);
        for offset in offsets {
            registry.release(offset)?;
        }
        Ok(registry)
    }

    /// Take the oldest free offset, or `None` if nothing is free
    pub fn allocate(&mut self) -> Option<u64> {
        let offset = self.free.pop_front()?;
        self.members.remove(&offset);
        Some(offset)
    }

    /// Return `offset` to the registry
    ///
    /// Offset 0 always belongs to the header and can never be a block.
    pub fn release(&mut self, offset: u64) -> Result<()> {
        if offset == 0 {
            return Err(PackError::Corrupt(
                "attempted to release offset 0 (header region)".to_string(),
            ));
        }
        if self.members.contains(&offset) {
            return Err(PackError::Corrupt(format!(
                "block at offset {} released twice",
                offset
            )));
        }
        if self.free.len() >= self.capacity {
            return Err(PackError::Capacity {
                what: "free block registry",
                limit: self.capacity,
            });
        }

        self.free.push_back(offset);
        self.members.insert(offset);
        Ok(())
    }

    /// Release every offset in `offsets`, or none of them
    pub fn release_all(&mut self, offsets: &[u64]) -> Result<()> {
        if self.free.len() + offsets.len() > self.capacity {
            return Err(PackError::Capacity {
                what: "free block registry",
                limit: self.capacity,
            });
        }
        for &offset in offsets {
            self.release(offset)?;
        }
        Ok(())
    }

    /// Make a freshly grown block available
    pub fn register_new_block(&mut self, offset: u64) -> Result<()> {
        tracing::debug!(offset, "registered new free block");
        self.release(offset)
    }

    /// Forget every free offset
    pub fn clear(&mut self) {
        self.free.clear();
        self.members.clear();
    }

    /// Whether `offset` is currently free
    pub fn contains(&self, offset: u64) -> bool {
        self.members.contains(&offset)
    }

    /// Free offsets, oldest first
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.free.iter().copied()
    }

    /// Number of free offsets
    pub fn len(&self) -> usize {
        self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// Maximum number of offsets held at once
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
