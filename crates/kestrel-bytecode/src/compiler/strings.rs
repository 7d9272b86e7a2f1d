//! Interned string pool.
//!
//! Every call to [`StringPool::intern`] stores an independent owned copy;
//! equal text is not deduplicated, so two handles never alias.

use tracing::trace;

use crate::config::DEFAULT_STRING_CAPACITY;
use crate::error::{CompileError, Region, Result};

/// Handle to a string in a [`StringPool`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrHandle(u32);

impl StrHandle {
    /// Position of the entry in its pool.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Growable pool of owned string constants.
#[derive(Debug)]
pub struct StringPool {
    entries: Vec<Box<str>>,
}

impl StringPool {
    /// Creates an empty pool with the default capacity.
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_STRING_CAPACITY)
    }

    /// Creates an empty pool with room for `capacity` entries.
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(capacity.max(1))
            .map_err(|_| CompileError::OutOfMemory(Region::Strings))?;
        Ok(Self { entries })
    }

    /// Copies `text` into the pool and returns a handle to the copy.
    pub fn intern(&mut self, text: &str) -> Result<StrHandle> {
        if self.entries.len() == self.entries.capacity() {
            let capacity = self.entries.capacity().max(1);
            self.entries
                .try_reserve_exact(capacity)
                .map_err(|_| CompileError::OutOfMemory(Region::Strings))?;
            trace!(from = capacity, to = self.entries.capacity(), "grew string pool");
        }

        let mut owned = String::new();
        owned
            .try_reserve_exact(text.len())
            .map_err(|_| CompileError::OutOfMemory(Region::Strings))?;
        owned.push_str(text);

        let handle = u32::try_from(self.entries.len())
            .map(StrHandle)
            .map_err(|_| CompileError::OutOfMemory(Region::Strings))?;
        self.entries.push(owned.into_boxed_str());
        Ok(handle)
    }

    /// Resolves a handle to its text.
    pub fn get(&self, handle: StrHandle) -> Option<&str> {
        self.entries.get(handle.index()).map(|s| &**s)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.entries.capacity()
    }
}
