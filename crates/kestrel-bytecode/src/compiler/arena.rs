//! Bump arena for literal text referenced by instructions.
//!
//! String and regular-expression literals are copied here once and the
//! instructions carry plain `&str` slices into it. Nothing is freed
//! piecewise; everything goes when the arena is dropped.
//!
//! ```text
//! ┌──────────────────────────────────────────┐
//! │ chunk                                    │
//! │ ["hello"]["^a+$"]["gi"]    [free space]  │
//! └──────────────────────────────────────────┘
//! ```

use std::alloc::Layout;

use bumpalo::Bump;

use crate::error::{CompileError, Region, Result};

/// Literal arena shared by one compilation unit.
#[derive(Debug, Default)]
pub struct Arena {
    bump: Bump,
}

impl Arena {
    /// Creates an unbounded arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an arena that refuses to allocate more than `limit` bytes.
    pub fn with_limit(limit: Option<usize>) -> Self {
        let bump = Bump::new();
        bump.set_allocation_limit(limit);
        Self { bump }
    }

    /// Copies `text` into the arena.
    pub fn alloc_str(&self, text: &str) -> Result<&str> {
        if text.is_empty() {
            return Ok("");
        }

        let layout = Layout::for_value(text.as_bytes());
        let ptr = self
            .bump
            .try_alloc_layout(layout)
            .map_err(|_| CompileError::OutOfMemory(Region::Arena))?;

        // SAFETY: `ptr` is a fresh allocation of exactly `text.len()` bytes
        // owned by the bump for as long as `self` is borrowed, and the bytes
        // copied into it come from a valid `str`.
        unsafe {
            std::ptr::copy_nonoverlapping(text.as_ptr(), ptr.as_ptr(), text.len());
            let bytes = std::slice::from_raw_parts(ptr.as_ptr(), text.len());
            Ok(std::str::from_utf8_unchecked(bytes))
        }
    }

    /// Bytes handed out by the underlying allocator so far.
    pub fn allocated_bytes(&self) -> usize {
        self.bump.allocated_bytes()
    }
}
