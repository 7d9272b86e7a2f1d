//! Compilation unit configuration.

use crate::compiler::arena::Arena;

/// Initial instruction buffer capacity.
pub const DEFAULT_CODE_CAPACITY: usize = 64;

/// Initial string pool capacity.
pub const DEFAULT_STRING_CAPACITY: usize = 8;

/// Options applied when a [`crate::CompilationUnit`] lazily creates its
/// buffers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitConfig {
    /// Instruction buffer capacity on first use; doubles on overflow
    pub initial_code_capacity: usize,
    /// String pool capacity on first use; doubles on overflow
    pub initial_string_capacity: usize,
    /// Upper bound on emitted instructions, reported as out of memory
    pub max_instructions: Option<usize>,
    /// Byte limit for the literal arena
    pub arena_limit: Option<usize>,
    /// Whether statements without a bytecode mapping become escape
    /// instructions at the top level
    pub allow_escape: bool,
}

impl Default for UnitConfig {
    fn default() -> Self {
        Self {
            initial_code_capacity: DEFAULT_CODE_CAPACITY,
            initial_string_capacity: DEFAULT_STRING_CAPACITY,
            max_instructions: None,
            arena_limit: None,
            allow_escape: true,
        }
    }
}

impl UnitConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the initial instruction buffer capacity (at least 1).
    pub fn with_code_capacity(mut self, capacity: usize) -> Self {
        self.initial_code_capacity = capacity.max(1);
        self
    }

    /// Sets the initial string pool capacity (at least 1).
    pub fn with_string_capacity(mut self, capacity: usize) -> Self {
        self.initial_string_capacity = capacity.max(1);
        self
    }

    /// Caps the number of instructions the unit may hold.
    pub fn with_max_instructions(mut self, limit: usize) -> Self {
        self.max_instructions = Some(limit);
        self
    }

    /// Caps the bytes the literal arena may allocate.
    pub fn with_arena_limit(mut self, bytes: usize) -> Self {
        self.arena_limit = Some(bytes);
        self
    }

    /// Enables or disables top-level escape instructions.
    pub fn with_escape(mut self, allow: bool) -> Self {
        self.allow_escape = allow;
        self
    }

    /// Creates an arena honoring [`UnitConfig::arena_limit`].
    pub fn arena(&self) -> Arena {
        Arena::with_limit(self.arena_limit)
    }
}
