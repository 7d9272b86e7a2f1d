// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! Error types for the bytecode compiler

use std::fmt;
use thiserror::Error;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// The storage that failed to grow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    /// The instruction buffer
    Instructions,
    /// The interned string pool
    Strings,
    /// The literal arena
    Arena,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::Instructions => write!(f, "instruction buffer"),
            Region::Strings => write!(f, "string pool"),
            Region::Arena => write!(f, "arena"),
        }
    }
}

/// Errors reported by the public compilation entry points.
///
/// A unit that returned [`CompileError::OutOfMemory`] must be discarded;
/// nothing inside it is cleaned up.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// An allocation failed
    #[error("out of memory while growing the {0}")]
    OutOfMemory(Region),

    /// The statement has no bytecode mapping and escape instructions are
    /// disabled for this unit; evaluate the statement with the tree walker.
    #[error("statement requires tree-walking evaluation")]
    TreeWalkRequired,
}

/// Internal control signal threaded through the recursive compiler.
///
/// `NotImplemented` means "no direct bytecode mapping here" and is only ever
/// caught by the loop compilers or converted at the entry points.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Bail {
    Fatal(CompileError),
    NotImplemented,
}

impl From<CompileError> for Bail {
    fn from(err: CompileError) -> Self {
        Bail::Fatal(err)
    }
}

pub(crate) type Flow<T> = std::result::Result<T, Bail>;

/// Violations found by [`crate::compiler::verify`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// The entry offset is past the end of the buffer
    #[error("entry offset {start} is outside the buffer (length {len})")]
    BadEntry {
        /// Requested start offset
        start: usize,
        /// Buffer length
        len: usize,
    },

    /// A reserved jump was never patched
    #[error("jump at {at} was never patched")]
    UnpatchedJump {
        /// Offset of the jump instruction
        at: usize,
    },

    /// A jump points past the end of the buffer
    #[error("jump at {at} targets {target}, past the buffer end {len}")]
    TargetOutOfRange {
        /// Offset of the jump instruction
        at: usize,
        /// The target operand
        target: usize,
        /// Buffer length
        len: usize,
    },

    /// Two paths reach one instruction with different stack depths
    #[error("inconsistent stack depth at {at}: {expected} vs {found}")]
    DepthMismatch {
        /// Offset of the join point
        at: usize,
        /// Depth recorded first
        expected: usize,
        /// Depth found on another path
        found: usize,
    },

    /// An instruction pops more values than the stack holds
    #[error("stack underflow at {at}")]
    Underflow {
        /// Offset of the instruction
        at: usize,
    },

    /// A return leaves other than exactly one value
    #[error("return at {at} leaves {depth} values on the stack")]
    Unbalanced {
        /// Offset of the return
        at: usize,
        /// Stack depth at the return
        depth: usize,
    },

    /// Execution runs off the end of the buffer without returning
    #[error("control falls off the end of the buffer")]
    FellOffEnd,

    /// A jump operand has the wrong shape
    #[error("malformed operand at {at}")]
    MalformedOperand {
        /// Offset of the instruction
        at: usize,
    },
}
