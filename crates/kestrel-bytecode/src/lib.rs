// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright (c) 2025 Pegasus Heavy Industries, LLC

//! # kestrel-bytecode
//!
//! Single-pass compiler that lowers a script AST into a linear stack
//! bytecode for the Kestrel interpreter.
//!
//! ## Overview
//!
//! This crate provides:
//! - An ESTree-style AST the compiler borrows from
//! - Compilation units with growable instruction and string buffers
//! - Escape instructions that hand unsupported statements back to a
//!   tree-walking evaluator
//! - A stack-discipline verifier and a disassembler for tooling
//!
//! ## Quick Start
//!
//! ```rust
//! use kestrel_bytecode::ast::{BinaryExpression, BinaryOperator, Expression, Literal};
//! use kestrel_bytecode::{Arena, CompilationUnit};
//!
//! let expr = Expression::Binary(BinaryExpression {
//!     operator: BinaryOperator::Add,
//!     left: Box::new(Expression::Literal(Literal::Number(1.0))),
//!     right: Box::new(Expression::Literal(Literal::Number(2.0))),
//! });
//!
//! let arena = Arena::new();
//! let mut unit = CompilationUnit::new(&arena);
//! let start = unit.compile_expression(&expr)?;
//! assert_eq!(unit.len(), 4);
//! unit.verify(start).expect("balanced");
//! # Ok::<(), kestrel_bytecode::CompileError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod ast;
pub mod compiler;
pub mod config;
pub mod error;

// Re-exports for convenience
pub use compiler::arena::Arena;
pub use compiler::bytecode::{Instruction, OpCode, Operand, PredefinedError};
pub use compiler::unit::CompilationUnit;
pub use compiler::verify::StackReport;
pub use config::UnitConfig;
pub use error::{CompileError, Region, Result, VerifyError};
