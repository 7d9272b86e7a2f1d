//! Compilation units.
//!
//! A unit owns one instruction buffer and one string pool, and borrows the
//! arena its literal text is copied into. The buffers are created on first
//! use. Each entry point appends to the same buffers and returns the offset
//! where its code starts, so one unit can hold many independent entry points
//! sharing names and literals.
//!
//! # Lifetimes
//!
//! `'a` covers both the arena and the parse tree. Escape and function
//! instructions hold plain references into the tree, so the borrow checker
//! keeps the tree alive for as long as any unit compiled from it.

use tracing::{debug, warn};

use crate::ast::{Expression, Program, Statement};
use crate::compiler::arena::Arena;
use crate::compiler::bytecode::{Bytecode, Instruction, OpCode};
use crate::compiler::codegen::Compiler;
use crate::compiler::disasm::Listing;
use crate::compiler::strings::{StrHandle, StringPool};
use crate::compiler::verify::{self, StackReport};
use crate::config::UnitConfig;
use crate::error::{Bail, CompileError, Flow, Result, VerifyError};

/// One compiled unit: instructions, interned names and literal arena.
///
/// After an [`CompileError::OutOfMemory`] the unit is in an unspecified
/// state and must be discarded.
#[derive(Debug)]
pub struct CompilationUnit<'a> {
    arena: &'a Arena,
    config: UnitConfig,
    code: Option<Bytecode<'a>>,
    strings: Option<StringPool>,
}

impl<'a> CompilationUnit<'a> {
    /// Creates an empty unit with the default configuration.
    pub fn new(arena: &'a Arena) -> Self {
        Self::with_config(arena, UnitConfig::default())
    }

    /// Creates an empty unit with the given configuration.
    pub fn with_config(arena: &'a Arena, config: UnitConfig) -> Self {
        Self {
            arena,
            config,
            code: None,
            strings: None,
        }
    }

    /// Compiles an expression followed by `Return` and returns its start
    /// offset.
    pub fn compile_expression(&mut self, expr: &'a Expression) -> Result<usize> {
        self.compile_entry("expression", |compiler| compiler.compile_expression(expr))
    }

    /// Compiles statements followed by `Return` and returns the start offset.
    ///
    /// With `treat_as_block` and more than one statement, all of them are
    /// compiled as a block. Otherwise only the first statement is compiled;
    /// an empty slice compiles to `undefined`.
    pub fn compile_statement(
        &mut self,
        statements: &'a [Statement],
        treat_as_block: bool,
    ) -> Result<usize> {
        self.compile_entry("statement", |compiler| match statements {
            [] => compiler.compile_block(statements),
            [single] => compiler.compile_statement(single),
            many if treat_as_block => compiler.compile_block(many),
            [first, rest @ ..] => {
                warn!(ignored = rest.len(), "compiling only the first of several statements");
                compiler.compile_statement(first)
            }
        })
    }

    /// Compiles a whole program as one block.
    pub fn compile_program(&mut self, program: &'a Program) -> Result<usize> {
        self.compile_statement(&program.body, true)
    }

    fn compile_entry(
        &mut self,
        kind: &'static str,
        body: impl FnOnce(&mut Compiler<'_, 'a>) -> Flow<()>,
    ) -> Result<usize> {
        let code_capacity = self.config.initial_code_capacity;
        let limit = self.config.max_instructions;
        let code = match &mut self.code {
            Some(code) => code,
            slot => slot.insert(Bytecode::with_capacity(code_capacity, limit)?),
        };
        let strings = match &mut self.strings {
            Some(strings) => strings,
            slot => slot.insert(StringPool::with_capacity(self.config.initial_string_capacity)?),
        };

        let start = code.len();
        let mut compiler = Compiler::new(code, strings, self.arena, !self.config.allow_escape);
        let outcome = body(&mut compiler).and_then(|()| compiler.emit_op(OpCode::Return));

        match outcome {
            Ok(_) => {
                debug!(kind, start, emitted = code.len() - start, "compiled entry point");
                Ok(start)
            }
            Err(Bail::Fatal(err)) => Err(err),
            Err(Bail::NotImplemented) => {
                debug!(kind, start, "entry point needs the tree walker");
                code.rewind(start);
                Err(CompileError::TreeWalkRequired)
            }
        }
    }

    /// The configuration the unit was created with.
    pub fn config(&self) -> &UnitConfig {
        &self.config
    }

    /// The arena literal text is copied into.
    pub fn arena(&self) -> &'a Arena {
        self.arena
    }

    /// The instruction buffer, once anything has been compiled.
    pub fn bytecode(&self) -> Option<&Bytecode<'a>> {
        self.code.as_ref()
    }

    /// All emitted instructions.
    pub fn instructions(&self) -> &[Instruction<'a>] {
        match &self.code {
            Some(code) => code.instructions(),
            None => &[],
        }
    }

    /// The string pool, once anything has been compiled.
    pub fn strings(&self) -> Option<&StringPool> {
        self.strings.as_ref()
    }

    /// Resolves an interned name.
    pub fn name(&self, handle: StrHandle) -> Option<&str> {
        self.strings.as_ref().and_then(|strings| strings.get(handle))
    }

    /// Number of emitted instructions.
    pub fn len(&self) -> usize {
        self.instructions().len()
    }

    /// Whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.instructions().is_empty()
    }

    /// Checks the stack discipline of the entry point starting at `start`.
    pub fn verify(&self, start: usize) -> std::result::Result<StackReport, VerifyError> {
        verify::verify(self.instructions(), start)
    }

    /// Human-readable listing of every instruction.
    pub fn listing(&self) -> Listing<'_, 'a> {
        Listing::new(self.instructions(), self.strings.as_ref())
    }
}
