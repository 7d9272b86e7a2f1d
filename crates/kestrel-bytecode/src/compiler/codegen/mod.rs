//! Code generation from AST to bytecode.
//!
//! This module contains the `Compiler` context which lowers a borrowed AST
//! into the instruction buffer of a [`crate::CompilationUnit`]. Expression
//! lowering lives in `expressions`, statement lowering in `statements`.
//!
//! Every expression compiles to code with a net stack effect of +1, and so
//! does every statement (its completion value).

mod expressions;
mod statements;


use crate::compiler::arena::Arena;
use crate::compiler::bytecode::{Bytecode, Instruction, OpCode, Operand};
use crate::compiler::strings::{StrHandle, StringPool};
use crate::error::{CompileError, Flow, Region};

/// Compiles AST nodes into one unit's buffers.
///
/// All state the recursive compile needs travels in this one value; there
/// is no global state, so independent units can be compiled side by side.
pub struct Compiler<'u, 'a> {
    /// The instruction buffer being appended to
    code: &'u mut Bytecode<'a>,
    /// Pool for identifier and property names
    strings: &'u mut StringPool,
    /// Arena for copied literal text
    arena: &'a Arena,
    /// Set while compiling a loop: unsupported statements bail with
    /// `NotImplemented` instead of emitting an escape
    escape_disabled: bool,
}

impl<'u, 'a> Compiler<'u, 'a> {
    /// Creates a compiler appending to the given buffers.
    pub(crate) fn new(
        code: &'u mut Bytecode<'a>,
        strings: &'u mut StringPool,
        arena: &'a Arena,
        escape_disabled: bool,
    ) -> Self {
        Self {
            code,
            strings,
            arena,
            escape_disabled,
        }
    }

    // ========================================================================
    // Utilities
    // ========================================================================

    fn emit(&mut self, instruction: Instruction<'a>) -> Flow<usize> {
        Ok(self.code.emit(instruction)?)
    }

    pub(crate) fn emit_op(&mut self, opcode: OpCode) -> Flow<usize> {
        self.emit(Instruction::simple(opcode))
    }

    /// Reserves a jump whose target is not known yet.
    ///
    /// The returned index must be passed to [`Compiler::patch_jump`] before
    /// the reserving compile call returns.
    fn emit_jump(&mut self, opcode: OpCode) -> Flow<usize> {
        debug_assert!(opcode.is_jump());
        self.emit(Instruction::with_operand(opcode, Operand::Pending))
    }

    /// Emits a jump to an already known (backward) target.
    fn emit_jump_to(&mut self, opcode: OpCode, target: usize) -> Flow<usize> {
        debug_assert!(target <= self.position());
        self.emit(Instruction::with_operand(opcode, Operand::Jump(target)))
    }

    /// Points a reserved jump at the current end of the buffer.
    fn patch_jump(&mut self, at: usize) {
        debug_assert!(
            matches!(self.code.get(at).and_then(|inst| inst.operand.as_ref()), Some(Operand::Pending)),
            "jump at {at} patched twice or never reserved"
        );
        let target = self.position();
        self.code.set_operand(at, Operand::Jump(target));
    }

    /// Index of the next instruction.
    fn position(&self) -> usize {
        self.code.len()
    }

    fn intern(&mut self, text: &str) -> Flow<StrHandle> {
        Ok(self.strings.intern(text)?)
    }

    fn copy_str(&self, text: &str) -> Flow<&'a str> {
        Ok(self.arena.alloc_str(text)?)
    }

    fn count(len: usize) -> Flow<Operand<'a>> {
        u32::try_from(len)
            .map(Operand::Count)
            .map_err(|_| CompileError::OutOfMemory(Region::Instructions).into())
    }
}
