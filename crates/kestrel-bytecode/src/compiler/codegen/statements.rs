//! Statement compilation.
//!
//! Every statement leaves exactly one completion value on the stack.
//!
//! | Statement | Key Operations | Notes |
//! |-----------|----------------|-------|
//! | block | `Pop` between children | Empty block pushes undefined |
//! | `var` | `StoreVar` | Completion is undefined |
//! | `if/else` | `JumpIfFalse`, `Jump` | Missing else pushes undefined |
//! | `while` | `JumpIfFalse`, `Jump` (back) | Seeded with undefined |
//! | `do-while` | `JumpIfFalse`, `Jump` (back) | Tests after the body |
//! | `for` | Multiple jumps | Init, test, body, update |
//! | anything else | `Escape` | Handed to the tree walker |
//!
//! ### While Loop
//!
//! ```text
//!   PushUndefined           ; completion if the body never runs
//! test:
//!   [condition]
//!   JumpIfFalse -> end
//!   Pop                     ; drop the previous completion
//!   [body]
//!   Jump -> test
//! end:
//! ```
//!
//! ### Escapes inside loops
//!
//! Loop bodies compile with escapes disabled. A body statement without a
//! bytecode mapping bails with `NotImplemented`; the loop rewinds the buffer
//! to its own start and becomes a single `Escape`, so a loop is either
//! bytecode throughout or handed over whole.

use tracing::debug;

use crate::ast::*;
use crate::compiler::bytecode::{Instruction, OpCode, Operand};
use crate::error::{Bail, Flow};

use super::Compiler;

impl<'a> Compiler<'_, 'a> {
    /// Compiles one statement; net stack effect +1.
    pub(crate) fn compile_statement(&mut self, stmt: &'a Statement) -> Flow<()> {
        match stmt {
            Statement::Block(block) => self.compile_block(&block.body),
            Statement::Expression(expr) => self.compile_expression(&expr.expression),
            Statement::VariableDeclaration(decl) => self.compile_variable_declaration(decl),
            Statement::If(if_stmt) => self.compile_if_statement(if_stmt),
            Statement::While(while_stmt) => {
                self.compile_loop(stmt, |c| c.compile_while_statement(while_stmt))
            }
            Statement::DoWhile(do_while) => {
                self.compile_loop(stmt, |c| c.compile_do_while_statement(do_while))
            }
            Statement::For(for_stmt) => self.compile_loop(stmt, |c| c.compile_for_statement(for_stmt)),
            Statement::Empty => {
                self.emit_op(OpCode::PushUndefined)?;
                Ok(())
            }
            Statement::ForIn(_)
            | Statement::Return(_)
            | Statement::Break(_)
            | Statement::Continue(_)
            | Statement::Throw(_)
            | Statement::Try(_)
            | Statement::Switch(_)
            | Statement::With(_)
            | Statement::Labeled(_)
            | Statement::FunctionDeclaration(_) => self.compile_escape(stmt),
        }
    }

    /// Compiles statements so that only the last one's value survives.
    pub(crate) fn compile_block(&mut self, body: &'a [Statement]) -> Flow<()> {
        if body.is_empty() {
            self.emit_op(OpCode::PushUndefined)?;
            return Ok(());
        }

        for (i, stmt) in body.iter().enumerate() {
            if i > 0 {
                self.emit_op(OpCode::Pop)?;
            }
            self.compile_statement(stmt)?;
        }
        Ok(())
    }

    /// Hands `stmt` to the tree walker, or bails when escapes are disabled.
    fn compile_escape(&mut self, stmt: &'a Statement) -> Flow<()> {
        if self.escape_disabled {
            return Err(Bail::NotImplemented);
        }
        self.emit(Instruction::with_operand(OpCode::Escape, Operand::Statement(stmt)))?;
        Ok(())
    }

    /// Runs a loop compiler with escapes disabled. If the loop cannot be
    /// compiled completely, everything it emitted is discarded and the whole
    /// loop becomes one escape.
    fn compile_loop(
        &mut self,
        stmt: &'a Statement,
        compile: impl FnOnce(&mut Self) -> Flow<()>,
    ) -> Flow<()> {
        let start = self.position();
        let outer = std::mem::replace(&mut self.escape_disabled, true);
        let result = compile(self);
        self.escape_disabled = outer;

        match result {
            Err(Bail::NotImplemented) => {
                debug!(
                    kind = stmt.kind_name(),
                    start,
                    discarded = self.position() - start,
                    "loop needs the tree walker, escaping it whole"
                );
                self.code.rewind(start);
                self.compile_escape(stmt)
            }
            other => other,
        }
    }

    fn compile_variable_declaration(&mut self, decl: &'a VariableDeclaration) -> Flow<()> {
        for declarator in &decl.declarations {
            // Uninitialized declarators are left to the interpreter's hoisting.
            let Some(init) = &declarator.init else {
                continue;
            };
            self.compile_expression(init)?;
            let name = self.intern(&declarator.id.name)?;
            self.emit(Instruction::with_operand(OpCode::StoreVar, Operand::Name(name)))?;
        }

        self.emit_op(OpCode::PushUndefined)?;
        Ok(())
    }

    fn compile_if_statement(&mut self, if_stmt: &'a IfStatement) -> Flow<()> {
        self.compile_expression(&if_stmt.test)?;
        let jump_to_else = self.emit_jump(OpCode::JumpIfFalse)?;

        self.compile_statement(&if_stmt.consequent)?;
        let jump_to_end = self.emit_jump(OpCode::Jump)?;

        self.patch_jump(jump_to_else);
        match &if_stmt.alternate {
            Some(alternate) => self.compile_statement(alternate)?,
            None => {
                self.emit_op(OpCode::PushUndefined)?;
            }
        }

        self.patch_jump(jump_to_end);
        Ok(())
    }

    fn compile_while_statement(&mut self, while_stmt: &'a WhileStatement) -> Flow<()> {
        self.emit_op(OpCode::PushUndefined)?;

        let test = self.position();
        self.compile_expression(&while_stmt.test)?;
        let jump_to_end = self.emit_jump(OpCode::JumpIfFalse)?;
        self.emit_op(OpCode::Pop)?;

        self.compile_statement(&while_stmt.body)?;
        self.emit_jump_to(OpCode::Jump, test)?;

        self.patch_jump(jump_to_end);
        Ok(())
    }

    fn compile_do_while_statement(&mut self, do_while: &'a DoWhileStatement) -> Flow<()> {
        let loop_start = self.position();
        self.compile_statement(&do_while.body)?;

        self.compile_expression(&do_while.test)?;
        let jump_to_end = self.emit_jump(OpCode::JumpIfFalse)?;
        self.emit_op(OpCode::Pop)?;
        self.emit_jump_to(OpCode::Jump, loop_start)?;

        self.patch_jump(jump_to_end);
        Ok(())
    }

    fn compile_for_statement(&mut self, for_stmt: &'a ForStatement) -> Flow<()> {
        if let Some(init) = &for_stmt.init {
            match init {
                ForInit::Declaration(decl) => self.compile_variable_declaration(decl)?,
                ForInit::Expression(expr) => self.compile_expression(expr)?,
            }
            self.emit_op(OpCode::Pop)?;
        }

        self.emit_op(OpCode::PushUndefined)?;

        let test = self.position();
        let jump_to_end = match &for_stmt.test {
            Some(condition) => {
                self.compile_expression(condition)?;
                Some(self.emit_jump(OpCode::JumpIfFalse)?)
            }
            None => None,
        };
        self.emit_op(OpCode::Pop)?;

        self.compile_statement(&for_stmt.body)?;

        if let Some(update) = &for_stmt.update {
            self.compile_expression(update)?;
            self.emit_op(OpCode::Pop)?;
        }

        self.emit_jump_to(OpCode::Jump, test)?;

        if let Some(jump) = jump_to_end {
            self.patch_jump(jump);
        }
        Ok(())
    }
}
