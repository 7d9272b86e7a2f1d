//! Expression compilation.
//!
//! Expressions compile to code that leaves exactly one value on the stack.
//!
//! | Expression | Key Operations | Stack Effect |
//! |------------|----------------|--------------|
//! | Literal | `PushNumber`/`PushString`/... | Push value |
//! | Identifier | `LoadName` | Push value |
//! | Binary | `Add`/`Sub`/etc | Pop 2, push 1 |
//! | Unary | `Neg`/`Not`/etc | Pop 1, push 1 |
//! | Assignment | `ResolveName`/`ResolveIndex`, `Assign` | Push stored value |
//! | Call | `Call`/`CallRef` | Pop N+1, push result |
//! | Member | `GetMember`/`GetIndex` | Pop 1-2, push 1 |
//! | Array | `NewArray` | Pop N, push 1 |
//! | Object | `NewObject`, `SetProperty` | Push 1 |
//! | Conditional | `JumpIfFalseOrPop`, `Jump` | Pop 1, push 1 |
//!
//! ## References
//!
//! Assignment, update, `delete`, `typeof` and calls work on references.
//! Resolution looks the same whatever the surface syntax:
//!
//! ```text
//! x          ResolveName "x" <auto-create>
//! obj[key]   [obj] [key] ResolveIndex
//! obj.name   [obj] PushName "name" ResolveIndex
//! ```
//!
//! ## Compound Assignment
//!
//! ```text
//! Expression: a.b += c
//!
//! Bytecode:
//!   [a] PushName "b" ResolveIndex   ; stack: [ref]
//!   Deref                           ; stack: [ref, old]
//!   [c]                             ; stack: [ref, old, c]
//!   Add                             ; stack: [ref, new]
//!   Assign                          ; stack: [new]
//! ```
//!
//! ## Logical Operators (Short-Circuit)
//!
//! ```text
//! Expression: a && b
//!
//! Bytecode:
//!   [compile a]
//!   JumpIfFalseOrPop end  ; falsy: keep a, skip b
//!   [compile b]
//! end:
//! ```

use crate::ast::*;
use crate::compiler::bytecode::{Instruction, OpCode, Operand, PredefinedError};
use crate::error::Flow;

use super::Compiler;

impl<'a> Compiler<'_, 'a> {
    /// Compiles one expression; net stack effect +1.
    pub(crate) fn compile_expression(&mut self, expr: &'a Expression) -> Flow<()> {
        match expr {
            Expression::Literal(lit) => self.compile_literal(lit),
            Expression::Identifier(id) => {
                let name = self.intern(&id.name)?;
                self.emit(Instruction::with_operand(OpCode::LoadName, Operand::Name(name)))?;
                Ok(())
            }
            Expression::This => {
                self.emit_op(OpCode::PushThis)?;
                Ok(())
            }
            Expression::Function(func) => {
                self.emit(Instruction::with_operand(
                    OpCode::PushFunction,
                    Operand::Function(func),
                ))?;
                Ok(())
            }
            Expression::Array(arr) => self.compile_array(arr),
            Expression::Object(obj) => self.compile_object(obj),
            Expression::Member(member) => self.compile_member(member),
            Expression::Call(call) => {
                self.compile_call(&call.callee, &call.arguments, OpCode::Call, OpCode::CallRef)
            }
            Expression::New(new_expr) => {
                self.compile_call(&new_expr.callee, &new_expr.arguments, OpCode::New, OpCode::NewRef)
            }
            Expression::Unary(un) => self.compile_unary(un),
            Expression::Update(update) => self.compile_update(update),
            Expression::Binary(bin) => self.compile_binary(bin),
            Expression::Logical(logical) => self.compile_logical(logical),
            Expression::Assignment(assign) => self.compile_assignment(assign),
            Expression::Conditional(cond) => self.compile_conditional(cond),
            Expression::Sequence(seq) => self.compile_sequence(seq),
        }
    }

    fn compile_literal(&mut self, lit: &Literal) -> Flow<()> {
        let instruction = match lit {
            Literal::Number(n) => Instruction::with_operand(OpCode::PushNumber, Operand::Number(*n)),
            Literal::String(s) => {
                Instruction::with_operand(OpCode::PushString, Operand::Raw(self.copy_str(s)?))
            }
            Literal::RegExp { pattern, flags } => Instruction::with_operands(
                OpCode::PushRegExp,
                Operand::Raw(self.copy_str(pattern)?),
                Operand::Raw(self.copy_str(flags)?),
            ),
            Literal::Boolean(true) => Instruction::simple(OpCode::PushTrue),
            Literal::Boolean(false) => Instruction::simple(OpCode::PushFalse),
            Literal::Null => Instruction::simple(OpCode::PushNull),
            Literal::Undefined => Instruction::simple(OpCode::PushUndefined),
        };
        self.emit(instruction)?;
        Ok(())
    }

    /// Emits the lvalue-resolution sequence for `expr`, leaving one
    /// reference on the stack.
    ///
    /// Returns `false`, having emitted nothing, when `expr` is not a
    /// reference.
    fn compile_reference(&mut self, expr: &'a Expression, auto_create: bool) -> Flow<bool> {
        match expr {
            Expression::Identifier(id) => {
                let name = self.intern(&id.name)?;
                self.emit(Instruction::with_operands(
                    OpCode::ResolveName,
                    Operand::Name(name),
                    Operand::Flag(auto_create),
                ))?;
            }
            Expression::Member(member) => {
                self.compile_expression(&member.object)?;
                self.compile_property_key(&member.property)?;
                self.emit_op(OpCode::ResolveIndex)?;
            }
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// Pushes the key of a member access: the interned name for `obj.name`,
    /// the computed value for `obj[expr]`.
    fn compile_property_key(&mut self, property: &'a MemberProperty) -> Flow<()> {
        match property {
            MemberProperty::Identifier(id) => {
                let name = self.intern(&id.name)?;
                self.emit(Instruction::with_operand(OpCode::PushName, Operand::Name(name)))?;
                Ok(())
            }
            MemberProperty::Expression(key) => self.compile_expression(key),
        }
    }

    fn compile_member(&mut self, member: &'a MemberExpression) -> Flow<()> {
        self.compile_expression(&member.object)?;

        match &member.property {
            MemberProperty::Identifier(id) => {
                let name = self.intern(&id.name)?;
                self.emit(Instruction::with_operand(OpCode::GetMember, Operand::Name(name)))?;
            }
            MemberProperty::Expression(key) => {
                self.compile_expression(key)?;
                self.emit_op(OpCode::GetIndex)?;
            }
        }
        Ok(())
    }

    /// Compiles a call or `new`. Identifier and member callees go through a
    /// reference so the interpreter can bind the receiver.
    fn compile_call(
        &mut self,
        callee: &'a Expression,
        arguments: &'a [Expression],
        plain: OpCode,
        by_reference: OpCode,
    ) -> Flow<()> {
        let opcode = if self.compile_reference(callee, false)? {
            by_reference
        } else {
            self.compile_expression(callee)?;
            plain
        };

        for arg in arguments {
            self.compile_expression(arg)?;
        }

        let argc = Self::count(arguments.len())?;
        self.emit(Instruction::with_operand(opcode, argc))?;
        Ok(())
    }

    fn compile_array(&mut self, arr: &'a ArrayExpression) -> Flow<()> {
        for elem in &arr.elements {
            match elem {
                Some(expr) => self.compile_expression(expr)?,
                None => {
                    self.emit_op(OpCode::PushUndefined)?;
                }
            }
        }

        let count = Self::count(arr.elements.len())?;
        self.emit(Instruction::with_operand(OpCode::NewArray, count))?;
        Ok(())
    }

    fn compile_object(&mut self, obj: &'a ObjectExpression) -> Flow<()> {
        self.emit_op(OpCode::NewObject)?;

        for prop in &obj.properties {
            self.compile_expression(&prop.value)?;
            let key = match &prop.key {
                PropertyKey::Identifier(id) => self.intern(&id.name)?,
                PropertyKey::String(s) => self.intern(s)?,
                PropertyKey::Number(n) => self.intern(&number_key(*n))?,
            };
            self.emit(Instruction::with_operand(OpCode::SetProperty, Operand::Name(key)))?;
        }
        Ok(())
    }

    fn compile_unary(&mut self, un: &'a UnaryExpression) -> Flow<()> {
        let opcode = match un.operator {
            UnaryOperator::Delete => {
                if self.compile_reference(&un.argument, false)? {
                    self.emit_op(OpCode::Delete)?;
                } else {
                    self.compile_invalid_target(&un.argument, PredefinedError::InvalidDelete)?;
                }
                return Ok(());
            }
            UnaryOperator::Typeof => {
                // typeof on an undeclared name must not throw, so it reads
                // through a reference.
                if self.compile_reference(&un.argument, false)? {
                    self.emit_op(OpCode::TypeOfRef)?;
                    return Ok(());
                }
                OpCode::TypeOf
            }
            UnaryOperator::Minus => OpCode::Neg,
            UnaryOperator::Plus => OpCode::Plus,
            UnaryOperator::LogicalNot => OpCode::Not,
            UnaryOperator::BitwiseNot => OpCode::BitNot,
            UnaryOperator::Void => OpCode::Void,
        };

        self.compile_expression(&un.argument)?;
        self.emit_op(opcode)?;
        Ok(())
    }

    /// Compile ++/-- expressions.
    fn compile_update(&mut self, update: &'a UpdateExpression) -> Flow<()> {
        if !self.compile_reference(&update.argument, false)? {
            return self.compile_invalid_target(&update.argument, PredefinedError::IllegalAssignment);
        }

        let opcode = match (update.operator, update.prefix) {
            (UpdateOperator::Increment, true) => OpCode::PreInc,
            (UpdateOperator::Decrement, true) => OpCode::PreDec,
            (UpdateOperator::Increment, false) => OpCode::PostInc,
            (UpdateOperator::Decrement, false) => OpCode::PostDec,
        };
        self.emit_op(opcode)?;
        Ok(())
    }

    fn compile_binary(&mut self, bin: &'a BinaryExpression) -> Flow<()> {
        self.compile_expression(&bin.left)?;
        self.compile_expression(&bin.right)?;
        self.emit_op(binary_opcode(bin.operator))?;
        Ok(())
    }

    /// Compile logical AND/OR with short-circuit evaluation.
    fn compile_logical(&mut self, logical: &'a LogicalExpression) -> Flow<()> {
        self.compile_expression(&logical.left)?;

        let short_circuit = self.emit_jump(match logical.operator {
            LogicalOperator::And => OpCode::JumpIfFalseOrPop,
            LogicalOperator::Or => OpCode::JumpIfTrueOrPop,
        })?;

        self.compile_expression(&logical.right)?;
        self.patch_jump(short_circuit);
        Ok(())
    }

    fn compile_assignment(&mut self, assign: &'a AssignmentExpression) -> Flow<()> {
        if !self.compile_reference(&assign.left, true)? {
            return self.compile_invalid_target(&assign.left, PredefinedError::IllegalAssignment);
        }

        match assign.operator.binary_operator() {
            None => self.compile_expression(&assign.right)?,
            Some(operator) => {
                self.emit_op(OpCode::Deref)?;
                self.compile_expression(&assign.right)?;
                self.emit_op(binary_opcode(operator))?;
            }
        }

        self.emit_op(OpCode::Assign)?;
        Ok(())
    }

    /// Evaluates a non-reference target for its side effects, then raises
    /// `error` at run time in place of the assignment.
    fn compile_invalid_target(&mut self, target: &'a Expression, error: PredefinedError) -> Flow<()> {
        self.compile_expression(target)?;
        self.emit(Instruction::with_operand(OpCode::ThrowError, Operand::Error(error)))?;
        Ok(())
    }

    fn compile_conditional(&mut self, cond: &'a ConditionalExpression) -> Flow<()> {
        self.compile_expression(&cond.test)?;

        let jump_to_alternate = self.emit_jump(OpCode::JumpIfFalseOrPop)?;
        self.compile_expression(&cond.consequent)?;
        let jump_to_end = self.emit_jump(OpCode::Jump)?;

        // The false edge still carries the test value.
        self.patch_jump(jump_to_alternate);
        self.emit_op(OpCode::Pop)?;
        self.compile_expression(&cond.alternate)?;

        self.patch_jump(jump_to_end);
        Ok(())
    }

    /// Compile sequence (comma) expressions.
    fn compile_sequence(&mut self, seq: &'a SequenceExpression) -> Flow<()> {
        if seq.expressions.is_empty() {
            self.emit_op(OpCode::PushUndefined)?;
            return Ok(());
        }

        for (i, expr) in seq.expressions.iter().enumerate() {
            if i > 0 {
                self.emit_op(OpCode::Pop)?;
            }
            self.compile_expression(expr)?;
        }
        Ok(())
    }
}

/// Opcode applying a binary operator.
pub(crate) fn binary_opcode(operator: BinaryOperator) -> OpCode {
    match operator {
        BinaryOperator::Add => OpCode::Add,
        BinaryOperator::Subtract => OpCode::Sub,
        BinaryOperator::Multiply => OpCode::Mul,
        BinaryOperator::Divide => OpCode::Div,
        BinaryOperator::Modulo => OpCode::Mod,
        BinaryOperator::Equal => OpCode::Eq,
        BinaryOperator::NotEqual => OpCode::Ne,
        BinaryOperator::StrictEqual => OpCode::StrictEq,
        BinaryOperator::StrictNotEqual => OpCode::StrictNe,
        BinaryOperator::LessThan => OpCode::Lt,
        BinaryOperator::LessThanEqual => OpCode::Le,
        BinaryOperator::GreaterThan => OpCode::Gt,
        BinaryOperator::GreaterThanEqual => OpCode::Ge,
        BinaryOperator::BitwiseAnd => OpCode::BitAnd,
        BinaryOperator::BitwiseOr => OpCode::BitOr,
        BinaryOperator::BitwiseXor => OpCode::BitXor,
        BinaryOperator::LeftShift => OpCode::Shl,
        BinaryOperator::RightShift => OpCode::Shr,
        BinaryOperator::UnsignedRightShift => OpCode::Ushr,
        BinaryOperator::In => OpCode::In,
        BinaryOperator::InstanceOf => OpCode::InstanceOf,
    }
}

/// Property name for a numeric object-literal key.
fn number_key(n: f64) -> String {
    if n == 0.0 {
        "0".to_string()
    } else if n.is_infinite() {
        if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else {
        n.to_string()
    }
}
