//! Bytecode definitions and the instruction buffer.

use std::fmt;

use tracing::trace;

use crate::ast::{FunctionExpression, Statement};
use crate::compiler::strings::StrHandle;
use crate::config::DEFAULT_CODE_CAPACITY;
use crate::error::{CompileError, Region, Result};

/// The growable instruction buffer of a compilation unit.
///
/// Instructions are addressed by index. Indices stay valid across growth,
/// which is why pending jumps are remembered as indices and patched through
/// [`Bytecode::set_operand`] instead of through a held reference.
#[derive(Debug)]
pub struct Bytecode<'a> {
    instructions: Vec<Instruction<'a>>,
    limit: Option<usize>,
}

impl<'a> Bytecode<'a> {
    /// Creates an empty buffer with the default initial capacity.
    pub fn new() -> Result<Self> {
        Self::with_capacity(DEFAULT_CODE_CAPACITY, None)
    }

    /// Creates an empty buffer with `capacity` slots and an optional hard
    /// instruction limit.
    pub fn with_capacity(capacity: usize, limit: Option<usize>) -> Result<Self> {
        let mut instructions = Vec::new();
        instructions
            .try_reserve_exact(capacity.max(1))
            .map_err(|_| CompileError::OutOfMemory(Region::Instructions))?;
        Ok(Self {
            instructions,
            limit,
        })
    }

    /// Appends an instruction and returns its index.
    pub fn emit(&mut self, instruction: Instruction<'a>) -> Result<usize> {
        let index = self.instructions.len();
        if self.limit.is_some_and(|limit| index >= limit) {
            return Err(CompileError::OutOfMemory(Region::Instructions));
        }
        if index == self.instructions.capacity() {
            self.grow()?;
        }
        self.instructions.push(instruction);
        Ok(index)
    }

    /// Doubles the capacity.
    fn grow(&mut self) -> Result<()> {
        let capacity = self.instructions.capacity().max(1);
        self.instructions
            .try_reserve_exact(capacity)
            .map_err(|_| CompileError::OutOfMemory(Region::Instructions))?;
        trace!(from = capacity, to = self.instructions.capacity(), "grew instruction buffer");
        Ok(())
    }

    /// Number of emitted instructions; also the index the next emit returns.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// Whether nothing has been emitted.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.instructions.capacity()
    }

    /// Returns the instruction at `index`.
    pub fn get(&self, index: usize) -> Option<&Instruction<'a>> {
        self.instructions.get(index)
    }

    /// All emitted instructions in order.
    pub fn instructions(&self) -> &[Instruction<'a>] {
        &self.instructions
    }

    /// Mutable view of the first operand of an already emitted instruction.
    ///
    /// The borrow ends before the next `emit`, so it can never dangle
    /// across growth.
    pub fn operand_at(&mut self, index: usize) -> Option<&mut Option<Operand<'a>>> {
        self.instructions.get_mut(index).map(|inst| &mut inst.operand)
    }

    /// Overwrites the first operand of the instruction at `index`.
    ///
    /// Returns `false` when `index` has not been emitted.
    pub fn set_operand(&mut self, index: usize, operand: Operand<'a>) -> bool {
        match self.operand_at(index) {
            Some(slot) => {
                *slot = Some(operand);
                true
            }
            None => false,
        }
    }

    /// Drops every instruction at or after `len`, keeping capacity.
    pub(crate) fn rewind(&mut self, len: usize) {
        self.instructions.truncate(len);
    }
}

/// A single bytecode instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction<'a> {
    /// The operation code
    pub opcode: OpCode,
    /// Optional first operand
    pub operand: Option<Operand<'a>>,
    /// Optional second operand
    pub extra: Option<Operand<'a>>,
}

impl<'a> Instruction<'a> {
    /// Creates a new instruction with no operand.
    pub fn simple(opcode: OpCode) -> Self {
        Self {
            opcode,
            operand: None,
            extra: None,
        }
    }

    /// Creates a new instruction with an operand.
    pub fn with_operand(opcode: OpCode, operand: Operand<'a>) -> Self {
        Self {
            opcode,
            operand: Some(operand),
            extra: None,
        }
    }

    /// Creates a new instruction with two operands.
    pub fn with_operands(opcode: OpCode, operand: Operand<'a>, extra: Operand<'a>) -> Self {
        Self {
            opcode,
            operand: Some(operand),
            extra: Some(extra),
        }
    }

    /// The jump target, if this is a patched jump.
    pub fn jump_target(&self) -> Option<usize> {
        match (self.opcode.is_jump(), &self.operand) {
            (true, Some(Operand::Jump(target))) => Some(*target),
            _ => None,
        }
    }

    /// Values popped and pushed when the instruction falls through.
    ///
    /// `ThrowError` is accounted as yielding a value in place of its operand
    /// so code after it stays balanced for analysis, even though it never
    /// completes at run time.
    pub fn stack_effect(&self) -> StackEffect {
        use OpCode::*;
        let count = match self.operand {
            Some(Operand::Count(n)) => n as usize,
            _ => 0,
        };
        let (pops, pushes) = match self.opcode {
            PushUndefined | PushNull | PushTrue | PushFalse | PushNumber | PushString
            | PushRegExp | PushThis | PushName | PushFunction => (0, 1),
            Pop => (1, 0),

            LoadName | ResolveName => (0, 1),
            StoreVar => (1, 0),
            ResolveIndex => (2, 1),
            Deref => (1, 2),
            Assign => (2, 1),

            GetMember => (1, 1),
            GetIndex => (2, 1),
            SetProperty => (2, 1),
            NewObject => (0, 1),
            NewArray => (count, 1),

            Add | Sub | Mul | Div | Mod | Shl | Shr | Ushr | BitAnd | BitOr | BitXor | Eq
            | Ne | StrictEq | StrictNe | Lt | Le | Gt | Ge | In | InstanceOf => (2, 1),

            Neg | Plus | Not | BitNot | TypeOf | TypeOfRef | Void | Delete => (1, 1),
            PreInc | PreDec | PostInc | PostDec => (1, 1),

            Jump => (0, 0),
            JumpIfFalse => (1, 0),
            // Fall-through pops the tested value; the taken edge keeps it.
            JumpIfFalseOrPop | JumpIfTrueOrPop => (1, 0),

            Call | CallRef | New | NewRef => (count + 1, 1),

            Escape => (0, 1),
            ThrowError => (1, 1),
            Return => (1, 0),
        };
        StackEffect { pops, pushes }
    }
}

/// Static stack effect of one instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StackEffect {
    /// Values consumed
    pub pops: usize,
    /// Values produced
    pub pushes: usize,
}

/// Errors the interpreter raises for code the compiler knew was invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredefinedError {
    /// Assignment or update of something that is not a reference
    IllegalAssignment,
    /// `delete` applied to something that is not a reference
    InvalidDelete,
}

impl fmt::Display for PredefinedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredefinedError::IllegalAssignment => write!(f, "illegal assignment target"),
            PredefinedError::InvalidDelete => write!(f, "invalid delete target"),
        }
    }
}

/// Instruction operands.
///
/// Borrowed operands point into the unit's arena or into the parse tree;
/// both outlive the unit by construction.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<'a> {
    /// Argument or element count
    Count(u32),
    /// Auto-create flag of a name resolution
    Flag(bool),
    /// Numeric literal
    Number(f64),
    /// Interned name in the unit's string pool
    Name(StrHandle),
    /// Raw literal text copied into the arena
    Raw(&'a str),
    /// Statement handed to the tree walker
    Statement(&'a Statement),
    /// Nested function literal
    Function(&'a FunctionExpression),
    /// Patched jump target (instruction index)
    Jump(usize),
    /// Reserved jump awaiting its target
    Pending,
    /// Run-time error to raise
    Error(PredefinedError),
}

/// Operation codes for the interpreter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum OpCode {
    // Literals
    /// Push undefined
    PushUndefined,
    /// Push null
    PushNull,
    /// Push true
    PushTrue,
    /// Push false
    PushFalse,
    /// Push a numeric literal
    PushNumber,
    /// Push a string literal (raw arena text)
    PushString,
    /// Construct a regular expression from pattern and flags
    PushRegExp,
    /// Push the receiver (`this`)
    PushThis,
    /// Push an interned name as a string value
    PushName,
    /// Create a closure from a function literal
    PushFunction,

    // Stack
    /// Pop the top value
    Pop,

    // Names and references
    /// Read a variable by name
    LoadName,
    /// Pop a value and store it into a named variable
    StoreVar,
    /// Push a reference to a named variable (name, auto-create flag)
    ResolveName,
    /// Pop object and key, push a reference to the property
    ResolveIndex,
    /// Push the value a reference points to, keeping the reference
    Deref,
    /// Pop value and reference, store through the reference, push the value
    Assign,

    // Properties and literals
    /// Pop object, push the named property
    GetMember,
    /// Pop object and key, push the property
    GetIndex,
    /// Pop a value and set it as a named property of the object below
    SetProperty,
    /// Push a new empty object
    NewObject,
    /// Pop N values and push an array of them
    NewArray,

    // Arithmetic
    /// Add (or concatenate)
    Add,
    /// Subtract
    Sub,
    /// Multiply
    Mul,
    /// Divide
    Div,
    /// Modulo
    Mod,

    // Bitwise
    /// Left shift
    Shl,
    /// Signed right shift
    Shr,
    /// Unsigned right shift
    Ushr,
    /// Bitwise AND
    BitAnd,
    /// Bitwise OR
    BitOr,
    /// Bitwise XOR
    BitXor,

    // Comparison
    /// Equal (==)
    Eq,
    /// Not equal (!=)
    Ne,
    /// Strict equal (===)
    StrictEq,
    /// Strict not equal (!==)
    StrictNe,
    /// Less than
    Lt,
    /// Less than or equal
    Le,
    /// Greater than
    Gt,
    /// Greater than or equal
    Ge,
    /// in operator
    In,
    /// instanceof operator
    InstanceOf,

    // Unary
    /// Negate (unary minus)
    Neg,
    /// Convert to number (unary plus)
    Plus,
    /// Logical NOT
    Not,
    /// Bitwise NOT
    BitNot,
    /// typeof of a value
    TypeOf,
    /// typeof of a reference; unresolvable names yield "undefined"
    TypeOfRef,
    /// Replace the top value with undefined
    Void,
    /// Delete through a reference, push whether it succeeded
    Delete,

    // Update
    /// ++ref, push the new value
    PreInc,
    /// --ref, push the new value
    PreDec,
    /// ref++, push the old value
    PostInc,
    /// ref--, push the old value
    PostDec,

    // Control flow
    /// Unconditional jump
    Jump,
    /// Pop and jump if false
    JumpIfFalse,
    /// Jump keeping the value if false, otherwise pop it
    JumpIfFalseOrPop,
    /// Jump keeping the value if true, otherwise pop it
    JumpIfTrueOrPop,

    // Calls
    /// Call a plain callee value with N arguments
    Call,
    /// Call through a reference, binding its base as the receiver
    CallRef,
    /// Construct from a plain callee value with N arguments
    New,
    /// Construct through a reference
    NewRef,

    // Special
    /// Evaluate a statement with the tree walker and push its completion
    Escape,
    /// Raise a predefined run-time error
    ThrowError,
    /// Return the top value
    Return,
}

impl OpCode {
    /// Whether the first operand is a jump target.
    pub fn is_jump(self) -> bool {
        matches!(
            self,
            OpCode::Jump | OpCode::JumpIfFalse | OpCode::JumpIfFalseOrPop | OpCode::JumpIfTrueOrPop
        )
    }

    /// Mnemonic used by the disassembler.
    pub fn mnemonic(self) -> &'static str {
        use OpCode::*;
        match self {
            PushUndefined => "push_undefined",
            PushNull => "push_null",
            PushTrue => "push_true",
            PushFalse => "push_false",
            PushNumber => "push_number",
            PushString => "push_string",
            PushRegExp => "push_regexp",
            PushThis => "push_this",
            PushName => "push_name",
            PushFunction => "push_function",
            Pop => "pop",
            LoadName => "load_name",
            StoreVar => "store_var",
            ResolveName => "resolve_name",
            ResolveIndex => "resolve_index",
            Deref => "deref",
            Assign => "assign",
            GetMember => "get_member",
            GetIndex => "get_index",
            SetProperty => "set_property",
            NewObject => "new_object",
            NewArray => "new_array",
            Add => "add",
            Sub => "sub",
            Mul => "mul",
            Div => "div",
            Mod => "mod",
            Shl => "shl",
            Shr => "shr",
            Ushr => "ushr",
            BitAnd => "bit_and",
            BitOr => "bit_or",
            BitXor => "bit_xor",
            Eq => "eq",
            Ne => "ne",
            StrictEq => "strict_eq",
            StrictNe => "strict_ne",
            Lt => "lt",
            Le => "le",
            Gt => "gt",
            Ge => "ge",
            In => "in",
            InstanceOf => "instanceof",
            Neg => "neg",
            Plus => "plus",
            Not => "not",
            BitNot => "bit_not",
            TypeOf => "typeof",
            TypeOfRef => "typeof_ref",
            Void => "void",
            Delete => "delete",
            PreInc => "pre_inc",
            PreDec => "pre_dec",
            PostInc => "post_inc",
            PostDec => "post_dec",
            Jump => "jump",
            JumpIfFalse => "jump_if_false",
            JumpIfFalseOrPop => "jump_if_false_or_pop",
            JumpIfTrueOrPop => "jump_if_true_or_pop",
            Call => "call",
            CallRef => "call_ref",
            New => "new",
            NewRef => "new_ref",
            Escape => "escape",
            ThrowError => "throw_error",
            Return => "return",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}
