//! Single-pass compiler from a borrowed AST to stack bytecode.
//!
//! # Module Structure
//!
//! - `unit`: Compilation units and their entry points
//! - `bytecode`: Instruction buffer, instructions and opcodes
//! - `codegen`: Code generation from AST
//!   - `codegen::expressions`: Expression lowering
//!   - `codegen::statements`: Statement lowering and loop escapes
//! - `strings`: Interned name pool
//! - `arena`: Literal text arena
//! - `verify`: Static stack-discipline checker
//! - `disasm`: Text listings

pub mod arena;
pub mod bytecode;
pub(crate) mod codegen;
pub mod disasm;
pub mod strings;
pub mod unit;
pub mod verify;

pub use arena::Arena;
pub use bytecode::{Bytecode, Instruction, OpCode, Operand, PredefinedError, StackEffect};
pub use disasm::{Listing, disassemble};
pub use strings::{StrHandle, StringPool};
pub use unit::CompilationUnit;
pub use verify::{StackReport, check_jumps, verify};
