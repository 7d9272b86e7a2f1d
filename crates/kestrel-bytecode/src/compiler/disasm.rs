//! Bytecode disassembler.
//!
//! ```text
//!    0  push_number           1
//!    1  push_number           2
//!    2  add
//!    3  store_var             "y"
//!    4  push_undefined
//!    5  return
//! ```

use std::fmt;

use crate::compiler::bytecode::{Instruction, Operand};
use crate::compiler::strings::StringPool;

/// Displayable listing of a unit's instructions.
#[derive(Debug, Clone, Copy)]
pub struct Listing<'u, 'a> {
    code: &'u [Instruction<'a>],
    strings: Option<&'u StringPool>,
}

impl<'u, 'a> Listing<'u, 'a> {
    /// Creates a listing; names are shown as handles when no pool is given.
    pub fn new(code: &'u [Instruction<'a>], strings: Option<&'u StringPool>) -> Self {
        Self { code, strings }
    }

    fn write_operand(&self, f: &mut fmt::Formatter<'_>, operand: &Operand<'a>) -> fmt::Result {
        match operand {
            Operand::Count(n) => write!(f, "{n}"),
            Operand::Flag(flag) => write!(f, "{}", if *flag { "create" } else { "existing" }),
            Operand::Number(n) => write!(f, "{n}"),
            Operand::Name(handle) => match self.strings.and_then(|pool| pool.get(*handle)) {
                Some(name) => write!(f, "{name:?}"),
                None => write!(f, "#{}", handle.index()),
            },
            Operand::Raw(text) => write!(f, "{text:?}"),
            Operand::Statement(stmt) => write!(f, "<{} statement>", stmt.kind_name()),
            Operand::Function(func) => match &func.id {
                Some(id) => write!(f, "<function {}>", id.name),
                None => write!(f, "<function>"),
            },
            Operand::Jump(target) => write!(f, "-> {target}"),
            Operand::Pending => write!(f, "-> ?"),
            Operand::Error(error) => write!(f, "{error}"),
        }
    }
}

impl fmt::Display for Listing<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (offset, inst) in self.code.iter().enumerate() {
            write!(f, "{offset:>4}  {:<22}", inst.opcode.mnemonic())?;
            if let Some(operand) = &inst.operand {
                self.write_operand(f, operand)?;
            }
            if let Some(extra) = &inst.extra {
                write!(f, ", ")?;
                self.write_operand(f, extra)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Renders `code` as text, one instruction per line.
pub fn disassemble(code: &[Instruction<'_>], strings: Option<&StringPool>) -> String {
    Listing::new(code, strings).to_string()
}
