//! Static stack-discipline checker.
//!
//! Walks every path from an entry offset using each instruction's static
//! stack effect and checks what the compiler promises the interpreter:
//! jumps are patched and in range, join points agree on depth, nothing
//! underflows, and each `Return` sees exactly one value.

use std::collections::hash_map::Entry;

use rustc_hash::FxHashMap;

use crate::compiler::bytecode::{Instruction, OpCode, Operand};
use crate::error::VerifyError;

/// Summary of a successful verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackReport {
    /// Deepest stack reached on any path
    pub max_depth: usize,
    /// Instructions reachable from the entry
    pub reachable: usize,
    /// Reachable `Return` instructions
    pub returns: usize,
}

/// Checks that every jump in `code` has been patched with an in-range target.
pub fn check_jumps(code: &[Instruction<'_>]) -> Result<(), VerifyError> {
    for (at, inst) in code.iter().enumerate() {
        if inst.opcode.is_jump() {
            jump_target(code, at)?;
        }
    }
    Ok(())
}

/// Verifies the entry point that starts at `start`.
pub fn verify(code: &[Instruction<'_>], start: usize) -> Result<StackReport, VerifyError> {
    let len = code.len();
    if start >= len {
        return Err(VerifyError::BadEntry { start, len });
    }
    check_jumps(code)?;

    let mut depths: FxHashMap<usize, usize> = FxHashMap::default();
    let mut work = vec![(start, 0usize)];
    let mut report = StackReport::default();

    while let Some((at, depth)) = work.pop() {
        if at >= len {
            return Err(VerifyError::FellOffEnd);
        }
        match depths.entry(at) {
            Entry::Occupied(seen) => {
                if *seen.get() != depth {
                    return Err(VerifyError::DepthMismatch {
                        at,
                        expected: *seen.get(),
                        found: depth,
                    });
                }
                continue;
            }
            Entry::Vacant(slot) => {
                slot.insert(depth);
            }
        }

        let inst = &code[at];
        let effect = inst.stack_effect();
        if depth < effect.pops {
            return Err(VerifyError::Underflow { at });
        }
        let after = depth - effect.pops + effect.pushes;
        report.max_depth = report.max_depth.max(depth).max(after);

        match inst.opcode {
            OpCode::Return => {
                if depth != 1 {
                    return Err(VerifyError::Unbalanced { at, depth });
                }
                report.returns += 1;
            }
            OpCode::Jump => work.push((jump_target(code, at)?, after)),
            OpCode::JumpIfFalse => {
                work.push((jump_target(code, at)?, after));
                work.push((at + 1, after));
            }
            OpCode::JumpIfFalseOrPop | OpCode::JumpIfTrueOrPop => {
                // Taken edge keeps the tested value.
                work.push((jump_target(code, at)?, depth));
                work.push((at + 1, after));
            }
            _ => work.push((at + 1, after)),
        }
    }

    report.reachable = depths.len();
    Ok(report)
}

fn jump_target(code: &[Instruction<'_>], at: usize) -> Result<usize, VerifyError> {
    match code[at].operand {
        Some(Operand::Jump(target)) if target <= code.len() => Ok(target),
        Some(Operand::Jump(target)) => Err(VerifyError::TargetOutOfRange {
            at,
            target,
            len: code.len(),
        }),
        Some(Operand::Pending) => Err(VerifyError::UnpatchedJump { at }),
        _ => Err(VerifyError::MalformedOperand { at }),
    }
}
