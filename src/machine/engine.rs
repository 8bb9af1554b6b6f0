//! Single-instruction execution engine.
//!
//! [`step`] executes exactly one instruction against a machine state and
//! reports what should happen next. The engine never moves the program
//! counter itself: the caller advances by one on [`StepOutcome::Advance`],
//! transfers control on [`StepOutcome::Jump`], and hands
//! [`StepOutcome::Syscall`] to the syscall layer. Faults come back through
//! the `Err` arm and are fatal to the executing task only.

use crate::machine::errors::Fault;
use crate::machine::isa::{BinaryOp, Instruction, UnaryOp};
use crate::machine::operand;
use crate::machine::state::MachineState;

/// What the scheduler should do after one executed instruction.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum StepOutcome {
    /// Move to the next instruction.
    Advance,
    /// Transfer control to the given instruction index. A target equal to
    /// the program length is the program's natural halt.
    Jump(usize),
    /// The instruction requested a syscall; no other effect has happened.
    Syscall(i64),
}

/// Executes one instruction.
///
/// `pc` is the executing instruction's own index and `program_len` the
/// program length; both are needed to resolve relative jump targets.
/// Arithmetic wraps; division and remainder by zero return
/// [`Fault::DivisionByZero`]. Jump targets outside `[0, program_len]`
/// return [`Fault::BadJumpTarget`].
pub fn step(
    instruction: &Instruction,
    state: &mut MachineState,
    pc: usize,
    program_len: usize,
) -> Result<StepOutcome, Fault> {
    match instruction {
        Instruction::Copy { dst, src } => {
            let value = operand::read(src, state)?;
            state.set_flags_from(value);
            operand::write(dst, state, value)?;
            Ok(StepOutcome::Advance)
        }
        Instruction::Binary {
            op,
            dst,
            src1,
            src2,
        } => {
            let lhs = operand::read(src1, state)?;
            let rhs = operand::read(src2, state)?;
            let value = apply_binary(*op, lhs, rhs)?;
            state.set_flags_from(value);
            operand::write(dst, state, value)?;
            Ok(StepOutcome::Advance)
        }
        Instruction::Unary { op, dst, src } => {
            let value = apply_unary(*op, operand::read(src, state)?);
            state.set_flags_from(value);
            operand::write(dst, state, value)?;
            Ok(StepOutcome::Advance)
        }
        Instruction::JumpIfZero { offset } => {
            conditional_jump(state.flags().is_zero(), *offset, pc, program_len)
        }
        Instruction::JumpIfNegative { offset } => {
            conditional_jump(state.flags().is_negative(), *offset, pc, program_len)
        }
        Instruction::JumpIfPositive { offset } => {
            conditional_jump(state.flags().is_positive(), *offset, pc, program_len)
        }
        Instruction::Jump { offset } => {
            Ok(StepOutcome::Jump(jump_target(*offset, pc, program_len)?))
        }
        Instruction::Syscall { number } => Ok(StepOutcome::Syscall(*number)),
    }
}

/// Evaluates a binary operation with wrapping semantics.
fn apply_binary(op: BinaryOp, lhs: i64, rhs: i64) -> Result<i64, Fault> {
    Ok(match op {
        BinaryOp::Add => lhs.wrapping_add(rhs),
        BinaryOp::Sub => lhs.wrapping_sub(rhs),
        BinaryOp::Mul => lhs.wrapping_mul(rhs),
        BinaryOp::Div => {
            if rhs == 0 {
                return Err(Fault::DivisionByZero);
            }
            lhs.wrapping_div(rhs)
        }
        BinaryOp::And => lhs & rhs,
        BinaryOp::Or => lhs | rhs,
        BinaryOp::Rem => {
            if rhs == 0 {
                return Err(Fault::DivisionByZero);
            }
            lhs.wrapping_rem(rhs)
        }
    })
}

/// Evaluates a unary operation with wrapping semantics.
fn apply_unary(op: UnaryOp, value: i64) -> i64 {
    match op {
        UnaryOp::Abs => value.wrapping_abs(),
        UnaryOp::Neg => value.wrapping_neg(),
        UnaryOp::Not => i64::from(value == 0),
        UnaryOp::BitNot => !value,
    }
}

fn conditional_jump(
    taken: bool,
    offset: i64,
    pc: usize,
    program_len: usize,
) -> Result<StepOutcome, Fault> {
    if taken {
        Ok(StepOutcome::Jump(jump_target(offset, pc, program_len)?))
    } else {
        Ok(StepOutcome::Advance)
    }
}

/// Resolves a relative jump. Targets in `[0, program_len]` are valid; the
/// upper bound is the natural halt.
fn jump_target(offset: i64, pc: usize, program_len: usize) -> Result<usize, Fault> {
    let target = (pc as i64).checked_add(offset);
    match target {
        Some(t) if t >= 0 && t <= program_len as i64 => Ok(t as usize),
        _ => Err(Fault::BadJumpTarget {
            target: target.unwrap_or(i64::MAX),
            len: program_len,
        }),
    }
}
