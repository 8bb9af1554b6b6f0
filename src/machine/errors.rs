//! Fault and parse error types.
//!
//! A [`Fault`] is fatal to the task that raised it and to that task only;
//! the scheduler keeps running every other task. A [`ParseError`] is raised
//! before a task exists, so a malformed program is simply never scheduled.

use thiserror::Error;

/// Task-local execution faults.
///
/// Faults are deterministic given the program, so there is nothing to retry:
/// the offending task moves to its `Faulted` state and is removed from
/// scheduling.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
pub enum Fault {
    /// Register index outside the register file.
    #[error("register index {index} out of range (0..{limit})")]
    BadRegister { index: i64, limit: usize },
    /// Memory address outside the address space, or an invalid disk block.
    #[error("address {address} out of range (0..{limit})")]
    BadAddress { address: i64, limit: usize },
    /// Write attempted on an immediate operand.
    #[error("write to an immediate operand")]
    InvalidWrite,
    /// Division or remainder by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Jump target outside `[0, program length]`.
    #[error("jump target {target} outside program of length {len}")]
    BadJumpTarget { target: i64, len: usize },
    /// Syscall number with no handler.
    #[error("unknown syscall number {number}")]
    UnknownSyscall { number: i64 },
}

/// Source text rejected by the assembler.
///
/// Carries the byte position of the offending input. A program that fails to
/// parse never reaches the scheduler.
#[derive(Clone, Debug, Error, Eq, PartialEq)]
#[error("parse error at byte {position}: {reason}")]
pub struct ParseError {
    /// Byte offset into the source text.
    pub position: usize,
    /// Human-readable description of what was expected.
    pub reason: String,
}

impl ParseError {
    /// Creates a parse error at the given byte position.
    pub fn new(position: usize, reason: impl Into<String>) -> Self {
        Self {
            position,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_messages() {
        assert_eq!(
            Fault::BadRegister {
                index: 99,
                limit: 16
            }
            .to_string(),
            "register index 99 out of range (0..16)"
        );
        assert_eq!(
            Fault::DivisionByZero.to_string(),
            "division by zero"
        );
        assert_eq!(
            Fault::BadJumpTarget { target: -1, len: 4 }.to_string(),
            "jump target -1 outside program of length 4"
        );
    }

    #[test]
    fn parse_error_message() {
        let err = ParseError::new(7, "expected a number");
        assert_eq!(err.to_string(), "parse error at byte 7: expected a number");
    }
}
