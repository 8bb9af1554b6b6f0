//! Register-based virtual machine core.
//!
//! Executes decoded instructions against a per-task machine state. The
//! machine is deliberately small: a fixed register file, a flat word-addressed
//! memory, and three mutually exclusive condition flags.
//!
//! # Architecture
//!
//! - **Registers**: 16 general-purpose registers holding signed 64-bit words
//! - **Memory**: 256 words, addressed `0..256`; indirect addresses are
//!   validated, never wrapped
//! - **Flags**: Zero/Negative/Positive, set from the result of every copy,
//!   binary, and unary operation, consumed by conditional jumps
//! - **Arithmetic**: wrapping semantics, so no operation can panic; division
//!   and remainder by zero fault instead
//! - **Execution model**: [`engine::step`] executes exactly one instruction
//!   and reports a [`engine::StepOutcome`]; the caller owns the program
//!   counter and dispatches syscall requests
//!
//! # Modules
//!
//! - [`assembler`]: text-to-program parser for the compact assembly syntax
//! - [`engine`]: single-instruction execution engine
//! - [`errors`]: fault and parse error types
//! - [`isa`]: instruction set and addressing-mode definitions
//! - [`operand`]: operand resolution (read/write a [`isa::Location`])
//! - [`program`]: shared immutable instruction sequences
//! - [`state`]: per-task registers, memory, and flags

pub mod assembler;
pub mod engine;
pub mod errors;
pub mod isa;
pub mod operand;
pub mod program;
pub mod state;
