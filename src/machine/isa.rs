//! Instruction Set Architecture (ISA) definitions.
//!
//! Defines the addressing modes and the eight instructions the machine
//! executes. Both are plain sum types: exhaustive matching everywhere
//! replaces the tag-and-union bookkeeping a lower-level representation
//! would need, and operator/mnemonic lookups are const functions rather
//! than process-wide name tables.
//!
//! Register indices and memory addresses are carried as `i64` on purpose:
//! range violations are execution-time faults raised by the operand
//! resolver, not parse errors, so the ISA must be able to represent them.

/// An addressing-mode descriptor: where an instruction reads or writes.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Location {
    /// A general-purpose register.
    Register(i64),
    /// An absolute memory address.
    Memory(i64),
    /// Memory at the address held in a register.
    RegisterIndirect(i64),
    /// A literal value. Never a valid write target.
    Immediate(i64),
}

/// Binary ALU operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Integer division; faults on a zero divisor.
    Div,
    /// Bitwise and.
    And,
    /// Bitwise or.
    Or,
    /// Remainder; faults on a zero divisor.
    Rem,
}

impl BinaryOp {
    /// Returns the operator's source symbol.
    pub const fn symbol(&self) -> char {
        match self {
            BinaryOp::Add => '+',
            BinaryOp::Sub => '-',
            BinaryOp::Mul => '*',
            BinaryOp::Div => '/',
            BinaryOp::And => '&',
            BinaryOp::Or => '|',
            BinaryOp::Rem => '%',
        }
    }

    /// Maps a source symbol to its operator.
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        Some(match symbol {
            '+' => BinaryOp::Add,
            '-' => BinaryOp::Sub,
            '*' => BinaryOp::Mul,
            '/' => BinaryOp::Div,
            '&' => BinaryOp::And,
            '|' => BinaryOp::Or,
            '%' => BinaryOp::Rem,
            _ => return None,
        })
    }
}

/// Unary ALU operations.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UnaryOp {
    /// Absolute value.
    Abs,
    /// Arithmetic negation.
    Neg,
    /// Logical not: nonzero becomes 0, zero becomes 1.
    Not,
    /// Bitwise complement.
    BitNot,
}

impl UnaryOp {
    /// Returns the operator's source symbol.
    pub const fn symbol(&self) -> char {
        match self {
            UnaryOp::Abs => '+',
            UnaryOp::Neg => '-',
            UnaryOp::Not => '!',
            UnaryOp::BitNot => '~',
        }
    }

    /// Maps a source symbol to its operator.
    pub const fn from_symbol(symbol: char) -> Option<Self> {
        Some(match symbol {
            '+' => UnaryOp::Abs,
            '-' => UnaryOp::Neg,
            '!' => UnaryOp::Not,
            '~' => UnaryOp::BitNot,
            _ => return None,
        })
    }
}

/// A decoded instruction.
///
/// Immutable once constructed; a task's program is a shared read-only
/// sequence of these. Jump offsets are relative to the jumping
/// instruction's own index and may be negative.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Instruction {
    /// `dst = src`; flags set from the copied value.
    Copy { dst: Location, src: Location },
    /// `dst = src1 op src2`; flags set from the result.
    Binary {
        op: BinaryOp,
        dst: Location,
        src1: Location,
        src2: Location,
    },
    /// `dst = op src`; flags set from the result.
    Unary {
        op: UnaryOp,
        dst: Location,
        src: Location,
    },
    /// Jump by `offset` if the Zero flag is set.
    JumpIfZero { offset: i64 },
    /// Jump by `offset` if the Negative flag is set.
    JumpIfNegative { offset: i64 },
    /// Jump by `offset` if the Positive flag is set.
    JumpIfPositive { offset: i64 },
    /// Jump by `offset` unconditionally.
    Jump { offset: i64 },
    /// Request syscall `number`; the scheduler dispatches it.
    Syscall { number: i64 },
}

impl Instruction {
    /// Returns the assembly mnemonic for this instruction.
    pub const fn mnemonic(&self) -> &'static str {
        match self {
            Instruction::Copy { .. } => "c",
            Instruction::Binary { .. } => "b",
            Instruction::Unary { .. } => "u",
            Instruction::JumpIfZero { .. } => "jz",
            Instruction::JumpIfNegative { .. } => "jn",
            Instruction::JumpIfPositive { .. } => "jp",
            Instruction::Jump { .. } => "ju",
            Instruction::Syscall { .. } => "s",
        }
    }
}
