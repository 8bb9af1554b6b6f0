//! Shared immutable instruction sequences.

use crate::machine::isa::Instruction;
use std::sync::Arc;

/// A decoded program: an ordered, immutable sequence of instructions.
///
/// Cloning a program is cheap and shares the underlying instructions, so
/// several tasks can run the same code without copying it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Program {
    instructions: Arc<[Instruction]>,
}

impl Program {
    /// Creates a program from decoded instructions.
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            instructions: instructions.into(),
        }
    }

    /// Number of instructions. A program counter equal to this value is the
    /// program's natural halt.
    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    /// True for a program with no instructions.
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Returns the instruction at `pc`, if any.
    pub fn get(&self, pc: usize) -> Option<&Instruction> {
        self.instructions.get(pc)
    }

    /// Iterates over the instructions in order.
    pub fn iter(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter()
    }
}

impl From<Vec<Instruction>> for Program {
    fn from(instructions: Vec<Instruction>) -> Self {
        Self::new(instructions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::isa::Instruction;

    #[test]
    fn clones_share_instructions() {
        let program = Program::new(vec![Instruction::Jump { offset: 0 }]);
        let clone = program.clone();
        assert_eq!(program.len(), 1);
        assert_eq!(program.get(0), clone.get(0));
        assert!(program.get(1).is_none());
    }

    #[test]
    fn empty_program() {
        let program = Program::new(Vec::new());
        assert!(program.is_empty());
        assert_eq!(program.len(), 0);
    }
}
