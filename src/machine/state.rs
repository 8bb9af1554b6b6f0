//! Per-task machine state: register file, data memory, and condition flags.
//!
//! Every task owns its state exclusively; tasks never alias each other's
//! registers or memory. All accessors bounds-check and fault instead of
//! wrapping or panicking.

use crate::machine::errors::Fault;

/// Number of general-purpose registers.
pub const NUM_REGISTERS: usize = 16;
/// Width of a memory address in bits.
pub const ADDR_WIDTH: u32 = 8;
/// Number of addressable memory words.
pub const MEMORY_WORDS: usize = 1 << ADDR_WIDTH;

/// Condition flags, set from the result of every copy, binary, and unary
/// operation and consumed by conditional jumps.
///
/// Exactly one flag is set at any time. Jumps and syscalls never change
/// them. A fresh state starts at [`Flags::Zero`], consistent with its
/// all-zero registers.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Flags {
    #[default]
    Zero,
    Negative,
    Positive,
}

impl Flags {
    /// Classifies a result value.
    pub const fn of(value: i64) -> Self {
        if value == 0 {
            Flags::Zero
        } else if value < 0 {
            Flags::Negative
        } else {
            Flags::Positive
        }
    }

    /// True if the Zero flag is set.
    pub const fn is_zero(self) -> bool {
        matches!(self, Flags::Zero)
    }

    /// True if the Negative flag is set.
    pub const fn is_negative(self) -> bool {
        matches!(self, Flags::Negative)
    }

    /// True if the Positive flag is set.
    pub const fn is_positive(self) -> bool {
        matches!(self, Flags::Positive)
    }
}

/// A task's private registers, memory, and flags.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MachineState {
    registers: [i64; NUM_REGISTERS],
    memory: Vec<i64>,
    flags: Flags,
}

impl MachineState {
    /// Creates a zeroed machine state.
    pub fn new() -> Self {
        Self {
            registers: [0; NUM_REGISTERS],
            memory: vec![0; MEMORY_WORDS],
            flags: Flags::Zero,
        }
    }

    /// Returns the value of register `index`.
    ///
    /// Returns [`Fault::BadRegister`] if `index` is outside the register file.
    pub fn register(&self, index: i64) -> Result<i64, Fault> {
        self.reg_slot(index).map(|slot| self.registers[slot])
    }

    /// Stores `value` into register `index`.
    ///
    /// Returns [`Fault::BadRegister`] if `index` is outside the register file.
    pub fn set_register(&mut self, index: i64, value: i64) -> Result<(), Fault> {
        let slot = self.reg_slot(index)?;
        self.registers[slot] = value;
        Ok(())
    }

    /// Returns the word at memory address `address`.
    ///
    /// Returns [`Fault::BadAddress`] if `address` is negative or outside the
    /// address space.
    pub fn load(&self, address: i64) -> Result<i64, Fault> {
        self.mem_slot(address).map(|slot| self.memory[slot])
    }

    /// Stores `value` at memory address `address`.
    ///
    /// Returns [`Fault::BadAddress`] if `address` is negative or outside the
    /// address space.
    pub fn store(&mut self, address: i64, value: i64) -> Result<(), Fault> {
        let slot = self.mem_slot(address)?;
        self.memory[slot] = value;
        Ok(())
    }

    /// Returns the current condition flags.
    pub const fn flags(&self) -> Flags {
        self.flags
    }

    /// Sets the flags from a result value.
    pub fn set_flags_from(&mut self, value: i64) {
        self.flags = Flags::of(value);
    }

    /// Returns the full memory contents.
    pub fn memory(&self) -> &[i64] {
        &self.memory
    }

    /// Mutable memory access for device transfers.
    pub(crate) fn memory_mut(&mut self) -> &mut [i64] {
        &mut self.memory
    }

    fn reg_slot(&self, index: i64) -> Result<usize, Fault> {
        usize::try_from(index)
            .ok()
            .filter(|&slot| slot < NUM_REGISTERS)
            .ok_or(Fault::BadRegister {
                index,
                limit: NUM_REGISTERS,
            })
    }

    fn mem_slot(&self, address: i64) -> Result<usize, Fault> {
        usize::try_from(address)
            .ok()
            .filter(|&slot| slot < self.memory.len())
            .ok_or(Fault::BadAddress {
                address,
                limit: self.memory.len(),
            })
    }
}

impl Default for MachineState {
    fn default() -> Self {
        Self::new()
    }
}
