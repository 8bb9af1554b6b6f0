//! Operand resolution against a task's machine state.
//!
//! Resolves a [`Location`] to a single read or write with no other side
//! effects. Register-indirect addresses go through the same bounds checks as
//! absolute ones: a negative or overflowing address is a fault, never a
//! wraparound.

use crate::machine::errors::Fault;
use crate::machine::isa::Location;
use crate::machine::state::MachineState;

/// Reads the value a location designates.
///
/// Returns [`Fault::BadRegister`] or [`Fault::BadAddress`] if the location
/// resolves out of range.
pub fn read(loc: &Location, state: &MachineState) -> Result<i64, Fault> {
    match *loc {
        Location::Register(index) => state.register(index),
        Location::Memory(address) => state.load(address),
        Location::RegisterIndirect(index) => {
            let address = state.register(index)?;
            state.load(address)
        }
        Location::Immediate(value) => Ok(value),
    }
}

/// Writes `value` to the location a destination designates.
///
/// Returns [`Fault::InvalidWrite`] for an immediate destination, and
/// [`Fault::BadRegister`] or [`Fault::BadAddress`] for out-of-range ones.
pub fn write(loc: &Location, state: &mut MachineState, value: i64) -> Result<(), Fault> {
    match *loc {
        Location::Register(index) => state.set_register(index, value),
        Location::Memory(address) => state.store(address, value),
        Location::RegisterIndirect(index) => {
            let address = state.register(index)?;
            state.store(address, value)
        }
        Location::Immediate(_) => Err(Fault::InvalidWrite),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::state::{MEMORY_WORDS, NUM_REGISTERS};

    #[test]
    fn register_read_write() {
        let mut state = MachineState::new();
        write(&Location::Register(3), &mut state, -7).unwrap();
        assert_eq!(read(&Location::Register(3), &state).unwrap(), -7);
    }

    #[test]
    fn register_out_of_range() {
        let state = MachineState::new();
        assert_eq!(
            read(&Location::Register(16), &state),
            Err(Fault::BadRegister {
                index: 16,
                limit: NUM_REGISTERS
            })
        );
    }

    #[test]
    fn memory_read_write() {
        let mut state = MachineState::new();
        write(&Location::Memory(200), &mut state, 11).unwrap();
        assert_eq!(read(&Location::Memory(200), &state).unwrap(), 11);
    }

    #[test]
    fn register_indirect_resolves_through_register() {
        let mut state = MachineState::new();
        state.set_register(2, 100).unwrap();
        write(&Location::RegisterIndirect(2), &mut state, 42).unwrap();
        assert_eq!(state.load(100).unwrap(), 42);
        assert_eq!(read(&Location::RegisterIndirect(2), &state).unwrap(), 42);
    }

    #[test]
    fn register_indirect_bad_address_faults() {
        let mut state = MachineState::new();
        state.set_register(2, -1).unwrap();
        assert_eq!(
            read(&Location::RegisterIndirect(2), &state),
            Err(Fault::BadAddress {
                address: -1,
                limit: MEMORY_WORDS
            })
        );
        state.set_register(2, MEMORY_WORDS as i64).unwrap();
        assert_eq!(
            write(&Location::RegisterIndirect(2), &mut state, 0),
            Err(Fault::BadAddress {
                address: MEMORY_WORDS as i64,
                limit: MEMORY_WORDS
            })
        );
    }

    #[test]
    fn immediate_reads_its_value() {
        let state = MachineState::new();
        assert_eq!(read(&Location::Immediate(-99), &state).unwrap(), -99);
    }

    #[test]
    fn immediate_write_faults() {
        let mut state = MachineState::new();
        assert_eq!(
            write(&Location::Immediate(5), &mut state, 1),
            Err(Fault::InvalidWrite)
        );
    }
}
