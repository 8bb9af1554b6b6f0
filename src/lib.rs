//! Multitasking register virtual machine.
//!
//! Provides a small register/memory instruction set, an assembler for its
//! compact text syntax, and a fair-share scheduler that multiplexes several
//! independent tasks onto the single virtual CPU with sleep, disk, and mutex
//! syscalls.

pub mod machine;
pub mod scheduler;
pub mod utils;
