use thiserror::Error;

use crate::constants::{Address, Word};

use super::memory::MemoryError;

/// Faults raised by the processor. None of them can be recovered from: the
/// machine halts on the first one.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    #[error("memory violation: accessing system address {address} in user mode")]
    MemoryViolation { address: Address },

    #[error("invalid instruction {opcode} at address {address}")]
    InvalidInstruction { opcode: Word, address: Address },

    #[error("out of bounds memory access ({0})")]
    OutOfBounds(#[from] MemoryError),
}
