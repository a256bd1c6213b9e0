use thiserror::Error;

use crate::constants::{Address, Word};

use super::channel::ChannelError;
use super::memory::{Memory, MemoryError};

#[derive(Debug, Error)]
pub enum BusError {
    #[error(transparent)]
    Memory(#[from] MemoryError),

    #[error(transparent)]
    Channel(#[from] ChannelError),
}

/// The processor side of the memory bus.
///
/// Every fetch, load, store and stack access goes through here, one request at
/// a time: a request returns only once the memory answered it.
pub trait Bus {
    /// Read the word at an address
    ///
    /// # Errors
    ///
    /// Fails if the address is out of bounds or if the memory cannot be reached
    fn read(&mut self, address: Address) -> Result<Word, BusError>;

    /// Write a word at an address
    ///
    /// # Errors
    ///
    /// Fails if the address is out of bounds or if the memory cannot be reached
    fn write(&mut self, address: Address, value: Word) -> Result<(), BusError>;

    /// Let the memory know no more requests will come
    ///
    /// # Errors
    ///
    /// Fails if the memory cannot be reached
    fn halt(&mut self) -> Result<(), BusError> {
        Ok(())
    }
}

/// Direct access, the memory lives on the same thread as the processor
impl Bus for Memory {
    fn read(&mut self, address: Address) -> Result<Word, BusError> {
        Ok(self.get(address)?)
    }

    fn write(&mut self, address: Address, value: Word) -> Result<(), BusError> {
        Ok(self.set(address, value)?)
    }
}
