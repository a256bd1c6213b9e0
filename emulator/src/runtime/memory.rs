use thiserror::Error;

use crate::compiler::Image;
use crate::constants::{Address, Word, MEMORY_SIZE};

use super::Instruction;

/// Represents errors related to memory manipulations
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MemoryError {
    /// The address does not exist on the memory bus
    #[error("address {address} is out of bounds")]
    OutOfBounds { address: Address },
}

/// Holds the memory cells of the computer.
///
/// It has 2000 cells, all initialized to zero. Instructions and data are not
/// distinguished: any cell can be fetched as an opcode or read as a value.
///
/// The memory only checks that addresses exist. Access rights depend on the
/// processor mode and are checked by the processor before it issues a request.
#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    inner: Box<[Word; MEMORY_SIZE]>,
}

impl Default for Memory {
    fn default() -> Self {
        Self {
            inner: Box::new([0; MEMORY_SIZE]),
        }
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let used = self.inner.iter().filter(|w| **w != 0).count();
        write!(f, "Memory {{ size: {MEMORY_SIZE}, non_zero: {used} }}")
    }
}

impl Memory {
    /// Build the memory from a loaded program image
    #[must_use]
    pub fn from_image(image: &Image) -> Self {
        let mut memory = Self::default();
        for (address, word) in image.iter() {
            // The image only holds addresses that were checked when it was built
            if let Some(cell) = usize::try_from(address)
                .ok()
                .and_then(|a| memory.inner.get_mut(a))
            {
                *cell = word;
            }
        }
        memory
    }

    fn index(address: Address) -> Result<usize, MemoryError> {
        usize::try_from(address)
            .ok()
            .filter(|a| *a < MEMORY_SIZE)
            .ok_or(MemoryError::OutOfBounds { address })
    }

    /// Read the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get(&self, address: Address) -> Result<Word, MemoryError> {
        let index = Self::index(address)?;
        Ok(self.inner[index])
    }

    /// Get a mutable reference to the word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn get_mut(&mut self, address: Address) -> Result<&mut Word, MemoryError> {
        let index = Self::index(address)?;
        Ok(&mut self.inner[index])
    }

    /// Write a word at an address
    ///
    /// # Errors
    ///
    /// It fails if the address is out of bounds.
    pub fn set(&mut self, address: Address, value: Word) -> Result<(), MemoryError> {
        *self.get_mut(address)? = value;
        Ok(())
    }

    /// Iterate over the cells which are not zero
    pub fn non_zero(&self) -> impl Iterator<Item = (Address, Word)> + '_ {
        (0..)
            .zip(self.inner.iter().copied())
            .filter(|(_, word)| *word != 0)
    }

    /// Decode the instruction starting at an address, if it holds a valid one
    #[must_use]
    pub fn instruction_at(&self, address: Address) -> Option<Instruction> {
        let opcode = self.get(address).ok()?;
        Instruction::decode(opcode, || self.get(address.wrapping_add(1)))
            .ok()
            .flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_test() {
        let mut memory = Memory::default();
        assert_eq!(memory.get(0), Ok(0));
        assert_eq!(memory.get(1999), Ok(0));
        assert_eq!(
            memory.get(2000),
            Err(MemoryError::OutOfBounds { address: 2000 })
        );
        assert_eq!(memory.get(-1), Err(MemoryError::OutOfBounds { address: -1 }));
        assert_eq!(
            memory.set(2500, 1),
            Err(MemoryError::OutOfBounds { address: 2500 })
        );
    }

    #[test]
    fn read_write_test() {
        let mut memory = Memory::default();
        memory.set(1500, 42).unwrap();
        memory.set(3, -7).unwrap();
        assert_eq!(memory.get(1500), Ok(42));
        assert_eq!(memory.get(3), Ok(-7));
        assert_eq!(memory.non_zero().collect::<Vec<_>>(), vec![(3, -7), (1500, 42)]);
    }

    #[test]
    fn instruction_at_test() {
        let mut memory = Memory::default();
        for (address, word) in (0..).zip([1, 65, 9, 2, 42, 50]) {
            memory.set(address, word).unwrap();
        }
        memory.set(1999, 23).unwrap();

        insta::assert_snapshot!(memory.instruction_at(0).unwrap().to_string(), @"LoadValue 65");
        insta::assert_snapshot!(memory.instruction_at(2).unwrap().to_string(), @"Put 2");
        insta::assert_snapshot!(memory.instruction_at(5).unwrap().to_string(), @"Halt");
        // Unknown opcode
        assert_eq!(memory.instruction_at(4), None);
        // The operand would be past the end of memory
        assert_eq!(memory.instruction_at(1999), None);
        assert_eq!(memory.instruction_at(2500), None);
    }
}
