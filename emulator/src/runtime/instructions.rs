use parse_display::Display;
use rand::Rng;
use tracing::debug;

use crate::constants::{Address, Word, SYSCALL_HANDLER};

use super::{Bus, Computer, ProcessorError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Instruction {
    /// Load a value in the accumulator
    #[display("LoadValue {0}")]
    LoadValue(Word),

    /// Load the value at an address in the accumulator
    #[display("LoadAddr {0}")]
    LoadAddr(Address),

    /// Load the value pointed by the value at an address in the accumulator
    #[display("LoadInd {0}")]
    LoadInd(Address),

    /// Load the value at `address + %x` in the accumulator
    #[display("LoadIdxX {0}")]
    LoadIdxX(Address),

    /// Load the value at `address + %y` in the accumulator
    #[display("LoadIdxY {0}")]
    LoadIdxY(Address),

    /// Load the value at `%sp + %x` in the accumulator
    #[display("LoadSpX")]
    LoadSpX,

    /// Store the accumulator at an address
    #[display("Store {0}")]
    Store(Address),

    /// Load a random number between 1 and 100 in the accumulator
    #[display("Rand")]
    Rand,

    /// Print the accumulator, as a number on port 1, as a character on port 2
    #[display("Put {0}")]
    Put(Word),

    #[display("AddX")]
    AddX,

    #[display("AddY")]
    AddY,

    #[display("SubX")]
    SubX,

    #[display("SubY")]
    SubY,

    #[display("CopyToX")]
    CopyToX,

    #[display("CopyFromX")]
    CopyFromX,

    #[display("CopyToY")]
    CopyToY,

    #[display("CopyFromY")]
    CopyFromY,

    #[display("CopyToSp")]
    CopyToSp,

    #[display("CopyFromSp")]
    CopyFromSp,

    /// Unconditional jump
    #[display("Jump {0}")]
    Jump(Address),

    /// Jump if the accumulator is zero
    #[display("JumpIfEqual {0}")]
    JumpIfEqual(Address),

    /// Jump if the accumulator is not zero
    #[display("JumpIfNotEqual {0}")]
    JumpIfNotEqual(Address),

    /// Push the return address and go to the given address
    #[display("Call {0}")]
    Call(Address),

    /// Return from a `Call`
    #[display("Ret")]
    Ret,

    #[display("IncX")]
    IncX,

    #[display("DecX")]
    DecX,

    /// Push the accumulator on the stack
    #[display("Push")]
    Push,

    /// Pop the top of the stack in the accumulator
    #[display("Pop")]
    Pop,

    /// System call
    #[display("Int")]
    Int,

    /// Return from a system call or a timer interrupt
    #[display("IRet")]
    IRet,

    /// Stop the computer
    #[display("Halt")]
    Halt,
}

impl Instruction {
    /// Decode the instruction for an opcode.
    ///
    /// `operand` is called once for instructions which have an operand, and
    /// should fetch the word following the opcode. Unknown opcodes decode to
    /// `None`, without fetching anything.
    ///
    /// # Errors
    ///
    /// Forwards the error of the operand fetch
    pub fn decode<E, F>(opcode: Word, operand: F) -> Result<Option<Self>, E>
    where
        F: FnOnce() -> Result<Word, E>,
    {
        use Instruction::*;

        let with_operand = |build: fn(Word) -> Self| operand().map(|w| Some(build(w)));

        let instruction = match opcode {
            1 => return with_operand(LoadValue),
            2 => return with_operand(LoadAddr),
            3 => return with_operand(LoadInd),
            4 => return with_operand(LoadIdxX),
            5 => return with_operand(LoadIdxY),
            6 => LoadSpX,
            7 => return with_operand(Store),
            8 => Rand,
            9 => return with_operand(Put),
            10 => AddX,
            11 => AddY,
            12 => SubX,
            13 => SubY,
            14 => CopyToX,
            15 => CopyFromX,
            16 => CopyToY,
            17 => CopyFromY,
            18 => CopyToSp,
            19 => CopyFromSp,
            20 => return with_operand(Jump),
            21 => return with_operand(JumpIfEqual),
            22 => return with_operand(JumpIfNotEqual),
            23 => return with_operand(Call),
            24 => Ret,
            25 => IncX,
            26 => DecX,
            27 => Push,
            28 => Pop,
            29 => Int,
            30 => IRet,
            50 => Halt,
            _ => return Ok(None),
        };

        Ok(Some(instruction))
    }

    #[must_use]
    pub const fn opcode(&self) -> Word {
        use Instruction::*;

        match self {
            LoadValue(_) => 1,
            LoadAddr(_) => 2,
            LoadInd(_) => 3,
            LoadIdxX(_) => 4,
            LoadIdxY(_) => 5,
            LoadSpX => 6,
            Store(_) => 7,
            Rand => 8,
            Put(_) => 9,
            AddX => 10,
            AddY => 11,
            SubX => 12,
            SubY => 13,
            CopyToX => 14,
            CopyFromX => 15,
            CopyToY => 16,
            CopyFromY => 17,
            CopyToSp => 18,
            CopyFromSp => 19,
            Jump(_) => 20,
            JumpIfEqual(_) => 21,
            JumpIfNotEqual(_) => 22,
            Call(_) => 23,
            Ret => 24,
            IncX => 25,
            DecX => 26,
            Push => 27,
            Pop => 28,
            Int => 29,
            IRet => 30,
            Halt => 50,
        }
    }

    /// The word following the opcode, if any
    #[must_use]
    pub const fn operand(&self) -> Option<Word> {
        use Instruction::*;

        match self {
            LoadValue(w) | LoadAddr(w) | LoadInd(w) | LoadIdxX(w) | LoadIdxY(w) | Store(w)
            | Put(w) | Jump(w) | JumpIfEqual(w) | JumpIfNotEqual(w) | Call(w) => Some(*w),
            _ => None,
        }
    }

    /// Number of memory words the instruction takes
    #[must_use]
    pub const fn size(&self) -> Address {
        if self.operand().is_some() {
            2
        } else {
            1
        }
    }

    /// Memory words for this instruction
    #[must_use]
    pub fn encode(&self) -> Vec<Word> {
        std::iter::once(self.opcode()).chain(self.operand()).collect()
    }

    /// Execute the instruction
    ///
    /// The program counter already points past the instruction when this runs.
    #[tracing::instrument(skip(computer), level = "debug")]
    pub(crate) fn execute<B: Bus>(self, computer: &mut Computer<B>) -> Result<(), ProcessorError> {
        use Instruction::*;

        match self {
            LoadValue(value) => {
                computer.registers.ac = value;
            }

            LoadAddr(address) => {
                computer.registers.ac = computer.load(address)?;
            }

            LoadInd(address) => {
                // Only the first level address is checked
                let pointer = computer.load(address)?;
                computer.registers.ac = computer.read(pointer)?;
            }

            LoadIdxX(address) => {
                let address = computer.check_access(address)?;
                let x = computer.registers.x;
                computer.registers.ac = computer.read(address.wrapping_add(x))?;
            }

            LoadIdxY(address) => {
                let address = computer.check_access(address)?;
                let y = computer.registers.y;
                computer.registers.ac = computer.read(address.wrapping_add(y))?;
            }

            LoadSpX => {
                let address = computer.registers.sp.wrapping_add(computer.registers.x);
                computer.registers.ac = computer.read(address)?;
            }

            Store(address) => {
                let value = computer.registers.ac;
                computer.store(address, value)?;
            }

            Rand => {
                computer.registers.ac = computer.rng.gen_range(1..=100);
                debug!(value = computer.registers.ac, "Random number");
            }

            Put(port) => computer.put(port)?,

            AddX => {
                computer.registers.ac = computer.registers.ac.wrapping_add(computer.registers.x);
            }

            AddY => {
                computer.registers.ac = computer.registers.ac.wrapping_add(computer.registers.y);
            }

            SubX => {
                computer.registers.ac = computer.registers.ac.wrapping_sub(computer.registers.x);
            }

            SubY => {
                computer.registers.ac = computer.registers.ac.wrapping_sub(computer.registers.y);
            }

            CopyToX => computer.registers.x = computer.registers.ac,
            CopyFromX => computer.registers.ac = computer.registers.x,
            CopyToY => computer.registers.y = computer.registers.ac,
            CopyFromY => computer.registers.ac = computer.registers.y,
            CopyToSp => computer.registers.sp = computer.registers.ac,
            CopyFromSp => computer.registers.ac = computer.registers.sp,

            Jump(address) => computer.jump(address),

            JumpIfEqual(address) => {
                if computer.registers.ac == 0 {
                    computer.jump(address);
                }
            }

            JumpIfNotEqual(address) => {
                if computer.registers.ac != 0 {
                    computer.jump(address);
                }
            }

            Call(address) => {
                let pc = computer.registers.pc;
                computer.push(pc)?;
                computer.jump(address);
            }

            Ret => {
                let ret = computer.pop()?;
                debug!("Returning to {}", ret);
                computer.registers.pc = ret;
            }

            IncX => computer.registers.x = computer.registers.x.wrapping_add(1),
            DecX => computer.registers.x = computer.registers.x.wrapping_sub(1),

            Push => {
                let value = computer.registers.ac;
                computer.push(value)?;
            }

            Pop => {
                computer.registers.ac = computer.pop()?;
            }

            Int => {
                if computer.registers.in_interrupt() {
                    debug!("Already in an interrupt, ignoring system call");
                } else {
                    computer.enter_interrupt(SYSCALL_HANDLER)?;
                }
            }

            IRet => computer.return_from_interrupt()?,

            Halt => return Err(ProcessorError::Halt),
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_words(words: &[Word]) -> Option<Instruction> {
        let mut operands = words[1..].iter().copied();
        Instruction::decode(words[0], || operands.next().ok_or(())).unwrap()
    }

    #[test]
    fn decode_test() {
        assert_eq!(decode_words(&[1, 42]), Some(Instruction::LoadValue(42)));
        assert_eq!(decode_words(&[7, 1500]), Some(Instruction::Store(1500)));
        assert_eq!(decode_words(&[6]), Some(Instruction::LoadSpX));
        assert_eq!(decode_words(&[50]), Some(Instruction::Halt));
        assert_eq!(decode_words(&[31]), None);
        assert_eq!(decode_words(&[0]), None);
        assert_eq!(decode_words(&[-1]), None);
    }

    #[test]
    fn decode_fetches_operand_only_when_needed_test() {
        let mut fetched = 0;
        let inst = Instruction::decode::<(), _>(25, || {
            fetched += 1;
            Ok(0)
        });
        assert_eq!(inst, Ok(Some(Instruction::IncX)));
        assert_eq!(fetched, 0);
    }

    #[test]
    fn encode_test() {
        for opcode in (1..=30).chain([50]) {
            let inst = decode_words(&[opcode, 123]).unwrap();
            assert_eq!(inst.opcode(), opcode);
            let words = inst.encode();
            assert_eq!(words.len(), usize::try_from(inst.size()).unwrap());
            assert_eq!(decode_words(&words), Some(inst));
        }
    }

    #[test]
    fn display_test() {
        insta::assert_snapshot!(Instruction::LoadIdxX(12).to_string(), @"LoadIdxX 12");
        insta::assert_snapshot!(Instruction::Halt.to_string(), @"Halt");
        insta::assert_snapshot!(Instruction::Rand.to_string(), @"Rand");
    }
}
