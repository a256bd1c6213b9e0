use std::io::Write;
use std::num::NonZeroU32;

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::{debug, info, trace};

use crate::constants as C;

mod bus;
mod channel;
mod exception;
mod instructions;
mod memory;
mod registers;

pub use self::bus::{Bus, BusError};
pub use self::channel::{ChannelBus, ChannelError, MemoryController};
pub use self::exception::Exception;
pub use self::instructions::Instruction;
pub use self::memory::{Memory, MemoryError};
pub use self::registers::{Mode, Reg, RegisterParseError, Registers, StatusRegister};

#[derive(Error, Debug)]
pub enum ProcessorError {
    #[error("CPU exception: {0}")]
    Exception(#[from] Exception),

    #[error("memory channel failure: {0}")]
    Channel(#[from] ChannelError),

    #[error("could not write program output: {0}")]
    Output(#[from] std::io::Error),

    #[error("computer halted")]
    Halt,
}

impl From<MemoryError> for ProcessorError {
    fn from(e: MemoryError) -> Self {
        Self::Exception(Exception::OutOfBounds(e))
    }
}

impl From<BusError> for ProcessorError {
    fn from(e: BusError) -> Self {
        match e {
            BusError::Memory(e) => e.into(),
            BusError::Channel(e) => e.into(),
        }
    }
}

type Result<T> = std::result::Result<T, ProcessorError>;

/// The processor, connected to its memory through a [`Bus`]
pub struct Computer<B = Memory> {
    pub registers: Registers,
    pub memory: B,

    /// Instructions retired outside of interrupts since the last timer
    /// interrupt. It is -1 while the timer handler runs.
    pub interrupt_counter: i64,

    /// Number of instructions between two timer interrupts
    pub timer_interval: NonZeroU32,

    /// Instructions retired since the beginning of the program
    pub cycles: usize,

    rng: StdRng,
    output: Box<dyn Write>,
}

impl<B: std::fmt::Debug> std::fmt::Debug for Computer<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Computer {{ registers: {:?}, memory: {:?}, interrupt_counter: {}, cycles: {} }}",
            self.registers, self.memory, self.interrupt_counter, self.cycles
        )
    }
}

impl<B: Bus> Computer<B> {
    /// Build a computer in its startup state. Program output goes to stdout.
    pub fn new(memory: B, timer_interval: NonZeroU32) -> Self {
        Self {
            registers: Registers::default(),
            memory,
            interrupt_counter: 0,
            timer_interval,
            cycles: 0,
            rng: StdRng::from_entropy(),
            output: Box::new(std::io::stdout()),
        }
    }

    /// Seed the random number generator used by `Rand`
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Send the output of `Put` somewhere else
    #[must_use]
    pub fn with_output<W: Write + 'static>(mut self, output: W) -> Self {
        self.output = Box::new(output);
        self
    }

    pub(crate) fn read(&mut self, address: C::Address) -> Result<C::Word> {
        let value = self.memory.read(address)?;
        trace!(address, value, "Read");
        Ok(value)
    }

    pub(crate) fn write(&mut self, address: C::Address, value: C::Word) -> Result<()> {
        trace!(address, value, "Write");
        self.memory.write(address, value)?;
        Ok(())
    }

    /// Check that the current mode allows accessing an address
    pub(crate) fn check_access(&self, address: C::Address) -> Result<C::Address> {
        if self.registers.mode() == Mode::User && address >= C::SYSTEM_START {
            Err(Exception::MemoryViolation { address }.into())
        } else {
            Ok(address)
        }
    }

    /// Read a memory operand, checking access rights first
    pub(crate) fn load(&mut self, address: C::Address) -> Result<C::Word> {
        let address = self.check_access(address)?;
        self.read(address)
    }

    /// Write a memory operand, checking access rights first
    pub(crate) fn store(&mut self, address: C::Address, value: C::Word) -> Result<()> {
        let address = self.check_access(address)?;
        self.write(address, value)
    }

    fn jump(&mut self, address: C::Address) {
        debug!("Jumping to address {}", address);
        self.registers.pc = address;
    }

    #[tracing::instrument(skip(self))]
    fn push(&mut self, value: C::Word) -> Result<()> {
        self.registers.sp = self.registers.sp.wrapping_sub(1);

        // And write it on memory
        let address = self.registers.sp;
        self.write(address, value)
    }

    #[tracing::instrument(skip(self))]
    fn pop(&mut self) -> Result<C::Word> {
        // First read the value
        let value = self.read(self.registers.sp)?;
        // Then move the SP
        self.registers.sp = self.registers.sp.wrapping_add(1);
        debug!("Popping value: {}", value);
        Ok(value)
    }

    /// Switch to kernel mode and the system stack, saving the interrupted
    /// `%sp` and `%pc` on it
    #[tracing::instrument(skip(self), level = "debug")]
    fn enter_interrupt(&mut self, handler: C::Address) -> Result<()> {
        let saved_sp = self.registers.sp;
        self.registers.sp = C::SYSTEM_STACK_START;
        self.registers
            .sr
            .insert(StatusRegister::KERNEL | StatusRegister::IN_INTERRUPT);

        self.push(saved_sp)?;
        let pc = self.registers.pc;
        self.push(pc)?;

        self.jump(handler);
        Ok(())
    }

    #[tracing::instrument(skip(self), level = "debug")]
    fn return_from_interrupt(&mut self) -> Result<()> {
        self.registers.pc = self.pop()?;
        self.registers.sp = self.pop()?;
        self.registers
            .sr
            .remove(StatusRegister::KERNEL | StatusRegister::IN_INTERRUPT);
        debug!(pc = self.registers.pc, sp = self.registers.sp, "Back in user mode");
        Ok(())
    }

    fn put(&mut self, port: C::Word) -> Result<()> {
        let value = self.registers.ac;
        match port {
            1 => write!(self.output, "{value}")?,
            2 => self.output.write_all(&value.to_le_bytes()[..1])?,
            _ => debug!(port, "Ignoring output on unknown port"),
        }
        Ok(())
    }

    /// Raise a timer interrupt right now.
    ///
    /// Returns `false` if the processor is already servicing an interrupt, in
    /// which case the timer event is dropped.
    ///
    /// # Errors
    ///
    /// Fails if saving the interrupted state on the system stack fails
    pub fn raise_timer_interrupt(&mut self) -> Result<bool> {
        // Interrupts are never nested, and never deferred
        if self.registers.in_interrupt() {
            self.interrupt_counter = 0;
            debug!("Already in an interrupt, dropping timer interrupt");
            return Ok(false);
        }

        // The `IRet` leaving the handler brings it back to zero
        self.interrupt_counter = -1;
        info!(pc = self.registers.pc, "Timer interrupt");
        self.enter_interrupt(C::TIMER_HANDLER)?;
        Ok(true)
    }

    /// Count a retired instruction towards the next timer interrupt.
    ///
    /// Only instructions which end outside of an interrupt are counted, so the
    /// `IRet` leaving a handler counts but `Int` does not.
    fn tick_timer(&mut self) -> Result<()> {
        if self.registers.in_interrupt() {
            return Ok(());
        }

        self.interrupt_counter += 1;
        if self.interrupt_counter >= i64::from(self.timer_interval.get()) {
            self.raise_timer_interrupt()?;
        }

        Ok(())
    }

    fn decode_instruction(&mut self) -> Result<Instruction> {
        let address = self.registers.pc;
        let opcode = self.read(address)?;
        let instruction = Instruction::decode(opcode, || self.read(address.wrapping_add(1)))?
            .ok_or(Exception::InvalidInstruction { opcode, address })?;
        self.registers.pc = address.wrapping_add(instruction.size());
        Ok(instruction)
    }

    /// Fetch, decode and execute one instruction, then count it for the timer.
    ///
    /// # Errors
    ///
    /// Returns [`ProcessorError::Halt`] when the program ends, or the fault
    /// which stopped the computer.
    #[tracing::instrument(skip(self), level = "debug")]
    pub fn step(&mut self) -> Result<()> {
        let instruction = self.decode_instruction()?;
        debug!("Executing instruction \"{}\"", instruction);
        instruction.execute(self)?;
        self.cycles += 1;
        self.tick_timer()?;
        trace!("Register state {}", self.registers);
        Ok(())
    }

    /// Flush what `Put` wrote so far
    ///
    /// # Errors
    ///
    /// Fails if the output could not be written
    pub fn flush_output(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }

    /// Flush the program output and tell the memory no more requests will come
    ///
    /// # Errors
    ///
    /// Fails if the output could not be flushed or the memory cannot be reached
    pub fn shutdown(&mut self) -> Result<()> {
        self.flush_output()?;
        self.memory.halt()?;
        Ok(())
    }

    /// Run the program until it halts
    ///
    /// # Errors
    ///
    /// Returns the fault which stopped the computer
    #[tracing::instrument(skip(self))]
    pub fn run(&mut self) -> Result<()> {
        let res = loop {
            match self.step() {
                Ok(()) => {}
                Err(ProcessorError::Halt) => break Ok(()),
                Err(e) => break Err(e),
            }
        };

        let shutdown = self.shutdown();
        debug!(cycles = self.cycles, "Computer stopped");
        res.and(shutdown)
    }
}
