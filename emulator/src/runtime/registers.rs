use bitflags::bitflags;
use parse_display::Display;
use thiserror::Error;

use crate::constants as C;

bitflags! {
    #[derive(Clone, Copy, PartialEq, Eq, Default)]
    pub struct StatusRegister: u8 {
        /// Set when the processor runs in kernel mode, cleared in user mode
        const KERNEL       = 0b01;
        /// Set while an interrupt (timer or system call) is being serviced
        const IN_INTERRUPT = 0b10;
    }
}

impl std::fmt::Debug for StatusRegister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#04b}", self.bits())
    }
}

/// Processor mode, derived from the status register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display(style = "lowercase")]
pub enum Mode {
    /// Restricted to addresses below the system region
    User,

    /// Full address space
    Kernel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registers {
    /// Program counter
    pub pc: C::Address,

    /// Stack pointer
    pub sp: C::Address,

    /// Accumulator
    pub ac: C::Word,

    /// Index register
    pub x: C::Word,

    /// Index register
    pub y: C::Word,

    /// Status register
    pub sr: StatusRegister,
}

impl Default for Registers {
    fn default() -> Self {
        // On startup, the processor runs the user program in user mode
        Self {
            pc: C::PROGRAM_START,
            sp: C::USER_STACK_START,
            ac: 0,
            x: 0,
            y: 0,
            sr: StatusRegister::empty(),
        }
    }
}

impl Registers {
    #[must_use]
    pub fn mode(&self) -> Mode {
        if self.sr.contains(StatusRegister::KERNEL) {
            Mode::Kernel
        } else {
            Mode::User
        }
    }

    #[must_use]
    pub fn in_interrupt(&self) -> bool {
        self.sr.contains(StatusRegister::IN_INTERRUPT)
    }

    #[must_use]
    pub fn get(&self, reg: Reg) -> C::Word {
        match reg {
            Reg::PC => self.pc,
            Reg::SP => self.sp,
            Reg::AC => self.ac,
            Reg::X => self.x,
            Reg::Y => self.y,
        }
    }

    pub fn set(&mut self, reg: Reg, value: C::Word) {
        match reg {
            Reg::PC => self.pc = value,
            Reg::SP => self.sp = value,
            Reg::AC => self.ac = value,
            Reg::X => self.x = value,
            Reg::Y => self.y = value,
        }
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "%pc = {} | %sp = {} | %ac = {} | %x = {} | %y = {} | mode = {}{}",
            self.pc,
            self.sp,
            self.ac,
            self.x,
            self.y,
            self.mode(),
            if self.in_interrupt() {
                " (in interrupt)"
            } else {
                ""
            }
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[display("%{}", style = "lowercase")]
pub enum Reg {
    /// Program counter
    PC,

    /// Stack pointer
    SP,

    /// Accumulator
    AC,

    /// Index register
    X,

    /// Index register
    Y,
}

#[derive(Error, Debug)]
#[error("could not parse register")]
pub struct RegisterParseError;

impl std::str::FromStr for Reg {
    type Err = RegisterParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "%pc" | "pc" => Ok(Reg::PC),
            "%sp" | "sp" => Ok(Reg::SP),
            "%ac" | "ac" => Ok(Reg::AC),
            "%x" | "x" => Ok(Reg::X),
            "%y" | "y" => Ok(Reg::Y),
            _ => Err(RegisterParseError),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_state_test() {
        let registers = Registers::default();
        assert_eq!(registers.pc, 0);
        assert_eq!(registers.sp, 999);
        assert_eq!(registers.mode(), Mode::User);
        assert!(!registers.in_interrupt());
    }

    #[test]
    fn parse_register_test() {
        assert_eq!("%sp".parse::<Reg>().unwrap(), Reg::SP);
        assert_eq!("AC".parse::<Reg>().unwrap(), Reg::AC);
        assert!("%a".parse::<Reg>().is_err());
        assert_eq!(Reg::PC.to_string(), "%pc");
    }
}
