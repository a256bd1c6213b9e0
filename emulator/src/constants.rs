pub type Address = i32;
pub type Word = i32;

/// Total size of the computer memory
pub const MEMORY_SIZE: usize = 2000;

/// First address of the system region. User mode cannot address anything from here on.
pub const SYSTEM_START: Address = 1000;

/// Where the program counter starts
pub const PROGRAM_START: Address = 0;

/// Start of the user stack pointer
pub const USER_STACK_START: Address = 999;

/// Start of the system stack pointer, used while servicing an interrupt
pub const SYSTEM_STACK_START: Address = 1999;

/// Address of the timer interrupt handler
pub const TIMER_HANDLER: Address = 1000;

/// Address of the system call handler
pub const SYSCALL_HANDLER: Address = 1500;
