//! The simulated machine as seen from the kernel.
//!
//! The CPU, physical memory, MMU, clock and terminals are collaborators with
//! a fixed contract. The kernel only touches them through these traits and
//! never looks at how they work inside; `sim::SimMachine` is an in-memory
//! implementation used by the tests.

pub mod sim;

use crate::loader::ProgramImage;
use crate::memory::paging::PageTable;

/// One machine word. Registers, memory cells and device ports all hold one.
pub type Word = i32;

/// Registers saved by the CPU when it takes an interrupt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reg {
    Pc,
    A,
    X,
    Err,
    Complement,
    Mode,
}

impl Reg {
    pub const ALL: [Reg; 6] = [Reg::Pc, Reg::A, Reg::X, Reg::Err, Reg::Complement, Reg::Mode];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// CPU privilege level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuMode {
    Supervisor,
    User,
}

impl CpuMode {
    pub fn to_word(self) -> Word {
        match self {
            CpuMode::Supervisor => 0,
            CpuMode::User => 1,
        }
    }

    pub fn from_word(w: Word) -> CpuMode {
        if w == 0 { CpuMode::Supervisor } else { CpuMode::User }
    }
}

/// Error codes the CPU reports in its error register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CpuErr {
    Ok,
    AddressInvalid,
    DeviceInvalid,
    InstructionInvalid,
    Privileged,
    ArgumentInvalid,
    DivByZero,
    PageFault,
    Halted,
    Unknown(Word),
}

impl CpuErr {
    pub fn to_word(self) -> Word {
        match self {
            CpuErr::Ok => 0,
            CpuErr::AddressInvalid => 1,
            CpuErr::DeviceInvalid => 2,
            CpuErr::InstructionInvalid => 3,
            CpuErr::Privileged => 4,
            CpuErr::ArgumentInvalid => 5,
            CpuErr::DivByZero => 6,
            CpuErr::PageFault => 7,
            CpuErr::Halted => 8,
            CpuErr::Unknown(w) => w,
        }
    }

    pub fn from_word(w: Word) -> CpuErr {
        match w {
            0 => CpuErr::Ok,
            1 => CpuErr::AddressInvalid,
            2 => CpuErr::DeviceInvalid,
            3 => CpuErr::InstructionInvalid,
            4 => CpuErr::Privileged,
            5 => CpuErr::ArgumentInvalid,
            6 => CpuErr::DivByZero,
            7 => CpuErr::PageFault,
            8 => CpuErr::Halted,
            other => CpuErr::Unknown(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            CpuErr::Ok => "OK",
            CpuErr::AddressInvalid => "invalid address",
            CpuErr::DeviceInvalid => "invalid device",
            CpuErr::InstructionInvalid => "invalid instruction",
            CpuErr::Privileged => "privileged instruction",
            CpuErr::ArgumentInvalid => "invalid argument",
            CpuErr::DivByZero => "division by zero",
            CpuErr::PageFault => "page fault",
            CpuErr::Halted => "CPU halted",
            CpuErr::Unknown(_) => "unknown error",
        }
    }
}

/// Register file written by the CPU on interrupt entry and read back on return.
pub trait Registers {
    fn read_reg(&self, reg: Reg) -> Word;
    fn write_reg(&mut self, reg: Reg, value: Word);
}

/// Raw physical memory.
pub trait PhysMemory {
    fn mem_read(&self, addr: usize) -> Result<Word, CpuErr>;
    fn mem_write(&mut self, addr: usize, value: Word) -> Result<(), CpuErr>;
    fn mem_size(&self) -> usize;
}

/// Page translation. The kernel installs the current process's table with
/// `activate`; `virt_read` translates with the active table.
pub trait Mmu {
    fn activate(&mut self, table: &PageTable);
    fn virt_read(&self, vaddr: usize, mode: CpuMode) -> Result<Word, CpuErr>;
}

/// Terminal devices, addressed by `terminal * 4 + port`.
pub trait Console {
    fn term_read(&mut self, port: usize) -> Result<Word, CpuErr>;
    fn term_write(&mut self, port: usize, value: Word) -> Result<(), CpuErr>;
}

/// Interval timer plus the instruction clock used for accounting.
pub trait Timer {
    /// Arm the timer to interrupt after `interval` instructions.
    fn arm(&mut self, interval: Word);
    /// Clear a pending timer interrupt.
    fn ack(&mut self);
    /// Instructions executed since power-on.
    fn now(&self) -> u64;
}

/// Executable loader: turns a file name into a program image.
pub trait ProgramLoader {
    fn load(&self, name: &str) -> Option<ProgramImage>;
}

/// Everything the kernel needs from the machine.
pub trait Hardware: Registers + PhysMemory + Mmu + Console + Timer + ProgramLoader {}

impl<T> Hardware for T where T: Registers + PhysMemory + Mmu + Console + Timer + ProgramLoader {}
