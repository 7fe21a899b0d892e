use alloc::string::String;
use core::fmt;

use crate::hw::{CpuErr, Word};
use crate::interrupts::Irq;

/// Machine-fatal conditions. The interrupt that raised one still runs to
/// completion, then the machine halts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    UnknownIrq(Word),
    UnknownSyscall(Word),
    NoCurrentProcess(Irq),
    InitLoad(LoadError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            KernelError::UnknownIrq(n) => write!(f, "Unknown IRQ {}", n),
            KernelError::UnknownSyscall(n) => write!(f, "Unknown system call {}", n),
            KernelError::NoCurrentProcess(irq) => write!(f, "{} with no current process", irq.name()),
            KernelError::InitLoad(e) => write!(f, "Cannot load init program: {}", e),
        }
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Failure to bring a program into a process's address space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadError {
    NotFound(String),
    BadName,
    Storage(StorageError),
    OutOfFrames,
    MemoryWrite { vaddr: usize, paddr: usize },
    Translate(CpuErr),
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            LoadError::NotFound(name) => write!(f, "Program '{}' not found", name),
            LoadError::BadName => write!(f, "Invalid program name"),
            LoadError::Storage(e) => write!(f, "Secondary storage: {}", e),
            LoadError::OutOfFrames => write!(f, "No free physical frames"),
            LoadError::MemoryWrite { vaddr, paddr } => {
                write!(f, "Memory write failed at V{} F{}", vaddr, paddr)
            }
            LoadError::Translate(e) => write!(f, "Address translation failed: {}", e.name()),
        }
    }
}

impl From<StorageError> for LoadError {
    fn from(e: StorageError) -> Self {
        LoadError::Storage(e)
    }
}

/// Secondary storage errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    NoSpace,
    CatalogFull,
    OutOfRange(usize),
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            StorageError::NoSpace => write!(f, "No space left"),
            StorageError::CatalogFull => write!(f, "Program catalog full"),
            StorageError::OutOfRange(addr) => write!(f, "Address {} out of range", addr),
        }
    }
}

/// A `KernelConfig` field that cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    ZeroQuantum,
    ZeroTimerInterval,
    ZeroTableSize,
    ZeroTerminals,
    ZeroPageSize,
    ZeroMaxPrograms,
    EmptyInitProgram,
    UnknownPolicy(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::ZeroQuantum => write!(f, "quantum must be positive"),
            ConfigError::ZeroTimerInterval => write!(f, "timer interval must be positive"),
            ConfigError::ZeroTableSize => write!(f, "process table needs at least one slot"),
            ConfigError::ZeroTerminals => write!(f, "at least one terminal is required"),
            ConfigError::ZeroPageSize => write!(f, "page size must be positive"),
            ConfigError::ZeroMaxPrograms => write!(f, "catalog needs at least one entry"),
            ConfigError::EmptyInitProgram => write!(f, "init program name is empty"),
            ConfigError::UnknownPolicy(s) => write!(f, "unknown policy '{}'", s),
        }
    }
}

/// Why a process could not be created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    TableFull,
    Load(LoadError),
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpawnError::TableFull => write!(f, "Process table full"),
            SpawnError::Load(e) => write!(f, "{}", e),
        }
    }
}

impl From<LoadError> for SpawnError {
    fn from(e: LoadError) -> Self {
        SpawnError::Load(e)
    }
}
