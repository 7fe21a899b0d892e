//! Teaching kernel for a simulated machine.
//!
//! The kernel is entered once per interrupt through
//! [`Kernel::handle_interrupt`] and talks to the machine only through the
//! traits in [`hw`]. It manages a fixed-size process table, a ready queue,
//! per-process page tables backed by secondary storage, and the terminals.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod serial;
pub mod config;
pub mod error;
pub mod hw;
pub mod loader;
pub mod memory;
pub mod scheduler;
pub mod drivers;
pub mod interrupts;
pub mod syscalls;
pub mod kernel;

pub use config::{KernelConfig, LoadPolicy, SchedPolicy};
pub use error::{ConfigError, KernelError, KernelResult, LoadError, SpawnError, StorageError};
pub use hw::sim::SimMachine;
pub use hw::{CpuErr, CpuMode, Hardware, Reg, Word};
pub use interrupts::Irq;
pub use kernel::{Dispatch, Kernel};
pub use loader::ProgramImage;
pub use scheduler::{BlockReason, Pid, Process, ProcessState};
