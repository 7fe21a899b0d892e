use alloc::vec;
use alloc::vec::Vec;

use crate::hw::{Console, CpuErr, Word};

/// Registers of one terminal, relative to `terminal * PORTS_PER_TERMINAL`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(usize)]
pub enum TermPort {
    InData = 0,
    InReady = 1,
    OutData = 2,
    OutReady = 3,
}

pub const PORTS_PER_TERMINAL: usize = 4;

/// Device address of `port` on `terminal`.
pub fn port(terminal: usize, port: TermPort) -> usize {
    terminal * PORTS_PER_TERMINAL + port as usize
}

pub fn input_ready<C: Console + ?Sized>(console: &mut C, terminal: usize) -> Result<bool, CpuErr> {
    Ok(console.term_read(port(terminal, TermPort::InReady))? != 0)
}

pub fn output_ready<C: Console + ?Sized>(console: &mut C, terminal: usize) -> Result<bool, CpuErr> {
    Ok(console.term_read(port(terminal, TermPort::OutReady))? != 0)
}

pub fn read_input<C: Console + ?Sized>(console: &mut C, terminal: usize) -> Result<Word, CpuErr> {
    console.term_read(port(terminal, TermPort::InData))
}

pub fn write_output<C: Console + ?Sized>(console: &mut C, terminal: usize, value: Word) -> Result<(), CpuErr> {
    console.term_write(port(terminal, TermPort::OutData), value)
}

/// Usage counters for the fixed set of terminals.
///
/// A new process gets the terminal with the lowest count (lowest index on
/// ties); the count goes back down when the process dies.
#[derive(Debug, Clone)]
pub struct TerminalPool {
    usage: Vec<u32>,
}

impl TerminalPool {
    pub fn new(terminals: usize) -> Self {
        TerminalPool { usage: vec![0; terminals] }
    }

    /// Pick the least used terminal and count one more user for it.
    pub fn acquire(&mut self) -> usize {
        let mut best = 0;
        for (i, &count) in self.usage.iter().enumerate().skip(1) {
            if count < self.usage[best] {
                best = i;
            }
        }
        self.usage[best] += 1;
        best
    }

    pub fn release(&mut self, terminal: usize) {
        if let Some(count) = self.usage.get_mut(terminal) {
            *count = count.saturating_sub(1);
        }
    }

    pub fn reset(&mut self) {
        self.usage.iter_mut().for_each(|c| *c = 0);
    }

    pub fn usage(&self) -> &[u32] {
        &self.usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_port_layout() {
        assert_eq!(port(0, TermPort::InData), 0);
        assert_eq!(port(1, TermPort::InReady), 5);
        assert_eq!(port(2, TermPort::OutData), 10);
        assert_eq!(port(3, TermPort::OutReady), 15);
    }

    #[test]
    fn test_least_used_terminal() {
        let mut pool = TerminalPool::new(4);
        assert_eq!(pool.acquire(), 0);
        assert_eq!(pool.acquire(), 1);
        assert_eq!(pool.acquire(), 2);
        pool.release(1);
        assert_eq!(pool.acquire(), 1);
        assert_eq!(pool.acquire(), 3);
        // all in use once: wraps back to the lowest index
        assert_eq!(pool.acquire(), 0);
        assert_eq!(pool.usage(), &[2, 1, 1, 1]);
    }

    #[test]
    fn test_release_saturates() {
        let mut pool = TerminalPool::new(2);
        pool.release(0);
        pool.release(9);
        assert_eq!(pool.usage(), &[0, 0]);
    }
}
