//! In-memory machine for driving the kernel without a CPU emulator.
//!
//! `SimMachine` does not execute instructions. A test plays the CPU: it sets
//! registers, pokes devices and calls `Kernel::handle_interrupt`, then reads
//! back what the kernel left in the registers, memory and terminals.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use super::{Console, CpuErr, CpuMode, Mmu, PhysMemory, ProgramLoader, Reg, Registers, Timer, Word};
use crate::drivers::tty::{TermPort, PORTS_PER_TERMINAL};
use crate::error::LoadError;
use crate::loader::{ImageError, ProgramImage};
use crate::memory::paging::PageTable;

/// One terminal: a keyboard queue and a screen.
#[derive(Debug, Clone)]
pub struct SimTerminal {
    pub input: VecDeque<Word>,
    pub output: Vec<Word>,
    pub output_ready: bool,
}

impl SimTerminal {
    fn new() -> Self {
        SimTerminal {
            input: VecDeque::new(),
            output: Vec::new(),
            output_ready: true,
        }
    }
}

pub struct SimMachine {
    regs: [Word; 6],
    memory: Vec<Word>,
    active: Option<PageTable>,
    terminals: Vec<SimTerminal>,
    timer_interval: Option<Word>,
    /// Instructions executed since the timer was last armed.
    since_armed: u64,
    timer_pending: bool,
    clock: u64,
    programs: BTreeMap<String, ProgramImage>,
}

impl SimMachine {
    pub fn new(mem_size: usize, terminals: usize) -> Self {
        SimMachine {
            regs: [0; 6],
            memory: vec![0; mem_size],
            active: None,
            terminals: (0..terminals).map(|_| SimTerminal::new()).collect(),
            timer_interval: None,
            since_armed: 0,
            timer_pending: false,
            clock: 0,
            programs: BTreeMap::new(),
        }
    }

    pub fn reg(&self, reg: Reg) -> Word {
        self.regs[reg.index()]
    }

    pub fn set_reg(&mut self, reg: Reg, value: Word) {
        self.regs[reg.index()] = value;
    }

    /// Make `image` loadable under `name`.
    pub fn add_program(&mut self, name: &str, image: ProgramImage) {
        self.programs.insert(String::from(name), image);
    }

    /// Parse `text` as a program image and make it loadable under `name`.
    pub fn add_program_text(&mut self, name: &str, text: &str) -> Result<(), ImageError> {
        let image = ProgramImage::parse(text)?;
        self.add_program(name, image);
        Ok(())
    }

    /// Queue a keypress on `terminal`.
    pub fn push_input(&mut self, terminal: usize, value: Word) {
        if let Some(t) = self.terminals.get_mut(terminal) {
            t.input.push_back(value);
        }
    }

    pub fn set_output_ready(&mut self, terminal: usize, ready: bool) {
        if let Some(t) = self.terminals.get_mut(terminal) {
            t.output_ready = ready;
        }
    }

    /// Everything written to `terminal` so far.
    pub fn output(&self, terminal: usize) -> &[Word] {
        self.terminals.get(terminal).map_or(&[], |t| t.output.as_slice())
    }

    /// Let `instructions` pass. Returns true if the timer fired meanwhile.
    pub fn advance(&mut self, instructions: u64) -> bool {
        self.clock += instructions;
        self.since_armed += instructions;
        if self.timer_interval.is_some_and(|i| self.since_armed >= i as u64) {
            self.timer_pending = true;
        }
        self.timer_pending
    }

    pub fn timer_interval(&self) -> Option<Word> {
        self.timer_interval
    }

    pub fn timer_pending(&self) -> bool {
        self.timer_pending
    }

    pub fn active_table(&self) -> Option<&PageTable> {
        self.active.as_ref()
    }

    /// Write `words` to physical memory starting at `addr`.
    pub fn poke(&mut self, addr: usize, words: &[Word]) -> Result<(), LoadError> {
        for (i, &w) in words.iter().enumerate() {
            self.mem_write(addr + i, w)
                .map_err(|_| LoadError::MemoryWrite { vaddr: addr + i, paddr: addr + i })?;
        }
        Ok(())
    }

    fn terminal_port(&self, port: usize) -> Result<(usize, usize), CpuErr> {
        let terminal = port / PORTS_PER_TERMINAL;
        if terminal >= self.terminals.len() {
            return Err(CpuErr::DeviceInvalid);
        }
        Ok((terminal, port % PORTS_PER_TERMINAL))
    }
}

impl Registers for SimMachine {
    fn read_reg(&self, reg: Reg) -> Word {
        self.reg(reg)
    }

    fn write_reg(&mut self, reg: Reg, value: Word) {
        self.set_reg(reg, value);
    }
}

impl PhysMemory for SimMachine {
    fn mem_read(&self, addr: usize) -> Result<Word, CpuErr> {
        self.memory.get(addr).copied().ok_or(CpuErr::AddressInvalid)
    }

    fn mem_write(&mut self, addr: usize, value: Word) -> Result<(), CpuErr> {
        match self.memory.get_mut(addr) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(CpuErr::AddressInvalid),
        }
    }

    fn mem_size(&self) -> usize {
        self.memory.len()
    }
}

impl Mmu for SimMachine {
    fn activate(&mut self, table: &PageTable) {
        self.active = Some(table.clone());
    }

    /// Supervisor accesses are physical; user accesses go through the
    /// active table.
    fn virt_read(&self, vaddr: usize, mode: CpuMode) -> Result<Word, CpuErr> {
        let paddr = match (mode, &self.active) {
            (CpuMode::Supervisor, _) => vaddr,
            (CpuMode::User, Some(table)) => table.translate(vaddr)?,
            (CpuMode::User, None) => return Err(CpuErr::AddressInvalid),
        };
        self.mem_read(paddr)
    }
}

impl Console for SimMachine {
    fn term_read(&mut self, port: usize) -> Result<Word, CpuErr> {
        let (terminal, offset) = self.terminal_port(port)?;
        let t = &mut self.terminals[terminal];
        match offset {
            p if p == TermPort::InData as usize => t.input.pop_front().ok_or(CpuErr::DeviceInvalid),
            p if p == TermPort::InReady as usize => Ok(!t.input.is_empty() as Word),
            p if p == TermPort::OutReady as usize => Ok(t.output_ready as Word),
            _ => Err(CpuErr::DeviceInvalid),
        }
    }

    fn term_write(&mut self, port: usize, value: Word) -> Result<(), CpuErr> {
        let (terminal, offset) = self.terminal_port(port)?;
        let t = &mut self.terminals[terminal];
        if offset != TermPort::OutData as usize || !t.output_ready {
            return Err(CpuErr::DeviceInvalid);
        }
        t.output.push(value);
        Ok(())
    }
}

impl Timer for SimMachine {
    fn arm(&mut self, interval: Word) {
        self.timer_interval = Some(interval);
        self.since_armed = 0;
    }

    fn ack(&mut self) {
        self.timer_pending = false;
    }

    fn now(&self) -> u64 {
        self.clock
    }
}

impl ProgramLoader for SimMachine {
    fn load(&self, name: &str) -> Option<ProgramImage> {
        self.programs.get(name).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::tty::port;

    #[test]
    fn test_terminal_ports() {
        let mut m = SimMachine::new(100, 2);
        assert_eq!(m.term_read(port(1, TermPort::InReady)), Ok(0));
        m.push_input(1, 'x' as Word);
        assert_eq!(m.term_read(port(1, TermPort::InReady)), Ok(1));
        assert_eq!(m.term_read(port(1, TermPort::InData)), Ok('x' as Word));

        assert_eq!(m.term_write(port(0, TermPort::OutData), 7), Ok(()));
        m.set_output_ready(0, false);
        assert_eq!(m.term_read(port(0, TermPort::OutReady)), Ok(0));
        assert_eq!(m.term_write(port(0, TermPort::OutData), 8), Err(CpuErr::DeviceInvalid));
        assert_eq!(m.output(0), &[7]);

        assert_eq!(m.term_read(port(2, TermPort::InReady)), Err(CpuErr::DeviceInvalid));
    }

    #[test]
    fn test_user_reads_translate() {
        let mut m = SimMachine::new(100, 1);
        m.poke(30, &[11, 12]).unwrap();
        let mut table = PageTable::new(10);
        table.map(0, 3);
        m.activate(&table);
        assert_eq!(m.virt_read(1, CpuMode::User), Ok(12));
        assert_eq!(m.virt_read(1, CpuMode::Supervisor), Ok(0));
        assert_eq!(m.virt_read(15, CpuMode::User), Err(CpuErr::AddressInvalid));
    }

    #[test]
    fn test_timer_fires_after_interval() {
        let mut m = SimMachine::new(10, 1);
        m.arm(20);
        assert!(!m.advance(5));
        assert!(m.advance(25));
        m.ack();
        assert!(!m.timer_pending());
        assert_eq!(m.now(), 30);
    }

    #[test]
    fn test_timer_accumulates_across_advances() {
        let mut m = SimMachine::new(10, 1);
        m.arm(20);
        for _ in 0..3 {
            assert!(!m.advance(5));
        }
        assert!(m.advance(5));
        assert_eq!(m.now(), 20);

        // rearming restarts the count
        m.ack();
        m.arm(20);
        assert!(!m.advance(15));
        assert!(m.advance(5));
    }
}
