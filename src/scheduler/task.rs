use alloc::string::String;
use core::fmt;

use super::accounting::ProcessStats;
use super::context::CpuContext;
use crate::hw::Word;
use crate::memory::paging::PageTable;
use crate::memory::secondary::StoredRange;

/// Unique process identifier. Assigned in increasing order, never reused
/// while the kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Pid(pub Word);

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Process state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    /// Waiting for another process to die.
    Waiting,
    /// Waiting for a terminal to become ready.
    Blocked,
}

impl ProcessState {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Why a blocked process is blocked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// Input not available yet.
    Read,
    /// Output busy; the value is written once it frees up.
    Write(Word),
}

/// A single process.
pub struct Process {
    pub pid: Pid,
    pub name: String,
    state: ProcessState,
    pub context: CpuContext,
    /// Terminal owned for the whole lifetime of the process.
    pub terminal: usize,
    /// Clock interrupts left before preemption. Only meaningful while running.
    pub quantum: i32,
    /// Lower is preferred by the priority scheduler.
    pub priority: i32,
    pub page_table: PageTable,
    /// Where the program image is staged in secondary storage.
    pub image: StoredRange,
    pub blocked_on: Option<BlockReason>,
    pub waiting_for: Option<Pid>,
    pub stats: ProcessStats,
}

impl Process {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        pid: Pid,
        name: &str,
        context: CpuContext,
        terminal: usize,
        priority: i32,
        page_table: PageTable,
        image: StoredRange,
        now: u64,
    ) -> Self {
        Process {
            pid,
            name: String::from(name),
            state: ProcessState::Ready,
            context,
            terminal,
            quantum: 0,
            priority,
            page_table,
            image,
            blocked_on: None,
            waiting_for: None,
            stats: ProcessStats::new(now, ProcessState::Ready),
        }
    }

    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub fn is_ready(&self) -> bool {
        self.state == ProcessState::Ready
    }

    /// Move to `state`, closing the accounting interval of the old one.
    pub fn set_state(&mut self, state: ProcessState, now: u64) {
        if state == self.state {
            return;
        }
        self.stats.transition(self.state, state, now);
        self.state = state;
        if state != ProcessState::Blocked {
            self.blocked_on = None;
        }
        if state != ProcessState::Waiting {
            self.waiting_for = None;
        }
    }

    pub fn block(&mut self, reason: BlockReason, now: u64) {
        self.set_state(ProcessState::Blocked, now);
        self.blocked_on = Some(reason);
    }

    pub fn wait_for(&mut self, pid: Pid, now: u64) {
        self.set_state(ProcessState::Waiting, now);
        self.waiting_for = Some(pid);
    }
}

impl fmt::Debug for Process {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .field("state", &self.state)
            .field("terminal", &self.terminal)
            .field("quantum", &self.quantum)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process() -> Process {
        let image = StoredRange { start: 0, end: 9, load_address: 0 };
        Process::new(Pid(1), "p", CpuContext::new(0), 0, 50, PageTable::new(10), image, 0)
    }

    #[test]
    fn test_new_process_is_ready() {
        let p = process();
        assert!(p.is_ready());
        assert_eq!(p.stats.entries(ProcessState::Ready), 1);
    }

    #[test]
    fn test_leaving_blocked_clears_reason() {
        let mut p = process();
        p.block(BlockReason::Write(65), 5);
        assert_eq!(p.state(), ProcessState::Blocked);
        assert_eq!(p.blocked_on, Some(BlockReason::Write(65)));
        p.set_state(ProcessState::Ready, 9);
        assert_eq!(p.blocked_on, None);
        assert_eq!(p.stats.time_in(ProcessState::Blocked), 4);
    }

    #[test]
    fn test_wait_records_target() {
        let mut p = process();
        p.wait_for(Pid(7), 3);
        assert_eq!(p.waiting_for, Some(Pid(7)));
        p.set_state(ProcessState::Ready, 4);
        assert_eq!(p.waiting_for, None);
    }
}
