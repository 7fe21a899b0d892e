//! The kernel proper: one call per interrupt.
//!
//! Every interrupt runs the same five stages in a fixed order:
//! save the interrupted context, handle the IRQ, resolve pending waits and
//! blocks, pick the next process, restore its context. A process unblocked
//! in the third stage is already visible to the fourth.

use alloc::string::String;
use alloc::vec::Vec;

use crate::config::{KernelConfig, LoadPolicy, SchedPolicy};
use crate::drivers::tty::{self, TerminalPool};
use crate::error::{ConfigError, KernelResult, LoadError, SpawnError};
use crate::hw::{CpuErr, CpuMode, Hardware, Reg, Word};
use crate::interrupts::Irq;
use crate::memory::{BumpFrameAllocator, Loaded, PageTable, Pager, SecondaryStorage, StoredRange};
use crate::scheduler::{
    self, BlockReason, CpuContext, Metrics, Pid, Process, ProcessState, ProcessTable, Report, Scheduler,
};
use crate::{log_debug, log_error, log_info, log_warn};

/// What the CPU resumes after the kernel returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Running(Pid),
    /// Nothing to run; the halt code is in the error register.
    Idle,
}

/// Kernel state, created once at power-on. All five dispatch stages and
/// every handler operate on it; there is no other kernel state.
pub struct Kernel<H: Hardware> {
    pub(crate) hw: H,
    pub(crate) config: KernelConfig,
    pub(crate) table: ProcessTable,
    pub(crate) scheduler: Scheduler,
    pub(crate) terminals: TerminalPool,
    pub(crate) pager: Pager,
    pub(crate) storage: SecondaryStorage,
    /// Process whose context is in the CPU, if any.
    pub(crate) current: Option<Pid>,
    pub(crate) next_pid: Word,
    pub(crate) metrics: Metrics,
}

impl<H: Hardware> Kernel<H> {
    pub fn new(mut hw: H, config: KernelConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let frames = BumpFrameAllocator::for_memory(hw.mem_size(), config.page_size, config.reserved_words);
        let pager = Pager::new(frames, config.page_size, config.load_policy);
        hw.arm(config.timer_interval);

        log_info!(
            "SO: kernel up, {} scheduling, {} loading, {} slots, {} terminals",
            config.sched_policy,
            config.load_policy,
            config.table_size,
            config.terminals
        );

        Ok(Kernel {
            table: ProcessTable::new(config.table_size),
            scheduler: Scheduler::new(config.sched_policy),
            terminals: TerminalPool::new(config.terminals),
            storage: SecondaryStorage::new(config.secondary_size, config.max_programs),
            pager,
            current: None,
            next_pid: 1,
            metrics: Metrics::default(),
            hw,
            config,
        })
    }

    /// Handle interrupt `raw_irq`. A fatal error is reported after the
    /// remaining stages have run; the caller should stop the machine.
    pub fn handle_interrupt(&mut self, raw_irq: Word) -> KernelResult<Dispatch> {
        let irq = Irq::from_word(raw_irq);
        self.metrics.count_irq(irq);
        log_info!("SO: IRQ {} ({})", raw_irq, irq.name());

        self.save_context();
        let routed = self.route_irq(irq);
        self.resolve_pending();
        self.schedule();
        let dispatched = self.dispatch();

        match routed {
            Ok(()) => Ok(dispatched),
            Err(e) => {
                log_error!("SO: {}", e);
                self.hw.write_reg(Reg::Err, CpuErr::Halted.to_word());
                Err(e)
            }
        }
    }

    // ── Dispatch stages ──

    fn save_context(&mut self) {
        if let Some(p) = self.current.and_then(|pid| self.table.get_mut(pid)) {
            p.context.save_from(&self.hw);
        }
    }

    /// Wake every waiting process whose target died and every blocked
    /// process whose terminal became ready.
    fn resolve_pending(&mut self) {
        let now = self.hw.now();
        for pid in self.table.pids() {
            let Some(p) = self.table.get(pid) else { continue };
            let (terminal, waiting_for, blocked_on) = (p.terminal, p.waiting_for, p.blocked_on);
            let woken = match p.state() {
                ProcessState::Waiting => !waiting_for.is_some_and(|target| self.table.contains(target)),
                ProcessState::Blocked => match blocked_on {
                    Some(reason) => self.finish_io(pid, terminal, reason),
                    None => true,
                },
                ProcessState::Ready | ProcessState::Running => false,
            };
            if woken {
                self.wake(pid, now);
            }
        }
    }

    /// Retry the terminal transfer `pid` is blocked on. On success the
    /// result is left in its saved A register.
    fn finish_io(&mut self, pid: Pid, terminal: usize, reason: BlockReason) -> bool {
        let result = match reason {
            BlockReason::Read => match tty::input_ready(&mut self.hw, terminal) {
                Ok(true) => tty::read_input(&mut self.hw, terminal).unwrap_or(-1),
                _ => return false,
            },
            BlockReason::Write(value) => match tty::output_ready(&mut self.hw, terminal) {
                Ok(true) => match tty::write_output(&mut self.hw, terminal, value) {
                    Ok(()) => 0,
                    Err(_) => -1,
                },
                _ => return false,
            },
        };
        if let Some(p) = self.table.get_mut(pid) {
            p.context.a = result;
        }
        true
    }

    /// Keep the current process while it has quantum left; otherwise queue
    /// it and take the first ready process from the queue.
    fn schedule(&mut self) {
        let now = self.hw.now();
        let previous = self.current.take();

        if let Some(pid) = previous {
            let quantum = self.config.quantum;
            let policy = self.config.sched_policy;
            if let Some(p) = self.table.get_mut(pid) {
                if p.quantum > 0 {
                    self.current = Some(pid);
                    return;
                }
                if p.state() == ProcessState::Running {
                    p.stats.preemptions += 1;
                    self.metrics.preemptions += 1;
                    if policy == SchedPolicy::Priority {
                        p.priority = scheduler::recompute_priority(p.priority, quantum - p.quantum, quantum);
                    }
                    log_debug!("SO: pid {} used its quantum", pid);
                }
                p.set_state(ProcessState::Ready, now);
                let priority = p.priority;
                self.scheduler.push(pid, priority);
            }
        }

        while let Some(pid) = self.scheduler.dequeue() {
            match self.table.get_mut(pid) {
                Some(p) if p.is_ready() => {
                    p.set_state(ProcessState::Running, now);
                    p.quantum = self.config.quantum;
                    self.hw.activate(&p.page_table);
                    if previous != Some(pid) {
                        self.metrics.context_switches += 1;
                    }
                    self.current = Some(pid);
                    return;
                }
                _ => log_debug!("SO: dropping stale queue entry for pid {}", pid),
            }
        }
    }

    fn dispatch(&mut self) -> Dispatch {
        let now = self.hw.now();
        match self.current.and_then(|pid| self.table.get(pid)) {
            Some(p) => {
                p.context.restore_to(&mut self.hw);
                self.metrics.leave_idle(now);
                Dispatch::Running(p.pid)
            }
            None => {
                self.hw.write_reg(Reg::Err, CpuErr::Halted.to_word());
                self.metrics.enter_idle(now);
                log_info!("SO: nothing to run, CPU idle");
                Dispatch::Idle
            }
        }
    }

    // ── Process management ──

    pub(crate) fn allocate_pid(&mut self) -> Pid {
        let pid = Pid(self.next_pid);
        self.next_pid += 1;
        pid
    }

    /// Stage `name` in secondary storage if needed and map it into `table`.
    pub(crate) fn load_program(
        &mut self,
        name: &str,
        table: &mut PageTable,
    ) -> Result<(StoredRange, Loaded), LoadError> {
        let range = match self.storage.lookup(name) {
            Some(range) => range,
            None => {
                let image = self.hw.load(name).ok_or_else(|| LoadError::NotFound(String::from(name)))?;
                self.storage.stage(name, &image)?
            }
        };
        let loaded = self.pager.load(range, &self.storage, table, &mut self.hw)?;
        log_info!("SO: '{}' loaded at V{}-{}", name, loaded.vstart, loaded.vend);
        Ok((range, loaded))
    }

    /// Create a ready process running program `name`.
    pub(crate) fn spawn(&mut self, name: &str) -> Result<Pid, SpawnError> {
        if self.table.is_full() {
            return Err(SpawnError::TableFull);
        }
        let mut page_table = PageTable::new(self.config.page_size);
        let (image, loaded) = self.load_program(name, &mut page_table)?;

        let pid = self.allocate_pid();
        let terminal = self.terminals.acquire();
        let now = self.hw.now();
        let process = Process::new(
            pid,
            name,
            CpuContext::new(loaded.vstart as Word),
            terminal,
            self.config.default_priority,
            page_table,
            image,
            now,
        );
        let priority = process.priority;
        if let Err(process) = self.table.insert(process) {
            self.terminals.release(process.terminal);
            return Err(SpawnError::TableFull);
        }
        self.scheduler.push(pid, priority);
        self.metrics.created += 1;
        log_info!("SO: created pid {} '{}' on terminal {}", pid, name, terminal);
        Ok(pid)
    }

    /// Destroy `pid` and give back its terminal. Its frames stay allocated.
    pub(crate) fn kill(&mut self, pid: Pid) -> Option<Process> {
        let process = self.table.remove(pid)?;
        self.terminals.release(process.terminal);
        self.scheduler.remove(pid);
        if self.current == Some(pid) {
            self.current = None;
        }
        self.metrics.killed += 1;

        let summary = process.stats.summary(process.state(), self.hw.now());
        log_info!(
            "SO: pid {} '{}' died: turnaround {}, running {}, mean ready {}, {} preemptions",
            pid,
            process.name,
            summary.turnaround,
            summary.running,
            summary.mean_ready,
            summary.preemptions
        );
        Some(process)
    }

    fn wake(&mut self, pid: Pid, now: u64) {
        if let Some(p) = self.table.get_mut(pid) {
            p.set_state(ProcessState::Ready, now);
            let priority = p.priority;
            self.scheduler.push(pid, priority);
            log_info!("SO: pid {} is ready again", pid);
        }
    }

    /// Priority bookkeeping for a process leaving the CPU before its
    /// quantum ran out.
    pub(crate) fn charge_cpu(&mut self, pid: Pid) {
        if self.config.sched_policy != SchedPolicy::Priority {
            return;
        }
        let quantum = self.config.quantum;
        if let Some(p) = self.table.get_mut(pid) {
            p.priority = scheduler::recompute_priority(p.priority, quantum - p.quantum, quantum);
        }
    }

    /// Read one word of `pid`'s address space. Only valid for the current
    /// process, whose table is the active one.
    fn read_virtual(&mut self, pid: Pid, vaddr: usize) -> Result<Word, CpuErr> {
        match self.hw.virt_read(vaddr, CpuMode::User) {
            Err(CpuErr::PageFault) if self.pager.policy() == LoadPolicy::OnDemand && self.swap_in(pid, vaddr) => {
                self.hw.virt_read(vaddr, CpuMode::User)
            }
            other => other,
        }
    }

    /// Copy a zero-terminated program name out of the current process's
    /// memory. Unreadable memory is a translation error; a negative address,
    /// a non-character word or a missing terminator within `max_name_len`
    /// is a bad name.
    pub(crate) fn copy_str_from_process(&mut self, pid: Pid, vaddr: Word) -> Result<String, LoadError> {
        if vaddr < 0 || self.current != Some(pid) {
            return Err(LoadError::BadName);
        }
        let mut s = String::new();
        for i in 0..self.config.max_name_len {
            let c = self.read_virtual(pid, vaddr as usize + i).map_err(LoadError::Translate)?;
            match c {
                0 if s.is_empty() => return Err(LoadError::BadName),
                0 => return Ok(s),
                1..=255 => s.push(char::from(c as u8)),
                _ => return Err(LoadError::BadName),
            }
        }
        log_warn!("SO: string at V{} longer than {}", vaddr, self.config.max_name_len);
        Err(LoadError::BadName)
    }

    // ── Public interface ──

    pub fn config(&self) -> &KernelConfig {
        &self.config
    }

    pub fn hw(&self) -> &H {
        &self.hw
    }

    pub fn hw_mut(&mut self) -> &mut H {
        &mut self.hw
    }

    pub fn current(&self) -> Option<Pid> {
        self.current
    }

    pub fn process(&self, pid: Pid) -> Option<&Process> {
        self.table.get(pid)
    }

    pub fn processes(&self) -> impl Iterator<Item = &Process> {
        self.table.iter()
    }

    /// Pids waiting in the ready queue, head first.
    pub fn ready_pids(&self) -> Vec<Pid> {
        self.scheduler.pids()
    }

    pub fn terminal_usage(&self) -> &[u32] {
        self.terminals.usage()
    }

    pub fn storage(&self) -> &SecondaryStorage {
        &self.storage
    }

    pub fn pager(&self) -> &Pager {
        &self.pager
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Override the scheduling priority of `pid`. Takes effect the next
    /// time it is queued.
    pub fn set_priority(&mut self, pid: Pid, priority: i32) -> bool {
        match self.table.get_mut(pid) {
            Some(p) => {
                p.priority = priority;
                true
            }
            None => false,
        }
    }

    pub fn report(&self) -> Report<'_> {
        Report {
            metrics: &self.metrics,
            now: self.hw.now(),
            live: self.table.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw::sim::SimMachine;

    fn booted() -> Kernel<SimMachine> {
        let mut hw = SimMachine::new(1000, 2);
        // "p1" at 3, a non-character at 6, an empty name at 9
        hw.add_program_text("init.maq", "@0\n1 2 3 \"p1\" 300 0 0 \"\"").unwrap();
        let mut kernel = Kernel::new(hw, KernelConfig::default()).unwrap();
        assert_eq!(kernel.handle_interrupt(0), Ok(Dispatch::Running(Pid(1))));
        kernel
    }

    #[test]
    fn test_schedule_skips_dead_queue_entries() {
        let mut kernel = booted();
        kernel.scheduler.push(Pid(9), 50);
        kernel.hw.set_reg(Reg::A, crate::syscalls::SYS_KILL_PROC);
        kernel.hw.set_reg(Reg::X, 0);

        assert_eq!(kernel.handle_interrupt(2), Ok(Dispatch::Idle));
        assert!(kernel.scheduler.is_empty());
        assert_eq!(kernel.current(), None);
    }

    #[test]
    fn test_copy_name_from_process() {
        let mut kernel = booted();
        assert_eq!(kernel.copy_str_from_process(Pid(1), 3), Ok(String::from("p1")));
        assert_eq!(kernel.copy_str_from_process(Pid(1), 6), Err(LoadError::BadName));
        assert_eq!(kernel.copy_str_from_process(Pid(1), 9), Err(LoadError::BadName));
        assert_eq!(kernel.copy_str_from_process(Pid(1), -1), Err(LoadError::BadName));
        assert_eq!(
            kernel.copy_str_from_process(Pid(1), 500),
            Err(LoadError::Translate(CpuErr::AddressInvalid))
        );
        // only the current process can be read
        assert_eq!(kernel.copy_str_from_process(Pid(2), 3), Err(LoadError::BadName));
    }

    #[test]
    fn test_name_without_terminator_is_rejected() {
        let mut hw = SimMachine::new(1000, 1);
        hw.add_program_text("init.maq", "@0\n\"abcdef\"").unwrap();
        let config = KernelConfig { max_name_len: 4, ..KernelConfig::default() };
        let mut kernel = Kernel::new(hw, config).unwrap();
        kernel.handle_interrupt(0).unwrap();
        assert_eq!(kernel.copy_str_from_process(Pid(1), 0), Err(LoadError::BadName));
        assert_eq!(kernel.copy_str_from_process(Pid(1), 3), Ok(String::from("def")));
    }
}
