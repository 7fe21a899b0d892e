//! Interrupt kinds and the handlers for everything but system calls.

use crate::error::{KernelError, KernelResult};
use crate::config::LoadPolicy;
use crate::hw::{CpuErr, Hardware, Reg, Word};
use crate::kernel::Kernel;
use crate::memory::paging::PageTable;
use crate::scheduler::{CpuContext, Pid, Process};
use crate::{log_debug, log_info, log_warn};

/// Interrupt request as raised by the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Irq {
    Reset,
    CpuError,
    Syscall,
    Timer,
    Unknown(Word),
}

impl Irq {
    /// Number of counted kinds; every unknown number shares one counter.
    pub const KINDS: usize = 5;
    pub const KIND_NAMES: [&'static str; Irq::KINDS] = ["reset", "cpu error", "syscall", "timer", "unknown"];

    pub fn from_word(w: Word) -> Irq {
        match w {
            0 => Irq::Reset,
            1 => Irq::CpuError,
            2 => Irq::Syscall,
            3 => Irq::Timer,
            other => Irq::Unknown(other),
        }
    }

    pub fn to_word(self) -> Word {
        match self {
            Irq::Reset => 0,
            Irq::CpuError => 1,
            Irq::Syscall => 2,
            Irq::Timer => 3,
            Irq::Unknown(w) => w,
        }
    }

    pub fn index(self) -> usize {
        match self {
            Irq::Reset => 0,
            Irq::CpuError => 1,
            Irq::Syscall => 2,
            Irq::Timer => 3,
            Irq::Unknown(_) => 4,
        }
    }

    pub fn name(self) -> &'static str {
        Irq::KIND_NAMES[self.index()]
    }
}

impl<H: Hardware> Kernel<H> {
    pub(crate) fn route_irq(&mut self, irq: Irq) -> KernelResult<()> {
        match irq {
            Irq::Reset => self.irq_reset(),
            Irq::CpuError => self.irq_cpu_error(),
            Irq::Syscall => self.syscall(),
            Irq::Timer => {
                self.irq_timer();
                Ok(())
            }
            Irq::Unknown(n) => {
                log_warn!("SO: cannot handle IRQ {}", n);
                Err(KernelError::UnknownIrq(n))
            }
        }
    }

    /// Boot: load the init program and make it pid 1.
    fn irq_reset(&mut self) -> KernelResult<()> {
        let name = self.config.init_program.clone();
        let mut page_table = PageTable::new(self.config.page_size);
        let loaded = self.load_program(&name, &mut page_table);

        self.table.clear();
        self.scheduler.clear();
        self.terminals.reset();
        self.current = None;
        self.next_pid = 1;

        let (image, loaded) = loaded.map_err(KernelError::InitLoad)?;
        let pid = self.allocate_pid();
        let terminal = self.terminals.acquire();
        let context = CpuContext::new(loaded.vstart as Word);
        let now = self.hw.now();
        let process = Process::new(
            pid,
            &name,
            context,
            terminal,
            self.config.default_priority,
            page_table,
            image,
            now,
        );

        self.hw.write_reg(Reg::Pc, context.pc);
        self.hw.write_reg(Reg::Mode, context.mode.to_word());
        self.hw.activate(&process.page_table);

        if self.table.insert(process).is_err() {
            return Err(KernelError::NoCurrentProcess(Irq::Reset));
        }
        self.metrics.created += 1;
        self.current = Some(pid);
        log_info!("SO: reset, '{}' is pid {} on terminal {}", name, pid, terminal);
        Ok(())
    }

    /// The CPU stopped on an error. Kills the offending process unless the
    /// error is a page fault that demand paging can satisfy.
    fn irq_cpu_error(&mut self) -> KernelResult<()> {
        let pid = self.current.ok_or(KernelError::NoCurrentProcess(Irq::CpuError))?;
        let (err, complement) = match self.table.get(pid) {
            Some(p) => (p.context.err, p.context.complement),
            None => return Err(KernelError::NoCurrentProcess(Irq::CpuError)),
        };

        match err {
            CpuErr::Ok => return Ok(()),
            CpuErr::PageFault
                if self.pager.policy() == LoadPolicy::OnDemand
                    && complement >= 0
                    && self.swap_in(pid, complement as usize) =>
            {
                if let Some(p) = self.table.get_mut(pid) {
                    p.context.err = CpuErr::Ok;
                }
                return Ok(());
            }
            _ => {}
        }

        log_warn!("SO: CPU error in pid {}: {} (complement {})", pid, err.name(), complement);
        self.kill(pid);
        Ok(())
    }

    fn irq_timer(&mut self) {
        self.hw.ack();
        self.hw.arm(self.config.timer_interval);
        if let Some(p) = self.current.and_then(|pid| self.table.get_mut(pid)) {
            p.quantum -= 1;
            log_debug!("SO: tick, pid {} has {} left", p.pid, p.quantum);
        }
    }

    /// Resolve a fault at `vaddr` of `pid` from secondary storage.
    pub(crate) fn swap_in(&mut self, pid: Pid, vaddr: usize) -> bool {
        let Some(p) = self.table.get_mut(pid) else {
            return false;
        };
        match self.pager.swap_in(vaddr, p.image, &self.storage, &mut p.page_table, &mut self.hw) {
            Ok(_) => {
                if self.current == Some(pid) {
                    self.hw.activate(&p.page_table);
                }
                self.metrics.swap_ins += 1;
                true
            }
            Err(e) => {
                log_warn!("SO: cannot page in V{} for pid {}: {}", vaddr, pid, e);
                false
            }
        }
    }
}
