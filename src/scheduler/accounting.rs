use core::fmt;

use super::task::ProcessState;
use crate::interrupts::Irq;

/// Time and entry counters for one process, kept per state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessStats {
    pub created_at: u64,
    state_since: u64,
    time_in: [u64; ProcessState::COUNT],
    entries: [u32; ProcessState::COUNT],
    pub preemptions: u32,
}

impl ProcessStats {
    pub fn new(now: u64, initial: ProcessState) -> Self {
        let mut entries = [0; ProcessState::COUNT];
        entries[initial.index()] = 1;
        ProcessStats {
            created_at: now,
            state_since: now,
            time_in: [0; ProcessState::COUNT],
            entries,
            preemptions: 0,
        }
    }

    /// Close the interval spent in `from` and open one in `to`.
    pub fn transition(&mut self, from: ProcessState, to: ProcessState, now: u64) {
        self.time_in[from.index()] += now.saturating_sub(self.state_since);
        self.entries[to.index()] += 1;
        self.state_since = now;
    }

    pub fn time_in(&self, state: ProcessState) -> u64 {
        self.time_in[state.index()]
    }

    pub fn entries(&self, state: ProcessState) -> u32 {
        self.entries[state.index()]
    }

    /// Final figures for a process dying at `now` while in `state`.
    pub fn summary(&self, state: ProcessState, now: u64) -> ExitSummary {
        let mut time_in = self.time_in;
        time_in[state.index()] += now.saturating_sub(self.state_since);
        let ready = ProcessState::Ready.index();
        let mean_ready = match self.entries[ready] {
            0 => 0,
            n => time_in[ready] / n as u64,
        };
        ExitSummary {
            turnaround: now.saturating_sub(self.created_at),
            mean_ready,
            running: time_in[ProcessState::Running.index()],
            preemptions: self.preemptions,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitSummary {
    pub turnaround: u64,
    pub mean_ready: u64,
    pub running: u64,
    pub preemptions: u32,
}

/// Kernel-wide counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metrics {
    pub irqs: [u64; Irq::KINDS],
    pub created: u64,
    pub killed: u64,
    pub preemptions: u64,
    pub context_switches: u64,
    pub swap_ins: u64,
    pub idle_time: u64,
    idle_since: Option<u64>,
}

impl Metrics {
    pub fn count_irq(&mut self, irq: Irq) {
        self.irqs[irq.index()] += 1;
    }

    pub fn irq_count(&self, irq: Irq) -> u64 {
        self.irqs[irq.index()]
    }

    pub fn enter_idle(&mut self, now: u64) {
        if self.idle_since.is_none() {
            self.idle_since = Some(now);
        }
    }

    pub fn leave_idle(&mut self, now: u64) {
        if let Some(since) = self.idle_since.take() {
            self.idle_time += now.saturating_sub(since);
        }
    }
}

/// Printable snapshot of the kernel counters.
pub struct Report<'a> {
    pub metrics: &'a Metrics,
    pub now: u64,
    pub live: usize,
}

impl fmt::Display for Report<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let m = self.metrics;
        writeln!(f, "time            {}", self.now)?;
        writeln!(f, "idle            {}", m.idle_time)?;
        writeln!(f, "processes       {} created, {} killed, {} live", m.created, m.killed, self.live)?;
        writeln!(f, "preemptions     {}", m.preemptions)?;
        writeln!(f, "switches        {}", m.context_switches)?;
        writeln!(f, "swap-ins        {}", m.swap_ins)?;
        for (name, count) in Irq::KIND_NAMES.iter().zip(m.irqs.iter()) {
            writeln!(f, "irq {:<12}{}", name, count)?;
        }
        Ok(())
    }
}
