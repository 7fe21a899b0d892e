pub mod task;
pub mod context;
pub mod table;
pub mod accounting;

use alloc::collections::VecDeque;
use alloc::vec::Vec;

pub use accounting::{ExitSummary, Metrics, ProcessStats, Report};
pub use context::CpuContext;
pub use table::{ProcessTable, SlotId};
pub use task::{BlockReason, Pid, Process, ProcessState};

use crate::config::SchedPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct QueueEntry {
    pid: Pid,
    priority: i32,
}

/// The ready queue.
///
/// Holds pids, not processes: the process table owns every process and a
/// queued pid may be dead or no longer ready by the time it is dequeued.
pub struct Scheduler {
    policy: SchedPolicy,
    ready_queue: VecDeque<QueueEntry>,
}

impl Scheduler {
    pub fn new(policy: SchedPolicy) -> Self {
        Scheduler {
            policy,
            ready_queue: VecDeque::new(),
        }
    }

    pub fn policy(&self) -> SchedPolicy {
        self.policy
    }

    /// Queue `pid` according to the configured policy.
    pub fn push(&mut self, pid: Pid, priority: i32) {
        match self.policy {
            SchedPolicy::Fifo => self.enqueue(pid),
            SchedPolicy::Priority => self.enqueue_by_priority(pid, priority),
        }
    }

    /// Append at the tail.
    pub fn enqueue(&mut self, pid: Pid) {
        self.ready_queue.push_back(QueueEntry { pid, priority: 0 });
    }

    /// Insert before the first entry with a strictly greater priority
    /// value, or at the tail if there is none. Equal priorities keep their
    /// arrival order.
    pub fn enqueue_by_priority(&mut self, pid: Pid, priority: i32) {
        let entry = QueueEntry { pid, priority };
        match self.ready_queue.iter().position(|e| e.priority > priority) {
            Some(i) => self.ready_queue.insert(i, entry),
            None => self.ready_queue.push_back(entry),
        }
    }

    /// Take the head of the queue. `None` means nothing is waiting for the CPU.
    pub fn dequeue(&mut self) -> Option<Pid> {
        self.ready_queue.pop_front().map(|e| e.pid)
    }

    /// Drop every entry for `pid`.
    pub fn remove(&mut self, pid: Pid) {
        self.ready_queue.retain(|e| e.pid != pid);
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.ready_queue.iter().any(|e| e.pid == pid)
    }

    pub fn clear(&mut self) {
        self.ready_queue.clear();
    }

    pub fn len(&self) -> usize {
        self.ready_queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready_queue.is_empty()
    }

    /// Queued pids, head first.
    pub fn pids(&self) -> Vec<Pid> {
        self.ready_queue.iter().map(|e| e.pid).collect()
    }
}

/// New priority of a process that used `used` of its `quantum` ticks.
/// Processes that burn their whole turn drift towards 100, ones that give
/// the CPU up early drift towards 0.
pub fn recompute_priority(priority: i32, used: i32, quantum: i32) -> i32 {
    if quantum <= 0 {
        return priority;
    }
    let used = used.clamp(0, quantum);
    (priority + 100 * used / quantum) / 2
}
