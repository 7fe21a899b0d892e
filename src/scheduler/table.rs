use alloc::vec::Vec;

use super::task::{Pid, Process};

/// Index of a slot in the process table. Unrelated to the pid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotId(pub usize);

/// Fixed number of slots, each empty or holding one live process.
pub struct ProcessTable {
    slots: Vec<Option<Process>>,
}

impl ProcessTable {
    pub fn new(size: usize) -> Self {
        let mut slots = Vec::with_capacity(size);
        slots.resize_with(size, || None);
        ProcessTable { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }

    pub fn is_full(&self) -> bool {
        self.slots.iter().all(Option::is_some)
    }

    /// Put `process` in the first free slot. Hands it back if none is free.
    pub fn insert(&mut self, process: Process) -> Result<SlotId, Process> {
        match self.slots.iter().position(Option::is_none) {
            Some(i) => {
                self.slots[i] = Some(process);
                Ok(SlotId(i))
            }
            None => Err(process),
        }
    }

    pub fn slot_of(&self, pid: Pid) -> Option<SlotId> {
        self.slots
            .iter()
            .position(|s| s.as_ref().map_or(false, |p| p.pid == pid))
            .map(SlotId)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.slot_of(pid).is_some()
    }

    pub fn get(&self, pid: Pid) -> Option<&Process> {
        self.iter().find(|p| p.pid == pid)
    }

    pub fn get_mut(&mut self, pid: Pid) -> Option<&mut Process> {
        self.iter_mut().find(|p| p.pid == pid)
    }

    pub fn slot(&self, slot: SlotId) -> Option<&Process> {
        self.slots.get(slot.0).and_then(Option::as_ref)
    }

    pub fn remove(&mut self, pid: Pid) -> Option<Process> {
        let slot = self.slot_of(pid)?;
        self.slots[slot.0].take()
    }

    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = None;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Process> {
        self.slots.iter().filter_map(Option::as_ref)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Process> {
        self.slots.iter_mut().filter_map(Option::as_mut)
    }

    /// Live pids in slot order.
    pub fn pids(&self) -> Vec<Pid> {
        self.iter().map(|p| p.pid).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::paging::PageTable;
    use crate::memory::secondary::StoredRange;
    use crate::scheduler::context::CpuContext;
    use alloc::vec;

    fn process(pid: i32) -> Process {
        let image = StoredRange { start: 0, end: 0, load_address: 0 };
        Process::new(Pid(pid), "p", CpuContext::new(0), 0, 0, PageTable::new(10), image, 0)
    }

    #[test]
    fn test_insert_uses_first_free_slot() {
        let mut t = ProcessTable::new(3);
        assert_eq!(t.insert(process(1)).ok(), Some(SlotId(0)));
        assert_eq!(t.insert(process(2)).ok(), Some(SlotId(1)));
        assert!(t.remove(Pid(1)).is_some());
        assert_eq!(t.insert(process(3)).ok(), Some(SlotId(0)));
        assert_eq!(t.pids(), vec![Pid(3), Pid(2)]);
        assert_eq!(t.slot(SlotId(1)).map(|p| p.pid), Some(Pid(2)));
    }

    #[test]
    fn test_full_table_returns_process() {
        let mut t = ProcessTable::new(1);
        assert!(t.insert(process(1)).is_ok());
        assert!(t.is_full());
        let back = t.insert(process(2)).unwrap_err();
        assert_eq!(back.pid, Pid(2));
        assert_eq!(t.len(), 1);
    }

    #[test]
    fn test_lookup_and_clear() {
        let mut t = ProcessTable::new(4);
        let _ = t.insert(process(5));
        assert!(t.contains(Pid(5)));
        assert!(!t.contains(Pid(6)));
        if let Some(p) = t.get_mut(Pid(5)) {
            p.terminal = 2;
        }
        assert_eq!(t.get(Pid(5)).map(|p| p.terminal), Some(2));
        t.clear();
        assert!(t.is_empty());
    }
}
