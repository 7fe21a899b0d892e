use crate::config::LoadPolicy;
use crate::error::LoadError;
use crate::hw::{CpuErr, PhysMemory};
use crate::{log_error, log_info};

use super::frame_allocator::{BumpFrameAllocator, FrameAllocator};
use super::paging::PageTable;
use super::secondary::{SecondaryStorage, StoredRange};

/// Result of mapping a staged program into a page table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Loaded {
    pub vstart: usize,
    pub vend: usize,
    /// Physical address of the first word, if it was made resident.
    pub pstart: Option<usize>,
}

/// Moves program pages from secondary storage into physical frames.
pub struct Pager {
    frames: BumpFrameAllocator,
    page_size: usize,
    policy: LoadPolicy,
}

impl Pager {
    pub fn new(frames: BumpFrameAllocator, page_size: usize, policy: LoadPolicy) -> Self {
        Pager { frames, page_size, policy }
    }

    pub fn policy(&self) -> LoadPolicy {
        self.policy
    }

    pub fn frames(&self) -> &BumpFrameAllocator {
        &self.frames
    }

    /// Map the virtual pages covered by `range` into `table`.
    ///
    /// With `LoadPolicy::Eager` every page gets the next free frame and its
    /// words are copied in now. With `LoadPolicy::OnDemand` the pages are
    /// only recorded as swapped; `swap_in` brings them in on first touch.
    /// A failure part way leaves whatever was already mapped in place.
    pub fn load<M: PhysMemory + ?Sized>(
        &mut self,
        range: StoredRange,
        storage: &SecondaryStorage,
        table: &mut PageTable,
        mem: &mut M,
    ) -> Result<Loaded, LoadError> {
        let vstart = range.load_address;
        let vend = vstart + range.word_count() - 1;
        let first_page = vstart / self.page_size;
        let last_page = vend / self.page_size;

        match self.policy {
            LoadPolicy::Eager => {
                for page in first_page..=last_page {
                    let frame = self.frames.allocate_frame().ok_or(LoadError::OutOfFrames)?;
                    table.map(page, frame);
                }
                for vaddr in vstart..=vend {
                    self.copy_word(vaddr, range, storage, table, mem)?;
                }
                let pstart = table.translate(vstart).map_err(LoadError::Translate)?;
                log_info!(
                    "SO: load V{}-{} F{}-{}",
                    vstart,
                    vend,
                    pstart,
                    pstart + range.word_count() - 1
                );
                Ok(Loaded { vstart, vend, pstart: Some(pstart) })
            }
            LoadPolicy::OnDemand => {
                for page in first_page..=last_page {
                    let page_start = (page * self.page_size).max(vstart);
                    if let Some(backing) = range.backing_of(page_start) {
                        table.map_swapped(page, backing);
                    }
                }
                log_info!(
                    "SO: mapped V{}-{} on demand ({} pages)",
                    vstart,
                    vend,
                    last_page - first_page + 1
                );
                Ok(Loaded { vstart, vend, pstart: None })
            }
        }
    }

    /// Bring the swapped page holding `vaddr` into a fresh frame.
    pub fn swap_in<M: PhysMemory + ?Sized>(
        &mut self,
        vaddr: usize,
        range: StoredRange,
        storage: &SecondaryStorage,
        table: &mut PageTable,
        mem: &mut M,
    ) -> Result<usize, LoadError> {
        let page = vaddr / self.page_size;
        match table.entry(page) {
            Some(e) if !e.is_valid() && e.backing.is_some() => {}
            _ => return Err(LoadError::Translate(CpuErr::AddressInvalid)),
        }
        let frame = self.frames.allocate_frame().ok_or(LoadError::OutOfFrames)?;
        table.map(page, frame);

        let page_start = page * self.page_size;
        for v in page_start..page_start + self.page_size {
            if range.backing_of(v).is_some() {
                self.copy_word(v, range, storage, table, mem)?;
            }
        }
        log_info!("SO: swap-in page {} -> frame {}", page, frame);
        Ok(frame)
    }

    fn copy_word<M: PhysMemory + ?Sized>(
        &self,
        vaddr: usize,
        range: StoredRange,
        storage: &SecondaryStorage,
        table: &PageTable,
        mem: &mut M,
    ) -> Result<(), LoadError> {
        let backing = range
            .backing_of(vaddr)
            .ok_or(LoadError::Translate(CpuErr::AddressInvalid))?;
        let value = storage.read(backing)?;
        let paddr = table.translate(vaddr).map_err(LoadError::Translate)?;
        if mem.mem_write(paddr, value).is_err() {
            log_error!("SO: memory write failed, V{} F{}", vaddr, paddr);
            return Err(LoadError::MemoryWrite { vaddr, paddr });
        }
        Ok(())
    }
}
