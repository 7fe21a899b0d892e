use alloc::collections::BTreeMap;
use bitflags::bitflags;

use crate::hw::CpuErr;

bitflags! {
    /// State bits of a page table entry.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u8 {
        /// The page is resident in `frame`.
        const VALID = 1 << 0;
        /// The page has a copy in secondary storage at `backing`.
        const SWAPPED = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageEntry {
    pub frame: usize,
    /// Secondary-storage address of the first word of this page.
    pub backing: Option<usize>,
    pub flags: PageFlags,
}

impl PageEntry {
    pub fn is_valid(&self) -> bool {
        self.flags.contains(PageFlags::VALID)
    }
}

/// Per-process map from virtual page number to physical frame.
///
/// Entries are only ever added or moved from swapped to valid; a valid
/// entry is never remapped while the owning process lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageTable {
    page_size: usize,
    entries: BTreeMap<usize, PageEntry>,
}

impl PageTable {
    pub fn new(page_size: usize) -> Self {
        PageTable {
            page_size,
            entries: BTreeMap::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_of(&self, vaddr: usize) -> usize {
        vaddr / self.page_size
    }

    /// Map `page` to `frame`. Returns false if the page is already resident.
    pub fn map(&mut self, page: usize, frame: usize) -> bool {
        let entry = self.entries.entry(page).or_insert(PageEntry {
            frame,
            backing: None,
            flags: PageFlags::empty(),
        });
        if entry.is_valid() {
            return false;
        }
        entry.frame = frame;
        entry.flags.insert(PageFlags::VALID);
        true
    }

    /// Record that `page` lives in secondary storage at `backing` and is not
    /// resident yet.
    pub fn map_swapped(&mut self, page: usize, backing: usize) {
        self.entries.entry(page).or_insert(PageEntry {
            frame: 0,
            backing: Some(backing),
            flags: PageFlags::SWAPPED,
        });
    }

    pub fn entry(&self, page: usize) -> Option<&PageEntry> {
        self.entries.get(&page)
    }

    pub fn frame_of(&self, page: usize) -> Option<usize> {
        self.entries.get(&page).filter(|e| e.is_valid()).map(|e| e.frame)
    }

    pub fn resident_pages(&self) -> usize {
        self.entries.values().filter(|e| e.is_valid()).count()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Virtual to physical address. An unmapped page is an invalid address,
    /// a mapped but non-resident page is a page fault.
    pub fn translate(&self, vaddr: usize) -> Result<usize, CpuErr> {
        let page = self.page_of(vaddr);
        match self.entries.get(&page) {
            Some(e) if e.is_valid() => Ok(e.frame * self.page_size + vaddr % self.page_size),
            Some(_) => Err(CpuErr::PageFault),
            None => Err(CpuErr::AddressInvalid),
        }
    }
}
