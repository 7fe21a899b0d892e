use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use crate::error::StorageError;
use crate::hw::Word;
use crate::loader::ProgramImage;
use crate::log_debug;

/// Where a staged program lives in secondary storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoredRange {
    /// First storage address (inclusive).
    pub start: usize,
    /// Last storage address (inclusive).
    pub end: usize,
    /// Virtual address the program expects its first word at.
    pub load_address: usize,
}

impl StoredRange {
    /// Number of words staged. A range always holds at least one.
    pub fn word_count(&self) -> usize {
        self.end - self.start + 1
    }

    /// Storage address holding virtual address `vaddr` of the program.
    pub fn backing_of(&self, vaddr: usize) -> Option<usize> {
        let offset = vaddr.checked_sub(self.load_address)?;
        (offset < self.word_count()).then(|| self.start + offset)
    }
}

/// Backing store plus the catalog of programs staged in it.
///
/// Space is handed out in order and never reclaimed. Each program name is
/// written once; staging it again returns the existing range.
pub struct SecondaryStorage {
    words: Vec<Word>,
    next: usize,
    max_programs: usize,
    catalog: BTreeMap<String, StoredRange>,
}

impl SecondaryStorage {
    pub fn new(capacity: usize, max_programs: usize) -> Self {
        SecondaryStorage {
            words: vec![0; capacity],
            next: 0,
            max_programs,
            catalog: BTreeMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.words.len()
    }

    pub fn used(&self) -> usize {
        self.next
    }

    pub fn programs(&self) -> usize {
        self.catalog.len()
    }

    /// Copy `image` into storage under `name`, unless it is already there.
    pub fn stage(&mut self, name: &str, image: &ProgramImage) -> Result<StoredRange, StorageError> {
        if let Some(range) = self.catalog.get(name) {
            return Ok(*range);
        }
        if image.is_empty() || self.next + image.len() > self.words.len() {
            return Err(StorageError::NoSpace);
        }
        if self.catalog.len() >= self.max_programs {
            return Err(StorageError::CatalogFull);
        }

        let start = self.next;
        self.words[start..start + image.len()].copy_from_slice(&image.words);
        self.next += image.len();

        let range = StoredRange {
            start,
            end: start + image.len() - 1,
            load_address: image.load_address,
        };
        self.catalog.insert(String::from(name), range);
        log_debug!("SO: '{}' staged at S{}-{}", name, range.start, range.end);
        Ok(range)
    }

    pub fn lookup(&self, name: &str) -> Option<StoredRange> {
        self.catalog.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.catalog.contains_key(name)
    }

    pub fn read(&self, addr: usize) -> Result<Word, StorageError> {
        if addr >= self.next {
            return Err(StorageError::OutOfRange(addr));
        }
        Ok(self.words[addr])
    }
}
