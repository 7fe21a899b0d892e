/// Hands out physical frame numbers.
pub trait FrameAllocator {
    fn allocate_frame(&mut self) -> Option<usize>;
}

/// A simple bump allocator for physical memory frames.
///
/// Frames are handed out in increasing order and never returned; a dead
/// process keeps its frames.
#[derive(Debug, Clone)]
pub struct BumpFrameAllocator {
    next_free_frame: usize,
    current_limit: usize,
}

impl BumpFrameAllocator {
    /// Create an empty allocator. It hands out nothing until `init`.
    pub fn new() -> Self {
        BumpFrameAllocator {
            next_free_frame: 0,
            current_limit: 0,
        }
    }

    /// Frames `[first, limit)` become available.
    pub fn init(&mut self, first: usize, limit: usize) {
        self.next_free_frame = first;
        self.current_limit = limit;
    }

    /// Allocator for a memory of `mem_words` words whose first
    /// `reserved_words` belong to the interrupt vector and kernel.
    pub fn for_memory(mem_words: usize, page_size: usize, reserved_words: usize) -> Self {
        let mut allocator = BumpFrameAllocator::new();
        let first = reserved_words.saturating_sub(1) / page_size + 1;
        allocator.init(first, mem_words / page_size);
        allocator
    }

    pub fn next_free_frame(&self) -> usize {
        self.next_free_frame
    }

    pub fn free_frames(&self) -> usize {
        self.current_limit.saturating_sub(self.next_free_frame)
    }
}

impl Default for BumpFrameAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameAllocator for BumpFrameAllocator {
    fn allocate_frame(&mut self) -> Option<usize> {
        if self.next_free_frame < self.current_limit {
            let frame = self.next_free_frame;
            self.next_free_frame += 1;
            Some(frame)
        } else {
            None
        }
    }
}
