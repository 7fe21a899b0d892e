pub mod paging;
pub mod frame_allocator;
pub mod secondary;
pub mod pager;

pub use frame_allocator::{BumpFrameAllocator, FrameAllocator};
pub use pager::{Loaded, Pager};
pub use paging::{PageEntry, PageFlags, PageTable};
pub use secondary::{SecondaryStorage, StoredRange};
