#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod address_space;
pub mod elf;
pub mod page_alloc;
pub mod paging;
pub mod slab;

pub use address_space::{AddressSpace, ImageSource, VmError, VmResult};
pub use page_alloc::{AllocFlags, PageAllocator, PageAllocatorStats, PageFrame};
pub use paging::{Mmu, PageFlags};
pub use slab::{SlabId, SlabPool, SlabPoolConfig, SlabView, SlotId};
