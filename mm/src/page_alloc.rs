//! Physical frame allocator.
//!
//! Hands out fixed-size, page-aligned frames from a bounded budget. Freed
//! frames are poisoned and reused last-in first-out, so a frame released and
//! immediately reallocated comes back with the same physical address.

use alloc::boxed::Box;
use alloc::vec::Vec;

use bitflags::bitflags;
use spin::Mutex;

use pebble_abi::addr::PhysAddr;
use pebble_abi::param::PAGE_SIZE;

bitflags! {
    /// Allocation flags (mirrors page_alloc.h)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllocFlags: u32 {
        const ZERO = 0x01;
        const KERNEL = 0x04;
    }
}

/// Fill pattern for freed frames; catches use of stale contents.
const JUNK_BYTE: u8 = 0x01;

/// Frame 0 is never handed out so that `PhysAddr::NULL` stays invalid.
const FIRST_FRAME: u64 = 1;

#[repr(C, align(4096))]
pub struct Page(pub [u8; PAGE_SIZE as usize]);

/// An owned physical frame. Must be given back with
/// [`PageAllocator::free_page_frame`].
pub struct PageFrame {
    phys: PhysAddr,
    page: Box<Page>,
}

impl PageFrame {
    #[inline]
    pub fn phys(&self) -> PhysAddr {
        self.phys
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.page.0
    }

    #[inline]
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.page.0
    }
}

impl core::fmt::Debug for PageFrame {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("PageFrame").field(&self.phys).finish()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageAllocatorStats {
    pub total_frames: u32,
    pub free_frames: u32,
    pub allocated_frames: u32,
}

struct PageAllocatorState {
    free_list: Vec<PageFrame>,
    total_frames: u32,
    created_frames: u32,
    allocated_frames: u32,
}

pub struct PageAllocator {
    state: Mutex<PageAllocatorState>,
}

impl PageAllocator {
    pub fn new(total_frames: u32) -> Self {
        Self {
            state: Mutex::new(PageAllocatorState {
                free_list: Vec::new(),
                total_frames,
                created_frames: 0,
                allocated_frames: 0,
            }),
        }
    }

    /// Take one frame, or `None` when the budget is spent.
    pub fn alloc_page_frame(&self, flags: AllocFlags) -> Option<PageFrame> {
        let mut frame = {
            let mut state = self.state.lock();
            let frame = match state.free_list.pop() {
                Some(frame) => frame,
                None if state.created_frames < state.total_frames => {
                    let phys = PhysAddr::new(
                        (FIRST_FRAME + state.created_frames as u64) * PAGE_SIZE as u64,
                    );
                    state.created_frames += 1;
                    PageFrame {
                        phys,
                        page: Box::new(Page([0; PAGE_SIZE as usize])),
                    }
                }
                None => return None,
            };
            state.allocated_frames += 1;
            frame
        };

        if flags.contains(AllocFlags::ZERO) {
            frame.page.0.fill(0);
        }
        Some(frame)
    }

    pub fn free_page_frame(&self, mut frame: PageFrame) {
        frame.page.0.fill(JUNK_BYTE);
        let mut state = self.state.lock();
        state.allocated_frames -= 1;
        state.free_list.push(frame);
    }

    pub fn stats(&self) -> PageAllocatorStats {
        let state = self.state.lock();
        PageAllocatorStats {
            total_frames: state.total_frames,
            free_frames: state.total_frames - state.allocated_frames,
            allocated_frames: state.allocated_frames,
        }
    }
}
