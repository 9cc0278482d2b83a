//! Fixed-size object slabs backed by physical frames.
//!
//! A [`SlabPool`] keeps a singly linked list of slabs, each holding `N`
//! objects and charged one frame from the page allocator. Slots are claimed
//! lowest-index-first from the first slab with room. A slab whose last claimed
//! slot is released is unlinked and its frame returned immediately.
//!
//! The default pool is a fixed size: `initial_slabs` slabs are reserved up
//! front and `max_slabs` equals that count, so acquire only refills slabs
//! that were freed when they emptied and never grows past the boot size.
//!
//! The pool itself is not locked. Owners wrap it in their own lock.

use alloc::boxed::Box;
use alloc::sync::Arc;
use alloc::vec::Vec;

use pebble_abi::addr::PhysAddr;
use pebble_abi::param::NUM_SLABS;
use pebble_lib::{klog_debug, klog_warn};

use crate::page_alloc::{AllocFlags, PageAllocator, PageFrame};

pub type SlabId = u16;

/// Location of one object in a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId {
    slab: SlabId,
    index: u16,
}

impl SlotId {
    #[inline]
    pub const fn slab(self) -> SlabId {
        self.slab
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.index as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlabPoolConfig {
    /// Slabs created up front.
    pub initial_slabs: usize,
    /// Upper bound on slabs alive at once. Slabs are only added past
    /// `initial_slabs` when this is larger.
    pub max_slabs: usize,
}

impl Default for SlabPoolConfig {
    fn default() -> Self {
        Self {
            initial_slabs: NUM_SLABS,
            max_slabs: NUM_SLABS,
        }
    }
}

struct Slab<T, const N: usize> {
    frame: PageFrame,
    objects: [T; N],
    /// Bit `i` set when slot `i` is claimed.
    claimed: u64,
    num_free: usize,
    next: Option<SlabId>,
}

/// Read-only view of one live slab.
pub struct SlabView<'a, T> {
    pub id: SlabId,
    pub frame: PhysAddr,
    pub num_free: usize,
    pub claimed: u64,
    pub objects: &'a [T],
}

impl<T> SlabView<'_, T> {
    #[inline]
    pub fn is_claimed(&self, index: usize) -> bool {
        index < self.objects.len() && self.claimed & (1 << index) != 0
    }
}

pub struct SlabPool<T, const N: usize> {
    slabs: Vec<Option<Box<Slab<T, N>>>>,
    head: Option<SlabId>,
    live_slabs: usize,
    frames: Arc<PageAllocator>,
    config: SlabPoolConfig,
}

impl<T: Default, const N: usize> SlabPool<T, N> {
    pub fn new(frames: &Arc<PageAllocator>, config: SlabPoolConfig) -> Self {
        const { assert!(N > 0 && N <= 64, "slab object count must fit the claim bitmap") };

        let mut pool = Self {
            slabs: Vec::new(),
            head: None,
            live_slabs: 0,
            frames: Arc::clone(frames),
            config,
        };
        let wanted = config.initial_slabs.min(config.max_slabs);
        for _ in 0..wanted {
            if pool.grow().is_none() {
                klog_warn!("slab: reserved only {} of {} slabs", pool.live_slabs, wanted);
                break;
            }
        }
        pool
    }

    /// Link a fresh slab at the head of the list.
    fn grow(&mut self) -> Option<SlabId> {
        if self.live_slabs >= self.config.max_slabs {
            return None;
        }
        let frame = self
            .frames
            .alloc_page_frame(AllocFlags::ZERO | AllocFlags::KERNEL)?;

        let id = match self.slabs.iter().position(Option::is_none) {
            Some(id) => id,
            None => {
                self.slabs.push(None);
                self.slabs.len() - 1
            }
        };
        let id = id as SlabId;
        self.slabs[id as usize] = Some(Box::new(Slab {
            frame,
            objects: core::array::from_fn(|_| T::default()),
            claimed: 0,
            num_free: N,
            next: self.head,
        }));
        self.head = Some(id);
        self.live_slabs += 1;
        klog_debug!("slab: added slab {} ({} live)", id, self.live_slabs);
        Some(id)
    }

    /// Claim the lowest free slot of the first slab with room. When every
    /// linked slab is full a slab is added only while fewer than `max_slabs`
    /// are alive. `None` once that bound is reached or no frame is available.
    pub fn acquire_slot(&mut self) -> Option<SlotId> {
        let slab_id = match self.first_with_room() {
            Some(id) => id,
            None => self.grow()?,
        };
        let slab = self.slab_mut(slab_id)?;
        let index = (!slab.claimed).trailing_zeros() as usize;
        debug_assert!(index < N);
        slab.claimed |= 1 << index;
        slab.num_free -= 1;
        Some(SlotId {
            slab: slab_id,
            index: index as u16,
        })
    }
}

impl<T, const N: usize> SlabPool<T, N> {
    fn slab(&self, id: SlabId) -> Option<&Slab<T, N>> {
        self.slabs.get(id as usize)?.as_deref()
    }

    fn slab_mut(&mut self, id: SlabId) -> Option<&mut Slab<T, N>> {
        self.slabs.get_mut(id as usize)?.as_deref_mut()
    }

    fn first_with_room(&self) -> Option<SlabId> {
        let mut cursor = self.head;
        while let Some(id) = cursor {
            let slab = self.slab(id)?;
            if slab.num_free > 0 {
                return Some(id);
            }
            cursor = slab.next;
        }
        None
    }

    /// Give a claimed slot back. The object is left as the caller reset it.
    /// Panics if `slot` is not claimed.
    pub fn release_slot(&mut self, slot: SlotId) {
        let Some(slab) = self.slab_mut(slot.slab) else {
            panic!("slab: release of unclaimed slot");
        };
        if slot.index() >= N || slab.claimed & (1 << slot.index()) == 0 {
            panic!("slab: release of unclaimed slot");
        }
        slab.claimed &= !(1 << slot.index());
        slab.num_free += 1;
        if slab.num_free == N {
            self.free_slab(slot.slab);
        }
    }

    fn free_slab(&mut self, id: SlabId) {
        let next = self.slab(id).and_then(|slab| slab.next);
        if self.head == Some(id) {
            self.head = next;
        } else {
            let mut cursor = self.head;
            while let Some(cur) = cursor {
                let Some(slab) = self.slab_mut(cur) else {
                    break;
                };
                if slab.next == Some(id) {
                    slab.next = next;
                    break;
                }
                cursor = slab.next;
            }
        }

        if let Some(slab) = self.slabs[id as usize].take() {
            let Slab { frame, .. } = *slab;
            self.frames.free_page_frame(frame);
            self.live_slabs -= 1;
            klog_debug!("slab: freed slab {} ({} live)", id, self.live_slabs);
        }
    }

    /// The object in a claimed slot.
    pub fn get(&self, slot: SlotId) -> Option<&T> {
        let slab = self.slab(slot.slab)?;
        if slot.index() >= N || slab.claimed & (1 << slot.index()) == 0 {
            return None;
        }
        slab.objects.get(slot.index())
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut T> {
        let slab = self.slab_mut(slot.slab)?;
        if slot.index() >= N || slab.claimed & (1 << slot.index()) == 0 {
            return None;
        }
        slab.objects.get_mut(slot.index())
    }

    pub fn slab_count(&self) -> usize {
        self.live_slabs
    }

    pub fn capacity(&self) -> usize {
        self.live_slabs * N
    }

    pub fn free_slots(&self) -> usize {
        self.slabs().map(|view| view.num_free).sum()
    }

    pub fn config(&self) -> SlabPoolConfig {
        self.config
    }

    /// Live slabs in list order.
    pub fn slabs(&self) -> SlabIter<'_, T, N> {
        SlabIter {
            pool: self,
            cursor: self.head,
        }
    }
}

impl<T, const N: usize> Drop for SlabPool<T, N> {
    fn drop(&mut self) {
        for entry in self.slabs.iter_mut() {
            if let Some(slab) = entry.take() {
                let Slab { frame, .. } = *slab;
                self.frames.free_page_frame(frame);
            }
        }
        self.live_slabs = 0;
        self.head = None;
    }
}

pub struct SlabIter<'a, T, const N: usize> {
    pool: &'a SlabPool<T, N>,
    cursor: Option<SlabId>,
}

impl<'a, T, const N: usize> Iterator for SlabIter<'a, T, N> {
    type Item = SlabView<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.cursor?;
        let slab = self.pool.slab(id)?;
        self.cursor = slab.next;
        Some(SlabView {
            id,
            frame: slab.frame.phys(),
            num_free: slab.num_free,
            claimed: slab.claimed,
            objects: &slab.objects,
        })
    }
}
