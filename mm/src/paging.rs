use core::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;

use pebble_abi::addr::PhysAddr;

use crate::address_space::AddressSpace;

bitflags! {
    /// Page table entry permission bits.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PageFlags: u32 {
        const PRESENT = 0x001;
        const WRITABLE = 0x002;
        const USER = 0x004;
    }
}

impl PageFlags {
    pub const USER_RW: Self = Self::PRESENT.union(Self::WRITABLE).union(Self::USER);
    pub const KERNEL_RW: Self = Self::PRESENT.union(Self::WRITABLE);
}

/// The translation root the CPU is currently running user code against.
pub struct Mmu {
    active_root: AtomicU64,
    switches: AtomicU64,
}

impl Mmu {
    pub const fn new() -> Self {
        Self {
            active_root: AtomicU64::new(0),
            switches: AtomicU64::new(0),
        }
    }

    /// Load `space` as the active user address space.
    pub fn switch_user_vm(&self, space: &AddressSpace) {
        self.active_root
            .store(space.root().as_u64(), Ordering::Release);
        self.switches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn active_root(&self) -> PhysAddr {
        PhysAddr::new(self.active_root.load(Ordering::Acquire))
    }

    pub fn switch_count(&self) -> u64 {
        self.switches.load(Ordering::Relaxed)
    }
}

impl Default for Mmu {
    fn default() -> Self {
        Self::new()
    }
}
