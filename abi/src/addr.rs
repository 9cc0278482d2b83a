//! Physical and virtual address types for type-safe memory operations.
//!
//! These newtypes keep frame addresses handed out by the page allocator apart
//! from addresses inside a user image. They are `#[repr(transparent)]` and
//! compile to raw integers.
//!
//! - [`PhysAddr`]: the address of a physical frame. Never dereferenced.
//! - [`VirtAddr`]: an address inside a 32-bit user image.

use crate::param::PAGE_SIZE;

/// A physical memory address.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct PhysAddr(pub u64);

/// A user virtual address.
///
/// User images live below [`crate::param::USER_TOP`], so 32 bits are enough
/// and match the word size of the image format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct VirtAddr(pub u32);

// =============================================================================
// PhysAddr implementation
// =============================================================================

impl PhysAddr {
    /// The null physical address.
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Frame number of this address.
    #[inline]
    pub const fn frame_number(self) -> u64 {
        self.0 / PAGE_SIZE as u64
    }

    /// Check if address is aligned to the given alignment.
    #[inline]
    pub const fn is_aligned(self, align: u64) -> bool {
        self.0 & (align - 1) == 0
    }
}

// =============================================================================
// VirtAddr implementation
// =============================================================================

impl VirtAddr {
    /// The null virtual address.
    pub const NULL: Self = Self(0);

    #[inline]
    pub const fn new(addr: u32) -> Self {
        Self(addr)
    }

    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Add an offset, returning None on overflow.
    #[inline]
    pub const fn checked_offset(self, off: u32) -> Option<Self> {
        match self.0.checked_add(off) {
            Some(addr) => Some(Self(addr)),
            None => None,
        }
    }

    /// Align address down to the given alignment.
    #[inline]
    pub const fn align_down(self, align: u32) -> Self {
        Self(self.0 & !(align - 1))
    }

    /// Check if address is aligned to the given alignment.
    #[inline]
    pub const fn is_aligned(self, align: u32) -> bool {
        self.0 & (align - 1) == 0
    }

    /// Returns the page-aligned base address.
    #[inline]
    pub const fn page_base(self) -> Self {
        self.align_down(PAGE_SIZE)
    }

    /// Returns the offset within a page.
    #[inline]
    pub const fn page_offset(self) -> u32 {
        self.0 & (PAGE_SIZE - 1)
    }

    /// Whether the address is page aligned.
    #[inline]
    pub const fn is_page_aligned(self) -> bool {
        self.is_aligned(PAGE_SIZE)
    }
}

impl From<u32> for VirtAddr {
    fn from(addr: u32) -> Self {
        Self(addr)
    }
}
