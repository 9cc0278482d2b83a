//! Open flags understood by the `open` system call.

use bitflags::bitflags;

bitflags! {
    /// Access mode and creation flags. `RDONLY` is the empty set.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u32 {
        const WRONLY = 0x001;
        const RDWR = 0x002;
        const CREATE = 0x200;
    }
}

impl OpenFlags {
    pub const RDONLY: Self = Self::empty();

    #[inline]
    pub fn readable(self) -> bool {
        !self.contains(Self::WRONLY)
    }

    #[inline]
    pub fn writable(self) -> bool {
        self.intersects(Self::WRONLY | Self::RDWR)
    }
}
