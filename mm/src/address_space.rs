//! Per-process user address spaces.
//!
//! An [`AddressSpace`] owns a translation root frame plus every user page
//! mapped below `USER_TOP`. Pages are tracked by their page-aligned virtual
//! address; all user frames go back to the allocator when the space is
//! dropped.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;

use pebble_abi::addr::{PhysAddr, VirtAddr};
use pebble_abi::error::{ExecError, FileError};
use pebble_abi::param::{PAGE_SIZE, USER_TOP};
use pebble_lib::{align_down_u32, align_up_u32, klog_debug};

use crate::page_alloc::{AllocFlags, PageAllocator, PageFrame};
use crate::paging::PageFlags;

pub type VmResult<T> = Result<T, VmError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VmError {
    /// Frame allocator ran dry
    OutOfMemory,
    /// Request reaches `USER_TOP` or wraps the address space
    OutOfRange,
    /// Address has no mapping
    NotMapped,
    /// Mapping exists but is not user accessible
    NotUser,
    /// Segment load address is not page aligned
    Misaligned,
    /// Image source returned fewer bytes than requested
    ShortRead,
}

impl From<VmError> for ExecError {
    fn from(err: VmError) -> Self {
        match err {
            VmError::OutOfMemory | VmError::OutOfRange => ExecError::NoMem,
            VmError::NotMapped | VmError::NotUser => ExecError::Fault,
            VmError::Misaligned => ExecError::NoExec,
            VmError::ShortRead => ExecError::IoError,
        }
    }
}

impl From<VmError> for FileError {
    fn from(_: VmError) -> Self {
        FileError::Fault
    }
}

/// Something a program image can be read from.
pub trait ImageSource {
    /// Read up to `buf.len()` bytes at `offset`. Returns the number of bytes
    /// read, or `None` on failure.
    fn read_image(&mut self, offset: u32, buf: &mut [u8]) -> Option<usize>;
}

impl ImageSource for &[u8] {
    fn read_image(&mut self, offset: u32, buf: &mut [u8]) -> Option<usize> {
        let start = offset as usize;
        if start > self.len() {
            return None;
        }
        let n = buf.len().min(self.len() - start);
        buf[..n].copy_from_slice(&self[start..start + n]);
        Some(n)
    }
}

struct Mapping {
    frame: PageFrame,
    flags: PageFlags,
}

pub struct AddressSpace {
    root: Option<PageFrame>,
    pages: BTreeMap<u32, Mapping>,
    frames: Arc<PageAllocator>,
}

impl AddressSpace {
    /// Create an empty address space with a fresh translation root.
    pub fn new(frames: &Arc<PageAllocator>) -> VmResult<Self> {
        let root = frames
            .alloc_page_frame(AllocFlags::ZERO | AllocFlags::KERNEL)
            .ok_or(VmError::OutOfMemory)?;
        Ok(Self {
            root: Some(root),
            pages: BTreeMap::new(),
            frames: Arc::clone(frames),
        })
    }

    pub fn root(&self) -> PhysAddr {
        self.root.as_ref().map_or(PhysAddr::NULL, PageFrame::phys)
    }

    pub fn mapped_pages(&self) -> usize {
        self.pages.len()
    }

    /// Map zeroed user pages so that `[0, new_size)` is backed, given that
    /// `[0, old_size)` already is. Returns the new size. On failure every page
    /// mapped by this call is released again.
    pub fn grow(&mut self, old_size: u32, new_size: u32) -> VmResult<u32> {
        if new_size >= USER_TOP {
            return Err(VmError::OutOfRange);
        }
        if new_size < old_size {
            return Ok(old_size);
        }

        let mut va = align_up_u32(old_size, PAGE_SIZE);
        while va < new_size {
            let Some(frame) = self.frames.alloc_page_frame(AllocFlags::ZERO) else {
                klog_debug!("vm: out of frames growing to {:#x}", new_size);
                self.shrink(new_size, old_size);
                return Err(VmError::OutOfMemory);
            };
            let prev = self.pages.insert(
                va,
                Mapping {
                    frame,
                    flags: PageFlags::USER_RW,
                },
            );
            if prev.is_some() {
                panic!("vm: remap of {:#x}", va);
            }
            va += PAGE_SIZE;
        }
        Ok(new_size)
    }

    /// Unmap user pages so that only `[0, new_size)` stays backed. Returns the
    /// new size.
    pub fn shrink(&mut self, old_size: u32, new_size: u32) -> u32 {
        if new_size >= old_size {
            return old_size;
        }
        let start = align_up_u32(new_size, PAGE_SIZE);
        let doomed: Vec<u32> = self
            .pages
            .range(start..old_size)
            .map(|(&va, _)| va)
            .collect();
        for va in doomed {
            if let Some(mapping) = self.pages.remove(&va) {
                self.frames.free_page_frame(mapping.frame);
            }
        }
        new_size
    }

    /// Fill `len` bytes at page-aligned `va` from `source` starting at
    /// `offset`. The destination pages must already be mapped.
    pub fn load_segment<S>(
        &mut self,
        va: VirtAddr,
        source: &mut S,
        offset: u32,
        len: u32,
    ) -> VmResult<()>
    where
        S: ImageSource + ?Sized,
    {
        if !va.is_page_aligned() {
            return Err(VmError::Misaligned);
        }

        let mut done = 0u32;
        while done < len {
            let page_va = va.as_u32().checked_add(done).ok_or(VmError::OutOfRange)?;
            let mapping = self.pages.get_mut(&page_va).ok_or(VmError::NotMapped)?;
            let n = (len - done).min(PAGE_SIZE);
            let file_off = offset.checked_add(done).ok_or(VmError::ShortRead)?;
            let dst = &mut mapping.frame.bytes_mut()[..n as usize];
            match source.read_image(file_off, dst) {
                Some(read) if read == n as usize => {}
                _ => return Err(VmError::ShortRead),
            }
            done = done.saturating_add(PAGE_SIZE);
        }
        Ok(())
    }

    fn user_page(&self, va: u32) -> VmResult<&Mapping> {
        let mapping = self
            .pages
            .get(&align_down_u32(va, PAGE_SIZE))
            .ok_or(VmError::NotMapped)?;
        if !mapping.flags.contains(PageFlags::USER) {
            return Err(VmError::NotUser);
        }
        Ok(mapping)
    }

    fn user_page_mut(&mut self, va: u32) -> VmResult<&mut Mapping> {
        let mapping = self
            .pages
            .get_mut(&align_down_u32(va, PAGE_SIZE))
            .ok_or(VmError::NotMapped)?;
        if !mapping.flags.contains(PageFlags::USER) {
            return Err(VmError::NotUser);
        }
        Ok(mapping)
    }

    /// Copy `data` to user address `va`. Every touched page must be mapped
    /// and user accessible.
    pub fn copy_out(&mut self, va: VirtAddr, data: &[u8]) -> VmResult<()> {
        let mut va = va.as_u32();
        let mut remaining = data;
        while !remaining.is_empty() {
            let off = (va % PAGE_SIZE) as usize;
            let n = (PAGE_SIZE as usize - off).min(remaining.len());
            let mapping = self.user_page_mut(va)?;
            mapping.frame.bytes_mut()[off..off + n].copy_from_slice(&remaining[..n]);
            remaining = &remaining[n..];
            if remaining.is_empty() {
                break;
            }
            va = va.checked_add(n as u32).ok_or(VmError::OutOfRange)?;
        }
        Ok(())
    }

    /// Copy from user address `va` into `buf`.
    pub fn copy_in(&self, va: VirtAddr, buf: &mut [u8]) -> VmResult<()> {
        let mut va = va.as_u32();
        let mut filled = 0;
        while filled < buf.len() {
            let off = (va % PAGE_SIZE) as usize;
            let n = (PAGE_SIZE as usize - off).min(buf.len() - filled);
            let mapping = self.user_page(va)?;
            buf[filled..filled + n].copy_from_slice(&mapping.frame.bytes()[off..off + n]);
            filled += n;
            if filled == buf.len() {
                break;
            }
            va = va.checked_add(n as u32).ok_or(VmError::OutOfRange)?;
        }
        Ok(())
    }

    pub fn write_u32(&mut self, va: VirtAddr, value: u32) -> VmResult<()> {
        self.copy_out(va, &value.to_le_bytes())
    }

    pub fn read_u32(&self, va: VirtAddr) -> VmResult<u32> {
        let mut word = [0u8; 4];
        self.copy_in(va, &mut word)?;
        Ok(u32::from_le_bytes(word))
    }

    /// Fetch the NUL-terminated string at `va`, at most `max` bytes long
    /// (terminator excluded).
    pub fn copy_in_str(&self, va: VirtAddr, max: usize) -> VmResult<Vec<u8>> {
        let mut out = Vec::new();
        let mut cursor = va.as_u32();
        loop {
            let mapping = self.user_page(cursor)?;
            let off = (cursor % PAGE_SIZE) as usize;
            for &byte in &mapping.frame.bytes()[off..] {
                if byte == 0 {
                    return Ok(out);
                }
                if out.len() == max {
                    return Err(VmError::OutOfRange);
                }
                out.push(byte);
            }
            cursor = align_down_u32(cursor, PAGE_SIZE)
                .checked_add(PAGE_SIZE)
                .ok_or(VmError::OutOfRange)?;
        }
    }

    /// Revoke user access to the page containing `va`. Used for the stack
    /// guard page.
    pub fn clear_user(&mut self, va: VirtAddr) -> VmResult<()> {
        let mapping = self
            .pages
            .get_mut(&va.page_base().as_u32())
            .ok_or(VmError::NotMapped)?;
        mapping.flags.remove(PageFlags::USER);
        Ok(())
    }

    pub fn is_mapped(&self, va: VirtAddr) -> bool {
        self.pages.contains_key(&va.page_base().as_u32())
    }

    pub fn is_user_accessible(&self, va: VirtAddr) -> bool {
        self.user_page(va.as_u32()).is_ok()
    }
}

impl Drop for AddressSpace {
    fn drop(&mut self) {
        let pages = core::mem::take(&mut self.pages);
        for (_, mapping) in pages {
            self.frames.free_page_frame(mapping.frame);
        }
        if let Some(root) = self.root.take() {
            self.frames.free_page_frame(root);
        }
    }
}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddressSpace")
            .field("root", &self.root())
            .field("pages", &self.pages.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn space(budget: u32) -> (Arc<PageAllocator>, AddressSpace) {
        let frames = Arc::new(PageAllocator::new(budget));
        let space = AddressSpace::new(&frames).unwrap();
        (frames, space)
    }

    #[test]
    fn grow_maps_whole_pages() {
        let (frames, mut vm) = space(16);
        assert_eq!(vm.grow(0, 1).unwrap(), 1);
        assert_eq!(vm.mapped_pages(), 1);
        assert_eq!(vm.grow(1, 4097).unwrap(), 4097);
        assert_eq!(vm.mapped_pages(), 2);
        assert_eq!(vm.grow(4097, 8192).unwrap(), 8192);
        assert_eq!(vm.mapped_pages(), 2);
        assert_eq!(vm.grow(8192, 100).unwrap(), 8192);
        assert_eq!(frames.stats().allocated_frames, 3);
    }

    #[test]
    fn failed_grow_rolls_back() {
        let (frames, mut vm) = space(4);
        vm.grow(0, PAGE_SIZE).unwrap();
        let before = frames.stats();
        assert_eq!(vm.grow(PAGE_SIZE, 10 * PAGE_SIZE), Err(VmError::OutOfMemory));
        assert_eq!(vm.mapped_pages(), 1);
        assert_eq!(frames.stats(), before);
    }

    #[test]
    fn grow_past_user_top_is_rejected() {
        let (_frames, mut vm) = space(4);
        assert_eq!(vm.grow(0, USER_TOP), Err(VmError::OutOfRange));
        assert_eq!(vm.mapped_pages(), 0);
    }

    #[test]
    fn copy_out_spans_pages_and_respects_user_bit() {
        let (_frames, mut vm) = space(8);
        vm.grow(0, 2 * PAGE_SIZE).unwrap();
        let data = [0x5au8; 64];
        vm.copy_out(VirtAddr::new(PAGE_SIZE - 32), &data).unwrap();
        let mut back = [0u8; 64];
        vm.copy_in(VirtAddr::new(PAGE_SIZE - 32), &mut back).unwrap();
        assert_eq!(back, data);

        vm.clear_user(VirtAddr::new(0)).unwrap();
        assert!(vm.is_mapped(VirtAddr::new(0)));
        assert!(!vm.is_user_accessible(VirtAddr::new(16)));
        assert_eq!(vm.copy_out(VirtAddr::new(16), &data), Err(VmError::NotUser));
        assert_eq!(
            vm.copy_out(VirtAddr::new(2 * PAGE_SIZE), &data),
            Err(VmError::NotMapped)
        );
    }

    #[test]
    fn load_segment_reads_from_source() {
        let (_frames, mut vm) = space(8);
        vm.grow(0, 2 * PAGE_SIZE).unwrap();
        let image: Vec<u8> = (0..6000u32).map(|i| i as u8).collect();
        let mut source: &[u8] = &image;
        vm.load_segment(VirtAddr::new(0), &mut source, 100, 5000).unwrap();
        let mut back = [0u8; 8];
        vm.copy_in(VirtAddr::new(4096), &mut back).unwrap();
        assert_eq!(back[0], (100 + 4096) as u8);

        assert_eq!(
            vm.load_segment(VirtAddr::new(0), &mut source, 5000, 2000),
            Err(VmError::ShortRead)
        );
        assert_eq!(
            vm.load_segment(VirtAddr::new(12), &mut source, 0, 16),
            Err(VmError::Misaligned)
        );
    }

    #[test]
    fn strings_stop_at_nul() {
        let (_frames, mut vm) = space(4);
        vm.grow(0, PAGE_SIZE).unwrap();
        vm.copy_out(VirtAddr::new(8), b"echo\0").unwrap();
        assert_eq!(vm.copy_in_str(VirtAddr::new(8), 16).unwrap(), b"echo");
        assert_eq!(vm.copy_in_str(VirtAddr::new(8), 3), Err(VmError::OutOfRange));
    }

    #[test]
    fn drop_returns_every_frame() {
        let frames = Arc::new(PageAllocator::new(8));
        {
            let mut vm = AddressSpace::new(&frames).unwrap();
            vm.grow(0, 3 * PAGE_SIZE).unwrap();
            assert_eq!(frames.stats().allocated_frames, 4);
        }
        assert_eq!(frames.stats().allocated_frames, 0);
    }
}
