//! Kernel-wide shared state.
//!
//! A [`KernelContext`] owns the frame allocator, the filesystem, the open file
//! table and the MMU state. It is built once from a [`KernelConfig`] and
//! passed by reference to everything that needs it.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicU32, Ordering};

use pebble_abi::error::{ExecError, ExecResult};
use pebble_abi::param::{DEFAULT_FRAME_BUDGET, DEFAULT_FS_BLOCKS};
use pebble_fs::{FileTable, MemFs};
use pebble_lib::klog_info;
use pebble_mm::{AddressSpace, Mmu, PageAllocator, SlabPoolConfig};

use crate::process::Process;

/// Device number of the root filesystem.
pub const ROOT_DEV: u32 = 1;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KernelConfig {
    /// Physical frames available to page tables, user pages and slabs.
    pub frame_budget: u32,
    /// Data blocks available to the root filesystem.
    pub fs_blocks: u32,
    /// Slab pool bounds for the open file table.
    pub file_slabs: SlabPoolConfig,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            frame_budget: DEFAULT_FRAME_BUDGET,
            fs_blocks: DEFAULT_FS_BLOCKS,
            file_slabs: SlabPoolConfig::default(),
        }
    }
}

pub struct KernelContext {
    pub frames: Arc<PageAllocator>,
    pub fs: MemFs,
    pub files: Arc<FileTable>,
    pub mmu: Mmu,
    next_pid: AtomicU32,
}

impl KernelContext {
    pub fn new(config: KernelConfig) -> Self {
        let frames = Arc::new(PageAllocator::new(config.frame_budget));
        let files = FileTable::new(&frames, config.file_slabs);
        klog_info!(
            "kernel: {} frames, {} fs blocks, {} file slabs reserved",
            config.frame_budget,
            config.fs_blocks,
            files.stats().slabs
        );
        Self {
            frames,
            fs: MemFs::new(ROOT_DEV, config.fs_blocks),
            files,
            mmu: Mmu::new(),
            next_pid: AtomicU32::new(1),
        }
    }

    /// A fresh process with an empty address space and no open files.
    pub fn new_process(&self, name: &[u8]) -> ExecResult<Process> {
        let space = AddressSpace::new(&self.frames).map_err(|_| ExecError::NoMem)?;
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        Ok(Process::new(pid, name, space))
    }
}

impl Default for KernelContext {
    fn default() -> Self {
        Self::new(KernelConfig::default())
    }
}
