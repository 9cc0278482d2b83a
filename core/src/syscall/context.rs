use alloc::vec::Vec;

use pebble_abi::addr::VirtAddr;
use pebble_mm::VmResult;

use crate::kernel::KernelContext;
use crate::process::Process;

/// The calling process and kernel state seen by a system call handler.
///
/// Arguments are 32-bit words on the user stack just above the return
/// address, as laid out by the C calling convention.
pub struct SyscallContext<'a> {
    pub kernel: &'a KernelContext,
    pub proc: &'a mut Process,
}

impl<'a> SyscallContext<'a> {
    pub fn new(kernel: &'a KernelContext, proc: &'a mut Process) -> Self {
        Self { kernel, proc }
    }

    /// Fetch the word at `va`. It must lie entirely inside the image.
    pub fn fetch_word(&self, va: u32) -> Option<u32> {
        let end = va.checked_add(4)?;
        if end > self.proc.size {
            return None;
        }
        self.proc.space.read_u32(VirtAddr::new(va)).ok()
    }

    /// Fetch the NUL-terminated string at `va`.
    pub fn fetch_str(&self, va: u32, max: usize) -> VmResult<Vec<u8>> {
        self.proc.space.copy_in_str(VirtAddr::new(va), max)
    }

    /// The `n`th word-sized argument.
    #[inline]
    pub fn arg(&self, n: u32) -> Option<u32> {
        let va = self.proc.tf.esp.checked_add(4 + 4 * n)?;
        self.fetch_word(va)
    }

    #[inline]
    pub fn arg_int(&self, n: u32) -> Option<i32> {
        self.arg(n).map(|word| word as i32)
    }

    /// The `n`th argument as a pointer to `size` bytes of user memory.
    pub fn arg_ptr(&self, n: u32, size: u32) -> Option<VirtAddr> {
        let ptr = self.arg(n)?;
        if ptr >= self.proc.size || ptr.checked_add(size)? > self.proc.size {
            return None;
        }
        Some(VirtAddr::new(ptr))
    }

    /// The `n`th argument as a NUL-terminated string of at most `max` bytes.
    pub fn arg_str(&self, n: u32, max: usize) -> Option<VmResult<Vec<u8>>> {
        let ptr = self.arg(n)?;
        Some(self.fetch_str(ptr, max))
    }
}
