//! exec(): replace the calling process image with an ELF binary from the
//! filesystem.
//!
//! The new image is built in a fresh address space. Nothing about the caller
//! changes until every step that can fail has succeeded; the commit at the end
//! cannot fail.

use alloc::vec::Vec;

use pebble_abi::addr::VirtAddr;
use pebble_abi::error::{ExecError, ExecResult};
use pebble_abi::param::{FAKE_RETURN_PC, MAXARG, MAXPATH, PAGE_SIZE, USER_WORD};
use pebble_lib::{
    c_str_len, checked_align_up_u32, copy_truncated, klog_debug, klog_info, last_path_component,
};
use pebble_mm::elf::{ElfHeader, ProgramHeader};
use pebble_mm::{AddressSpace, VmError};

use crate::kernel::KernelContext;
use crate::process::Process;


/// A program image that has been loaded but not yet installed.
struct LoadedImage {
    space: AddressSpace,
    size: u32,
    entry: u32,
}

pub fn do_exec(
    kernel: &KernelContext,
    proc: &mut Process,
    path: &[u8],
    argv: &[&[u8]],
) -> ExecResult<()> {
    let path = &path[..c_str_len(path)];
    let result = exec_image(kernel, proc, path, argv);
    if let Err(err) = result {
        klog_info!(
            "exec: pid {} failed to load {}: {:?}",
            proc.pid,
            core::str::from_utf8(path).unwrap_or("<non-utf8>"),
            err
        );
    }
    result
}

fn exec_image(
    kernel: &KernelContext,
    proc: &mut Process,
    path: &[u8],
    argv: &[&[u8]],
) -> ExecResult<()> {
    if path.is_empty() || path.len() >= MAXPATH {
        return Err(ExecError::NameTooLong);
    }
    if argv.len() > MAXARG {
        return Err(ExecError::TooManyArgs);
    }

    let LoadedImage {
        mut space,
        size,
        entry,
    } = load_image(kernel, path)?;
    let (size, sp) = setup_user_stack(&mut space, size, argv)?;

    // Commit.
    copy_truncated(&mut proc.name, last_path_component(path));
    let old = core::mem::replace(&mut proc.space, space);
    proc.size = size;
    proc.tf.eip = entry;
    proc.tf.esp = sp;
    kernel.mmu.switch_user_vm(&proc.space);
    drop(old);

    klog_debug!(
        "exec: pid {} entry={:#x} sp={:#x} size={:#x}",
        proc.pid,
        entry,
        sp,
        size
    );
    Ok(())
}

/// Map every loadable segment of the ELF file at `path` into a new address
/// space. The inode and the filesystem transaction are released before
/// returning, on every path.
fn load_image(kernel: &KernelContext, path: &[u8]) -> ExecResult<LoadedImage> {
    let tx = kernel.fs.begin_op();
    let inode = kernel.fs.resolve(path)?;
    let mut guard = inode.lock();

    let mut raw = [0u8; ElfHeader::SIZE];
    if guard.read_at(0, &mut raw)? != raw.len() {
        return Err(ExecError::NoExec);
    }
    let elf = ElfHeader::parse(&raw);
    if !elf.has_valid_magic() {
        return Err(ExecError::NoExec);
    }

    let mut space = AddressSpace::new(&kernel.frames)?;
    let mut size = 0u32;
    for index in 0..elf.phnum {
        let off = elf
            .program_header_offset(index)
            .ok_or(ExecError::NoExec)?;
        let mut raw = [0u8; ProgramHeader::SIZE];
        if guard.read_at(off, &mut raw)? != raw.len() {
            return Err(ExecError::NoExec);
        }
        let ph = ProgramHeader::parse(&raw);
        if !ph.is_load() {
            continue;
        }
        if ph.memsz < ph.filesz {
            return Err(ExecError::NoExec);
        }
        let end = ph.mem_end().ok_or(ExecError::NoExec)?;
        if !VirtAddr::new(ph.vaddr).is_page_aligned() {
            return Err(ExecError::NoExec);
        }
        size = space.grow(size, end).map_err(|err| match err {
            VmError::OutOfRange => ExecError::NoExec,
            err => err.into(),
        })?;
        space.load_segment(VirtAddr::new(ph.vaddr), &mut guard, ph.off, ph.filesz)?;
    }

    drop(guard);
    drop(inode);
    drop(tx);

    Ok(LoadedImage {
        space,
        size,
        entry: elf.entry,
    })
}

/// Map a guard page and a stack page above the image and lay out `argv` on
/// the stack. Returns the new image size and the initial stack pointer.
///
/// From the stack pointer upwards: fake return PC, argc, argv pointer, the
/// argument pointers, a null pointer, then the strings themselves.
fn setup_user_stack(space: &mut AddressSpace, size: u32, argv: &[&[u8]]) -> ExecResult<(u32, u32)> {
    let base = checked_align_up_u32(size, PAGE_SIZE).ok_or(ExecError::NoMem)?;
    let top = base.checked_add(2 * PAGE_SIZE).ok_or(ExecError::NoMem)?;
    let size = space.grow(base, top)?;
    space.clear_user(VirtAddr::new(size - 2 * PAGE_SIZE))?;

    let argc = argv.len();
    let mut ustack: Vec<u32> = Vec::with_capacity(3 + argc + 1);
    ustack.extend_from_slice(&[FAKE_RETURN_PC, argc as u32, 0]);

    let mut sp = size;
    for arg in argv {
        let arg = &arg[..c_str_len(arg)];
        let len = u32::try_from(arg.len() + 1).map_err(|_| ExecError::InvalidArgument)?;
        sp = sp.checked_sub(len).ok_or(ExecError::Fault)? & !(USER_WORD - 1);
        space.copy_out(VirtAddr::new(sp), arg)?;
        space.copy_out(VirtAddr::new(sp + arg.len() as u32), &[0])?;
        ustack.push(sp);
    }
    ustack.push(0);
    ustack[2] = sp - (argc as u32 + 1) * USER_WORD;

    let block: Vec<u8> = ustack.iter().flat_map(|word| word.to_le_bytes()).collect();
    sp = sp.checked_sub(block.len() as u32).ok_or(ExecError::Fault)?;
    space.copy_out(VirtAddr::new(sp), &block)?;

    Ok((size, sp))
}
