//! File descriptor system calls.
//!
//! Descriptors index the calling process's [`FdTable`](crate::process::FdTable);
//! each one holds a counted reference into the kernel's open file table.

use alloc::vec;

use pebble_abi::error::{FileError, FileResult};
use pebble_abi::fcntl::OpenFlags;
use pebble_abi::param::{MAXPATH, USER_WORD};
use pebble_abi::stat::FileStat;
use pebble_fs::{file_open, pipe_alloc};

use super::context::SyscallContext;

fn ret(result: FileResult<usize>) -> i32 {
    match result {
        Ok(n) => n as i32,
        Err(err) => err.as_c_int(),
    }
}

fn arg_fd(ctx: &SyscallContext<'_>, n: u32) -> FileResult<i32> {
    let fd = ctx.arg_int(n).ok_or(FileError::Fault)?;
    ctx.proc.files.get(fd)?;
    Ok(fd)
}

fn arg_len(ctx: &SyscallContext<'_>, n: u32) -> FileResult<u32> {
    let len = ctx.arg_int(n).ok_or(FileError::Fault)?;
    u32::try_from(len).map_err(|_| FileError::InvalidArgument)
}

pub fn sys_open(ctx: &mut SyscallContext<'_>) -> i32 {
    ret(open(ctx))
}

fn open(ctx: &mut SyscallContext<'_>) -> FileResult<usize> {
    let path = ctx
        .arg_str(0, MAXPATH)
        .ok_or(FileError::Fault)?
        .map_err(|_| FileError::Fault)?;
    let raw = ctx.arg(1).ok_or(FileError::Fault)?;
    let flags = OpenFlags::from_bits(raw).ok_or(FileError::InvalidArgument)?;
    let file = file_open(&ctx.kernel.fs, &ctx.kernel.files, &path, flags)?;
    ctx.proc.files.alloc(file)
}

pub fn sys_read(ctx: &mut SyscallContext<'_>) -> i32 {
    ret(read(ctx))
}

fn read(ctx: &mut SyscallContext<'_>) -> FileResult<usize> {
    let fd = arg_fd(ctx, 0)?;
    let len = arg_len(ctx, 2)?;
    let dst = ctx.arg_ptr(1, len).ok_or(FileError::Fault)?;

    let mut buf = vec![0u8; len as usize];
    let n = ctx.proc.files.get(fd)?.read(&mut buf)?;
    ctx.proc.space.copy_out(dst, &buf[..n])?;
    Ok(n)
}

pub fn sys_write(ctx: &mut SyscallContext<'_>) -> i32 {
    ret(write(ctx))
}

fn write(ctx: &mut SyscallContext<'_>) -> FileResult<usize> {
    let fd = arg_fd(ctx, 0)?;
    let len = arg_len(ctx, 2)?;
    let src = ctx.arg_ptr(1, len).ok_or(FileError::Fault)?;

    let mut buf = vec![0u8; len as usize];
    ctx.proc.space.copy_in(src, &mut buf)?;
    ctx.proc.files.get(fd)?.write(&buf)
}

pub fn sys_close(ctx: &mut SyscallContext<'_>) -> i32 {
    ret(close(ctx))
}

fn close(ctx: &mut SyscallContext<'_>) -> FileResult<usize> {
    let fd = arg_fd(ctx, 0)?;
    ctx.proc.files.take(fd)?.close();
    Ok(0)
}

pub fn sys_dup(ctx: &mut SyscallContext<'_>) -> i32 {
    ret(dup(ctx))
}

fn dup(ctx: &mut SyscallContext<'_>) -> FileResult<usize> {
    let fd = arg_fd(ctx, 0)?;
    let file = ctx.proc.files.get(fd)?.dup();
    ctx.proc.files.alloc(file)
}

pub fn sys_fstat(ctx: &mut SyscallContext<'_>) -> i32 {
    ret(fstat(ctx))
}

fn fstat(ctx: &mut SyscallContext<'_>) -> FileResult<usize> {
    let fd = arg_fd(ctx, 0)?;
    let dst = ctx
        .arg_ptr(1, FileStat::SIZE as u32)
        .ok_or(FileError::Fault)?;
    let st = ctx.proc.files.get(fd)?.stat()?;
    ctx.proc.space.copy_out(dst, &st.to_bytes())?;
    Ok(0)
}

pub fn sys_pipe(ctx: &mut SyscallContext<'_>) -> i32 {
    ret(pipe(ctx))
}

/// pipe(fds): the read end goes in `fds[0]`, the write end in `fds[1]`.
fn pipe(ctx: &mut SyscallContext<'_>) -> FileResult<usize> {
    let fds = ctx
        .arg_ptr(0, 2 * USER_WORD)
        .ok_or(FileError::Fault)?;
    let (rf, wf) = pipe_alloc(&ctx.kernel.files)?;

    let files = &mut ctx.proc.files;
    let fd0 = files.alloc(rf)?;
    let fd1 = match files.alloc(wf) {
        Ok(fd) => fd,
        Err(err) => {
            files.take(fd0 as i32)?;
            return Err(err);
        }
    };

    let mut out = [0u8; 8];
    out[..4].copy_from_slice(&(fd0 as i32).to_le_bytes());
    out[4..].copy_from_slice(&(fd1 as i32).to_le_bytes());
    if ctx.proc.space.copy_out(fds, &out).is_err() {
        ctx.proc.files.take(fd0 as i32)?;
        ctx.proc.files.take(fd1 as i32)?;
        return Err(FileError::Fault);
    }
    Ok(0)
}
