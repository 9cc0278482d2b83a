use pebble_lib::klog_warn;

use super::context::SyscallContext;
use super::exec::sys_exec;
use super::fs::{sys_close, sys_dup, sys_fstat, sys_open, sys_pipe, sys_read, sys_write};
use super::{SYS_CLOSE, SYS_DUP, SYS_EXEC, SYS_FSTAT, SYS_OPEN, SYS_PIPE, SYS_READ, SYS_WRITE};
use crate::kernel::KernelContext;
use crate::process::Process;

/// A system call handler. Returns the value to hand back in `eax`: zero or
/// a count on success, a negative error code on failure.
pub type SyscallHandler = fn(&mut SyscallContext<'_>) -> i32;

#[derive(Clone, Copy)]
pub struct SyscallEntry {
    pub num: u32,
    pub name: &'static str,
    pub handler: SyscallHandler,
}

static SYSCALL_TABLE: [SyscallEntry; 8] = [
    SyscallEntry { num: SYS_PIPE, name: "pipe", handler: sys_pipe },
    SyscallEntry { num: SYS_READ, name: "read", handler: sys_read },
    SyscallEntry { num: SYS_EXEC, name: "exec", handler: sys_exec },
    SyscallEntry { num: SYS_FSTAT, name: "fstat", handler: sys_fstat },
    SyscallEntry { num: SYS_DUP, name: "dup", handler: sys_dup },
    SyscallEntry { num: SYS_OPEN, name: "open", handler: sys_open },
    SyscallEntry { num: SYS_WRITE, name: "write", handler: sys_write },
    SyscallEntry { num: SYS_CLOSE, name: "close", handler: sys_close },
];

pub fn syscall_lookup(num: u32) -> Option<&'static SyscallEntry> {
    SYSCALL_TABLE.iter().find(|entry| entry.num == num)
}

/// Run the system call named by `eax` and store its result back in `eax`.
pub fn syscall_handle(kernel: &KernelContext, proc: &mut Process) {
    let num = proc.tf.eax;
    let Some(entry) = syscall_lookup(num) else {
        klog_warn!("syscall: pid {} {}: unknown sys call {}", proc.pid, name_of(proc), num);
        proc.tf.eax = -1i32 as u32;
        return;
    };

    let ret = {
        let mut ctx = SyscallContext::new(kernel, proc);
        (entry.handler)(&mut ctx)
    };
    proc.tf.eax = ret as u32;
}

fn name_of(proc: &Process) -> &str {
    core::str::from_utf8(proc.name()).unwrap_or("?")
}
