#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod exec;
pub mod kernel;
pub mod process;
pub mod syscall;

pub use exec::do_exec;
pub use kernel::{KernelConfig, KernelContext};
pub use process::{FdTable, Process, TrapFrame};
pub use syscall::{SyscallContext, syscall_handle};
