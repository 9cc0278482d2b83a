pub mod context;
pub mod dispatch;
pub mod exec;
pub mod fs;


pub use context::SyscallContext;
pub use dispatch::{SyscallEntry, syscall_handle, syscall_lookup};

pub const SYS_PIPE: u32 = 4;
pub const SYS_READ: u32 = 5;
pub const SYS_EXEC: u32 = 7;
pub const SYS_FSTAT: u32 = 8;
pub const SYS_DUP: u32 = 10;
pub const SYS_OPEN: u32 = 15;
pub const SYS_WRITE: u32 = 16;
pub const SYS_CLOSE: u32 = 21;
