#![cfg_attr(not(test), no_std)]

extern crate alloc;

mod error;
mod file;
mod fileio;
mod inode;
mod log;
mod memfs;
mod pipe;


pub use error::{FsError, FsResult};
pub use file::{File, FileKind, FileObject, FileTable, FileTableStats};
pub use fileio::file_open;
pub use inode::{Inode, InodeGuard};
pub use log::{Journal, JournalStats, Transaction};
pub use memfs::MemFs;
pub use pipe::{Pipe, pipe_alloc};
