use alloc::sync::Arc;

use pebble_abi::error::{FileError, FileResult};
use pebble_abi::fcntl::OpenFlags;
use pebble_abi::stat::T_FILE;

use crate::file::{File, FileKind, FileTable};
use crate::memfs::MemFs;

/// Open `path` and allocate a file object for it. Directories may only be
/// opened read-only.
pub fn file_open(
    fs: &MemFs,
    table: &Arc<FileTable>,
    path: &[u8],
    flags: OpenFlags,
) -> FileResult<File> {
    let _tx = fs.begin_op();
    let inode = if flags.contains(OpenFlags::CREATE) {
        fs.create(path, T_FILE)?
    } else {
        fs.resolve(path)?
    };
    if inode.is_dir() && flags.writable() {
        return Err(FileError::IsDirectory);
    }
    table
        .allocate(FileKind::Inode(inode), flags.readable(), flags.writable())
        .ok_or(FileError::TableFull)
}
