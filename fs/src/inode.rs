use alloc::sync::Arc;
use alloc::vec::Vec;

use spin::{Mutex, MutexGuard};

use pebble_abi::param::{BSIZE, MAXFILE};
use pebble_abi::stat::{FileStat, T_DIR};
use pebble_mm::ImageSource;

use crate::error::{FsError, FsResult};
use crate::log::{Journal, Transaction};
use crate::memfs::Superblock;

#[inline]
fn blocks_for(bytes: u32) -> u32 {
    bytes.div_ceil(BSIZE)
}

pub(crate) struct InodeData {
    bytes: Vec<u8>,
    nlink: i16,
}

/// An in-memory inode. Shared through `Arc`; the contents are only reachable
/// through [`Inode::lock`].
pub struct Inode {
    ino: u32,
    kind: i16,
    sb: Arc<Superblock>,
    data: Mutex<InodeData>,
}

impl Inode {
    pub(crate) fn new(ino: u32, kind: i16, sb: Arc<Superblock>) -> Self {
        Self {
            ino,
            kind,
            sb,
            data: Mutex::new(InodeData {
                bytes: Vec::new(),
                nlink: 1,
            }),
        }
    }

    pub fn ino(&self) -> u32 {
        self.ino
    }

    pub fn kind(&self) -> i16 {
        self.kind
    }

    pub fn is_dir(&self) -> bool {
        self.kind == T_DIR
    }

    /// Journal that must bracket writes to and releases of this inode.
    pub fn journal(&self) -> &Arc<Journal> {
        &self.sb.journal
    }

    pub fn lock(&self) -> InodeGuard<'_> {
        InodeGuard {
            inode: self,
            data: self.data.lock(),
        }
    }
}

impl core::fmt::Debug for Inode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Inode")
            .field("ino", &self.ino)
            .field("kind", &self.kind)
            .finish()
    }
}

impl Drop for Inode {
    fn drop(&mut self) {
        let data = self.data.get_mut();
        if data.nlink == 0 {
            self.sb.release_blocks(blocks_for(data.bytes.len() as u32));
        }
    }
}

/// A locked inode. Unlocks on drop.
pub struct InodeGuard<'a> {
    inode: &'a Inode,
    data: MutexGuard<'a, InodeData>,
}

impl InodeGuard<'_> {
    pub fn size(&self) -> u32 {
        self.data.bytes.len() as u32
    }

    /// Read from `off`, clamped at end of file.
    pub fn read_at(&self, off: u32, dst: &mut [u8]) -> FsResult<usize> {
        let size = self.size();
        if off > size {
            return Err(FsError::BadOffset);
        }
        let n = dst.len().min((size - off) as usize);
        let start = off as usize;
        dst[..n].copy_from_slice(&self.data.bytes[start..start + n]);
        Ok(n)
    }

    /// Write `src` at `off`, growing the file as needed. Writes short when the
    /// filesystem runs out of data blocks part way.
    pub fn write_at(&mut self, tx: &Transaction, off: u32, src: &[u8]) -> FsResult<usize> {
        let size = self.size();
        if off > size {
            return Err(FsError::BadOffset);
        }
        if src.is_empty() {
            return Ok(0);
        }
        let end = u32::try_from(src.len())
            .ok()
            .and_then(|len| off.checked_add(len))
            .ok_or(FsError::FileTooLarge)?;
        if end > MAXFILE * BSIZE {
            return Err(FsError::FileTooLarge);
        }

        // inode block, indirect block, and a bitmap block per data block
        tx.log_blocks(2 * (blocks_for(end) - off / BSIZE) + 2);

        let have = blocks_for(size);
        let want = blocks_for(end);
        let end = if want > have {
            let granted = self.inode.sb.claim_blocks(want - have);
            end.min((have + granted) * BSIZE)
        } else {
            end
        };
        if end <= off {
            return Err(FsError::NoSpace);
        }

        let n = (end - off) as usize;
        let bytes = &mut self.data.bytes;
        if end as usize > bytes.len() {
            bytes.resize(end as usize, 0);
        }
        let start = off as usize;
        bytes[start..start + n].copy_from_slice(&src[..n]);
        Ok(n)
    }

    pub fn stat(&self) -> FileStat {
        FileStat {
            kind: self.inode.kind,
            dev: self.inode.sb.dev as i32,
            ino: self.inode.ino,
            nlink: self.data.nlink,
            size: self.size(),
        }
    }

    pub(crate) fn drop_link(&mut self) {
        self.data.nlink = self.data.nlink.saturating_sub(1);
    }
}

impl ImageSource for InodeGuard<'_> {
    fn read_image(&mut self, offset: u32, buf: &mut [u8]) -> Option<usize> {
        self.read_at(offset, buf).ok()
    }
}
