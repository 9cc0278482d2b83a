//! Flat in-memory filesystem.
//!
//! Paths are looked up whole (leading slashes ignored, cut at the first NUL);
//! there is no directory traversal. Data blocks are drawn from a fixed budget
//! shared by every inode.

use alloc::collections::BTreeMap;
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::sync::atomic::{AtomicU32, Ordering};

use spin::Mutex;

use pebble_abi::param::MAX_WRITE_CHUNK;
use pebble_abi::stat::{T_DIR, T_FILE};
use pebble_lib::{c_str_len, klog_debug};

use crate::error::{FsError, FsResult};
use crate::inode::Inode;
use crate::log::{Journal, Transaction};

const ROOT_INO: u32 = 1;

pub(crate) struct Superblock {
    pub(crate) dev: u32,
    pub(crate) journal: Arc<Journal>,
    free_blocks: Mutex<u32>,
}

impl Superblock {
    /// Take up to `want` data blocks. Returns how many were granted.
    pub(crate) fn claim_blocks(&self, want: u32) -> u32 {
        let mut free = self.free_blocks.lock();
        let granted = want.min(*free);
        *free -= granted;
        granted
    }

    pub(crate) fn release_blocks(&self, count: u32) {
        *self.free_blocks.lock() += count;
    }
}

fn normalize(path: &[u8]) -> &[u8] {
    let path = &path[..c_str_len(path)];
    let skip = path.iter().take_while(|&&b| b == b'/').count();
    &path[skip..]
}

pub struct MemFs {
    sb: Arc<Superblock>,
    nodes: Mutex<BTreeMap<Vec<u8>, Arc<Inode>>>,
    next_ino: AtomicU32,
}

impl MemFs {
    pub fn new(dev: u32, total_blocks: u32) -> Self {
        let sb = Arc::new(Superblock {
            dev,
            journal: Journal::new(),
            free_blocks: Mutex::new(total_blocks),
        });
        let mut nodes = BTreeMap::new();
        nodes.insert(
            Vec::new(),
            Arc::new(Inode::new(ROOT_INO, T_DIR, Arc::clone(&sb))),
        );
        Self {
            sb,
            nodes: Mutex::new(nodes),
            next_ino: AtomicU32::new(ROOT_INO + 1),
        }
    }

    pub fn journal(&self) -> &Arc<Journal> {
        &self.sb.journal
    }

    pub fn begin_op(&self) -> Transaction {
        self.sb.journal.begin_op()
    }

    pub fn free_blocks(&self) -> u32 {
        *self.sb.free_blocks.lock()
    }

    pub fn resolve(&self, path: &[u8]) -> FsResult<Arc<Inode>> {
        self.nodes
            .lock()
            .get(normalize(path))
            .cloned()
            .ok_or(FsError::NotFound)
    }

    /// Create an inode of `kind` at `path`. An existing regular file is
    /// returned as is when a regular file is requested.
    pub fn create(&self, path: &[u8], kind: i16) -> FsResult<Arc<Inode>> {
        let key = normalize(path);
        let mut nodes = self.nodes.lock();
        if let Some(existing) = nodes.get(key) {
            if kind == T_FILE && existing.kind() == T_FILE {
                return Ok(Arc::clone(existing));
            }
            return Err(FsError::Exists);
        }
        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed);
        let inode = Arc::new(Inode::new(ino, kind, Arc::clone(&self.sb)));
        nodes.insert(key.to_vec(), Arc::clone(&inode));
        klog_debug!("memfs: created inode {}", ino);
        Ok(inode)
    }

    /// Create a regular file holding `data`, written one journal-sized chunk
    /// per transaction.
    pub fn install(&self, path: &[u8], data: &[u8]) -> FsResult<Arc<Inode>> {
        let inode = self.create(path, T_FILE)?;
        let mut off = 0u32;
        for chunk in data.chunks(MAX_WRITE_CHUNK as usize) {
            let tx = self.begin_op();
            let n = inode.lock().write_at(&tx, off, chunk)?;
            if n < chunk.len() {
                return Err(FsError::NoSpace);
            }
            off += n as u32;
        }
        Ok(inode)
    }

    /// Remove `path` from the namespace. Its blocks are returned once the
    /// last reference to the inode goes away.
    pub fn unlink(&self, path: &[u8]) -> FsResult<()> {
        let key = normalize(path);
        if key.is_empty() {
            return Err(FsError::Exists);
        }
        let inode = self.nodes.lock().remove(key).ok_or(FsError::NotFound)?;
        let _tx = self.begin_op();
        inode.lock().drop_link();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pebble_abi::param::BSIZE;

    #[test]
    fn paths_ignore_leading_slash_and_nul() {
        let fs = MemFs::new(1, 64);
        fs.install(b"/bin/ls", b"hello").unwrap();
        let a = fs.resolve(b"bin/ls").unwrap();
        let b = fs.resolve(b"//bin/ls\0garbage").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(fs.resolve(b"/").unwrap().is_dir());
        assert_eq!(fs.resolve(b"/nope").unwrap_err(), FsError::NotFound);
    }

    #[test]
    fn reads_clamp_at_eof() {
        let fs = MemFs::new(1, 64);
        let inode = fs.install(b"f", b"0123456789").unwrap();
        let guard = inode.lock();
        let mut buf = [0u8; 8];
        assert_eq!(guard.read_at(6, &mut buf).unwrap(), 4);
        assert_eq!(&buf[..4], b"6789");
        assert_eq!(guard.read_at(10, &mut buf).unwrap(), 0);
        assert_eq!(guard.read_at(11, &mut buf), Err(FsError::BadOffset));
    }

    #[test]
    fn block_budget_causes_short_write() {
        let fs = MemFs::new(1, 2);
        let inode = fs.create(b"f", T_FILE).unwrap();
        let tx = fs.begin_op();
        let data = [7u8; 3 * BSIZE as usize];
        let n = inode.lock().write_at(&tx, 0, &data).unwrap();
        assert_eq!(n, 2 * BSIZE as usize);
        assert_eq!(fs.free_blocks(), 0);
        drop(tx);

        let tx = fs.begin_op();
        assert_eq!(
            inode.lock().write_at(&tx, n as u32, &data[..1]),
            Err(FsError::NoSpace)
        );
    }

    #[test]
    fn unlinked_inode_returns_blocks_on_last_drop() {
        let fs = MemFs::new(1, 16);
        let inode = fs.install(b"tmp", &[1u8; 1000]).unwrap();
        assert_eq!(fs.free_blocks(), 14);
        fs.unlink(b"tmp").unwrap();
        assert_eq!(fs.free_blocks(), 14);
        assert_eq!(inode.lock().stat().nlink, 0);
        drop(inode);
        assert_eq!(fs.free_blocks(), 16);
    }

    #[test]
    fn create_rejects_kind_mismatch() {
        let fs = MemFs::new(1, 16);
        let dir = fs.create(b"d", T_DIR).unwrap();
        assert_eq!(fs.create(b"d", T_FILE).unwrap_err(), FsError::Exists);
        let f = fs.create(b"f", T_FILE).unwrap();
        let again = fs.create(b"f", T_FILE).unwrap();
        assert!(Arc::ptr_eq(&f, &again));
        assert_ne!(dir.ino(), f.ino());
    }
}
