//! System-wide table of open file objects.
//!
//! Every open file object lives in a slot of one [`SlabPool`] guarded by the
//! table lock. A [`File`] is a counted reference to such an object: cloning
//! it duplicates the reference and dropping it closes one. The slot goes back
//! to the pool when the last reference is closed.
//!
//! Lock order is inode lock first, table lock second. The table lock is only
//! held for bookkeeping; pipe and inode I/O run outside it.

use alloc::sync::Arc;
use core::fmt;

use spin::Mutex;

use pebble_abi::error::{FileError, FileResult};
use pebble_abi::param::{MAX_WRITE_CHUNK, SLAB_SIZE};
use pebble_abi::stat::FileStat;
use pebble_lib::klog_debug;
use pebble_mm::{PageAllocator, SlabPool, SlabPoolConfig, SlotId};

use crate::inode::Inode;
use crate::pipe::Pipe;

/// What an open file object reads from and writes to.
#[derive(Clone)]
pub enum FileKind {
    Pipe(Arc<Pipe>),
    Inode(Arc<Inode>),
}

impl fmt::Debug for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileKind::Pipe(_) => f.write_str("Pipe"),
            FileKind::Inode(inode) => write!(f, "Inode({})", inode.ino()),
        }
    }
}

/// One slot of the table. A free slot holds the default value: no backing,
/// zero references.
#[derive(Debug, Default)]
pub struct FileObject {
    pub kind: Option<FileKind>,
    pub ref_count: u32,
    pub readable: bool,
    pub writable: bool,
    pub offset: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FileTableStats {
    pub slabs: usize,
    pub capacity: usize,
    pub free: usize,
}

pub struct FileTable {
    pool: Mutex<SlabPool<FileObject, SLAB_SIZE>>,
}

impl FileTable {
    pub fn new(frames: &Arc<PageAllocator>, config: SlabPoolConfig) -> Arc<Self> {
        Arc::new(Self {
            pool: Mutex::new(SlabPool::new(frames, config)),
        })
    }

    /// Open a new file object with one reference. `None` when the pool is
    /// exhausted.
    pub fn allocate(
        self: &Arc<Self>,
        kind: FileKind,
        readable: bool,
        writable: bool,
    ) -> Option<File> {
        let mut pool = self.pool.lock();
        let slot = pool.acquire_slot()?;
        let obj = pool.get_mut(slot)?;
        *obj = FileObject {
            kind: Some(kind),
            ref_count: 1,
            readable,
            writable,
            offset: 0,
        };
        Some(File {
            table: Arc::clone(self),
            slot,
        })
    }

    pub(crate) fn dup(&self, slot: SlotId) {
        let mut pool = self.pool.lock();
        match pool.get_mut(slot) {
            Some(obj) if obj.ref_count >= 1 => obj.ref_count += 1,
            _ => panic!("filedup"),
        }
    }

    pub(crate) fn close(&self, slot: SlotId) {
        let released = {
            let mut pool = self.pool.lock();
            let Some(obj) = pool.get_mut(slot) else {
                panic!("fileclose");
            };
            if obj.ref_count < 1 {
                panic!("fileclose");
            }
            obj.ref_count -= 1;
            if obj.ref_count > 0 {
                return;
            }
            let released = core::mem::take(obj);
            pool.release_slot(slot);
            released
        };

        match released.kind {
            Some(FileKind::Pipe(pipe)) => pipe.close(released.writable),
            Some(FileKind::Inode(inode)) => {
                let journal = Arc::clone(inode.journal());
                let tx = journal.begin_op();
                drop(inode);
                drop(tx);
            }
            None => {}
        }
    }

    fn with_object<R>(&self, slot: SlotId, f: impl FnOnce(&mut FileObject) -> R) -> R {
        let mut pool = self.pool.lock();
        match pool.get_mut(slot) {
            Some(obj) if obj.ref_count >= 1 => f(obj),
            _ => panic!("file: stale handle"),
        }
    }

    pub fn stats(&self) -> FileTableStats {
        let pool = self.pool.lock();
        FileTableStats {
            slabs: pool.slab_count(),
            capacity: pool.capacity(),
            free: pool.free_slots(),
        }
    }

    /// Check slot bookkeeping against object state across every slab.
    pub fn audit(&self) -> Result<(), &'static str> {
        let pool = self.pool.lock();
        for view in pool.slabs() {
            let mut live = 0;
            for (index, obj) in view.objects.iter().enumerate() {
                match (&obj.kind, obj.ref_count) {
                    (None, 0) => {}
                    (None, _) => return Err("file object without backing has references"),
                    (Some(_), 0) => return Err("file object with backing has no references"),
                    (Some(_), _) => live += 1,
                }
                if view.is_claimed(index) != (obj.ref_count > 0) {
                    return Err("claimed slot disagrees with reference count");
                }
            }
            if view.num_free + live != SLAB_SIZE {
                return Err("slab free count does not match live objects");
            }
        }
        Ok(())
    }
}

/// A counted reference to an open file object.
pub struct File {
    table: Arc<FileTable>,
    slot: SlotId,
}

impl File {
    pub fn slot(&self) -> SlotId {
        self.slot
    }

    pub fn table(&self) -> &Arc<FileTable> {
        &self.table
    }

    /// Take another reference to the same object.
    pub fn dup(&self) -> File {
        self.table.dup(self.slot);
        File {
            table: Arc::clone(&self.table),
            slot: self.slot,
        }
    }

    /// Give up this reference.
    pub fn close(self) {
        drop(self);
    }

    pub fn ref_count(&self) -> u32 {
        self.table.with_object(self.slot, |obj| obj.ref_count)
    }

    pub fn offset(&self) -> u32 {
        self.table.with_object(self.slot, |obj| obj.offset)
    }

    pub fn is_readable(&self) -> bool {
        self.table.with_object(self.slot, |obj| obj.readable)
    }

    pub fn is_writable(&self) -> bool {
        self.table.with_object(self.slot, |obj| obj.writable)
    }

    fn snapshot(&self) -> (FileKind, bool, bool) {
        self.table.with_object(self.slot, |obj| match &obj.kind {
            Some(kind) => (kind.clone(), obj.readable, obj.writable),
            None => panic!("file: stale handle"),
        })
    }

    /// `n` is a byte count the inode layer already accepted, so it is at
    /// most `MAXFILE * BSIZE` and fits the offset.
    fn advance(&self, n: usize) {
        let n = u32::try_from(n).unwrap_or(u32::MAX);
        self.table
            .with_object(self.slot, |obj| obj.offset = obj.offset.saturating_add(n));
    }

    pub fn stat(&self) -> FileResult<FileStat> {
        match self.snapshot().0 {
            FileKind::Inode(inode) => {
                let st = inode.lock().stat();
                Ok(st)
            }
            FileKind::Pipe(_) => Err(FileError::InvalidArgument),
        }
    }

    pub fn read(&self, dst: &mut [u8]) -> FileResult<usize> {
        let (kind, readable, _) = self.snapshot();
        if !readable {
            return Err(FileError::NotReadable);
        }
        match kind {
            FileKind::Pipe(pipe) => pipe.read(dst),
            FileKind::Inode(inode) => {
                let guard = inode.lock();
                let n = guard.read_at(self.offset(), dst)?;
                if n > 0 {
                    self.advance(n);
                }
                Ok(n)
            }
        }
    }

    /// Write all of `src`. Inode writes go out in chunks small enough for one
    /// transaction each; earlier chunks stay written if a later one fails.
    pub fn write(&self, src: &[u8]) -> FileResult<usize> {
        let (kind, _, writable) = self.snapshot();
        if !writable {
            return Err(FileError::NotWritable);
        }
        let inode = match kind {
            FileKind::Pipe(pipe) => return pipe.write(src),
            FileKind::Inode(inode) => inode,
        };

        let mut written = 0;
        while written < src.len() {
            let n1 = (src.len() - written).min(MAX_WRITE_CHUNK as usize);
            let tx = inode.journal().begin_op();
            let result = {
                let mut guard = inode.lock();
                let result = guard.write_at(&tx, self.offset(), &src[written..written + n1]);
                if let Ok(n) = result {
                    self.advance(n);
                }
                result
            };
            drop(tx);

            match result {
                Ok(n) if n == n1 => written += n,
                Ok(_) => panic!("short filewrite"),
                Err(err) => {
                    klog_debug!("file: write stopped after {} of {} bytes", written, src.len());
                    return Err(err.into());
                }
            }
        }
        Ok(written)
    }
}

impl Clone for File {
    fn clone(&self) -> Self {
        self.dup()
    }
}

impl Drop for File {
    fn drop(&mut self) {
        self.table.close(self.slot);
    }
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("File").field("slot", &self.slot).finish()
    }
}
