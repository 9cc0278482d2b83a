use pebble_abi::error::{FileError, FileResult};
use pebble_abi::param::{NOFILE, PROC_NAME_LEN};
use pebble_fs::File;
use pebble_lib::{c_str_len, copy_truncated};
use pebble_mm::AddressSpace;

/// User register state saved on entry to the kernel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrapFrame {
    /// Instruction pointer to resume at
    pub eip: u32,
    /// User stack pointer
    pub esp: u32,
    /// System call number on entry, return value on exit
    pub eax: u32,
}

/// Per-process open file descriptors.
pub struct FdTable {
    slots: [Option<File>; NOFILE],
}

impl FdTable {
    pub fn new() -> Self {
        Self {
            slots: [const { None }; NOFILE],
        }
    }

    /// Install `file` at the lowest free descriptor. The file is closed if
    /// the table is full.
    pub fn alloc(&mut self, file: File) -> FileResult<usize> {
        match self.slots.iter().position(Option::is_none) {
            Some(fd) => {
                self.slots[fd] = Some(file);
                Ok(fd)
            }
            None => Err(FileError::TooManyOpen),
        }
    }

    pub fn get(&self, fd: i32) -> FileResult<&File> {
        usize::try_from(fd)
            .ok()
            .and_then(|fd| self.slots.get(fd))
            .and_then(Option::as_ref)
            .ok_or(FileError::BadDescriptor)
    }

    pub fn take(&mut self, fd: i32) -> FileResult<File> {
        usize::try_from(fd)
            .ok()
            .and_then(|fd| self.slots.get_mut(fd))
            .and_then(Option::take)
            .ok_or(FileError::BadDescriptor)
    }

    pub fn open_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn close_all(&mut self) {
        for slot in self.slots.iter_mut() {
            slot.take();
        }
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

/// The parts of a process control block that exec and the file system calls
/// touch.
pub struct Process {
    pub pid: u32,
    pub name: [u8; PROC_NAME_LEN],
    /// Bytes of user memory, from address 0.
    pub size: u32,
    pub space: AddressSpace,
    pub tf: TrapFrame,
    pub files: FdTable,
}

impl Process {
    pub fn new(pid: u32, name: &[u8], space: AddressSpace) -> Self {
        let mut proc = Self {
            pid,
            name: [0; PROC_NAME_LEN],
            size: 0,
            space,
            tf: TrapFrame::default(),
            files: FdTable::new(),
        };
        copy_truncated(&mut proc.name, name);
        proc
    }

    pub fn name(&self) -> &[u8] {
        &self.name[..c_str_len(&self.name)]
    }
}
