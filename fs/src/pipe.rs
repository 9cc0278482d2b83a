use alloc::sync::Arc;

use spin::Mutex;

use pebble_abi::error::{FileError, FileResult};
use pebble_abi::param::PIPESIZE;

use crate::file::{File, FileKind, FileTable};

struct PipeState {
    data: [u8; PIPESIZE],
    nread: usize,
    nwrite: usize,
    read_open: bool,
    write_open: bool,
}

/// Bounded byte pipe. Never blocks: an empty or full pipe reports
/// `WouldBlock` while the other end is still open.
pub struct Pipe {
    state: Mutex<PipeState>,
}

impl Pipe {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(PipeState {
                data: [0; PIPESIZE],
                nread: 0,
                nwrite: 0,
                read_open: true,
                write_open: true,
            }),
        })
    }

    /// Close one end.
    pub fn close(&self, writable: bool) {
        let mut state = self.state.lock();
        if writable {
            state.write_open = false;
        } else {
            state.read_open = false;
        }
    }

    pub fn is_open(&self) -> (bool, bool) {
        let state = self.state.lock();
        (state.read_open, state.write_open)
    }

    pub fn read(&self, dst: &mut [u8]) -> FileResult<usize> {
        let mut state = self.state.lock();
        if state.nread == state.nwrite {
            if state.write_open && !dst.is_empty() {
                return Err(FileError::WouldBlock);
            }
            return Ok(0);
        }
        let mut n = 0;
        while n < dst.len() && state.nread != state.nwrite {
            dst[n] = state.data[state.nread % PIPESIZE];
            state.nread += 1;
            n += 1;
        }
        Ok(n)
    }

    pub fn write(&self, src: &[u8]) -> FileResult<usize> {
        let mut state = self.state.lock();
        if !state.read_open {
            return Err(FileError::BrokenPipe);
        }
        if src.is_empty() {
            return Ok(0);
        }
        if state.nwrite == state.nread + PIPESIZE {
            return Err(FileError::WouldBlock);
        }
        let mut n = 0;
        while n < src.len() && state.nwrite != state.nread + PIPESIZE {
            let at = state.nwrite % PIPESIZE;
            state.data[at] = src[n];
            state.nwrite += 1;
            n += 1;
        }
        Ok(n)
    }
}

/// Create a pipe and a (read, write) handle pair on it.
pub fn pipe_alloc(table: &Arc<FileTable>) -> FileResult<(File, File)> {
    let pipe = Pipe::new();
    let Some(reader) = table.allocate(FileKind::Pipe(Arc::clone(&pipe)), true, false) else {
        return Err(FileError::TableFull);
    };
    let Some(writer) = table.allocate(FileKind::Pipe(pipe), false, true) else {
        // dropping the reader closes the read end
        return Err(FileError::TableFull);
    };
    Ok((reader, writer))
}
