use pebble_abi::error::{ExecError, FileError};

pub type FsResult<T> = Result<T, FsError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsError {
    /// No inode at that path
    NotFound,
    /// Path already names an inode of another kind
    Exists,
    /// Offset lies past the end of the file
    BadOffset,
    /// Write would grow the file past `MAXFILE` blocks
    FileTooLarge,
    /// No data blocks left
    NoSpace,
}

impl From<FsError> for FileError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound => FileError::NoEntry,
            FsError::Exists => FileError::InvalidArgument,
            FsError::BadOffset => FileError::Io,
            FsError::FileTooLarge | FsError::NoSpace => FileError::NoSpace,
        }
    }
}

impl From<FsError> for ExecError {
    fn from(err: FsError) -> Self {
        match err {
            FsError::NotFound => ExecError::NoEntry,
            _ => ExecError::IoError,
        }
    }
}
